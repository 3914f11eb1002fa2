//! Liveness check for the HTTP transport
//!
//! Load balancers and container orchestrators poll the configured path and
//! get the status along with the time the check was answered.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Health status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
}

/// Health response structure
#[derive(Debug, Serialize)]
pub struct Health {
    status: HealthStatus,
    timestamp: String,
}

impl Health {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus::Up,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Configuration options for the health check component.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Set to false to disable the health check
    pub enabled: bool,

    /// Optionally set a custom healthcheck path
    /// Defaults to /health
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/health".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HealthCheck {
    config: HealthCheckConfig,
}

impl HealthCheck {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    pub fn health(&self) -> Health {
        Health::at(Utc::now())
    }
}

/// Health check endpoint handler
pub async fn health_endpoint(
    State(health_check): State<HealthCheck>,
) -> (StatusCode, Json<Health>) {
    let health = health_check.health();
    trace!(?health, "health check");
    (StatusCode::OK, Json(health))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_health_check_default_config() {
        let config = HealthCheckConfig::default();
        assert!(config.enabled);
        assert_eq!(config.path, "/health");
    }

    #[test]
    fn test_health_serializes_status_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(
            serde_json::to_value(Health::at(now)).unwrap(),
            json!({ "status": "UP", "timestamp": "2025-01-02T03:04:05.000Z" })
        );
    }

    #[tokio::test]
    async fn test_health_endpoint_reports_up() {
        let health_check = HealthCheck::new(HealthCheckConfig::default());

        let (status, Json(health)) = health_endpoint(State(health_check)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, HealthStatus::Up);
        assert!(DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }
}

//! Cross Origin Resource Sharing (CORS) for the HTTP transport
//!
//! Browser based MCP clients connect to `/sse` from another origin, so CORS
//! is enabled by default and answers for any origin with the methods and
//! headers those clients send:
//! - **Methods:** `["GET", "POST", "OPTIONS"]`
//! - **Headers:** `Content-Type`, `Authorization`, `x-api-key`, `mcp-protocol-version`
//! - **Allow credentials:** `false`

use std::{str::FromStr, time::Duration};

use http::{HeaderName, HeaderValue, Method};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};

use crate::errors::ServerError;

/// Cross origin request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS support
    pub enabled: bool,

    /// Set to false to only allow the listed `origins`. Defaults to true.
    pub allow_any_origin: bool,

    /// Set to true to add the `Access-Control-Allow-Credentials` header.
    pub allow_credentials: bool,

    /// The request headers to allow.
    pub allow_headers: Vec<String>,

    /// Allowed request methods.
    pub methods: Vec<String>,

    /// The `Access-Control-Max-Age` header value in time units
    #[serde(deserialize_with = "humantime_serde::deserialize", default)]
    #[serde(serialize_with = "humantime_serde::serialize")]
    #[schemars(with = "Option<String>", default)]
    pub max_age: Option<Duration>,

    /// The origin(s) to allow requests from when `allow_any_origin` is false.
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_any_origin: true,
            allow_credentials: false,
            allow_headers: default_headers(),
            methods: default_methods(),
            max_age: None,
            origins: Vec::new(),
        }
    }
}

fn default_headers() -> Vec<String> {
    ["content-type", "authorization", "x-api-key", "mcp-protocol-version"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_methods() -> Vec<String> {
    vec!["GET".into(), "POST".into(), "OPTIONS".into()]
}

impl CorsConfig {
    /// Creates a new CorsLayer from this configuration
    pub fn into_layer(self) -> Result<CorsLayer, ServerError> {
        self.validate()?;

        let mut cors = CorsLayer::new();

        if self.allow_any_origin {
            cors = cors.allow_origin(AllowOrigin::any());
        } else if !self.origins.is_empty() {
            cors = cors.allow_origin(parse_all::<HeaderValue>(&self.origins, "origin")?);
        }

        if !self.methods.is_empty() {
            cors = cors.allow_methods(AllowMethods::list(parse_all::<Method>(
                &self.methods,
                "method",
            )?));
        }

        if !self.allow_headers.is_empty() {
            cors = cors.allow_headers(parse_all::<HeaderName>(&self.allow_headers, "header")?);
        }

        if self.allow_credentials {
            cors = cors.allow_credentials(true);
        }

        if let Some(max_age) = self.max_age {
            cors = cors.max_age(max_age);
        }

        Ok(cors)
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.origins.iter().any(|origin| origin == "*") {
            return Err(ServerError::Cors(
                "use `allow_any_origin: true` to set `Access-Control-Allow-Origin: *`".to_string(),
            ));
        }

        if self.origins.iter().any(|origin| origin.ends_with('/')) {
            return Err(ServerError::Cors(
                "origins cannot have trailing slashes".to_string(),
            ));
        }

        if self.allow_credentials {
            if self.allow_any_origin {
                return Err(ServerError::Cors(
                    "cannot combine `allow_credentials: true` with `allow_any_origin: true`"
                        .to_string(),
                ));
            }

            if self
                .allow_headers
                .iter()
                .chain(&self.methods)
                .any(|value| value == "*")
            {
                return Err(ServerError::Cors(
                    "cannot combine `allow_credentials: true` with wildcard headers or methods"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn parse_all<T: FromStr>(values: &[String], kind: &str) -> Result<Vec<T>, ServerError> {
    values
        .iter()
        .map(|value| {
            value
                .parse()
                .map_err(|_| ServerError::Cors(format!("{kind} '{value}' is not valid")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_allows_any_origin_by_default() {
        let config = CorsConfig::default();

        assert!(config.enabled);
        assert!(config.allow_any_origin);
        assert!(!config.allow_credentials);
        assert_eq!(config.methods, vec!["GET", "POST", "OPTIONS"]);
        assert!(config.allow_headers.contains(&"x-api-key".to_string()));
        assert!(config.into_layer().is_ok());
    }

    #[test]
    fn it_builds_a_layer_for_listed_origins() {
        let config = CorsConfig {
            allow_any_origin: false,
            allow_credentials: true,
            origins: vec!["http://localhost:5173".to_string()],
            max_age: Some(Duration::from_secs(600)),
            ..Default::default()
        };

        assert!(config.into_layer().is_ok());
    }

    #[test]
    fn it_rejects_wildcard_origins() {
        let config = CorsConfig {
            allow_any_origin: false,
            origins: vec!["*".to_string()],
            ..Default::default()
        };

        let error = config.into_layer().unwrap_err();

        assert!(error.to_string().contains("allow_any_origin"));
    }

    #[test]
    fn it_rejects_trailing_slashes() {
        let config = CorsConfig {
            allow_any_origin: false,
            origins: vec!["http://localhost:3000/".to_string()],
            ..Default::default()
        };

        assert!(config.into_layer().is_err());
    }

    #[test]
    fn it_rejects_credentials_with_any_origin() {
        let config = CorsConfig {
            allow_credentials: true,
            ..Default::default()
        };

        let error = config.into_layer().unwrap_err();

        assert!(error.to_string().contains("allow_any_origin"));
    }

    #[test]
    fn it_rejects_invalid_methods() {
        let config = CorsConfig {
            methods: vec!["GET POST".to_string()],
            ..Default::default()
        };

        assert_eq!(
            config.into_layer().unwrap_err().to_string(),
            "Invalid CORS configuration: method 'GET POST' is not valid"
        );
    }
}

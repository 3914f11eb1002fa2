use graphql_mcp_server::{
    cache::SchemaCacheConfig, cors::CorsConfig, graphql::AuthType, health::HealthCheckConfig,
    server::Transport,
};
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use super::{endpoint::Endpoint, logging::Logging};

/// Configuration for the MCP server
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// The target GraphQL endpoint
    #[schemars(schema_with = "Url::json_schema")]
    pub endpoint: Endpoint,

    /// Credential sent to the GraphQL endpoint
    #[schemars(with = "Option<String>")]
    pub api_key: Option<SecretString>,

    /// How the credential is presented to the endpoint
    pub auth_type: AuthType,

    /// Reject documents containing a mutation
    pub read_only: bool,

    /// Schema cache configuration
    pub schema_cache: SchemaCacheConfig,

    /// The type of server transport to use
    pub transport: Transport,

    /// CORS configuration for the HTTP transport
    pub cors: CorsConfig,

    /// Health check configuration
    pub health_check: HealthCheckConfig,

    /// Logging configuration
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            api_key: None,
            auth_type: AuthType::default(),
            read_only: true,
            schema_cache: SchemaCacheConfig::default(),
            transport: Transport::default(),
            cors: CorsConfig::default(),
            health_check: HealthCheckConfig::default(),
            logging: Logging::default(),
        }
    }
}

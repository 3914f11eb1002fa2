//! Runtime utilites
//!
//! This module is only used by the main binary and provides helper code
//! related to runtime configuration.

mod config;
mod endpoint;
mod logging;

use std::path::Path;

pub use config::Config;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};

/// Prefix of the environment variables read into the config
const ENV_PREFIX: &str = "GRAPHQL_MCP_";

/// Separator to use when drilling down into nested options in the env figment
const ENV_NESTED_SEPARATOR: &str = "__";

/// Read configuration from environment variables only (when no config file is provided)
#[allow(clippy::result_large_err)]
pub fn read_config_from_env() -> Result<Config, figment::Error> {
    Figment::new()
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .join(legacy_env())
        .join(legacy_port())
        .extract()
}

/// Read in a config from a YAML file, filling in any missing values from the environment
#[allow(clippy::result_large_err)]
pub fn read_config(yaml_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
    Figment::new()
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .join(legacy_env())
        .join(Yaml::file(yaml_path))
        .join(legacy_port())
        .extract()
}

/// Figment provider mapping the unprefixed variables of existing deployments
/// into the nested structure needed by the config
fn legacy_env() -> Env {
    Env::raw()
        .only(&["graphql_api_key", "auth_type", "graphql_read_only", "log_level"])
        .map(|key| match key.to_string().to_lowercase().as_str() {
            "graphql_api_key" => "api_key".into(),
            "graphql_read_only" => "read_only".into(),
            "log_level" => "logging:level".into(),
            other => other.to_string().into(),
        })
        .split(":")
}

/// The `PORT` of existing deployments, read as the HTTP transport port
///
/// Joined last, so an explicit transport from the environment or the file
/// always takes precedence.
fn legacy_port() -> Figment {
    Figment::from(
        Env::raw()
            .only(&["port"])
            .map(|_| "transport:port".into())
            .split(":"),
    )
    .join(Serialized::default("transport.type", "http"))
}

#[cfg(test)]
mod test {
    use graphql_mcp_server::{graphql::AuthType, server::Transport};
    use secrecy::ExposeSecret as _;

    use super::{read_config, read_config_from_env};

    #[test]
    fn it_prioritizes_env_vars() {
        let config = r#"
            endpoint: http://from_file:4000
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";
            let endpoint = "https://from_env:4000/";

            jail.create_file(path, config)?;
            jail.set_env("GRAPHQL_MCP_ENDPOINT", endpoint);

            let config = read_config(path)?;

            assert_eq!(config.endpoint.as_str(), endpoint);
            Ok(())
        });
    }

    #[test]
    fn it_extracts_nested_env() {
        let config = r#"
            schema_cache:
                ttl: 1h
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GRAPHQL_MCP_SCHEMA_CACHE__TTL", "10m");
            jail.set_env("GRAPHQL_MCP_TRANSPORT__TYPE", "stdio");

            let config = read_config(path)?;

            assert_eq!(config.schema_cache.ttl.as_secs(), 600);
            assert_eq!(config.transport, Transport::Stdio);
            Ok(())
        });
    }

    #[test]
    fn it_merges_env_and_file() {
        let config = "
            endpoint: http://from_file:4000/
            transport:
                type: http
                port: 8080
        ";

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GRAPHQL_MCP_READ_ONLY", "false");

            let config = read_config(path)?;

            assert_eq!(config.endpoint.as_str(), "http://from_file:4000/");
            assert!(!config.read_only);
            assert!(matches!(config.transport, Transport::Http { port: 8080, .. }));
            Ok(())
        });
    }

    #[test]
    fn it_maps_legacy_env_vars() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GRAPHQL_API_KEY", "secret");
            jail.set_env("AUTH_TYPE", "x-api-key");
            jail.set_env("GRAPHQL_READ_ONLY", "false");
            jail.set_env("LOG_LEVEL", "debug");

            let config = read_config_from_env()?;

            assert_eq!(
                config.api_key.as_ref().map(|key| key.expose_secret()),
                Some("secret")
            );
            assert_eq!(config.auth_type, AuthType::ApiKey);
            assert!(!config.read_only);
            assert_eq!(config.logging.level, tracing::Level::DEBUG);
            Ok(())
        });
    }

    #[test]
    fn it_defaults_without_any_config() {
        figment::Jail::expect_with(|_jail| {
            let config = read_config_from_env()?;

            assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:4000/");
            assert!(config.api_key.is_none());
            assert!(config.read_only);
            assert_eq!(config.transport, Transport::default());
            Ok(())
        });
    }

    #[test]
    fn it_maps_the_legacy_port_to_the_http_transport() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORT", "8080");

            let config = read_config_from_env()?;

            assert!(matches!(config.transport, Transport::Http { port: 8080, .. }));
            Ok(())
        });
    }

    #[test]
    fn it_prefers_the_configured_port_over_the_legacy_one() {
        let config = "
            transport:
                type: http
                port: 9000
        ";

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("PORT", "8080");

            let config = read_config(path)?;

            assert!(matches!(config.transport, Transport::Http { port: 9000, .. }));
            Ok(())
        });
    }
}

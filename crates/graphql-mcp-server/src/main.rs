use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use graphql_mcp_server::server::Server;
use runtime::Config;
use tracing::{info, warn};

mod runtime;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Arguments to the MCP server
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = STYLES,
    about = "GraphQL MCP Server - let an AI agent explore and query a GraphQL API",
)]
struct Args {
    /// Path to the config file
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: Config = match Args::parse().config {
        Some(config_path) => runtime::read_config(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?,
        None => runtime::read_config_from_env().context("Failed to read config from environment")?,
    };

    let _guard = config.logging.setup()?;

    info!(
        "GraphQL MCP Server v{} starting against {}",
        std::env!("CARGO_PKG_VERSION"),
        config.endpoint.as_str()
    );
    if config.api_key.is_none() {
        warn!("No API key configured, requests to the GraphQL endpoint are unauthenticated");
    }

    Ok(Server::builder()
        .transport(config.transport)
        .endpoint(config.endpoint.into_inner())
        .maybe_api_key(config.api_key)
        .auth_type(config.auth_type)
        .read_only(config.read_only)
        .schema_cache(config.schema_cache)
        .cors(config.cors)
        .health_check(config.health_check)
        .build()
        .start()
        .await?)
}

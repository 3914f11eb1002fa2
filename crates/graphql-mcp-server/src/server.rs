use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bon::bon;
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use url::Url;

use crate::{
    cache::{SchemaCache, SchemaCacheConfig},
    cors::CorsConfig,
    errors::ServerError,
    gateway::Gateway,
    graphql::{AuthType, GraphQLClient},
    health::{HealthCheck, HealthCheckConfig},
    validation::QueryValidator,
};

pub mod http;
pub mod protocol;
pub mod sessions;
pub mod stdio;

use protocol::ProtocolServer;

/// A GraphQL MCP Server
pub struct Server {
    transport: Transport,
    endpoint: Url,
    api_key: Option<SecretString>,
    auth_type: AuthType,
    read_only: bool,
    schema_cache: SchemaCacheConfig,
    cors: CorsConfig,
    health_check: HealthCheckConfig,
}

/// How MCP clients reach the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    /// Newline delimited JSON-RPC over stdin and stdout
    Stdio,

    /// SSE sessions and stateless JSON-RPC calls over HTTP
    Http {
        /// The IP address to bind to
        #[serde(default = "Transport::default_address")]
        address: IpAddr,

        /// The port to bind to
        #[serde(default = "Transport::default_port")]
        port: u16,
    },
}

impl Transport {
    fn default_address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    fn default_port() -> u16 {
        3000
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Http {
            address: Transport::default_address(),
            port: Transport::default_port(),
        }
    }
}

#[bon]
impl Server {
    #[builder]
    pub fn new(
        transport: Transport,
        endpoint: Url,
        api_key: Option<SecretString>,
        #[builder(default)] auth_type: AuthType,
        #[builder(default = true)] read_only: bool,
        #[builder(default)] schema_cache: SchemaCacheConfig,
        #[builder(default)] cors: CorsConfig,
        #[builder(default)] health_check: HealthCheckConfig,
    ) -> Self {
        Self {
            transport,
            endpoint,
            api_key,
            auth_type,
            read_only,
            schema_cache,
            cors,
            health_check,
        }
    }

    /// Serve the configured transport until it ends or a shutdown signal arrives
    pub async fn start(self) -> Result<(), ServerError> {
        let gateway = Gateway::new(
            GraphQLClient::new(self.endpoint, self.api_key, self.auth_type),
            Arc::new(SchemaCache::from_config(&self.schema_cache)),
            QueryValidator::new(self.read_only),
        );

        let cancellation_token = CancellationToken::new();
        tokio::spawn({
            let cancellation_token = cancellation_token.clone();
            async move {
                shutdown_signal().await;
                info!("Shutting down");
                cancellation_token.cancel();
            }
        });

        match self.transport {
            Transport::Stdio => {
                info!("Starting MCP server in stdio mode");
                stdio::serve_stdio(ProtocolServer::new(gateway), cancellation_token).await
            }
            Transport::Http { address, port } => {
                let cors = if self.cors.enabled {
                    Some(self.cors.into_layer()?)
                } else {
                    None
                };
                let health_check = self
                    .health_check
                    .enabled
                    .then(|| HealthCheck::new(self.health_check));
                let router = http::router(
                    ProtocolServer::factory(gateway),
                    health_check,
                    cors,
                    cancellation_token.clone(),
                );

                let address = SocketAddr::new(address, port);
                let listener = tokio::net::TcpListener::bind(address)
                    .await
                    .map_err(|source| ServerError::Bind { address, source })?;
                info!(%address, "Starting MCP server in HTTP mode");

                axum::serve(listener, router)
                    .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
                    .await?;
                Ok(())
            }
        }
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!("Failed to install SIGTERM signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

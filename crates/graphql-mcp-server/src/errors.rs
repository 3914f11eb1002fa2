use std::net::SocketAddr;

use apollo_compiler::{Schema, validation::WithErrors};

/// An error rejecting a GraphQL query before it reaches the upstream endpoint
///
/// The display text of every variant is returned verbatim to the agent, so it
/// carries its own remediation hints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Syntax Error: {message}{hint}")]
    Syntax { message: String, hint: String },

    #[error("Validation Error: Mutations are NOT allowed in Read-only mode.")]
    ReadOnlyViolation,

    #[error("Validation Error: Query depth {depth} exceeds maximum allowed depth of {limit}.")]
    DepthExceeded { depth: usize, limit: usize },

    #[error(
        "Schema Validation Error:\n{}\n\nHow to fix:\n\
        1. Check the 'graphql://schema' resource for correct types and fields.\n\
        2. Ensure you are not querying fields that don't exist on the type.\n\
        3. Distinguish scalar types from object types: scalars take no selection set, objects require one.",
        .0.iter().map(|violation| format!("- {violation}")).collect::<Vec<_>>().join("\n")
    )]
    SchemaValidation(Vec<String>),
}

/// An error talking to the upstream GraphQL endpoint
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Failed to send GraphQL request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("GraphQL Error: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Failed to read GraphQL response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// An error turning an introspection result into a schema
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error("Introspection result has no __schema: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("Introspection result has a malformed type reference in {0}")]
    MalformedTypeRef(String),

    #[error("Could not build schema from introspection: {0}")]
    Schema(Box<WithErrors<Schema>>),
}

/// An error on the execution path shared by the MCP handlers
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("GraphQL Error: introspection returned no data")]
    MissingData,

    #[error("Could not parse cached schema: {0}")]
    CachedSchema(Box<WithErrors<Schema>>),
}

/// An inbound message that could not be read as JSON-RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Parse error: Invalid JSON")]
    Parse,

    #[error("Invalid JSON-RPC request")]
    InvalidRequest,
}

/// An error looking up a streamed session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
}

/// An error in server initialization
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CORS configuration: {0}")]
    Cors(String),

    #[error("Server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// An MCP protocol error
pub type McpError = rmcp::model::ErrorData;

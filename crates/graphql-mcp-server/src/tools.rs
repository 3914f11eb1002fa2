//! MCP tools to allow an AI agent to introspect a GraphQL schema and run queries against it.

pub mod introspect;
pub mod query;

use rmcp::model::{CallToolResult, Content};

/// A tool failure reported to the agent as a successful call with an error text
pub(crate) fn error_result(message: impl std::fmt::Display) -> CallToolResult {
    CallToolResult::success(vec![Content::text(format!("Error: {message}"))])
}

use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use rmcp::schemars;
use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::error_result;
use crate::gateway::Gateway;
use crate::schema_from_type;
use crate::summary::summarize;

/// The name of the tool to run a GraphQL query
pub const QUERY_TOOL_NAME: &str = "query-graphql";

/// A tool running an ad hoc query through the validating gateway
#[derive(Clone)]
pub struct QueryGraphQL {
    pub tool: Tool,
}

/// Input for the query tool
///
/// Arguments are read loosely so that a malformed query reaches the
/// validator and gets its remediation text. This type only describes them.
#[derive(JsonSchema, Deserialize)]
#[allow(dead_code)]
pub struct Input {
    /// The GraphQL query to execute
    query: String,

    /// Variables for the query, as a JSON object
    #[serde(default)]
    variables: Option<Value>,
}

impl QueryGraphQL {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                QUERY_TOOL_NAME,
                "Executes a GraphQL query.",
                schema_from_type!(Input),
            ),
        }
    }

    /// Run the query in `arguments`
    ///
    /// Every failure, including a missing query, is reported as text so the
    /// agent can correct its next call.
    pub async fn execute(&self, gateway: &Gateway, arguments: Option<JsonObject>) -> CallToolResult {
        let mut arguments = arguments.unwrap_or_default();
        let query = match arguments.remove("query") {
            Some(Value::Null) | None => return error_result("Missing 'query' argument"),
            Some(Value::String(query)) if query.is_empty() => {
                return error_result("Missing 'query' argument");
            }
            Some(query) => query,
        };
        let variables = arguments.remove("variables");

        match gateway.execute(&query, variables.as_ref()).await {
            Ok(data) => {
                info!(result = %summarize(&data), "Tool Result: {QUERY_TOOL_NAME}");
                CallToolResult::success(vec![Content::text(data.to_string())])
            }
            Err(error) => error_result(error),
        }
    }
}

impl Default for QueryGraphQL {
    fn default() -> Self {
        Self::new()
    }
}

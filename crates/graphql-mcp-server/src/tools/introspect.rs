use rmcp::model::{CallToolResult, Content, Tool};
use rmcp::schemars;
use rmcp::schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use super::error_result;
use crate::gateway::Gateway;
use crate::schema_from_type;
use crate::summary::summarize;

/// The name of the tool to retrieve the full GraphQL schema
pub const INTROSPECT_TOOL_NAME: &str = "introspect-graphql-schema";

/// A tool returning the upstream introspection result
#[derive(Clone)]
pub struct IntrospectSchema {
    pub tool: Tool,
}

/// Input for the introspect tool, which takes no arguments
#[derive(JsonSchema, Deserialize)]
pub struct Input {}

impl IntrospectSchema {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                INTROSPECT_TOOL_NAME,
                "Retrieves the full GraphQL schema.",
                schema_from_type!(Input),
            ),
        }
    }

    pub async fn execute(&self, gateway: &Gateway) -> CallToolResult {
        match gateway.introspect().await {
            Ok(introspection) => {
                info!(result = %summarize(&introspection), "Tool Result: {INTROSPECT_TOOL_NAME}");
                CallToolResult::success(vec![Content::text(introspection.to_string())])
            }
            Err(error) => error_result(error),
        }
    }
}

impl Default for IntrospectSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::{
        cache::SchemaCache,
        graphql::{AuthType, GraphQLClient},
        validation::QueryValidator,
    };

    fn gateway(url: &str) -> Gateway {
        Gateway::new(
            GraphQLClient::new(Url::parse(url).unwrap(), None, AuthType::Bearer),
            Arc::new(SchemaCache::new(Duration::from_secs(60), None)),
            QueryValidator::new(true),
        )
    }

    fn text(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|content| content.as_text())
            .map(|text| text.text.clone())
            .unwrap()
    }

    #[test]
    fn it_takes_no_arguments() {
        let tool = IntrospectSchema::new().tool;

        assert_eq!(tool.name, INTROSPECT_TOOL_NAME);
        assert!(
            tool.input_schema
                .get("properties")
                .and_then(|properties| properties.as_object())
                .is_none_or(|properties| properties.is_empty())
        );
    }

    #[tokio::test]
    async fn it_returns_the_introspection_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(r#"{"data":{"__schema":{"types":[]}}}"#)
            .create_async()
            .await;

        let result = IntrospectSchema::new()
            .execute(&gateway(&server.url()))
            .await;

        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text(&result)).unwrap(),
            json!({ "__schema": { "types": [] } })
        );
    }

    #[tokio::test]
    async fn it_reports_upstream_failures_as_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .create_async()
            .await;

        let result = IntrospectSchema::new()
            .execute(&gateway(&server.url()))
            .await;

        assert_eq!(text(&result), "Error: GraphQL Error: 503 Service Unavailable");
    }
}

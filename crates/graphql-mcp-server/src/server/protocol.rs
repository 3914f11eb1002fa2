//! The JSON-RPC methods shared by every transport
//!
//! A [`ProtocolServer`] is created per streamed session and per stateless
//! request. The only state it shares with other instances is the immutable
//! [`Gateway`].

use std::{any::Any, panic::AssertUnwindSafe, str::FromStr, sync::Arc};

use futures::FutureExt as _;
use rmcp::model::{
    Annotated, CallToolRequestParam, CallToolResult, ErrorCode, GetPromptRequestParam,
    GetPromptResult, Implementation, ListPromptsResult, ListResourcesResult, ListToolsResult,
    Prompt, PromptArgument, PromptMessage, PromptMessageRole, ProtocolVersion, RawResource,
    ReadResourceRequestParam, ServerCapabilities, ServerInfo,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::{
    errors::McpError,
    gateway::Gateway,
    jsonrpc::{JsonRpcMessage, JsonRpcResponse, Reply},
    summary::summarize,
    tools::{
        introspect::{INTROSPECT_TOOL_NAME, IntrospectSchema},
        query::{QUERY_TOOL_NAME, QueryGraphQL},
    },
};

/// The URI of the schema resource
pub const SCHEMA_RESOURCE_URI: &str = "graphql://schema";

/// The name of the query writing prompt
pub const WRITE_QUERY_PROMPT_NAME: &str = "write-graphql-query";

const SERVER_NAME: &str = "GraphQL MCP Server";
const SCHEMA_READ_FAILED: ErrorCode = ErrorCode(-32000);

/// Produces a fresh [`ProtocolServer`] for each session or stateless request
pub type ServerFactory = Arc<dyn Fn() -> ProtocolServer + Send + Sync>;

/// A method of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Initialize,
    Initialized,
    ListTools,
    CallTool,
    ListResources,
    ReadResource,
    ListPrompts,
    GetPrompt,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Initialize,
        Method::Initialized,
        Method::ListTools,
        Method::CallTool,
        Method::ListResources,
        Method::ReadResource,
        Method::ListPrompts,
        Method::GetPrompt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Initialized => "notifications/initialized",
            Method::ListTools => "tools/list",
            Method::CallTool => "tools/call",
            Method::ListResources => "resources/list",
            Method::ReadResource => "resources/read",
            Method::ListPrompts => "prompts/list",
            Method::GetPrompt => "prompts/get",
        }
    }
}

impl FromStr for Method {
    type Err = McpError;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == method)
            .ok_or_else(|| {
                McpError::new(
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                    None,
                )
            })
    }
}

/// The parts of the `initialize` parameters this server reads
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InitializeParams {
    client_info: Option<Implementation>,
}

/// The `resources/read` result for the schema resource
///
/// Written out here so the text entry carries the `mimeType` key clients
/// expect.
#[derive(Debug, Serialize)]
struct SchemaResourceContents {
    contents: Vec<TextContents>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextContents {
    uri: String,
    mime_type: &'static str,
    text: String,
}

/// Handles protocol methods for one session or one stateless request
pub struct ProtocolServer {
    gateway: Gateway,
    introspect_tool: IntrospectSchema,
    query_tool: QueryGraphQL,
    client_info: Option<Implementation>,
}

impl ProtocolServer {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            introspect_tool: IntrospectSchema::new(),
            query_tool: QueryGraphQL::new(),
            client_info: None,
        }
    }

    /// A factory creating servers that share `gateway`
    pub fn factory(gateway: Gateway) -> ServerFactory {
        Arc::new(move || ProtocolServer::new(gateway.clone()))
    }

    /// The client identity sent with `initialize`, if any
    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.as_ref()
    }

    /// Handle one inbound message
    ///
    /// Notifications are acknowledged without a response envelope. Every
    /// request gets exactly one response, including when its handler panics.
    pub async fn dispatch(&mut self, message: JsonRpcMessage) -> Reply {
        let Some(id) = message.id.filter(|id| !id.is_null()) else {
            if message.method == Method::Initialized.as_str() {
                debug!("Client initialized");
            } else {
                debug!(method = %message.method, "Ignoring notification");
            }
            return Reply::Acknowledged;
        };

        let method = message.method;
        let outcome = guarded(&method, self.handle(&method, message.params)).await;

        Reply::Response(match outcome {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(error) => {
                debug!(code = error.code.0, message = %error.message, "Request failed");
                JsonRpcResponse::error(id, error)
            }
        })
    }

    async fn handle(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        match method.parse::<Method>()? {
            Method::Initialize => {
                let params: InitializeParams = decode(params)?;
                if let Some(client) = &params.client_info {
                    info!(client = %client.name, version = %client.version, "Client connected");
                }
                self.client_info = params.client_info;
                encode(self.get_info())
            }
            Method::Initialized => Ok(Value::Object(Map::new())),
            Method::ListTools => encode(self.list_tools()),
            Method::CallTool => encode(self.call_tool(decode(params)?).await?),
            Method::ListResources => encode(self.list_resources()),
            Method::ReadResource => encode(self.read_resource(decode(params)?).await?),
            Method::ListPrompts => encode(self.list_prompts()),
            Method::GetPrompt => encode(self.get_prompt(decode(params)?)?),
        }
    }

    fn get_info(&self) -> ServerInfo {
        let mut capabilities = ServerCapabilities::builder()
            .enable_tools()
            .enable_resources()
            .enable_prompts()
            .build();
        if let Some(resources) = capabilities.resources.as_mut() {
            resources.subscribe = Some(false);
        }

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities,
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: None,
        }
    }

    fn list_tools(&self) -> ListToolsResult {
        ListToolsResult {
            next_cursor: None,
            tools: vec![self.introspect_tool.tool.clone(), self.query_tool.tool.clone()],
        }
    }

    async fn call_tool(&self, request: CallToolRequestParam) -> Result<CallToolResult, McpError> {
        let arguments = summarize(&serde_json::Value::from(request.arguments.clone()));
        info!(tool = %request.name, %arguments, "Tool call");

        match request.name.as_ref() {
            INTROSPECT_TOOL_NAME => Ok(self.introspect_tool.execute(&self.gateway).await),
            QUERY_TOOL_NAME => Ok(self
                .query_tool
                .execute(&self.gateway, request.arguments)
                .await),
            name => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Unknown tool: {name}"),
                None,
            )),
        }
    }

    fn list_resources(&self) -> ListResourcesResult {
        let mut schema = RawResource::new(SCHEMA_RESOURCE_URI, "GraphQL Schema");
        schema.description = Some("The introspected GraphQL schema in SDL format".to_string());
        schema.mime_type = Some("text/plain".to_string());

        ListResourcesResult {
            next_cursor: None,
            resources: vec![Annotated::new(schema, None)],
        }
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
    ) -> Result<SchemaResourceContents, McpError> {
        if request.uri != SCHEMA_RESOURCE_URI {
            return Err(McpError::new(
                ErrorCode::INVALID_PARAMS,
                format!("Unknown resource: {}", request.uri),
                None,
            ));
        }

        let sdl = self.gateway.schema_sdl().await.map_err(|error| {
            error!("Failed to read schema: {error}");
            McpError::new(
                SCHEMA_READ_FAILED,
                format!("Failed to read schema: {error}"),
                None,
            )
        })?;

        Ok(SchemaResourceContents {
            contents: vec![TextContents {
                uri: request.uri,
                mime_type: "text/plain",
                text: sdl,
            }],
        })
    }

    fn list_prompts(&self) -> ListPromptsResult {
        ListPromptsResult {
            next_cursor: None,
            prompts: vec![Prompt::new(
                WRITE_QUERY_PROMPT_NAME,
                Some("Generate a GraphQL query."),
                Some(vec![PromptArgument {
                    name: "request".to_string(),
                    description: Some("Description of the query to generate".to_string()),
                    required: Some(true),
                }]),
            )],
        }
    }

    fn get_prompt(&self, request: GetPromptRequestParam) -> Result<GetPromptResult, McpError> {
        if request.name != WRITE_QUERY_PROMPT_NAME {
            return Err(McpError::new(
                ErrorCode::INVALID_PARAMS,
                format!("Unknown prompt: {}", request.name),
                None,
            ));
        }

        let description = request
            .arguments
            .as_ref()
            .and_then(|arguments| arguments.get("request"))
            .and_then(Value::as_str)
            .unwrap_or("a query");

        Ok(GetPromptResult {
            description: Some("Generate a GraphQL query.".to_string()),
            messages: vec![PromptMessage::new_text(
                PromptMessageRole::User,
                format!("Generate query for: \"{description}\". Inspect '{SCHEMA_RESOURCE_URI}'."),
            )],
        })
    }
}

fn decode<T: DeserializeOwned>(params: Option<Value>) -> Result<T, McpError> {
    serde_json::from_value(params.unwrap_or_else(|| Value::Object(Map::new()))).map_err(|error| {
        McpError::new(
            ErrorCode::INVALID_PARAMS,
            format!("Invalid params: {error}"),
            None,
        )
    })
}

fn encode<T: Serialize>(result: T) -> Result<Value, McpError> {
    serde_json::to_value(result).map_err(internal_error)
}

/// Run a handler, turning a panic into an internal error
async fn guarded<F>(method: &str, handler: F) -> Result<Value, McpError>
where
    F: Future<Output = Result<Value, McpError>>,
{
    AssertUnwindSafe(handler)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let reason = panic_message(panic.as_ref());
            error!(method, "Handler panicked: {reason}");
            Err(internal_error(reason))
        })
}

fn internal_error(error: impl std::fmt::Display) -> McpError {
    McpError::new(
        ErrorCode::INTERNAL_ERROR,
        format!("Internal error: {error}"),
        None,
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use apollo_compiler::Schema;
    use rstest::rstest;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::{
        cache::{CachedValue, SchemaCache},
        gateway::{PARSED_SCHEMA_KEY, SCHEMA_SDL_KEY},
        graphql::{AuthType, GraphQLClient},
        validation::QueryValidator,
    };

    async fn server(url: &str) -> ProtocolServer {
        let cache = Arc::new(SchemaCache::new(Duration::from_secs(60), None));
        let schema =
            Schema::parse_and_validate("type Query { hello: String }", "schema.graphql").unwrap();
        cache
            .set(PARSED_SCHEMA_KEY, CachedValue::Schema(Arc::new(schema)))
            .await;
        ProtocolServer::new(Gateway::new(
            GraphQLClient::new(Url::parse(url).unwrap(), None, AuthType::Bearer),
            cache,
            QueryValidator::new(true),
        ))
    }

    async fn request(server: &mut ProtocolServer, method: &str, params: Value) -> Value {
        server
            .dispatch(JsonRpcMessage::request(1, method, Some(params)))
            .await
            .into_body()
    }

    #[test]
    fn it_parses_every_method_name() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
        assert_eq!(
            "tools/run".parse::<Method>().unwrap_err().code,
            ErrorCode::METHOD_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn it_turns_handler_panics_into_internal_errors() {
        let error = guarded("tools/call", async {
            if true {
                panic!("upstream exploded");
            }
            Ok(Value::Null)
        })
        .await
        .unwrap_err();

        assert_eq!(error.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(error.message, "Internal error: upstream exploded");
    }

    #[tokio::test]
    async fn it_passes_handler_results_through() {
        let result = guarded("tools/list", async { Ok(json!({ "tools": [] })) }).await;

        assert_eq!(result.unwrap(), json!({ "tools": [] }));
    }

    #[test]
    fn it_reports_unencodable_results_as_internal_errors() {
        let result = std::collections::HashMap::from([((1, 2), "pair keys are not strings")]);

        let error = encode(result).unwrap_err();

        assert_eq!(error.code, ErrorCode::INTERNAL_ERROR);
        assert!(error.message.starts_with("Internal error: "));
    }

    #[tokio::test]
    async fn it_initializes() {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(
            &mut server,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "agent", "version": "1.2.3" }
            }),
        )
        .await;
        let result = &response["result"];

        assert_eq!(result["protocolVersion"], json!("2024-11-05"));
        assert_eq!(result["serverInfo"]["name"], json!("GraphQL MCP Server"));
        assert_eq!(
            result["serverInfo"]["version"],
            json!(env!("CARGO_PKG_VERSION"))
        );
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["prompts"].is_object());
        assert_eq!(result["capabilities"]["resources"]["subscribe"], json!(false));
        assert_eq!(server.client_info().map(|client| client.name.as_str()), Some("agent"));
    }

    #[tokio::test]
    async fn it_acknowledges_notifications() {
        let mut server = server("http://127.0.0.1:1").await;

        let reply = server
            .dispatch(JsonRpcMessage::notification("notifications/initialized", None))
            .await;
        let unknown = server
            .dispatch(JsonRpcMessage::notification("notifications/cancelled", None))
            .await;

        assert_eq!(reply, Reply::Acknowledged);
        assert_eq!(unknown, Reply::Acknowledged);
    }

    #[tokio::test]
    async fn it_answers_initialized_sent_as_a_request() {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(&mut server, "notifications/initialized", json!({})).await;

        assert_eq!(response, json!({ "jsonrpc": "2.0", "id": 1, "result": {} }));
    }

    #[tokio::test]
    async fn it_lists_tools() {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(&mut server, "tools/list", json!({})).await;
        let tools = response["result"]["tools"].as_array().unwrap();
        let names: Vec<_> = tools.iter().map(|tool| tool["name"].clone()).collect();

        assert_eq!(names, vec![json!(INTROSPECT_TOOL_NAME), json!(QUERY_TOOL_NAME)]);
        assert_eq!(tools[1]["inputSchema"]["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn it_calls_the_query_tool() {
        let mut upstream = mockito::Server::new_async().await;
        upstream
            .mock("POST", "/")
            .with_body(r#"{"data":{"hello":"world"}}"#)
            .create_async()
            .await;
        let mut server = server(&upstream.url()).await;

        let response = request(
            &mut server,
            "tools/call",
            json!({ "name": "query-graphql", "arguments": { "query": "{ hello }" } }),
        )
        .await;
        let text = response["result"]["content"][0]["text"].as_str().unwrap();

        assert_eq!(
            serde_json::from_str::<Value>(text).unwrap(),
            json!({ "hello": "world" })
        );
    }

    #[tokio::test]
    async fn it_returns_validation_failures_as_results() {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(
            &mut server,
            "tools/call",
            json!({ "name": "query-graphql", "arguments": { "query": "{ goodbye }" } }),
        )
        .await;
        let text = response["result"]["content"][0]["text"].as_str().unwrap();

        assert!(response.get("error").is_none());
        assert!(text.contains("Schema Validation Error"));
        assert!(text.contains("How to fix"));
    }

    #[tokio::test]
    async fn it_lists_and_reads_the_schema_resource() {
        let mut server = server("http://127.0.0.1:1").await;
        server
            .gateway
            .cache()
            .set(
                SCHEMA_SDL_KEY,
                CachedValue::Text("type Query { hello: String }".to_string()),
            )
            .await;

        let list = request(&mut server, "resources/list", json!({})).await;
        let read = request(
            &mut server,
            "resources/read",
            json!({ "uri": SCHEMA_RESOURCE_URI }),
        )
        .await;

        let resource = &list["result"]["resources"][0];
        let contents = &read["result"]["contents"][0];

        assert_eq!(resource["uri"], json!("graphql://schema"));
        assert_eq!(resource["name"], json!("GraphQL Schema"));
        assert_eq!(resource["mimeType"], json!("text/plain"));
        assert_eq!(contents["uri"], json!("graphql://schema"));
        assert_eq!(contents["mimeType"], json!("text/plain"));
        assert_eq!(contents["text"], json!("type Query { hello: String }"));
    }

    #[tokio::test]
    async fn it_reports_schema_read_failures() {
        let mut upstream = mockito::Server::new_async().await;
        upstream
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;
        let mut server = ProtocolServer::new(Gateway::new(
            GraphQLClient::new(Url::parse(&upstream.url()).unwrap(), None, AuthType::Bearer),
            Arc::new(SchemaCache::new(Duration::from_secs(60), None)),
            QueryValidator::new(true),
        ));

        let response = request(
            &mut server,
            "resources/read",
            json!({ "uri": SCHEMA_RESOURCE_URI }),
        )
        .await;

        assert_eq!(response["error"]["code"], json!(-32000));
        assert!(
            response["error"]["message"]
                .as_str()
                .unwrap()
                .starts_with("Failed to read schema: GraphQL Error: 500")
        );
    }

    #[rstest]
    #[case(json!({ "name": "write-graphql-query", "arguments": { "request": "all users" } }), "Generate query for: \"all users\". Inspect 'graphql://schema'.")]
    #[case(json!({ "name": "write-graphql-query" }), "Generate query for: \"a query\". Inspect 'graphql://schema'.")]
    #[tokio::test]
    async fn it_renders_the_prompt(#[case] params: Value, #[case] expected: &str) {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(&mut server, "prompts/get", params).await;

        assert_eq!(
            response["result"]["messages"],
            json!([{ "role": "user", "content": { "type": "text", "text": expected } }])
        );
    }

    #[tokio::test]
    async fn it_lists_the_prompt() {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(&mut server, "prompts/list", json!({})).await;

        assert_eq!(
            response["result"]["prompts"],
            json!([{
                "name": "write-graphql-query",
                "description": "Generate a GraphQL query.",
                "arguments": [{
                    "name": "request",
                    "description": "Description of the query to generate",
                    "required": true
                }]
            }])
        );
    }

    #[rstest]
    #[case("tools/call", json!({ "name": "nope" }), -32601, "Unknown tool: nope")]
    #[case("resources/read", json!({ "uri": "graphql://other" }), -32602, "Unknown resource: graphql://other")]
    #[case("prompts/get", json!({ "name": "nope" }), -32602, "Unknown prompt: nope")]
    #[case("tools/run", json!({}), -32601, "Method not found: tools/run")]
    #[tokio::test]
    async fn it_reports_protocol_errors(
        #[case] method: &str,
        #[case] params: Value,
        #[case] code: i32,
        #[case] message: &str,
    ) {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(&mut server, method, params).await;

        assert_eq!(response["id"], json!(1));
        assert_eq!(response["error"]["code"], json!(code));
        assert_eq!(response["error"]["message"], json!(message));
    }

    #[tokio::test]
    async fn it_rejects_invalid_params() {
        let mut server = server("http://127.0.0.1:1").await;

        let response = request(&mut server, "tools/call", json!("query-graphql")).await;

        assert_eq!(response["error"]["code"], json!(-32602));
    }
}

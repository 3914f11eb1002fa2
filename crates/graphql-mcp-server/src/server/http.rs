//! HTTP routes for the streamed and stateless transports

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt as _};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};

use super::{
    protocol::ServerFactory,
    sessions::{SessionEvent, SessionManager},
};
use crate::{
    errors::{EnvelopeError, SessionError},
    health::{HealthCheck, health_endpoint},
    jsonrpc::{JsonRpcMessage, JsonRpcResponse},
};

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";
pub const OPENAPI_PATH: &str = "/openapi.json";

#[derive(Clone)]
struct AppState {
    sessions: SessionManager,
    factory: ServerFactory,
    shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Build the router serving both HTTP transports
///
/// Open SSE streams end when `shutdown` is cancelled so that graceful
/// shutdown is not held up by idle sessions.
pub fn router(
    factory: ServerFactory,
    health_check: Option<HealthCheck>,
    cors: Option<CorsLayer>,
    shutdown: CancellationToken,
) -> Router {
    let state = AppState {
        sessions: SessionManager::new(factory.clone(), MESSAGES_PATH),
        factory,
        shutdown,
    };

    let mut router = Router::new()
        .route(SSE_PATH, get(open_session).post(stateless))
        .route(MESSAGES_PATH, post(follow_up))
        .route(OPENAPI_PATH, get(openapi))
        .with_state(state);

    if let Some(health_check) = health_check.filter(|health| health.config().enabled) {
        let health_router = Router::new()
            .route(&health_check.config().path, get(health_endpoint))
            .with_state(health_check.clone());
        router = router.merge(health_router);
    }

    if let Some(cors) = cors {
        router = router.layer(cors);
    }

    router.layer(TraceLayer::new_for_http())
}

async fn open_session(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state.sessions.open();
    debug!(session_id = stream.id(), "SSE stream opened");
    Sse::new(
        stream
            .map(into_event)
            .take_until(state.shutdown.cancelled_owned()),
    )
    .keep_alive(KeepAlive::default())
}

fn into_event(event: SessionEvent) -> Result<Event, axum::Error> {
    match event {
        SessionEvent::Endpoint(uri) => Ok(Event::default().event("endpoint").data(uri)),
        SessionEvent::Message(response) => Event::default().event("message").json_data(response),
    }
}

async fn follow_up(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    if !state.sessions.contains(&query.session_id) {
        return SessionError::NotFound.into_response();
    }
    let message = match JsonRpcMessage::from_slice(&body) {
        Ok(message) => message,
        Err(error) => return error.into_response(),
    };

    match state.sessions.forward(&query.session_id, message) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(error) => error.into_response(),
    }
}

/// Answer one JSON-RPC message with a fresh protocol server
async fn stateless(State(state): State<AppState>, body: Bytes) -> Response {
    let message = match JsonRpcMessage::from_slice(&body) {
        Ok(message) => message,
        Err(error) => return error.into_response(),
    };

    let mut server = (state.factory)();
    let reply = server.dispatch(message).await;
    (StatusCode::OK, Json(reply.into_body())).into_response()
}

async fn openapi(headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let protocol = header("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header("host").unwrap_or_else(|| "localhost".to_string());

    Json(json!({
        "openapi": "3.0.1",
        "info": {
            "title": "GraphQL MCP Server",
            "description": "Model Context Protocol Server for GraphQL",
            "version": env!("CARGO_PKG_VERSION")
        },
        "servers": [{ "url": format!("{protocol}://{host}") }],
        "paths": {
            SSE_PATH: {
                "get": {
                    "summary": "Connect via Server-Sent Events",
                    "responses": { "200": { "description": "SSE Stream" } }
                },
                "post": {
                    "summary": "Send JSON-RPC Message",
                    "requestBody": {
                        "content": { "application/json": { "schema": { "type": "object" } } }
                    },
                    "responses": {
                        "200": { "description": "JSON-RPC Response" },
                        "400": { "description": "Malformed JSON-RPC envelope" }
                    }
                }
            },
            MESSAGES_PATH: {
                "post": {
                    "summary": "Send a JSON-RPC message to an open SSE session",
                    "parameters": [{
                        "name": "sessionId",
                        "in": "query",
                        "required": true,
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "202": { "description": "Accepted, the response is sent on the SSE stream" },
                        "404": { "description": "Session not found" }
                    }
                }
            }
        }
    }))
}

impl IntoResponse for EnvelopeError {
    fn into_response(self) -> Response {
        warn!("Rejected message: {self}");
        match self {
            EnvelopeError::Parse => (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::parse_error()),
            )
                .into_response(),
            EnvelopeError::InvalidRequest => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, self.to_string()).into_response()
    }
}

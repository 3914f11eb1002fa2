//! JSON-RPC 2.0 envelopes

use rmcp::model::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::errors::{EnvelopeError, McpError};

pub const JSONRPC_VERSION: &str = "2.0";

/// An inbound request or notification
///
/// A message without an `id` is a notification and never gets a response
/// envelope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcMessage {
    pub fn request(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Read a message from a raw request body
    pub fn from_slice(body: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| EnvelopeError::Parse)?;
        Self::from_value(value)
    }

    /// Read a message from an already parsed JSON value
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let message: Self =
            serde_json::from_value(value).map_err(|_| EnvelopeError::InvalidRequest)?;
        if message.jsonrpc != JSONRPC_VERSION {
            return Err(EnvelopeError::InvalidRequest);
        }
        Ok(message)
    }
}

/// The outcome half of a response envelope
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(McpError),
}

/// A response to a request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn error(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// The envelope sent for bodies that are not valid JSON
    pub fn parse_error() -> Self {
        Self::error(
            Value::Null,
            McpError::new(ErrorCode::PARSE_ERROR, EnvelopeError::Parse.to_string(), None),
        )
    }
}

/// What dispatching one inbound message produced
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A request was answered
    Response(JsonRpcResponse),

    /// A notification was accepted
    Acknowledged,
}

impl Reply {
    /// The body to return for a single-shot exchange
    pub fn into_body(self) -> Value {
        match self {
            Reply::Response(response) => {
                let id = response.id.clone();
                serde_json::to_value(response)
                    .unwrap_or_else(|error| internal_error_body(id, error))
            }
            Reply::Acknowledged => Value::Object(Map::new()),
        }
    }
}

/// A -32603 envelope built without going through serde derive
fn internal_error_body(id: Value, error: impl std::fmt::Display) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": ErrorCode::INTERNAL_ERROR.0,
            "message": format!("Internal error: {error}"),
        },
    })
}

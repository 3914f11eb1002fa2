//! Strip server internals from upstream GraphQL responses before they reach an agent.

use serde_json::{Map, Value};

/// Message used for error entries that carry none
const UNKNOWN_ERROR: &str = "Unknown Error";

/// Extension fields that leak server internals
const SENSITIVE_EXTENSIONS: [&str; 2] = ["exception", "stacktrace"];

/// Sanitize a GraphQL response body
///
/// Every entry of a top-level `errors` array is rebuilt from `message`,
/// `locations`, `path` and `extensions` only, with the sensitive extension
/// fields removed. Everything else in the body passes through untouched.
pub fn sanitize_response(mut response: Value) -> Value {
    if let Some(Value::Array(errors)) = response.get_mut("errors") {
        for error in errors.iter_mut() {
            *error = sanitize_error(error.take());
        }
    }
    response
}

fn sanitize_error(error: Value) -> Value {
    let Value::Object(mut error) = error else {
        return unknown_error();
    };

    let mut sanitized = Map::new();
    let message = match error.remove("message") {
        Some(Value::Null) | None => Value::String(UNKNOWN_ERROR.to_string()),
        Some(message) => message,
    };
    sanitized.insert("message".to_string(), message);

    for key in ["locations", "path"] {
        if let Some(value) = error.remove(key) {
            sanitized.insert(key.to_string(), value);
        }
    }

    if let Some(mut extensions) = error.remove("extensions") {
        if let Some(fields) = extensions.as_object_mut() {
            for key in SENSITIVE_EXTENSIONS {
                fields.remove(key);
            }
        }
        sanitized.insert("extensions".to_string(), extensions);
    }

    Value::Object(sanitized)
}

fn unknown_error() -> Value {
    let mut error = Map::new();
    error.insert(
        "message".to_string(),
        Value::String(UNKNOWN_ERROR.to_string()),
    );
    Value::Object(error)
}

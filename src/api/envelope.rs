//! Request and response envelopes shared by the ack endpoints.
//!
//! Requests carry their arguments as a single JSON body under `payload`,
//! either as an embedded JSON string or as an object. Handlers produce a
//! [`HandlerResponse`] `{payload, status}` which renders as that HTTP status
//! with `payload` as the JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Result of one handler invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub payload: Value,
    pub status: u16,
}

impl HandlerResponse {
    pub fn ok(payload: Value) -> Self {
        Self {
            payload,
            status: 200,
        }
    }

    pub fn internal(payload: Value) -> Self {
        Self {
            payload,
            status: 500,
        }
    }

    /// `{"action": "failure", "result": <message>}` with status 500.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::internal(json!({"action": "failure", "result": message.into()}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.payload)).into_response()
    }
}

/// Extract the argument object from a raw request body.
///
/// Returns `None` when the body is missing, is not JSON, or carries no
/// usable object under `payload`; callers answer those with their usage
/// description.
pub fn parse_payload(body: &[u8]) -> Option<Map<String, Value>> {
    let raw: Value = serde_json::from_slice(body).ok()?;
    match raw.get("payload")? {
        Value::String(embedded) => match serde_json::from_str::<Value>(embedded).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        },
        Value::Object(map) => Some(map.clone()),
        _ => None,
    }
}

/// Whether the arguments ask for the usage description.
///
/// Follows loose truthiness: `true`, any non-empty string, a non-zero
/// number or a non-empty container all count.
pub fn wants_describe(args: &Map<String, Value>) -> bool {
    match args.get("describe") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Render a request value as text, the way it is echoed back in messages.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

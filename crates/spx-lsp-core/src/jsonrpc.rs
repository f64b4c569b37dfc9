//! JSON-RPC 2.0 adapter for the engine boundary.
//!
//! The language server itself speaks plain JSON-RPC, where request, response and
//! notification are told apart only by which keys are present. That structural
//! check lives here and nowhere else; the rest of the bridge works with the
//! tagged [`LspMessage`].

use crate::envelope::{
    LspMessage, Notification, Request, RequestId, Response, ResponseError, ResponseOutcome,
};
use serde_json::{Map, Value};
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Convert a tagged message into a JSON-RPC 2.0 object.
pub fn to_jsonrpc(message: &LspMessage) -> Value {
    let mut object = Map::new();
    object.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
    match message {
        LspMessage::Request(Request { id, method, params }) => {
            object.insert("id".into(), id_to_value(id));
            object.insert("method".into(), Value::from(method.as_str()));
            if let Some(params) = params {
                object.insert("params".into(), params.clone());
            }
        }
        LspMessage::Response(Response { id, outcome }) => {
            object.insert("id".into(), id_to_value(id));
            match outcome {
                ResponseOutcome::Result(result) => {
                    object.insert("result".into(), result.clone());
                }
                ResponseOutcome::Error(error) => {
                    let error = serde_json::to_value(error).unwrap_or(Value::Null);
                    object.insert("error".into(), error);
                }
            }
        }
        LspMessage::Notification(Notification { method, params }) => {
            object.insert("method".into(), Value::from(method.as_str()));
            if let Some(params) = params {
                object.insert("params".into(), params.clone());
            }
        }
    }
    Value::Object(object)
}

/// Classify a JSON-RPC 2.0 object.
///
/// - `id` + `method` → request
/// - `id` + exactly one of `result` / `error` → response
/// - `method` without `id` → notification
pub fn from_jsonrpc(value: Value) -> Result<LspMessage, JsonRpcError> {
    let Value::Object(mut object) = value else {
        return Err(JsonRpcError::NotAnObject);
    };

    let id = match object.remove("id") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(RequestId::Number(
            n.as_i64().ok_or(JsonRpcError::InvalidId)?,
        )),
        Some(Value::String(s)) => Some(RequestId::String(s)),
        Some(_) => return Err(JsonRpcError::InvalidId),
    };
    let method = match object.remove("method") {
        None => None,
        Some(Value::String(m)) => Some(m),
        Some(_) => return Err(JsonRpcError::InvalidMethod),
    };
    let params = object.remove("params");
    let result = object.remove("result");
    let error = object.remove("error");

    match (id, method) {
        (Some(id), Some(method)) => Ok(LspMessage::Request(Request { id, method, params })),
        (None, Some(method)) => Ok(LspMessage::Notification(Notification { method, params })),
        (Some(id), None) => {
            let outcome = match (result, error) {
                (Some(result), None) => ResponseOutcome::Result(result),
                (None, Some(error)) => ResponseOutcome::Error(
                    serde_json::from_value::<ResponseError>(error)
                        .map_err(|e| JsonRpcError::InvalidError(e.to_string()))?,
                ),
                (Some(_), Some(_)) => return Err(JsonRpcError::AmbiguousResponse),
                // A response without result is a success with `null`
                (None, None) => ResponseOutcome::Result(Value::Null),
            };
            Ok(LspMessage::Response(Response { id, outcome }))
        }
        (None, None) => Err(JsonRpcError::Unclassifiable),
    }
}

fn id_to_value(id: &RequestId) -> Value {
    match id {
        RequestId::Number(n) => Value::from(*n),
        RequestId::String(s) => Value::from(s.as_str()),
    }
}

/// Reasons a JSON-RPC object could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRpcError {
    NotAnObject,
    InvalidId,
    InvalidMethod,
    InvalidError(String),
    AmbiguousResponse,
    Unclassifiable,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcError::NotAnObject => write!(f, "JSON-RPC message is not an object"),
            JsonRpcError::InvalidId => write!(f, "JSON-RPC id must be an integer or a string"),
            JsonRpcError::InvalidMethod => write!(f, "JSON-RPC method must be a string"),
            JsonRpcError::InvalidError(msg) => write!(f, "invalid JSON-RPC error object: {msg}"),
            JsonRpcError::AmbiguousResponse => {
                write!(f, "JSON-RPC response carries both result and error")
            }
            JsonRpcError::Unclassifiable => {
                write!(f, "JSON-RPC message has neither id nor method")
            }
        }
    }
}

impl std::error::Error for JsonRpcError {}

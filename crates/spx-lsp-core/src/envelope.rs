//! Message Envelope
//!
//! Every value that crosses the host/worker channel is an [`Envelope`]. There are
//! exactly two families:
//!
//! - `files`: a full [`FileSet`] snapshot. Fire-and-forget, no id, no response.
//!   On receipt it replaces the worker's view wholesale.
//! - `lsp`: one [`LspMessage`] (request, response or notification).
//!
//! Both layers carry an explicit tag field (`type` for the envelope, `kind` for
//! the LSP payload) so decoding never depends on which keys happen to be present.
//!
//! ```text
//! {"type":"files","files":{"main.spx":{"content":"...","modTime":0}}}
//! {"type":"lsp","message":{"kind":"request","id":1,"method":"textDocument/hover","params":{}}}
//! {"type":"lsp","message":{"kind":"response","id":1,"result":null}}
//! {"type":"lsp","message":{"kind":"notification","method":"textDocument/publishDiagnostics","params":{}}}
//! ```

use crate::files::FileSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a request. Unique for the lifetime of a channel direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

/// Structured failure reported by the engine for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Used by the worker when the engine never came up.
    pub const SERVER_NOT_INITIALIZED: i64 = -32002;
    pub const REQUEST_CANCELLED: i64 = -32800;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Success/error disjunction of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOutcome {
    Result(Value),
    Error(ResponseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

impl Response {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Result(result),
        }
    }

    pub fn err(id: RequestId, error: ResponseError) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Error(error),
        }
    }

    pub fn into_result(self) -> Result<Value, ResponseError> {
        match self.outcome {
            ResponseOutcome::Result(value) => Ok(value),
            ResponseOutcome::Error(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// LSP payload carried by an `lsp` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LspMessage {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl LspMessage {
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        LspMessage::Request(Request {
            id: id.into(),
            method: method.into(),
            params,
        })
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        LspMessage::Notification(Notification {
            method: method.into(),
            params,
        })
    }

    /// Method name for requests and notifications; `None` for responses.
    pub fn method(&self) -> Option<&str> {
        match self {
            LspMessage::Request(r) => Some(&r.method),
            LspMessage::Notification(n) => Some(&n.method),
            LspMessage::Response(_) => None,
        }
    }

    /// Request or response id; `None` for notifications.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            LspMessage::Request(r) => Some(&r.id),
            LspMessage::Response(r) => Some(&r.id),
            LspMessage::Notification(_) => None,
        }
    }
}

/// Outer message exchanged between the host and the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Files { files: FileSet },
    Lsp { message: LspMessage },
}

impl Envelope {
    pub fn files(files: FileSet) -> Self {
        Envelope::Files { files }
    }

    pub fn lsp(message: LspMessage) -> Self {
        Envelope::Lsp { message }
    }

    /// Decode one envelope. Failures only concern this message.
    pub fn decode(value: Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value).map_err(|e| DecodeError(e.to_string()))
    }

    pub fn encode(&self) -> Result<Value, EncodeError> {
        serde_json::to_value(self).map_err(|e| EncodeError(e.to_string()))
    }
}

/// A value on the channel that is not a well-formed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed envelope: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError(pub String);

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to encode envelope: {}", self.0)
    }
}

impl std::error::Error for EncodeError {}

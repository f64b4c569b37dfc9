//! Wire types for the spx language server bridge.
//!
//! Shared by the host-side client and the worker-side runtime so both ends
//! encode and decode the channel identically.

pub mod envelope;
pub mod error;
pub mod files;
pub mod jsonrpc;

pub use envelope::{
    DecodeError, EncodeError, Envelope, LspMessage, Notification, Request, RequestId, Response,
    ResponseError, ResponseOutcome,
};
pub use error::ClientError;
pub use files::{File, FileSet};

/// Notification sent to the engine when a request is abandoned.
pub const CANCEL_REQUEST_METHOD: &str = "$/cancelRequest";

use crate::envelope::ResponseError;
use std::fmt;

/// Ways a request made through the bridge can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The engine reported a structured failure for this request.
    Engine(ResponseError),
    /// The worker terminated or the channel was disposed.
    ChannelClosed,
    /// The request was aborted locally before a response arrived.
    Canceled,
    /// The engine failed to start; the worker instance is unusable.
    StartupFailure(String),
    /// The result could not be decoded into the expected type.
    InvalidResponse(String),
    /// The params could not be encoded.
    Serialization(String),
}

impl ClientError {
    /// Cancellation is expected and should not be reported as a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ClientError::Canceled)
    }

    /// Map an error response to the matching variant. The worker answers with
    /// `SERVER_NOT_INITIALIZED` only when the engine could not be started.
    pub fn from_response_error(error: ResponseError) -> Self {
        if error.code == ResponseError::SERVER_NOT_INITIALIZED {
            ClientError::StartupFailure(error.message)
        } else {
            ClientError::Engine(error)
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Engine(error) => write!(f, "Language server error: {error}"),
            ClientError::ChannelClosed => write!(f, "Language server channel closed"),
            ClientError::Canceled => write!(f, "Request canceled"),
            ClientError::StartupFailure(msg) => {
                write!(f, "Language server failed to start: {msg}")
            }
            ClientError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
            ClientError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

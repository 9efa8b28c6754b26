pub mod codec;
pub mod message;

#[cfg(test)]
mod tests;

pub use codec::{decode_str, decode_value, encode_client, encode_server, encode_string, encode_value};
pub use message::*;

use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Why an inbound payload could not be turned into a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is not JSON at all
    #[error("Parse error: {0}")]
    Parse(String),

    /// The payload is JSON but not a JSON-RPC message
    #[error("Invalid message: {0}")]
    Invalid(String),
}

impl DecodeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::Parse(_) => ErrorCode::PARSE_ERROR,
            DecodeError::Invalid(_) => ErrorCode::INVALID_REQUEST,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The peer answered with a failed response
    #[error("Remote error {0}")]
    Remote(ResponseError),

    /// A response arrived whose id matches no outstanding request
    #[error("Response for unknown request id {0}")]
    UnknownResponse(RequestId),

    #[error("Request id {0} is already pending")]
    DuplicateRequestId(RequestId),

    /// A local handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Timed out after {}ms", duration.as_millis())]
    Timeout {
        request: Option<Box<Request>>,
        duration: Duration,
    },

    /// The connection went away while the call was outstanding
    #[error("Connection closed")]
    ConnectionClosed,

    /// The engine or transport was already closed when the call was made
    #[error("Engine is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Fieldless discriminant of [`Error`], used to select failures by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    Remote,
    UnknownResponse,
    DuplicateRequestId,
    Handler,
    Timeout,
    ConnectionClosed,
    Closed,
    Transport,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::Remote => "remote",
            ErrorKind::UnknownResponse => "unknown_response",
            ErrorKind::DuplicateRequestId => "duplicate_request_id",
            ErrorKind::Handler => "handler",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionClosed => "connection_closed",
            ErrorKind::Closed => "closed",
            ErrorKind::Transport => "transport",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Decode(_) => ErrorKind::Decode,
            Error::Remote(_) => ErrorKind::Remote,
            Error::UnknownResponse(_) => ErrorKind::UnknownResponse,
            Error::DuplicateRequestId(_) => ErrorKind::DuplicateRequestId,
            Error::Handler(_) => ErrorKind::Handler,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::ConnectionClosed => ErrorKind::ConnectionClosed,
            Error::Closed => ErrorKind::Closed,
            Error::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn timeout(request: Option<Request>, duration: Duration) -> Self {
        Error::Timeout {
            request: request.map(Box::new),
            duration,
        }
    }

    /// The wire error object that best describes this failure
    pub fn to_response_error(&self) -> ResponseError {
        match self {
            Error::Remote(error) => error.clone(),
            Error::Decode(e) => ResponseError::new(e.code(), e.to_string()),
            Error::Timeout { duration, .. } => ResponseError::new(
                ErrorCode::REQUEST_TIMEOUT,
                self.to_string(),
            )
            .with_data(json!({ "timeout_ms": duration.as_millis() as u64 })),
            Error::ConnectionClosed | Error::Closed => {
                ResponseError::new(ErrorCode::CONNECTION_CLOSED, self.to_string())
            }
            other => ResponseError::internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Handler(format!("{:#}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Handler(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

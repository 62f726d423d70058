//! Error type shared by the encoder, decoder and transports.

use bytes::Bytes;
use std::io;

/// Boxed error returned by [`InvocationClient`](crate::invoke::InvocationClient)
/// implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by a round trip through a function.
#[derive(Debug, thiserror::Error)]
pub enum TripError {
    /// The request could not be turned into a wire event.
    #[error("failed to encode request: {0}")]
    Encoding(String),

    /// The invocation client itself failed.
    #[error("invocation failed: {0}")]
    Invocation(#[source] BoxError),

    /// The invocation succeeded at the transport level but reported a
    /// non-success status. The payload is left untouched.
    #[error("unexpected invocation status code {status}")]
    InvocationRejected { status: u16, payload: Bytes },

    /// The function answered with a payload that is not a valid wire response.
    #[error("malformed wire response: {0}")]
    MalformedResponse(String),

    /// The event stream ended before the prelude separator, or without a
    /// completion event.
    #[error("response stream ended unexpectedly")]
    StreamTruncated,

    /// The function signaled an error while streaming its response.
    #[error("error during response stream: {code}, {details}")]
    Stream { code: String, details: String },

    /// The event stream delivered something other than a chunk or a
    /// completion.
    #[error("unexpected event in response stream: {0}")]
    UnexpectedEvent(String),

    /// The caller's cancellation token fired while waiting.
    #[error("round trip cancelled")]
    Cancelled,

    /// The round trip did not produce a response in time.
    #[error("round trip timed out after {0}s")]
    Timeout(u64),
}

impl TripError {
    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        TripError::Encoding(message.into())
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        TripError::MalformedResponse(message.into())
    }

    /// Wrap an error raised by the invocation client.
    pub fn invocation(err: impl Into<BoxError>) -> Self {
        TripError::Invocation(err.into())
    }

    /// Whether the remote function reported an error mid-stream.
    pub fn is_stream_error(&self) -> bool {
        matches!(self, TripError::Stream { .. })
    }

    /// Whether the event stream was cut short.
    pub fn is_truncated(&self) -> bool {
        matches!(self, TripError::StreamTruncated)
    }

    /// Whether the round trip was abandoned because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TripError::Cancelled)
    }

    /// Status code the proxy answers with when this error ends a request.
    pub fn gateway_status(&self) -> http::StatusCode {
        match self {
            TripError::Timeout(_) => http::StatusCode::GATEWAY_TIMEOUT,
            TripError::Encoding(_) => http::StatusCode::BAD_REQUEST,
            _ => http::StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<serde_json::Error> for TripError {
    fn from(err: serde_json::Error) -> Self {
        TripError::MalformedResponse(err.to_string())
    }
}

impl From<base64::DecodeError> for TripError {
    fn from(err: base64::DecodeError) -> Self {
        TripError::MalformedResponse(format!("invalid base64 body: {}", err))
    }
}

impl From<TripError> for io::Error {
    fn from(err: TripError) -> Self {
        let kind = match err {
            TripError::StreamTruncated => io::ErrorKind::UnexpectedEof,
            TripError::Cancelled => io::ErrorKind::Interrupted,
            TripError::Timeout(_) => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

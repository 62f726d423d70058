//! HTTP round trips through a function.
//!
//! A transport takes a request addressed as `fn://[qualifier@]function/path`,
//! encodes it as a wire event, invokes the function, and decodes what comes
//! back into a response. Cancellation is requested by attaching a
//! [`CancellationToken`] to the request's extensions.

mod body;
mod buffered;
mod streaming;

pub use body::StreamingBody;
pub use buffered::BufferedTransport;
pub use streaming::{read_prelude, StreamingTransport, PRELUDE_SEPARATOR};

use crate::error::{BoxError, TripError};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tokio_util::sync::CancellationToken;

/// Something that can turn a request into a response.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    /// Body of the responses this transport produces.
    type Body: hyper::body::Body<Data = Bytes> + Send + 'static;

    /// Send `request` and return the response.
    ///
    /// The request body is drained even if the round trip fails.
    async fn round_trip<B>(&self, request: Request<B>) -> Result<Response<Self::Body>, TripError>
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>;
}

/// The token attached to `request`, or one that never fires.
pub fn cancellation_token<B>(request: &Request<B>) -> CancellationToken {
    request
        .extensions()
        .get::<CancellationToken>()
        .cloned()
        .unwrap_or_else(CancellationToken::new)
}

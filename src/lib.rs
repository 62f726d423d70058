//! # fntrip - HTTP round trips through a function
//!
//! fntrip lets ordinary HTTP code talk to a function-as-a-service endpoint.
//! A request addressed as `fn://[qualifier@]function/path?query` is encoded
//! into the function's JSON event, the function is invoked, and its JSON
//! result is decoded back into an HTTP response. Functions that stream their
//! responses are supported too: the status and headers arrive first, and the
//! body is read lazily as the function produces it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     ProxyServer (optional, local)                    │
//! │            rewrites http://host/path into fn://function/path         │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 BufferedTransport / StreamingTransport               │
//! │  ┌────────────────┐   ┌──────────────────┐   ┌───────────────────┐   │
//! │  │ request encoder│──▶│ InvocationClient │──▶│ response decoder  │   │
//! │  │  (WireRequest) │   │  (HttpInvoker)   │   │ / prelude + body  │   │
//! │  └────────────────┘   └──────────────────┘   └───────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use fntrip::prelude::*;
//! use http_body_util::{BodyExt, Full};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let transport = BufferedTransport::new(HttpInvoker::new("http://127.0.0.1:9000"));
//!
//!     let request = http::Request::get("fn://live@hello/greet?name=fntrip")
//!         .body(Full::new(Bytes::new()))?;
//!     let response = transport.round_trip(request).await?;
//!
//!     println!("{}", response.status());
//!     let body = response.into_body().collect().await?.to_bytes();
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```
//!
//! ## Cancellation
//!
//! Attach a [`CancellationToken`](tokio_util::sync::CancellationToken) to a
//! request's extensions to abandon the round trip, or the body read of a
//! streamed response, when the token fires.

pub mod error;
pub mod invoke;
pub mod runtime;
pub mod transport;
pub mod wire;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::{BoxError, TripError};
    pub use crate::invoke::{
        EventStream, HttpInvoker, InvocationClient, InvokeInput, InvokeOutput, StreamEvent,
        Target,
    };
    pub use crate::runtime::{ProxyConfig, ProxyServer};
    pub use crate::transport::{BufferedTransport, RoundTrip, StreamingBody, StreamingTransport};
    pub use async_trait::async_trait;
}

// Re-export for convenience
pub use error::TripError;
pub use runtime::{ProxyConfig, ProxyServer};
pub use transport::{BufferedTransport, RoundTrip, StreamingBody, StreamingTransport};

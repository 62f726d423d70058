//! Round trips whose response body is streamed back incrementally.
//!
//! A streamed response starts with a JSON prelude holding the status,
//! headers and cookies, followed by eight zero bytes, followed by the raw
//! body. The prelude is parsed before the round trip returns; the body is
//! read lazily afterwards.

use super::body::{completion_error, StreamingBody};
use super::{cancellation_token, RoundTrip};
use crate::error::{BoxError, TripError};
use crate::invoke::{EventStream, InvocationClient, InvokeInput, StreamEvent, Target};
use crate::wire::{encode_request, WireResponse};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{Request, Response};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Marker between the prelude and the body.
pub const PRELUDE_SEPARATOR: [u8; 8] = [0; 8];

/// Transport for functions that stream their responses.
#[derive(Clone)]
pub struct StreamingTransport {
    client: Arc<dyn InvocationClient>,
}

impl StreamingTransport {
    /// Create a transport over an invocation client.
    pub fn new(client: impl InvocationClient + 'static) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a transport sharing an existing client.
    pub fn from_arc(client: Arc<dyn InvocationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoundTrip for StreamingTransport {
    type Body = StreamingBody;

    async fn round_trip<B>(&self, request: Request<B>) -> Result<Response<StreamingBody>, TripError>
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let cancel = cancellation_token(&request);
        let target = Target::from_uri(request.uri())?;
        let wire = encode_request(request, &cancel).await?;
        let payload = wire.to_payload()?;

        debug!(
            function = %target.function_name,
            qualifier = ?target.qualifier,
            request_id = %wire.request_context.request_id,
            "Invoking function with response stream"
        );

        let input = InvokeInput {
            function_name: target.function_name,
            qualifier: target.qualifier,
            payload,
        };
        let mut events = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TripError::Cancelled),
            out = self.client.invoke_with_response_stream(input) => out.map_err(TripError::Invocation)?,
        };

        let (prelude, leftover) = read_prelude(&mut events, &cancel).await?;
        let head = prelude.response_head()?;
        debug!(status = head.status().as_u16(), "Received response prelude");

        Ok(head.map(|()| StreamingBody::new(leftover, events, cancel)))
    }
}

/// Read events until the prelude separator shows up.
///
/// Returns the decoded prelude and the body bytes that arrived in the same
/// chunks as it. A stream that completes or closes first is truncated,
/// unless the completion carries the function's own error.
pub async fn read_prelude(
    events: &mut EventStream,
    cancel: &CancellationToken,
) -> Result<(WireResponse, Bytes), TripError> {
    let mut buf = BytesMut::new();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                events.close();
                return Err(TripError::Cancelled);
            }
            event = events.next() => event,
        };

        match event {
            Some(StreamEvent::PayloadChunk(chunk)) => {
                // A separator may straddle the previous chunk boundary.
                let start = buf.len().saturating_sub(PRELUDE_SEPARATOR.len() - 1);
                buf.extend_from_slice(&chunk);

                if let Some(pos) = find_separator(&buf[start..]) {
                    let at = start + pos;
                    let body = buf.split_off(at + PRELUDE_SEPARATOR.len());
                    buf.truncate(at);
                    let prelude = WireResponse::from_slice(&buf)?;
                    return Ok((prelude, body.freeze()));
                }
            }
            Some(StreamEvent::Complete {
                error_code,
                error_details,
            }) => {
                events.close();
                return Err(completion_error(error_code, error_details)
                    .unwrap_or(TripError::StreamTruncated));
            }
            Some(StreamEvent::Unknown(tag)) => {
                events.close();
                return Err(TripError::UnexpectedEvent(tag));
            }
            None => return Err(TripError::StreamTruncated),
        }
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(PRELUDE_SEPARATOR.len())
        .position(|window| window == &PRELUDE_SEPARATOR[..])
}

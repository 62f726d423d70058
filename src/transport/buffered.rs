//! Round trips that wait for the function's whole response.

use super::{cancellation_token, RoundTrip};
use crate::error::{BoxError, TripError};
use crate::invoke::{InvocationClient, InvokeInput, Target};
use crate::wire::{decode_response, encode_request};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use std::sync::Arc;
use tracing::debug;

/// Transport for functions that return their response in one payload.
#[derive(Clone)]
pub struct BufferedTransport {
    client: Arc<dyn InvocationClient>,
}

impl BufferedTransport {
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
impl RoundTrip for BufferedTransport {
    type Body = Full<Bytes>;

    async fn round_trip<B>(&self, request: Request<B>) -> Result<Response<Full<Bytes>>, TripError>
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
            "Invoking function"
        );

        let input = InvokeInput {
            function_name: target.function_name,
            qualifier: target.qualifier,
            payload,
        };
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TripError::Cancelled),
            out = self.client.invoke(input) => out.map_err(TripError::Invocation)?,
        };

        // The invocation status is distinct from the status inside the payload.
        if output.status_code != StatusCode::OK.as_u16() {
            return Err(TripError::InvocationRejected {
                status: output.status_code,
                payload: output.payload,
            });
        }

        decode_response(&output.payload)
    }
}

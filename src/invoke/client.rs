//! The invocation client seam.

use super::event::EventStream;
use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Parameters of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeInput {
    /// Function name or ARN.
    pub function_name: String,
    /// Alias or version to invoke.
    pub qualifier: Option<String>,
    /// JSON event.
    pub payload: Bytes,
}

/// Result of a synchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOutput {
    /// Status of the invocation itself, not of the HTTP response inside it.
    pub status_code: u16,
    pub payload: Bytes,
}

/// An already authenticated client able to invoke functions.
///
/// Errors are returned verbatim to the caller of the transport; retry
/// policy, if any, belongs to the implementation.
#[async_trait]
pub trait InvocationClient: Send + Sync {
    /// Invoke the function and wait for its whole response.
    async fn invoke(&self, input: InvokeInput) -> Result<InvokeOutput, BoxError>;

    /// Invoke the function and receive its response as a stream of events.
    async fn invoke_with_response_stream(
        &self,
        input: InvokeInput,
    ) -> Result<EventStream, BoxError>;
}

#[async_trait]
impl<T: InvocationClient + ?Sized> InvocationClient for Arc<T> {
    async fn invoke(&self, input: InvokeInput) -> Result<InvokeOutput, BoxError> {
        (**self).invoke(input).await
    }

    async fn invoke_with_response_stream(
        &self,
        input: InvokeInput,
    ) -> Result<EventStream, BoxError> {
        (**self).invoke_with_response_stream(input).await
    }
}

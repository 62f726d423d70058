//! Invocation client for an invoke-compatible HTTP endpoint, such as a local
//! runtime interface emulator.

use super::client::{InvocationClient, InvokeInput, InvokeOutput};
use super::event::{EventStream, StreamEvent};
use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};
use url::Url;

const INVOKE_API: &str = "2015-03-31";
const STREAMING_INVOKE_API: &str = "2021-11-15";

/// Number of chunks buffered between the connection task and the reader.
const EVENT_BUFFER: usize = 16;

/// Invokes functions over plain HTTP against `endpoint`.
///
/// Targets endpoints that stream the function's raw output as an ordinary
/// chunked HTTP body, such as a local runtime interface emulator. Each body
/// frame becomes one payload chunk; `application/vnd.amazon.eventstream`
/// framing is not decoded.
#[derive(Clone)]
pub struct HttpInvoker {
    endpoint: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpInvoker {
    /// Create an invoker for an endpoint such as `http://127.0.0.1:9000`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { endpoint, client }
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn invocation_uri(&self, input: &InvokeInput, streaming: bool) -> Result<Uri, BoxError> {
        let (api, action) = if streaming {
            (STREAMING_INVOKE_API, "response-streaming-invocations")
        } else {
            (INVOKE_API, "invocations")
        };

        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|()| format!("endpoint {} cannot carry a path", self.endpoint))?
            .pop_if_empty()
            .extend([api, "functions", input.function_name.as_str(), action]);
        if let Some(qualifier) = &input.qualifier {
            url.query_pairs_mut().append_pair("Qualifier", qualifier);
        }
        Ok(url.as_str().parse()?)
    }

    async fn send(&self, input: InvokeInput, streaming: bool) -> Result<hyper::Response<Incoming>, BoxError> {
        let uri = self.invocation_uri(&input, streaming)?;
        debug!(uri = %uri, streaming, "Invoking function over HTTP");

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(input.payload))?;
        Ok(self.client.request(request).await?)
    }
}

#[async_trait]
impl InvocationClient for HttpInvoker {
    async fn invoke(&self, input: InvokeInput) -> Result<InvokeOutput, BoxError> {
        let response = self.send(input, false).await?;
        let status_code = response.status().as_u16();
        let payload = response.into_body().collect().await?.to_bytes();
        Ok(InvokeOutput {
            status_code,
            payload,
        })
    }

    async fn invoke_with_response_stream(
        &self,
        input: InvokeInput,
    ) -> Result<EventStream, BoxError> {
        let response = self.send(input, true).await?;
        let (tx, stream) = EventStream::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let status = response.status();
            let mut body = response.into_body();

            if !status.is_success() {
                let details = match body.collect().await {
                    Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
                    Err(e) => e.to_string(),
                };
                warn!(status = status.as_u16(), "Streaming invocation rejected");
                let _ = tx
                    .send(StreamEvent::failed(status.as_u16().to_string(), details))
                    .await;
                return;
            }

            loop {
                let event = match body.frame().await {
                    Some(Ok(frame)) => match frame.into_data() {
                        Ok(data) => StreamEvent::PayloadChunk(data),
                        Err(_) => continue,
                    },
                    Some(Err(e)) => StreamEvent::failed("ResponseBodyError", e.to_string()),
                    None => StreamEvent::complete(),
                };
                let last = matches!(event, StreamEvent::Complete { .. });
                if tx.send(event).await.is_err() {
                    debug!("Event stream closed by reader");
                    return;
                }
                if last {
                    return;
                }
            }
        });

        Ok(stream)
    }
}

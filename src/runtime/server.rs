//! Local HTTP proxy in front of a function.

use crate::error::{BoxError, TripError};
use crate::invoke::Target;
use crate::runtime::ProxyConfig;
use crate::transport::RoundTrip;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Body of every response the proxy writes.
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Forwards every request it receives to one function.
///
/// Each connection is served on its own task. Requests are rewritten to
/// address the configured function and handed to the transport; its
/// response, buffered or streamed, is written back as is.
pub struct ProxyServer<T> {
    config: Arc<ProxyConfig>,
    target: Target,
    transport: Arc<T>,
    shutdown: CancellationToken,
}

impl<T> Clone for ProxyServer<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            target: self.target.clone(),
            transport: self.transport.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<T> ProxyServer<T>
where
    T: RoundTrip + 'static,
    <T::Body as Body>::Error: Into<BoxError>,
{
    /// Create a proxy for the function named in `config`.
    pub fn new(config: ProxyConfig, transport: T) -> Self {
        Self {
            target: config.target(),
            config: Arc::new(config),
            transport: Arc::new(transport),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the server when cancelled.
    ///
    /// Cancelling it also cancels every round trip still in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind to the configured address and serve until shutdown.
    pub async fn run(self) -> Result<(), BoxError> {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown.
    pub async fn serve(self, listener: TcpListener) -> Result<(), BoxError> {
        let addr = listener.local_addr()?;
        info!(
            %addr,
            function = %self.target,
            streaming = self.config.streaming,
            "Proxy listening"
        );

        loop {
            let (stream, remote_addr) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted?,
            };
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::task::spawn(async move {
                let shutdown = server.shutdown.clone();
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle(req, remote_addr).await) }
                });

                let conn = http1::Builder::new().serve_connection(io, service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = shutdown.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(err) = result {
                    debug!(error = %err, %remote_addr, "Error serving connection");
                }
            });
        }

        info!("Proxy stopped accepting connections");
        Ok(())
    }

    /// Forward one request and produce the response to write back.
    ///
    /// Never fails: transport errors become gateway error responses.
    pub async fn handle<B>(&self, req: Request<B>, remote_addr: SocketAddr) -> Response<ProxyBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = match self.forward(req, remote_addr).await {
            Ok(response) => response,
            Err(e) => {
                let status = e.gateway_status();
                warn!(
                    function = %self.target,
                    status = status.as_u16(),
                    error = %e,
                    "Round trip failed"
                );
                error_response(status, e.to_string())
            }
        };

        info!(
            %method,
            %path,
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    async fn forward<B>(
        &self,
        req: Request<B>,
        remote_addr: SocketAddr,
    ) -> Result<Response<ProxyBody>, TripError>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let (mut parts, body) = req.into_parts();
        let limit = self.config.max_body_size;

        if content_length(&parts.headers).is_some_and(|len| len > limit as u64) {
            return Ok(too_large());
        }

        let cancel = self.shutdown.child_token();
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TripError::Cancelled),
            collected = Limited::new(body, limit).collect() => match collected {
                Ok(collected) => collected.to_bytes(),
                Err(e) if e.is::<LengthLimitError>() => return Ok(too_large()),
                Err(e) => {
                    return Err(TripError::encoding(format!("failed to read request body: {}", e)))
                }
            },
        };

        parts.uri = self.target.uri(parts.uri.path_and_query())?;
        parts.extensions.insert(cancel.clone());
        parts.extensions.insert(remote_addr);
        let req = Request::from_parts(parts, Full::new(body));

        let round_trip = self.transport.round_trip(req);
        let response = match tokio::time::timeout(self.config.timeout(), round_trip).await {
            Ok(result) => result?,
            Err(_) => {
                cancel.cancel();
                return Err(TripError::Timeout(self.config.request_timeout));
            }
        };

        // The synthesized response says HTTP/1.0; the connection is HTTP/1.1.
        let mut response = response.map(|body| body.map_err(Into::<BoxError>::into).boxed_unsync());
        *response.version_mut() = Version::HTTP_11;
        Ok(response)
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn too_large() -> Response<ProxyBody> {
    error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
}

/// Plain-text response for failures the proxy answers itself.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response<ProxyBody> {
    let body = Full::new(Bytes::from(message.into()))
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

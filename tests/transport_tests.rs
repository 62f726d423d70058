//! Integration tests for the buffered and streaming transports.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use fntrip::prelude::*;
use fntrip::transport::PRELUDE_SEPARATOR;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Request, StatusCode, Version};
use http_body_util::{BodyExt, Empty, Full};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Error type a real client might return; used to check it passes through.
#[derive(Debug)]
struct Unreachable;

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("endpoint unreachable")
    }
}

impl std::error::Error for Unreachable {}

/// A client that replays a canned answer and records what it was asked.
#[derive(Default)]
struct MockClient {
    output: Mutex<Option<InvokeOutput>>,
    events: Mutex<Option<EventStream>>,
    fail: bool,
    inputs: Mutex<Vec<InvokeInput>>,
}

impl MockClient {
    fn buffered(status_code: u16, payload: &'static str) -> Arc<Self> {
        Arc::new(Self {
            output: Mutex::new(Some(InvokeOutput {
                status_code,
                payload: Bytes::from_static(payload.as_bytes()),
            })),
            ..Default::default()
        })
    }

    fn streaming(events: EventStream) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Some(events)),
            ..Default::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    fn last_input(&self) -> InvokeInput {
        self.inputs.lock().unwrap().last().cloned().expect("client was not invoked")
    }

    fn last_event(&self) -> serde_json::Value {
        serde_json::from_slice(&self.last_input().payload).unwrap()
    }
}

#[async_trait]
impl InvocationClient for MockClient {
    async fn invoke(&self, input: InvokeInput) -> Result<InvokeOutput, BoxError> {
        self.inputs.lock().unwrap().push(input);
        if self.fail {
            return Err(Box::new(Unreachable));
        }
        Ok(self.output.lock().unwrap().take().expect("no canned output"))
    }

    async fn invoke_with_response_stream(
        &self,
        input: InvokeInput,
    ) -> Result<EventStream, BoxError> {
        self.inputs.lock().unwrap().push(input);
        if self.fail {
            return Err(Box::new(Unreachable));
        }
        Ok(self.events.lock().unwrap().take().expect("no canned events"))
    }
}

fn get(uri: &str) -> Request<Empty<Bytes>> {
    Request::get(uri).body(Empty::new()).unwrap()
}

/// Prelude, separator and body bytes as they arrive from a streaming function.
fn streamed(prelude: &str, body: &str) -> Vec<StreamEvent> {
    let mut head = prelude.as_bytes().to_vec();
    head.extend_from_slice(&PRELUDE_SEPARATOR);
    vec![StreamEvent::chunk(head), StreamEvent::chunk(body.to_string())]
}

// ---- buffered ----

#[tokio::test]
async fn test_buffered_get() {
    let client = MockClient::buffered(200, r#"{"body":"\"Hello, world!\""}"#);
    let transport = BufferedTransport::new(client.clone());

    let request = Request::get("fn://hello/greet/some%20one?name=fn&x=1")
        .header("user-agent", "fntrip-test")
        .header("accept", "text/plain")
        .header("accept", "application/json")
        .header("cookie", "a=1; b=two words")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let response = transport.round_trip(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.version(), Version::HTTP_10);
    assert_eq!(response.headers()[CONTENT_LENGTH], "15");
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "\"Hello, world!\"");

    let input = client.last_input();
    assert_eq!(input.function_name, "hello");
    assert_eq!(input.qualifier, None);

    let event = client.last_event();
    assert_eq!(event["version"], "2.0");
    assert_eq!(event["routeKey"], "$default");
    assert_eq!(event["rawPath"], "/greet/some%20one");
    assert_eq!(event["rawQueryString"], "name=fn&x=1");
    assert_eq!(event["body"], "");
    assert_eq!(event["isBase64Encoded"], false);
    assert_eq!(event["headers"]["accept"], "text/plain,application/json");
    assert!(event["headers"].get("cookie").is_none());
    assert_eq!(event["cookies"], serde_json::json!(["a=1", "b=\"two words\""]));
    assert_eq!(event["requestContext"]["http"]["method"], "GET");
    assert_eq!(event["requestContext"]["http"]["path"], "/greet/some one");
    assert_eq!(event["requestContext"]["http"]["userAgent"], "fntrip-test");
    assert!(!event["requestContext"]["requestId"]
        .as_str()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_buffered_base64_response() {
    let client = MockClient::buffered(
        200,
        r#"{"statusCode":200,"headers":{"content-type":"image/png"},"body":"AAEC/w==","isBase64Encoded":true}"#,
    );
    let transport = BufferedTransport::new(client);

    let response = transport.round_trip(get("fn://images/logo.png")).await.unwrap();
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[CONTENT_LENGTH], "4");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], &[0x00, 0x01, 0x02, 0xff]);
}

#[tokio::test]
async fn test_buffered_invocation_rejected() {
    let client = MockClient::buffered(403, r#"{"message":"denied"}"#);
    let transport = BufferedTransport::new(client);

    match transport.round_trip(get("fn://private/")).await {
        Err(TripError::InvocationRejected { status, payload }) => {
            assert_eq!(status, 403);
            assert_eq!(payload, r#"{"message":"denied"}"#);
        }
        other => panic!("expected rejected invocation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_buffered_function_status() {
    let client = MockClient::buffered(
        200,
        r#"{"statusCode":403,"body":"forbidden","cookies":["s=1","t=2"]}"#,
    );
    let transport = BufferedTransport::new(client);

    let response = transport.round_trip(get("fn://guarded/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let cookies: Vec<_> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, ["s=1", "t=2"]);
}

#[tokio::test]
async fn test_buffered_malformed_response() {
    let client = MockClient::buffered(200, r#"{"statusCode":"teapot"}"#);
    let transport = BufferedTransport::new(client);

    let err = transport.round_trip(get("fn://broken/")).await.unwrap_err();
    assert!(matches!(err, TripError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_qualifier_from_user_info() {
    let client = MockClient::buffered(200, "{}");
    let transport = BufferedTransport::new(client.clone());

    transport.round_trip(get("fn://live@orders/")).await.unwrap();
    let input = client.last_input();
    assert_eq!(input.function_name, "orders");
    assert_eq!(input.qualifier.as_deref(), Some("live"));
}

#[tokio::test]
async fn test_binary_request_body() {
    let client = MockClient::buffered(200, "{}");
    let transport = BufferedTransport::new(client.clone());
    let bytes: &'static [u8] = &[0x00, 0x9f, 0x92, 0x96, 0xff, b'\n'];

    let request = Request::post("fn://upload/")
        .header("content-type", "application/octet-stream")
        .body(Full::new(Bytes::from_static(bytes)))
        .unwrap();
    transport.round_trip(request).await.unwrap();

    let event = client.last_event();
    assert_eq!(event["isBase64Encoded"], true);
    let decoded = STANDARD.decode(event["body"].as_str().unwrap()).unwrap();
    assert_eq!(decoded, bytes);
}

#[tokio::test]
async fn test_text_request_body() {
    let client = MockClient::buffered(200, "{}");
    let transport = BufferedTransport::new(client.clone());

    let request = Request::post("fn://echo/")
        .header("content-type", "application/vnd.api+json")
        .body(Full::new(Bytes::from_static(b"{\"k\":\"v\"}")))
        .unwrap();
    transport.round_trip(request).await.unwrap();

    let event = client.last_event();
    assert_eq!(event["isBase64Encoded"], false);
    assert_eq!(event["body"], "{\"k\":\"v\"}");
}

#[tokio::test]
async fn test_client_error_passes_through() {
    let transport = BufferedTransport::new(MockClient::failing());

    match transport.round_trip(get("fn://down/")).await {
        Err(TripError::Invocation(source)) => assert!(source.downcast_ref::<Unreachable>().is_some()),
        other => panic!("expected invocation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_before_invoke() {
    let client = MockClient::buffered(200, "{}");
    let transport = BufferedTransport::new(client.clone());

    let token = CancellationToken::new();
    token.cancel();
    let mut request = get("fn://slow/");
    request.extensions_mut().insert(token);

    let err = transport.round_trip(request).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(client.inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_function_name() {
    let transport = BufferedTransport::new(MockClient::buffered(200, "{}"));
    let err = transport.round_trip(get("/relative/only")).await.unwrap_err();
    assert!(matches!(err, TripError::Encoding(_)));
}

// ---- streaming ----

#[tokio::test]
async fn test_streaming_whole_body() {
    let mut events = streamed("{}", "\"Hello, world!\"");
    events.push(StreamEvent::complete());
    let client = MockClient::streaming(EventStream::from_events(events));
    let transport = StreamingTransport::new(client.clone());

    let response = transport.round_trip(get("fn://live@stream/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert!(response.headers().get(CONTENT_LENGTH).is_none());

    let mut body = Vec::new();
    response.into_body().read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"\"Hello, world!\"");
    assert_eq!(client.last_input().qualifier.as_deref(), Some("live"));
}

#[tokio::test]
async fn test_streaming_one_byte_at_a_time() {
    let mut events = streamed(r#"{"statusCode":202,"headers":{"x-a":"b"}}"#, "\"Hello, world!\"");
    events.push(StreamEvent::complete());
    let transport = StreamingTransport::new(MockClient::streaming(EventStream::from_events(events)));

    let response = transport.round_trip(get("fn://stream/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["x-a"], "b");

    let mut body = response.into_body();
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match body.read(&mut byte).await.unwrap() {
            0 => break,
            n => out.extend_from_slice(&byte[..n]),
        }
    }
    assert_eq!(out, b"\"Hello, world!\"");
}

#[tokio::test]
async fn test_streaming_returns_before_body() {
    let (tx, events) = EventStream::channel(4);
    let transport = StreamingTransport::new(MockClient::streaming(events));

    let mut head = b"{}".to_vec();
    head.extend_from_slice(&PRELUDE_SEPARATOR);
    tx.send(StreamEvent::chunk(head)).await.unwrap();

    // Only the prelude has been sent; the round trip must not wait for more.
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        transport.round_trip(get("fn://stream/")),
    )
    .await
    .expect("round trip waited for the body")
    .unwrap();

    let producer = tokio::spawn(async move {
        tx.send(StreamEvent::chunk("late")).await.unwrap();
        tx.send(StreamEvent::complete()).await.unwrap();
    });

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "late");
    producer.await.unwrap();
}

#[tokio::test]
async fn test_streaming_truncated_prelude() {
    let events = EventStream::from_events([StreamEvent::chunk("{\"statusCode\":"), StreamEvent::complete()]);
    let transport = StreamingTransport::new(MockClient::streaming(events));

    let err = transport.round_trip(get("fn://stream/")).await.unwrap_err();
    assert!(err.is_truncated());
}

#[tokio::test]
async fn test_streaming_error_after_body() {
    let mut events = streamed("{}", "partial");
    events.push(StreamEvent::failed("ERR", "msg"));
    let transport = StreamingTransport::new(MockClient::streaming(EventStream::from_events(events)));

    let mut body = transport
        .round_trip(get("fn://stream/"))
        .await
        .unwrap()
        .into_body();

    let mut buf = [0u8; 64];
    let n = body.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"partial");

    let err = body.read(&mut buf).await.unwrap_err();
    assert!(err.is_stream_error());
    assert_eq!(err.to_string(), "error during response stream: ERR, msg");
}

#[tokio::test]
async fn test_streaming_channel_closed_mid_body() {
    let events = EventStream::from_events(streamed("{}", "cut"));
    let transport = StreamingTransport::new(MockClient::streaming(events));

    let response = transport.round_trip(get("fn://stream/")).await.unwrap();
    match response.into_body().collect().await {
        Ok(_) => panic!("truncated body read as complete"),
        Err(err) => assert!(err.is_truncated()),
    }
}

#[tokio::test]
async fn test_streaming_cancelled_mid_body() {
    let (tx, events) = EventStream::channel(4);
    let transport = StreamingTransport::new(MockClient::streaming(events));

    let mut head = b"{}".to_vec();
    head.extend_from_slice(&PRELUDE_SEPARATOR);
    tx.send(StreamEvent::chunk(head)).await.unwrap();

    let token = CancellationToken::new();
    let mut request = get("fn://stream/");
    request.extensions_mut().insert(token.clone());
    let mut body = transport.round_trip(request).await.unwrap().into_body();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let mut buf = [0u8; 8];
    let result = tokio::time::timeout(Duration::from_secs(5), body.read(&mut buf))
        .await
        .expect("read hung after cancellation");
    assert!(result.unwrap_err().is_cancelled());
    drop(tx);
}

#[tokio::test]
async fn test_streaming_client_error_passes_through() {
    let transport = StreamingTransport::new(MockClient::failing());

    match transport.round_trip(get("fn://stream/")).await {
        Err(TripError::Invocation(source)) => assert!(source.downcast_ref::<Unreachable>().is_some()),
        other => panic!("expected invocation error, got {:?}", other),
    }
}

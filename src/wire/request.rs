//! Outbound wire event built from an HTTP request.

use super::classify::is_binary;
use super::request_id::new_request_id;
use crate::error::{BoxError, TripError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use cookie::Cookie;
use http::header::{COOKIE, USER_AGENT};
use http::request::Parts;
use http::{HeaderMap, Request};
use http_body_util::BodyExt;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

/// Payload format version of the event.
pub const EVENT_VERSION: &str = "2.0";

/// Route key of the catch-all route.
pub const DEFAULT_ROUTE_KEY: &str = "$default";

/// Format of `requestContext.time`, e.g. `19/Oct/2026:07:19:00 +0000`.
const TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// The request event handed to the function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub version: String,
    pub route_key: String,
    pub http_method: String,
    pub body: String,
    pub is_base64_encoded: bool,
    pub raw_path: String,
    pub raw_query_string: String,
    /// Header values joined with commas. Lossy for values that contain
    /// commas themselves, kept that way for compatibility.
    pub headers: HashMap<String, String>,
    pub cookies: Vec<String>,
    pub request_context: RequestContext,
}

/// Per-request metadata of the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub http: RequestContextHttp,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stage: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub time_epoch: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContextHttp {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl WireRequest {
    /// Build the event from request parts and an already collected body.
    pub fn build(
        parts: &Parts,
        body: &[u8],
        request_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        let (body, is_base64_encoded) = encode_body(&parts.headers, body);

        let raw_path = match parts.uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };

        let source_ip = parts
            .extensions
            .get::<SocketAddr>()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default();

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();

        Self {
            version: EVENT_VERSION.to_string(),
            route_key: DEFAULT_ROUTE_KEY.to_string(),
            http_method: parts.method.to_string(),
            body,
            is_base64_encoded,
            raw_query_string: parts.uri.query().unwrap_or("").to_string(),
            headers: fold_headers(&parts.headers),
            cookies: parse_cookies(&parts.headers),
            request_context: RequestContext {
                http: RequestContextHttp {
                    method: parts.method.to_string(),
                    path: percent_decode_str(&raw_path).decode_utf8_lossy().into_owned(),
                    protocol: format!("{:?}", parts.version),
                    source_ip,
                    user_agent,
                },
                request_id,
                stage: String::new(),
                time: now.format(TIME_FORMAT).to_string(),
                time_epoch: now.timestamp_millis(),
            },
            raw_path,
        }
    }

    /// Serialize the event into an invocation payload.
    pub fn to_payload(&self) -> Result<Bytes, TripError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| TripError::encoding(e.to_string()))
    }
}

/// Encode a request into a wire event, draining its body.
///
/// Reading the body is raced against `cancel`.
pub async fn encode_request<B>(
    request: Request<B>,
    cancel: &CancellationToken,
) -> Result<WireRequest, TripError>
where
    B: hyper::body::Body,
    B::Error: Into<BoxError>,
{
    let (parts, body) = request.into_parts();

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TripError::Cancelled),
        collected = body.collect() => collected
            .map_err(|e| {
                let e: BoxError = e.into();
                TripError::encoding(format!("failed to read request body: {}", e))
            })?
            .to_bytes(),
    };

    let request_id = new_request_id()?;
    Ok(WireRequest::build(&parts, &body, request_id, Utc::now()))
}

/// Returns the wire body and whether it was base64-encoded.
fn encode_body(headers: &HeaderMap, body: &[u8]) -> (String, bool) {
    // An empty body counts as no body and is never flagged as encoded.
    if body.is_empty() {
        return (String::new(), false);
    }
    if !is_binary(headers) {
        // A body declared as text that is not valid UTF-8 cannot be carried
        // verbatim in JSON; it falls back to base64 so no byte is lost.
        if let Ok(text) = std::str::from_utf8(body) {
            return (text.to_string(), false);
        }
    }
    (STANDARD.encode(body), true)
}

/// Collapse headers into a single comma-joined value per name, without cookies.
fn fold_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut folded = HashMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        if name == COOKIE {
            continue;
        }
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        folded.insert(name.as_str().to_string(), joined);
    }
    folded
}

/// Every `Cookie` header split into `name=value` strings.
///
/// Surrounding quotes are dropped and bytes not allowed in a cookie value
/// are stripped; values holding a space or comma are quoted again.
fn parse_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| Cookie::split_parse(v))
        .filter_map(Result::ok)
        .map(|cookie| render_cookie(cookie.name(), cookie.value_trimmed()))
        .collect()
}

fn render_cookie(name: &str, value: &str) -> String {
    let value: String = value.chars().filter(|&c| is_cookie_value_char(c)).collect();
    if value.contains([' ', ',']) {
        format!("{}=\"{}\"", name, value)
    } else {
        format!("{}={}", name, value)
    }
}

fn is_cookie_value_char(c: char) -> bool {
    (' '..='~').contains(&c) && !matches!(c, '"' | ';' | '\\')
}

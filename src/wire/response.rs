//! Inbound wire event decoded back into an HTTP response.

use crate::error::TripError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, Response, StatusCode, Version};
use http_body_util::Full;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Content type assumed when the function declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// The response event returned by the function.
///
/// Every field is optional on the wire; `null` is treated like absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    /// `0` means 200.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_base64_encoded: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cookies: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl WireResponse {
    /// Parse a wire response from a JSON payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, TripError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// The HTTP status, with `0` mapped to 200.
    ///
    /// Codes outside 100..=599 are rejected.
    pub fn status(&self) -> Result<StatusCode, TripError> {
        match self.status_code {
            0 => Ok(StatusCode::OK),
            code @ 100..=599 => StatusCode::from_u16(code as u16)
                .map_err(|e| TripError::malformed(format!("invalid status code {}: {}", code, e))),
            code => Err(TripError::malformed(format!(
                "status code {} out of range",
                code
            ))),
        }
    }

    /// Declared headers, then one `Set-Cookie` per cookie, then the default
    /// `Content-Type` if none was declared.
    pub fn header_map(&self) -> Result<HeaderMap, TripError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len() + self.cookies.len() + 1);

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TripError::malformed(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TripError::malformed(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        for cookie in &self.cookies {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| TripError::malformed(format!("invalid cookie {:?}: {}", cookie, e)))?;
            headers.append(SET_COOKIE, value);
        }

        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        Ok(headers)
    }

    /// The body bytes, base64-decoded when flagged.
    pub fn decoded_body(&self) -> Result<Bytes, TripError> {
        if self.is_base64_encoded {
            Ok(Bytes::from(STANDARD.decode(&self.body)?))
        } else {
            Ok(Bytes::copy_from_slice(self.body.as_bytes()))
        }
    }

    /// Status and headers as a bodiless response.
    pub fn response_head(&self) -> Result<Response<()>, TripError> {
        let mut response = Response::new(());
        *response.status_mut() = self.status()?;
        *response.version_mut() = Version::HTTP_10;
        *response.headers_mut() = self.header_map()?;
        Ok(response)
    }

    /// The complete buffered response, with an exact `Content-Length`.
    pub fn into_response(self) -> Result<Response<Full<Bytes>>, TripError> {
        let body = self.decoded_body()?;
        let mut response = self.response_head()?;
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Ok(response.map(|()| Full::new(body)))
    }
}

/// Status line text such as `200 OK`, or the bare code when the status has
/// no standard reason phrase.
pub fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Decode a complete invocation payload into an HTTP response.
pub fn decode_response(payload: &[u8]) -> Result<Response<Full<Bytes>>, TripError> {
    WireResponse::from_slice(payload)?.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_empty_object() {
        let response = decode_response(b"{}").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(status_text(response.status()), "200 OK");
        assert_eq!(response.version(), Version::HTTP_10);
        assert_eq!(response.headers()[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert_eq!(response.headers()[CONTENT_LENGTH], "0");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_text_body() {
        let response = decode_response(br#"{"body": "\"Hello, world!\""}"#).unwrap();
        assert_eq!(response.headers()[CONTENT_LENGTH], "15");
        assert_eq!(body_bytes(response).await, r#""Hello, world!""#);
    }

    #[tokio::test]
    async fn test_base64_body() {
        let response =
            decode_response(br#"{"body": "IkhlbGxvLCB3b3JsZCEi", "isBase64Encoded": true}"#).unwrap();
        assert_eq!(response.headers()[CONTENT_LENGTH], "15");
        assert_eq!(body_bytes(response).await, r#""Hello, world!""#);
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let err = decode_response(br#"{"body": "!!!", "isBase64Encoded": true}"#).unwrap_err();
        assert!(matches!(err, TripError::MalformedResponse(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = decode_response(b"not json").unwrap_err();
        assert!(matches!(err, TripError::MalformedResponse(_)));
    }

    #[test]
    fn test_body_level_status_is_kept() {
        let response = decode_response(br#"{"statusCode": 403}"#).unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(status_text(response.status()), "403 Forbidden");
    }

    #[test]
    fn test_status_out_of_range() {
        for payload in [
            &br#"{"statusCode": -1}"#[..],
            &br#"{"statusCode": 99}"#[..],
            &br#"{"statusCode": 600}"#[..],
        ] {
            let err = decode_response(payload).unwrap_err();
            assert!(matches!(err, TripError::MalformedResponse(_)));
        }
    }

    #[test]
    fn test_status_text_without_reason() {
        assert_eq!(status_text(StatusCode::from_u16(299).unwrap()), "299");
    }

    #[test]
    fn test_headers_and_cookies() {
        let response = decode_response(
            br#"{
                "statusCode": 201,
                "headers": {"Content-Type": "text/plain", "X-Custom": "yes"},
                "cookies": ["a=1; Path=/", "b=2"]
            }"#,
        )
        .unwrap();

        let headers = response.headers();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert_eq!(headers["x-custom"], "yes");
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["a=1; Path=/", "b=2"]);
    }

    #[test]
    fn test_null_fields() {
        let wire = WireResponse::from_slice(
            br#"{"statusCode": null, "headers": null, "body": null, "cookies": null}"#,
        )
        .unwrap();
        assert_eq!(wire, WireResponse::default());
    }
}

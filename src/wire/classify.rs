//! Decides whether a body must travel base64-encoded inside the JSON event.

use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::HeaderMap;

/// Media types that are text even though their main type is not `text`.
const TEXT_MEDIA_TYPES: &[&str] = &[
    "application/json",
    "application/yaml",
    "application/javascript",
    "application/xml",
];

/// Structured-syntax suffixes that mark a vendor media type as text,
/// e.g. `application/problem+json`.
const TEXT_SUFFIXES: &[&str] = &["json", "yaml", "xml"];

/// Classify a body from its declared headers.
///
/// Returns `true` when the body must be base64-encoded. Any non-empty
/// `Content-Encoding` forces binary even for textual media types. Missing or
/// unknown content types are binary.
pub fn is_binary(headers: &HeaderMap) -> bool {
    let encoded = headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|coding| !coding.is_empty());
    if encoded {
        return true;
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    !is_text_media_type(content_type)
}

/// Whether a `Content-Type` value names a textual media type.
pub fn is_text_media_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim();
    if media_type.is_empty() {
        return false;
    }

    let main_type = media_type.split('/').next().unwrap_or("");
    if main_type.eq_ignore_ascii_case("text") {
        return true;
    }

    if TEXT_MEDIA_TYPES
        .iter()
        .any(|t| media_type.eq_ignore_ascii_case(t))
    {
        return true;
    }

    match media_type.rsplit_once('+') {
        Some((_, suffix)) => TEXT_SUFFIXES.iter().any(|s| suffix.eq_ignore_ascii_case(s)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(content_type: Option<&str>, encoding: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        if let Some(enc) = encoding {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_str(enc).unwrap());
        }
        headers
    }

    #[test]
    fn test_compressed_text_is_binary() {
        assert!(is_binary(&headers(Some("text/html; charset=utf-8"), Some("gzip"))));
        assert!(is_binary(&headers(Some("application/json"), Some("br"))));
    }

    #[test]
    fn test_any_encoding_is_binary() {
        assert!(is_binary(&headers(Some("text/plain"), Some("identity"))));
        assert!(is_binary(&headers(Some("application/json"), Some("x-custom"))));
    }

    #[test]
    fn test_empty_encoding_is_ignored() {
        assert!(!is_binary(&headers(Some("text/plain"), Some(""))));
        assert!(!is_binary(&headers(Some("text/plain"), Some(" , "))));
    }

    #[test]
    fn test_text_types() {
        for ct in [
            "text/html",
            "text/plain",
            "text/xml",
            "TEXT/CSV",
            "application/json",
            "application/javascript",
            "application/yaml",
            "application/xml",
            "application/foo+json",
            "application/foo+yaml",
            "application/foo+xml",
            "application/foo+xml ; charset=utf8",
            "Application/Problem+JSON",
        ] {
            assert!(!is_binary(&headers(Some(ct), None)), "{} should be text", ct);
        }
    }

    #[test]
    fn test_binary_types() {
        for ct in [
            "application/octet-stream",
            "image/jpeg",
            "audio/mpeg",
            "unknown-content-type",
            "",
            "application/json-seq",
            "application/foo+zip",
        ] {
            assert!(is_binary(&headers(Some(ct), None)), "{} should be binary", ct);
        }
    }

    #[test]
    fn test_missing_content_type_is_binary() {
        assert!(is_binary(&HeaderMap::new()));
    }
}

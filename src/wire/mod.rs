//! Wire events exchanged with the function, and the codecs around them.
//!
//! The request side turns an HTTP request into a [`WireRequest`]; the
//! response side turns a [`WireResponse`] back into an HTTP response. Both
//! are pure and know nothing about how the function is invoked.

mod classify;
mod request;
mod request_id;
mod response;

pub use classify::{is_binary, is_text_media_type};
pub use request::{
    encode_request, RequestContext, RequestContextHttp, WireRequest, DEFAULT_ROUTE_KEY,
    EVENT_VERSION,
};
pub use request_id::new_request_id;
pub use response::{decode_response, status_text, WireResponse, DEFAULT_CONTENT_TYPE};

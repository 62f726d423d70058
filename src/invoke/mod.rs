//! Everything on the far side of the adapter: the invocation client, the
//! events of a streaming invocation, and how a request names its function.

mod client;
mod event;
mod http_invoker;
mod target;

pub use client::{InvocationClient, InvokeInput, InvokeOutput};
pub use event::{EventStream, StreamEvent};
pub use http_invoker::HttpInvoker;
pub use target::{Target, TARGET_SCHEME};

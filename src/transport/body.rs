//! Lazily streamed response body.

use crate::error::TripError;
use crate::invoke::{EventStream, StreamEvent};
use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Why a body stopped early. Kept so later reads report the same failure.
#[derive(Debug, Clone)]
enum Failure {
    Truncated,
    Cancelled,
    Stream { code: String, details: String },
    UnexpectedEvent(String),
}

impl Failure {
    fn to_error(&self) -> TripError {
        match self {
            Failure::Truncated => TripError::StreamTruncated,
            Failure::Cancelled => TripError::Cancelled,
            Failure::Stream { code, details } => TripError::Stream {
                code: code.clone(),
                details: details.clone(),
            },
            Failure::UnexpectedEvent(tag) => TripError::UnexpectedEvent(tag.clone()),
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Streaming,
    Completed,
    Failed(Failure),
}

/// The error carried by a completion event, if it carries one.
pub(crate) fn completion_error(
    error_code: Option<String>,
    error_details: Option<String>,
) -> Option<TripError> {
    let code = error_code.unwrap_or_default();
    let details = error_details.unwrap_or_default();
    if code.is_empty() && details.is_empty() {
        None
    } else {
        Some(TripError::Stream { code, details })
    }
}

/// Body of a streamed response.
///
/// Serves the bytes left over after the prelude first, then each payload
/// chunk as it arrives. A clean completion ends the body; a completion that
/// carries an error, a truncated stream, or cancellation surfaces as an
/// error instead, so a consumer can always tell a complete body from a
/// partial one. Single reader only.
///
/// The body can be consumed as a [`hyper::body::Body`], as a
/// [`tokio::io::AsyncRead`], or with [`read`](Self::read).
pub struct StreamingBody {
    leftover: Bytes,
    events: EventStream,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    state: State,
}

impl StreamingBody {
    /// Create a body from leftover prelude bytes and the rest of the stream.
    pub fn new(leftover: Bytes, events: EventStream, cancel: CancellationToken) -> Self {
        Self {
            leftover,
            events,
            cancelled: Box::pin(cancel.cancelled_owned()),
            state: State::Streaming,
        }
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns 0 at the end of the body. Buffered bytes are returned without
    /// waiting; otherwise waits for the next event or cancellation.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TripError> {
        std::future::poll_fn(|cx| self.poll_read_into(cx, buf)).await
    }

    /// Wait for the next chunk of the body. `None` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, TripError> {
        std::future::poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Release the underlying stream.
    pub fn close(mut self) {
        self.events.close();
    }

    fn fail(&mut self, failure: Failure) -> TripError {
        let err = failure.to_error();
        self.state = State::Failed(failure);
        self.events.close();
        err
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, TripError>> {
        if !self.leftover.is_empty() {
            return Poll::Ready(Ok(Some(std::mem::take(&mut self.leftover))));
        }

        match &self.state {
            State::Streaming => {}
            State::Completed => return Poll::Ready(Ok(None)),
            State::Failed(failure) => return Poll::Ready(Err(failure.to_error())),
        }

        loop {
            if self.cancelled.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(self.fail(Failure::Cancelled)));
            }

            let event = ready!(self.events.poll_next(cx));
            let result = match event {
                // An empty chunk must not read as end of body.
                Some(StreamEvent::PayloadChunk(chunk)) if chunk.is_empty() => continue,
                Some(StreamEvent::PayloadChunk(chunk)) => Ok(Some(chunk)),
                Some(StreamEvent::Complete {
                    error_code,
                    error_details,
                }) => match completion_error(error_code, error_details) {
                    Some(TripError::Stream { code, details }) => {
                        Err(self.fail(Failure::Stream { code, details }))
                    }
                    _ => {
                        self.state = State::Completed;
                        self.events.close();
                        Ok(None)
                    }
                },
                Some(StreamEvent::Unknown(tag)) => Err(self.fail(Failure::UnexpectedEvent(tag))),
                None => Err(self.fail(Failure::Truncated)),
            };
            return Poll::Ready(result);
        }
    }

    fn poll_read_into(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize, TripError>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let mut chunk = match ready!(self.poll_chunk(cx)) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Poll::Ready(Ok(0)),
            Err(err) => return Poll::Ready(Err(err)),
        };

        let n = buf.len().min(chunk.len());
        let head = chunk.split_to(n);
        buf[..n].copy_from_slice(&head);
        self.leftover = chunk;
        Poll::Ready(Ok(n))
    }
}

impl fmt::Debug for StreamingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingBody")
            .field("leftover", &self.leftover.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Body for StreamingBody {
    type Data = Bytes;
    type Error = TripError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, TripError>>> {
        self.get_mut()
            .poll_chunk(cx)
            .map(|result| result.transpose().map(|chunk| chunk.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.leftover.is_empty() && matches!(self.state, State::Completed)
    }

    fn size_hint(&self) -> SizeHint {
        match self.state {
            State::Streaming => {
                let mut hint = SizeHint::new();
                hint.set_lower(self.leftover.len() as u64);
                hint
            }
            _ => SizeHint::with_exact(self.leftover.len() as u64),
        }
    }
}

impl AsyncRead for StreamingBody {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let n = ready!(self.get_mut().poll_read_into(cx, buf.initialize_unfilled()))?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

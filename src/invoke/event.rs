//! Events delivered by a streaming invocation.

use bytes::Bytes;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One event of a streaming invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A slice of the response, in order.
    PayloadChunk(Bytes),
    /// The terminal event. Carries the error the function raised, if any.
    Complete {
        error_code: Option<String>,
        error_details: Option<String>,
    },
    /// An event type this adapter does not understand.
    Unknown(String),
}

impl StreamEvent {
    /// Create a payload chunk event.
    pub fn chunk(bytes: impl Into<Bytes>) -> Self {
        StreamEvent::PayloadChunk(bytes.into())
    }

    /// Create a clean completion event.
    pub fn complete() -> Self {
        StreamEvent::Complete {
            error_code: None,
            error_details: None,
        }
    }

    /// Create a completion event carrying an error.
    pub fn failed(code: impl Into<String>, details: impl Into<String>) -> Self {
        StreamEvent::Complete {
            error_code: Some(code.into()),
            error_details: Some(details.into()),
        }
    }
}

/// Receiving half of a streaming invocation.
///
/// Events are observed one at a time, in the order the producer sent them.
/// Dropping or closing the stream tells the producer to stop.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    /// Create a stream and the sender its producer writes to.
    pub fn channel(buffer: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Create an already finished stream holding `events`.
    pub fn from_events(events: impl IntoIterator<Item = StreamEvent>) -> Self {
        let events: Vec<_> = events.into_iter().collect();
        let (tx, stream) = Self::channel(events.len());
        for event in events {
            // Capacity matches the number of events.
            let _ = tx.try_send(event);
        }
        stream
    }

    /// Wait for the next event. `None` means the producer went away.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Poll for the next event.
    pub fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.rx.poll_recv(cx)
    }

    /// Stop accepting events from the producer.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl From<mpsc::Receiver<StreamEvent>> for EventStream {
    fn from(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }
}

//! Server-Sent Events streaming.
//!
//! # Data Flow
//! ```text
//! Response::sse(producer)
//!     → send(): spawn producer(SseEmitter)
//!     → emitter.send(event, data) → mpsc channel
//!     → ReceiverStream → axum Sse body (1s keep-alive heartbeat)
//! ```
//!
//! The stream stays open after the producer returns and only ends when the
//! client disconnects.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::{stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Interval of the keep-alive comment frames.
pub const HEARTBEAT: Duration = Duration::from_secs(1);

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SseError {
    #[error("client disconnected")]
    Disconnected,

    #[error("event name must not contain line breaks")]
    InvalidEvent,
}

/// Handle given to an SSE producer for pushing frames.
#[derive(Debug, Clone)]
pub struct SseEmitter {
    tx: mpsc::Sender<Event>,
}

impl SseEmitter {
    /// Send one frame. `data` may span several lines.
    pub async fn send(&self, event: Option<&str>, data: &str) -> Result<(), SseError> {
        let mut frame = Event::default();
        if let Some(name) = event {
            if name.contains(['\r', '\n']) {
                return Err(SseError::InvalidEvent);
            }
            frame = frame.event(name);
        }
        self.tx.send(frame.data(data)).await.map_err(|_| SseError::Disconnected)
    }

    /// True once the client has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A boxed SSE producer.
pub struct SseProducer(Box<dyn FnOnce(SseEmitter) -> BoxFuture<'static, ()> + Send>);

impl SseProducer {
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(SseEmitter) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Box::new(move |emitter| Box::pin(producer(emitter))))
    }

    /// Start the producer and return the streaming response.
    pub(crate) fn into_response(self) -> Response {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn((self.0)(SseEmitter { tx }));

        let frames = ReceiverStream::new(rx)
            .map(Ok::<Event, Infallible>)
            .chain(stream::pending());

        Sse::new(frames)
            .keep_alive(KeepAlive::new().interval(HEARTBEAT))
            .into_response()
    }
}

impl std::fmt::Debug for SseProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SseProducer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emitter_reports_disconnect() {
        let (tx, rx) = mpsc::channel(1);
        let emitter = SseEmitter { tx };
        assert!(!emitter.is_closed());

        drop(rx);
        assert!(emitter.is_closed());
        assert_eq!(emitter.send(None, "x").await, Err(SseError::Disconnected));
    }

    #[tokio::test]
    async fn test_rejects_multiline_event_name() {
        let (tx, _rx) = mpsc::channel(1);
        let emitter = SseEmitter { tx };
        assert_eq!(
            emitter.send(Some("a\nb"), "x").await,
            Err(SseError::InvalidEvent)
        );
    }

    #[tokio::test]
    async fn test_frames_are_streamed() {
        let producer = SseProducer::new(|emitter| async move {
            let _ = emitter.send(Some("tick"), "1").await;
        });
        let response = producer.into_response();
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"event: tick\ndata: 1\n\n");
    }
}

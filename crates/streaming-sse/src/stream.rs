//! Async Stream support for SSE parsing

use crate::streaming_sse::{SseDecoder, SseEvent};
use bytes::Bytes;
use futures_core::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Adapter that turns a byte stream into an SSE event stream
///
/// Transport errors are passed through without resetting the decoder, so a
/// stream that keeps yielding after an error continues where it left off. An
/// incomplete event at the end of the byte stream is discarded.
pub struct SseStream<S> {
    inner: S,
    decoder: SseDecoder,
    pending_events: VecDeque<SseEvent>,
    done: bool,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream
    pub fn new(stream: S) -> Self {
        Self::with_decoder(stream, SseDecoder::new())
    }

    /// Resume parsing with a decoder that already carries a last event id.
    pub fn with_decoder(stream: S, decoder: SseDecoder) -> Self {
        Self {
            inner: stream,
            decoder,
            pending_events: VecDeque::new(),
            done: false,
        }
    }

    pub fn decoder(&self) -> &SseDecoder {
        &self.decoder
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(event) = this.pending_events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = this.decoder.push(&chunk);
                    this.pending_events.extend(events);
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    this.done = true;
                    if this.decoder.has_buffered_data() {
                        tracing::debug!(
                            target: "eventsource::sse",
                            "discarding incomplete event at end of stream"
                        );
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extension trait for byte streams to easily convert to SSE streams
pub trait SseStreamExt: Stream {
    /// Convert this byte stream into an SSE event stream
    fn into_sse_stream(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

//! # Server-Sent Events (SSE) Parsing Library
//!
//! Transport-agnostic, incremental `text/event-stream` parsing.
//!
//! This crate provides:
//! - `LineDecoder`: splits arbitrarily chunked bytes into complete lines
//! - `Line`: classification of one line into blank / comment / field
//! - `PendingEvent`: folds fields into events and keeps the last event id
//! - `SseDecoder`: the three above composed for one connection attempt

use serde::Serialize;
use std::borrow::Cow;
use std::collections::VecDeque;

/// UTF-8 byte-order mark, stripped once from the start of a stream.
pub const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Event type used when a dispatched event carried no `event` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A completed event as produced by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SseEvent {
    /// Event type (`"message"` unless the server named one)
    #[serde(rename = "type")]
    pub event: String,
    /// Event data payload with the final newline removed
    pub data: String,
    /// Last event id seen on this stream at dispatch time
    pub id: String,
}

impl SseEvent {
    /// Create a default-typed event with just data
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: String::new(),
        }
    }

    /// Set the event type
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    /// Set the event ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BomState {
    /// Not enough bytes seen yet to decide.
    Pending,
    Done,
}

/// Incremental line splitter for a single connection attempt.
///
/// Lines end at CR, LF or CRLF; a CRLF pair split across two chunks still counts
/// as one terminator.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    bom: BomState,
    /// Set after a CR so that an LF at the next scan position is swallowed.
    discard_lf: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            bom: BomState::Pending,
            discard_lf: false,
        }
    }

    /// Append `chunk` and hand every completed line to `on_line`, in order.
    ///
    /// `on_line` receives the line without its terminator and the offset of the
    /// first colon within it, if any. The unterminated tail stays buffered.
    pub fn push<F>(&mut self, chunk: &[u8], mut on_line: F)
    where
        F: FnMut(&[u8], Option<usize>),
    {
        self.buffer.extend_from_slice(chunk);

        if self.bom == BomState::Pending {
            // BOM bytes never include CR/LF, so waiting cannot hold back a line.
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return;
            }
            if self.buffer.starts_with(&BOM) {
                self.buffer.drain(..BOM.len());
            }
            self.bom = BomState::Done;
        }

        let buf = &self.buffer;
        let len = buf.len();
        let mut pos = 0;

        while pos < len {
            if self.discard_lf {
                self.discard_lf = false;
                if buf[pos] == b'\n' {
                    pos += 1;
                    continue;
                }
            }

            let mut colon = None;
            let mut line_end = None;
            for (i, byte) in buf[pos..].iter().enumerate() {
                match *byte {
                    b':' if colon.is_none() => colon = Some(i),
                    b'\r' => {
                        self.discard_lf = true;
                        line_end = Some(pos + i);
                        break;
                    }
                    b'\n' => {
                        line_end = Some(pos + i);
                        break;
                    }
                    _ => {}
                }
            }

            let Some(end) = line_end else {
                break;
            };
            on_line(&buf[pos..end], colon);
            pos = end + 1;
        }

        if pos == len {
            self.buffer.clear();
        } else if pos > 0 {
            self.buffer = self.buffer.split_off(pos);
        }
    }

    /// Bytes of the current unterminated line.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// One complete line of an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty line: dispatch boundary.
    Blank,
    /// Line starting with a colon.
    Comment,
    Field { name: Cow<'a, str>, value: Cow<'a, str> },
}

impl<'a> Line<'a> {
    /// Classify `line` given the offset of its first colon.
    ///
    /// A line without a colon is a field whose value is empty.
    pub fn classify(line: &'a [u8], colon: Option<usize>) -> Self {
        if line.is_empty() {
            return Line::Blank;
        }
        match colon {
            Some(0) => Line::Comment,
            Some(at) => {
                let mut value = &line[at + 1..];
                if value.first() == Some(&b' ') {
                    value = &value[1..];
                }
                Line::Field {
                    name: String::from_utf8_lossy(&line[..at]),
                    value: String::from_utf8_lossy(value),
                }
            }
            None => Line::Field {
                name: String::from_utf8_lossy(line),
                value: Cow::Borrowed(""),
            },
        }
    }

    /// Classify a line that has not been scanned for a colon yet.
    pub fn parse(line: &'a [u8]) -> Self {
        let colon = line.iter().position(|b| *b == b':');
        Self::classify(line, colon)
    }
}

/// Effect of applying one line to a [`PendingEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A dispatch boundary completed an event.
    Dispatch(SseEvent),
    /// A well-formed `retry` field, in milliseconds.
    Retry(u64),
}

/// The in-progress event of one stream.
#[derive(Debug, Default)]
pub struct PendingEvent {
    data: String,
    event: String,
    last_event_id: String,
}

impl PendingEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an id carried over from an earlier connection attempt.
    pub fn with_last_event_id(last_event_id: impl Into<String>) -> Self {
        Self {
            last_event_id: last_event_id.into(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, line: Line<'_>) -> Option<Applied> {
        match line {
            Line::Blank => self.dispatch().map(Applied::Dispatch),
            Line::Comment => None,
            Line::Field { name, value } => match &*name {
                "data" => {
                    self.data.push_str(&value);
                    self.data.push('\n');
                    None
                }
                "event" => {
                    self.event = value.into_owned();
                    None
                }
                "id" => {
                    self.last_event_id = value.into_owned();
                    None
                }
                "retry" => parse_retry(&value).map(Applied::Retry),
                _ => None, // unknown field, ignore
            },
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_name = std::mem::take(&mut self.event);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        let event = if event_name.is_empty() {
            DEFAULT_EVENT_TYPE.to_string()
        } else {
            event_name
        };
        Some(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
        })
    }

    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Whether fields have been seen since the last dispatch boundary.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty() || !self.event.is_empty()
    }
}

/// `retry` values are base-10 ASCII digits; anything else is ignored.
fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Incremental SSE decoder that handles chunk boundaries correctly
#[derive(Debug)]
pub struct SseDecoder {
    lines: LineDecoder,
    pending: PendingEvent,
    /// Most recent well-formed `retry` value not yet taken
    retry: Option<u64>,
    /// Queue of completed events ready to be yielded
    event_queue: VecDeque<SseEvent>,
}

impl SseDecoder {
    /// Create a new SSE decoder
    pub fn new() -> Self {
        Self::with_last_event_id(String::new())
    }

    /// Create a decoder for a reconnect that keeps an earlier last event id.
    pub fn with_last_event_id(last_event_id: impl Into<String>) -> Self {
        Self {
            lines: LineDecoder::new(),
            pending: PendingEvent::with_last_event_id(last_event_id),
            retry: None,
            event_queue: VecDeque::new(),
        }
    }

    /// Push new data chunk and get any complete events
    ///
    /// Partial lines and partial events are buffered until a later chunk
    /// completes them.
    pub fn push(&mut self, chunk: &[u8]) -> impl Iterator<Item = SseEvent> + '_ {
        let pending = &mut self.pending;
        let retry = &mut self.retry;
        let queue = &mut self.event_queue;
        self.lines.push(chunk, |line, colon| {
            match pending.apply(Line::classify(line, colon)) {
                Some(Applied::Dispatch(event)) => queue.push_back(event),
                Some(Applied::Retry(ms)) => *retry = Some(ms),
                None => {}
            }
        });
        self.event_queue.drain(..)
    }

    /// Take the latest `retry` value seen since the previous call.
    pub fn take_retry(&mut self) -> Option<u64> {
        self.retry.take()
    }

    pub fn last_event_id(&self) -> &str {
        self.pending.last_event_id()
    }

    /// Check if decoder has buffered data that would be discarded at end of stream
    pub fn has_buffered_data(&self) -> bool {
        !self.lines.remainder().is_empty() || self.pending.has_data()
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "stream")]
pub mod stream;

#[cfg(feature = "stream")]
pub use stream::{SseStream, SseStreamExt};

#[cfg(test)]
#[path = "../tests/decoder_tests.rs"]
mod decoder_tests;

#[cfg(test)]
#[path = "../tests/line_tests.rs"]
mod line_tests;

#[cfg(all(test, feature = "stream"))]
#[path = "../tests/stream_tests.rs"]
mod stream_tests;

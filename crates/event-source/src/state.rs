//! Connection lifecycle without I/O.
//!
//! `ConnectionState` is fed the announcements of one connection attempt at a
//! time (response, chunks, end) and answers with the events to dispatch. The
//! async driver in [`crate::event_source::EventSource`] owns the waiting.

use crate::core::error::{endpoint_status_message, TransportError};
use crate::event_source::config::ERROR_STATUSES;
use crate::event_source::event::{ErrorEvent, MessageEvent, SourceEvent};
use crate::streaming_sse::SseDecoder;
use std::time::Duration;
use tracing::debug;

const TARGET: &str = "eventsource::connection";

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug)]
pub struct ConnectionState {
    ready_state: ReadyState,
    reconnect_interval: Duration,
    /// Survives attempts; the live decoder holds the current value while open.
    last_event_id: String,
    origin: String,
    /// Parser of the current attempt; present only between response and end.
    decoder: Option<SseDecoder>,
    stopped: bool,
    attempts: u64,
}

impl ConnectionState {
    pub fn new(origin: impl Into<String>, reconnect_interval: Duration) -> Self {
        Self {
            ready_state: ReadyState::Connecting,
            reconnect_interval,
            last_event_id: String::new(),
            origin: origin.into(),
            decoder: None,
            stopped: false,
            attempts: 0,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Number of connection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Enter `Connecting` for a new attempt. Returns false once stopped.
    pub fn begin_attempt(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.attempts += 1;
        self.ready_state = ReadyState::Connecting;
        self.decoder = None;
        debug!(target: TARGET, attempt = self.attempts, "connecting");
        true
    }

    /// Response announcement: optional `error`, then `open`.
    pub fn on_response(&mut self, status: Option<u16>) -> Vec<SourceEvent> {
        if self.stopped {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(2);
        let failed = status.map_or(true, |code| ERROR_STATUSES.contains(&code));
        if failed {
            debug!(target: TARGET, ?status, "response announced a failure status");
            events.push(SourceEvent::Error(ErrorEvent {
                message: endpoint_status_message(status),
                status,
            }));
        }
        self.ready_state = ReadyState::Open;
        self.decoder = Some(SseDecoder::with_last_event_id(self.last_event_id.clone()));
        debug!(target: TARGET, ?status, "open");
        events.push(SourceEvent::Open);
        events
    }

    /// Feed one body chunk; returns completed events in order.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<SourceEvent> {
        if self.stopped {
            return Vec::new();
        }
        let Some(decoder) = self.decoder.as_mut() else {
            debug!(target: TARGET, len = chunk.len(), "chunk outside an open attempt ignored");
            return Vec::new();
        };

        let origin = &self.origin;
        let events: Vec<SourceEvent> = decoder
            .push(chunk)
            .map(|event| SourceEvent::Message(MessageEvent::from_sse(event, origin)))
            .collect();

        if let Some(ms) = decoder.take_retry() {
            debug!(target: TARGET, retry_ms = ms, "server updated reconnect interval");
            self.reconnect_interval = Duration::from_millis(ms);
        }
        if decoder.last_event_id() != self.last_event_id {
            self.last_event_id = decoder.last_event_id().to_string();
        }
        events
    }

    /// The attempt failed before any response announcement.
    pub fn on_connect_error(&mut self, err: &TransportError) -> Option<SourceEvent> {
        if self.stopped {
            return None;
        }
        debug!(target: TARGET, error = %err, "connection attempt failed");
        Some(SourceEvent::Error(ErrorEvent {
            message: err.sanitized_message(),
            status: None,
        }))
    }

    /// Stream ended (for any reason): `Closed`, and the delay before the next attempt.
    pub fn on_end(&mut self) -> Duration {
        if let Some(decoder) = self.decoder.take() {
            if decoder.has_buffered_data() {
                debug!(target: TARGET, "discarding incomplete event at end of stream");
            }
        }
        self.ready_state = ReadyState::Closed;
        debug!(
            target: TARGET,
            delay_ms = self.reconnect_interval.as_millis() as u64,
            "stream ended, reconnect scheduled"
        );
        self.reconnect_interval
    }

    /// Terminal stop; no further events are produced.
    pub fn stop(&mut self) {
        if !self.stopped {
            debug!(target: TARGET, "closed");
        }
        self.stopped = true;
        self.decoder = None;
        self.ready_state = ReadyState::Closed;
    }
}

#[cfg(test)]
#[path = "../tests/state_tests.rs"]
mod state_tests;

use crate::streaming_sse::SseEvent;
use serde::Serialize;

/// Listener type for the signal sent once a response announcement arrives.
pub const OPEN_EVENT: &str = "open";
/// Listener type for failure statuses and connection failures.
pub const ERROR_EVENT: &str = "error";
/// Listener type for events sent without an `event` field.
pub const MESSAGE_EVENT: &str = crate::streaming_sse::DEFAULT_EVENT_TYPE;

/// A server event as handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: String,
    /// Scheme, host and port of the endpoint.
    pub origin: String,
    #[serde(rename = "lastEventId")]
    pub last_event_id: String,
}

impl MessageEvent {
    pub fn from_sse(event: SseEvent, origin: &str) -> Self {
        Self {
            event_type: event.event,
            data: event.data,
            origin: origin.to_string(),
            last_event_id: event.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
    /// Response status, when the error came from a response announcement.
    pub status: Option<u16>,
}

/// Everything a listener can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Open,
    Error(ErrorEvent),
    Message(MessageEvent),
}

impl SourceEvent {
    /// The listener type this event is dispatched under.
    pub fn event_type(&self) -> &str {
        match self {
            SourceEvent::Open => OPEN_EVENT,
            SourceEvent::Error(_) => ERROR_EVENT,
            SourceEvent::Message(message) => &message.event_type,
        }
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            SourceEvent::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            SourceEvent::Error(error) => Some(error),
            _ => None,
        }
    }
}

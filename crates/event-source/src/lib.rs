//! Reconnecting `text/event-stream` client.
//!
//! - config.rs: reconnect and request settings
//! - event.rs: what listeners receive
//! - listeners.rs: typed subscription registry
//! - state.rs: connection lifecycle without I/O
//! - source.rs: the async driver tying a transport to the above

pub mod config;
pub mod event;
pub mod listeners;
pub mod source;
pub mod state;

// Re-exports for convenience
pub use config::{EventSourceConfig, DEFAULT_RECONNECT_INTERVAL};
pub use event::{ErrorEvent, MessageEvent, SourceEvent, ERROR_EVENT, MESSAGE_EVENT, OPEN_EVENT};
pub use listeners::{Listener, ListenerId, Listeners};
pub use source::EventSource;
pub use state::{ConnectionState, ReadyState};

#[path = "../crates/core/src/lib.rs"]
pub mod core;
#[path = "../crates/streaming-sse/src/lib.rs"]
pub mod streaming_sse;
#[path = "../crates/event-source/src/lib.rs"]
pub mod event_source;
#[cfg(feature = "reqwest")]
#[path = "../crates/transports/reqwest/src/lib.rs"]
pub mod transport_reqwest;

pub mod transports {
    #[cfg(feature = "reqwest")]
    pub use crate::transport_reqwest as reqwest;
}

pub use crate::event_source::{
    ErrorEvent, EventSource, EventSourceConfig, ListenerId, MessageEvent, ReadyState,
    SourceEvent,
};
pub use crate::core::{EventSourceError, HttpTransport, TransportConfig, TransportError};
pub use crate::streaming_sse::{SseDecoder, SseEvent};

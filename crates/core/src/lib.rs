pub mod error;
pub mod transport;

pub use crate::core::error::{endpoint_status_message, EventSourceError, TransportError};
pub use crate::core::transport::{
    emit_transport_event, event_stream_headers, set_transport_observer, ByteStream,
    HttpTransport, StreamResponse, TransportConfig, TransportEvent, TransportObserver,
    EVENT_STREAM_MIME, LAST_EVENT_ID_HEADER,
};

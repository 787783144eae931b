use crate::core::transport::TransportConfig;
use std::time::Duration;

/// Reconnect delay used until the server sends a `retry` field.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);

/// Status codes that raise an `error` signal on the response announcement.
pub const ERROR_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Event source configuration.
#[derive(Clone, Debug)]
pub struct EventSourceConfig {
    /// Extra headers sent with every connection attempt.
    pub headers: Vec<(String, String)>,
    /// Initial reconnect delay; a server `retry` field replaces it.
    pub reconnect_interval: Duration,
    /// Send `Last-Event-ID` on attempts made after an id was seen.
    pub send_last_event_id: bool,
    pub transport: TransportConfig,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            send_last_event_id: true,
            transport: TransportConfig::default(),
        }
    }
}

impl EventSourceConfig {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_send_last_event_id(mut self, send: bool) -> Self {
        self.send_last_event_id = send;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

use crate::core::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};

/// Media type requested from event-stream endpoints.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Header carrying the last seen event id back to the server on reconnect.
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Raw body chunks of an event-stream response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Overall request timeout (optional; event streams are long-lived so None by default)
    pub request_timeout: Option<Duration>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Per-chunk idle read timeout; None lets a quiet stream stay open indefinitely
    pub idle_read_timeout: Option<Duration>,
    /// Speak HTTP/2 from the first byte instead of negotiating it (h2c endpoints)
    pub http2_prior_knowledge: bool,
    /// HTTP/2 PING interval keeping a quiet stream's connection alive
    pub http2_keep_alive_interval: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: Duration::from_secs(10),
            idle_read_timeout: None,
            http2_prior_knowledge: false,
            http2_keep_alive_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Response announcement plus the body that follows it.
pub struct StreamResponse {
    /// Status code, if the transport could determine one.
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl StreamResponse {
    pub fn new(status: Option<u16>, headers: Vec<(String, String)>, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Structured event emitted by transport implementations.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    pub started_at: SystemTime,
    pub latency: Option<Duration>,
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub request_headers: Vec<(String, String)>,
    pub response_headers: Vec<(String, String)>,
    pub error: Option<String>,
}

/// Observer hook for transport events.
pub trait TransportObserver: Send + Sync {
    fn on_event(&self, event: TransportEvent);
}

static TRANSPORT_OBSERVER: OnceLock<Arc<dyn TransportObserver>> = OnceLock::new();

/// Register a transport observer (one-time).
pub fn set_transport_observer(observer: Arc<dyn TransportObserver>) -> bool {
    TRANSPORT_OBSERVER.set(observer).is_ok()
}

/// Emit a transport event if an observer is registered.
pub fn emit_transport_event(event: TransportEvent) {
    if let Some(observer) = TRANSPORT_OBSERVER.get() {
        observer.on_event(event);
    }
}

/// Request headers every event-stream request carries, followed by caller headers.
///
/// Caller headers that repeat `Accept` or `Cache-Control` replace the defaults.
pub fn event_stream_headers(extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut headers = Vec::with_capacity(extra.len() + 2);
    if !extra.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept")) {
        headers.push(("Accept".to_string(), EVENT_STREAM_MIME.to_string()));
    }
    if !extra
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("cache-control"))
    {
        headers.push(("Cache-Control".to_string(), "no-cache".to_string()));
    }
    headers.extend(extra.iter().cloned());
    headers
}

/// The collaborator that opens one event-stream connection attempt.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET for `url` and resolve once the response announcement arrives.
    ///
    /// `headers` already contain `Accept` and `Cache-Control` (see
    /// [`event_stream_headers`]). A non-success status is not an error here: the
    /// caller decides what a status means. Errors are reserved for failures that
    /// prevent any response from arriving.
    async fn get_event_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<StreamResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn get_event_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<StreamResponse, TransportError> {
        (**self).get_event_stream(url, headers, cfg).await
    }
}

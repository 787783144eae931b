use crate::core::error::EventSourceError;
use crate::core::transport::{event_stream_headers, HttpTransport, LAST_EVENT_ID_HEADER};
use crate::event_source::config::EventSourceConfig;
use crate::event_source::event::SourceEvent;
use crate::event_source::listeners::{ListenerId, Listeners};
use crate::event_source::state::{ConnectionState, ReadyState};
use futures_util::StreamExt;
use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const TARGET: &str = "eventsource::connection";

thread_local! {
    /// Sources whose listeners are running on this thread, innermost last.
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn is_dispatching(key: usize) -> bool {
    DISPATCHING.with(|active| active.borrow().contains(&key))
}

/// Marks a source as dispatching on the current thread until dropped.
struct DispatchScope(usize);

impl DispatchScope {
    fn enter(key: usize) -> Self {
        DISPATCHING.with(|active| active.borrow_mut().push(key));
        Self(key)
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|key| *key == self.0) {
                active.remove(pos);
            }
        });
    }
}

struct Shared<T> {
    url: Url,
    origin: String,
    config: EventSourceConfig,
    transport: T,
    listeners: Listeners,
    state: Mutex<ConnectionState>,
    cancel: CancellationToken,
    /// Read-held around every listener call; `close` takes it for writing once.
    gate: RwLock<()>,
}

impl<T: HttpTransport> Shared<T> {
    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn dispatch(&self, event: &SourceEvent) -> usize {
        let key = self.key();
        // re-entrant dispatch from a listener already holds the gate
        let nested = is_dispatching(key);
        let _scope = DispatchScope::enter(key);
        self.listeners.dispatch_gated(event, || {
            let guard =
                (!nested).then(|| self.gate.read().unwrap_or_else(PoisonError::into_inner));
            (!self.cancel.is_cancelled()).then_some(guard)
        })
    }

    fn dispatch_all(&self, events: Vec<SourceEvent>) {
        for event in &events {
            if self.cancel.is_cancelled() {
                return;
            }
            self.dispatch(event);
        }
    }

    fn request_headers(&self, last_event_id: &str) -> Vec<(String, String)> {
        let mut headers = event_stream_headers(&self.config.headers);
        if self.config.send_last_event_id && !last_event_id.is_empty() {
            headers.push((LAST_EVENT_ID_HEADER.to_string(), last_event_id.to_string()));
        }
        headers
    }

    /// Run one connection attempt until its stream ends. Returns false when cancelled.
    async fn run_attempt(&self) -> bool {
        let headers = {
            let mut state = self.state();
            if !state.begin_attempt() {
                return false;
            }
            self.request_headers(state.last_event_id())
        };

        let request =
            self.transport
                .get_event_stream(self.url.as_str(), &headers, &self.config.transport);
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            response = request => response,
        };

        match response {
            Ok(response) => {
                let events = self.state().on_response(response.status);
                self.dispatch_all(events);

                let mut body = response.body;
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return false,
                        next = body.next() => next,
                    };
                    match next {
                        Some(Ok(chunk)) => {
                            let events = self.state().on_chunk(&chunk);
                            self.dispatch_all(events);
                        }
                        Some(Err(err)) => {
                            let attempt = self.state().attempts();
                            debug!(target: TARGET, attempt, error = %err, "stream failed");
                            break;
                        }
                        None => break,
                    }
                }
            }
            Err(err) => {
                let event = self.state().on_connect_error(&err);
                if let Some(event) = event {
                    self.dispatch(&event);
                }
            }
        }
        true
    }

    async fn run(self: Arc<Self>) {
        loop {
            if !self.run_attempt().await {
                return;
            }
            let delay = self.state().on_end();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Client for one `text/event-stream` endpoint.
///
/// Listeners are called on the driver task, synchronously and in the order
/// events complete. The source reconnects after every stream end until
/// [`EventSource::close`] is called or the value is dropped.
pub struct EventSource<T: HttpTransport + 'static> {
    shared: Arc<Shared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: HttpTransport + 'static> EventSource<T> {
    pub fn new(url: &str, transport: T) -> Result<Self, EventSourceError> {
        Self::with_config(url, transport, EventSourceConfig::default())
    }

    pub fn with_config(
        url: &str,
        transport: T,
        config: EventSourceConfig,
    ) -> Result<Self, EventSourceError> {
        let parsed = Url::parse(url).map_err(|source| EventSourceError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EventSourceError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }
        let origin = parsed.origin().ascii_serialization();
        let state = ConnectionState::new(origin.clone(), config.reconnect_interval);

        Ok(Self {
            shared: Arc::new(Shared {
                url: parsed,
                origin,
                config,
                transport,
                listeners: Listeners::new(),
                state: Mutex::new(state),
                cancel: CancellationToken::new(),
                gate: RwLock::new(()),
            }),
            task: Mutex::new(None),
        })
    }

    /// Register `listener` for `event_type` (`open`, `error`, `message` or a server-defined type).
    pub fn add_event_listener<F>(&self, event_type: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&SourceEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.add(event_type, Arc::new(listener))
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Invoke the listeners registered for the event's type.
    ///
    /// Returns true if at least one listener ran.
    pub fn dispatch_event(&self, event: &SourceEvent) -> bool {
        self.shared.dispatch(event) > 0
    }

    /// Spawn the connection loop on the current tokio runtime.
    ///
    /// Calling it again while the loop runs, or after `close`, does nothing.
    /// Fails with [`EventSourceError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self) -> Result<(), EventSourceError> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() || self.shared.cancel.is_cancelled() {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            debug!(target: TARGET, error = %err, "start called outside a tokio runtime");
            EventSourceError::NoRuntime
        })?;
        let shared = Arc::clone(&self.shared);
        *task = Some(runtime.spawn(shared.run()));
        Ok(())
    }

    /// Stop for good: cancels a scheduled reconnect and drops the active connection.
    ///
    /// No listener invocation starts after this returns. Called from another
    /// thread while a listener runs, it waits for that listener to return.
    pub fn close(&self) {
        self.shared.cancel.cancel();
        self.shared.state().stop();
        if !is_dispatching(self.shared.key()) {
            drop(self.shared.gate.write().unwrap_or_else(PoisonError::into_inner));
        }
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.state().ready_state()
    }

    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    pub fn origin(&self) -> &str {
        &self.shared.origin
    }

    pub fn last_event_id(&self) -> String {
        self.shared.state().last_event_id().to_string()
    }

    /// Delay that will be used before the next reconnect.
    pub fn reconnect_interval(&self) -> Duration {
        self.shared.state().reconnect_interval()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl<T: HttpTransport + 'static> Drop for EventSource<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: HttpTransport + 'static> std::fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("url", &self.shared.url.as_str())
            .field("ready_state", &self.ready_state())
            .field("attempts", &self.shared.state().attempts())
            .field("listeners", &self.shared.listeners)
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/event_source_tests.rs"]
mod event_source_tests;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported url scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    #[error("no tokio runtime to drive the connection")]
    NoRuntime,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network: {0}")]
    Network(String),
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),
    #[error("idle read timeout after {0:?}")]
    IdleReadTimeout(Duration),
    #[error("body read error: {0}")]
    BodyRead(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("other: {0}")]
    Other(String),
}

impl TransportError {
    /// Message handed to `error` listeners.
    pub fn sanitized_message(&self) -> String {
        match self {
            // upstream detail strings can carry full urls; keep only the kind
            TransportError::Network(_) => "network error".to_string(),
            TransportError::BodyRead(_) => "body read error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Message carried by the `error` signal for a failure status (or none at all).
pub fn endpoint_status_message(status: Option<u16>) -> String {
    match status {
        Some(code) => format!("endpoint status {code}"),
        None => "endpoint status unknown".to_string(),
    }
}

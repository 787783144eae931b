use crate::core::error::TransportError;
use crate::core::transport::{
    emit_transport_event, HttpTransport, StreamResponse, TransportConfig, TransportEvent,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::error::Error as StdError;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

const TARGET: &str = "eventsource::transport::reqwest";

/// Event-stream transport over a pooled reqwest client.
///
/// HTTP/2 is negotiated through ALPN on https endpoints; plain-text h2 needs
/// [`TransportConfig::http2_prior_knowledge`]. Several sources built from one
/// transport (wrap it in an `Arc`) share the client and, over HTTP/2, a single
/// connection per origin.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Apply the connection settings a long-lived event stream needs.
    fn stream_client(
        builder: reqwest::ClientBuilder,
        cfg: &TransportConfig,
    ) -> reqwest::ClientBuilder {
        let mut builder = builder
            .connect_timeout(cfg.connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .http2_keep_alive_interval(cfg.http2_keep_alive_interval)
            .http2_keep_alive_while_idle(cfg.http2_keep_alive_interval.is_some());
        if cfg.http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        match cfg.request_timeout {
            Some(total) => builder.timeout(total),
            None => builder,
        }
    }

    fn build(
        cfg: &TransportConfig,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, TransportError> {
        let client = Self::stream_client(builder, cfg).build().map_err(|err| {
            TransportError::Other(format!(
                "cannot build event-stream client: {}",
                error_chain(&err)
            ))
        })?;
        Ok(Self { client })
    }

    /// Like [`Self::build`], but a client that fails to build degrades to reqwest defaults.
    fn build_or_plain(cfg: &TransportConfig, builder: reqwest::ClientBuilder) -> Self {
        Self::build(cfg, builder).unwrap_or_else(|err| {
            debug!(target: TARGET, error = %err, "using a default reqwest client");
            Self {
                client: Client::new(),
            }
        })
    }

    pub fn try_new(cfg: &TransportConfig) -> Result<Self, TransportError> {
        Self::build(cfg, Client::builder())
    }

    pub fn new(cfg: &TransportConfig) -> Self {
        Self::build_or_plain(cfg, Client::builder())
    }

    /// Use an already configured client (timeouts in `TransportConfig` other
    /// than the idle read timeout are then the client's business).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_event_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        cfg: &TransportConfig,
    ) -> Result<StreamResponse, TransportError> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            let name = k
                .parse::<http::header::HeaderName>()
                .map_err(|_| TransportError::InvalidHeader(k.clone()))?;
            let value = v
                .parse::<http::header::HeaderValue>()
                .map_err(|_| TransportError::InvalidHeader(k.clone()))?;
            req = req.header(name, value);
        }

        let started_at = SystemTime::now();
        let start_instant = Instant::now();
        let request_headers = headers.to_vec();

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                let detail = error_chain(&e);
                debug!(target: TARGET, %detail, "reqwest send failed");
                emit_transport_event(TransportEvent {
                    started_at,
                    latency: Some(start_instant.elapsed()),
                    method: "GET".to_string(),
                    url: url.to_string(),
                    status: None,
                    request_headers,
                    response_headers: Vec::new(),
                    error: Some(detail.clone()),
                });
                return Err(if e.is_connect() {
                    TransportError::Network(format!("connect: {detail}"))
                } else if e.is_timeout() {
                    TransportError::ConnectTimeout(cfg.connect_timeout)
                } else {
                    TransportError::Network(detail)
                });
            }
        };

        let status = resp.status();
        let res_headers = header_pairs(resp.headers());
        emit_transport_event(TransportEvent {
            started_at,
            latency: Some(start_instant.elapsed()),
            method: "GET".to_string(),
            url: url.to_string(),
            status: Some(status.as_u16()),
            request_headers,
            response_headers: res_headers.clone(),
            error: None,
        });
        if !is_event_stream(&res_headers) {
            debug!(
                target: TARGET,
                status = status.as_u16(),
                "response content-type is not text/event-stream"
            );
        }

        let idle = cfg.idle_read_timeout;
        let mut inner = resp.bytes_stream();
        let s = async_stream::try_stream! {
            loop {
                let next = match idle {
                    Some(idle) => match tokio::time::timeout(idle, inner.next()).await {
                        Ok(next) => next,
                        Err(_) => Err(TransportError::IdleReadTimeout(idle))?,
                    },
                    None => inner.next().await,
                };
                match next {
                    None => break,
                    Some(Err(e)) => {
                        debug!(target: TARGET, error = %e, "body read failed");
                        Err(TransportError::BodyRead(e.to_string()))?;
                    }
                    Some(Ok(bytes)) => { yield bytes; }
                }
            }
        };
        Ok(StreamResponse::new(
            Some(status.as_u16()),
            res_headers,
            Box::pin(s),
        ))
    }
}

fn is_event_stream(headers: &[(String, String)]) -> bool {
    headers.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("content-type")
            && v.trim_start()
                .to_ascii_lowercase()
                .starts_with(crate::core::transport::EVENT_STREAM_MIME)
    })
}

fn header_pairs(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// `err` and its sources joined with `": "`; reqwest keeps the useful part in the sources.
fn error_chain(err: &reqwest::Error) -> String {
    std::iter::successors(Some(err as &dyn StdError), |e| (*e).source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_new_returns_transport_error_when_client_build_fails() {
        let cfg = TransportConfig::default();
        let err = match ReqwestTransport::build(
            &cfg,
            Client::builder().user_agent("bad\nagent"),
        ) {
            Ok(_) => panic!("invalid user-agent should fail reqwest client build"),
            Err(err) => err,
        };
        match err {
            TransportError::Other(message) => {
                assert!(
                    message.contains("cannot build event-stream client"),
                    "unexpected message: {message}"
                );
            }
            other => panic!("unexpected transport error variant: {other:?}"),
        }
    }

    #[test]
    fn failed_client_build_falls_back_to_defaults() {
        let cfg = TransportConfig::default();
        let _transport =
            ReqwestTransport::build_or_plain(&cfg, Client::builder().user_agent("bad\nagent"));
    }

    #[test]
    fn http2_settings_build_a_client() {
        let cfg = TransportConfig {
            http2_prior_knowledge: true,
            http2_keep_alive_interval: Some(Duration::from_secs(5)),
            ..TransportConfig::default()
        };
        assert!(ReqwestTransport::try_new(&cfg).is_ok());

        let cfg = TransportConfig {
            http2_keep_alive_interval: None,
            ..TransportConfig::default()
        };
        assert!(ReqwestTransport::try_new(&cfg).is_ok());
    }

    #[tokio::test]
    async fn prior_knowledge_client_speaks_http2_preface() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut preface = [0u8; 24];
            socket.read_exact(&mut preface).await.unwrap();
            // keep the socket open so the client stays waiting
            (preface, socket)
        });

        let cfg = TransportConfig {
            http2_prior_knowledge: true,
            connect_timeout: Duration::from_secs(2),
            ..TransportConfig::default()
        };
        let transport = ReqwestTransport::try_new(&cfg).unwrap();
        let url = format!("http://{addr}/events");
        let request = transport.get_event_stream(&url, &[], &cfg);
        let (preface, _socket) = tokio::select! {
            biased;
            accepted = server => accepted.unwrap(),
            _ = request => panic!("request finished before the server read the preface"),
        };
        assert_eq!(&preface, b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n");
    }

    #[test]
    fn content_type_check_accepts_parameters() {
        assert!(is_event_stream(&[(
            "Content-Type".into(),
            "text/event-stream; charset=utf-8".into()
        )]));
        assert!(!is_event_stream(&[(
            "content-type".into(),
            "application/json".into()
        )]));
        assert!(!is_event_stream(&[]));
    }

    #[tokio::test]
    async fn invalid_header_is_rejected_before_sending() {
        let transport = ReqwestTransport::default();
        let err = transport
            .get_event_stream(
                "http://127.0.0.1:9/events",
                &[("bad header".into(), "v".into())],
                &TransportConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader(name) if name == "bad header"));
    }

    #[test]
    fn header_pairs_keep_valid_values() {
        let mut headers = http::HeaderMap::new();
        headers.insert("content-type", "text/event-stream".parse().unwrap());
        assert_eq!(
            header_pairs(&headers),
            vec![("content-type".to_string(), "text/event-stream".to_string())]
        );
    }
}

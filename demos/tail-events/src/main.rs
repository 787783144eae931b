use anyhow::{Context, Result};
use eventsource_rs::transports::reqwest::ReqwestTransport;
use eventsource_rs::{EventSource, EventSourceConfig, SourceEvent, TransportConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

// Run with:
//   SSE_URL=http://localhost:3000/events cargo run -p tail-events
// Optional:
//   SSE_EVENTS=ping,update   (server-defined event types to print besides "message")
//   SSE_AUTHORIZATION="Bearer ..."
//   RUST_LOG=eventsource=debug

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let url = std::env::var("SSE_URL").context("SSE_URL is not set")?;
    let extra_types = std::env::var("SSE_EVENTS").unwrap_or_default();

    let mut config = EventSourceConfig::default();
    if let Ok(auth) = std::env::var("SSE_AUTHORIZATION") {
        config = config.with_header("Authorization", auth);
    }
    let transport = ReqwestTransport::try_new(&TransportConfig::default())?;
    let source = EventSource::with_config(&url, transport, config)?;

    let mut types = vec!["open", "error", "message"];
    types.extend(extra_types.split(',').map(str::trim).filter(|t| !t.is_empty()));
    for event_type in types {
        source.add_event_listener(event_type, print_event);
    }

    source.start()?;
    tokio::signal::ctrl_c().await?;
    source.close();
    eprintln!("closed; last event id: {:?}", source.last_event_id());
    Ok(())
}

fn print_event(event: &SourceEvent) {
    let line = match event {
        SourceEvent::Open => json!({ "type": "open" }),
        SourceEvent::Error(error) => json!({
            "type": "error",
            "message": error.message,
            "status": error.status,
        }),
        SourceEvent::Message(message) => match serde_json::to_value(message) {
            Ok(value) => value,
            Err(err) => json!({ "type": "error", "message": err.to_string() }),
        },
    };
    println!("{line}");
}

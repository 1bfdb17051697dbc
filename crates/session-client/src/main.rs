//! Session demo
//!
//! Runs one session against the in-process loopback transport: connects,
//! publishes a camera stream, subscribes to it, exchanges a signal with itself
//! and forces every stream to mute. Events are logged until Ctrl+C, then the
//! session disconnects.
//!
//! # Environment
//!
//! - `SESSION_API_KEY`, `SESSION_ID` (required, see `Config::from_env`)
//! - `SESSION_TOKEN` (required) session credential
//! - `SESSION_LOG_JSON` (optional) `true` for JSON logs

#![warn(clippy::pedantic)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use common::config::ObservabilityConfig;
use session_client::transport::loopback::LoopbackTransport;
use session_client::{Config, Publisher, Role, SessionActor, SessionEvent, Subscriber};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the loopback session to confirm a disconnect.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let observability = ObservabilityConfig {
        json_logs: env::var("SESSION_LOG_JSON").is_ok_and(|v| v == "true"),
        ..ObservabilityConfig::default()
    };
    init_tracing(&observability);

    info!("Starting session demo");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let token = env::var("SESSION_TOKEN").map_err(|e| {
        error!("SESSION_TOKEN is not set");
        e
    })?;

    info!(
        session_id = %config.session_id,
        max_turn_servers = config.max_turn_servers,
        mailbox_capacity = config.mailbox_capacity,
        settings = ?config.settings,
        "Configuration loaded successfully"
    );

    let transport = Arc::new(LoopbackTransport::new(Role::Moderator));
    let (handle, task) = SessionActor::spawn(&config, transport, CancellationToken::new());
    let mut events = handle.subscribe_events().await?;

    handle.connect(token).await?;

    let publisher = Publisher::new().with_name("demo camera");
    let mut subscribed = false;

    info!("Session demo running - press Ctrl+C to shutdown");
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Session released unexpectedly");
                    return Ok(());
                };
                log_event(&event);

                match event {
                    SessionEvent::Connected { .. } => {
                        handle.publish(publisher.clone()).await?;
                    }
                    SessionEvent::StreamCreated(stream) if !subscribed => {
                        subscribed = true;
                        handle.subscribe(Subscriber::new(stream.stream_id)).await?;
                        handle.signal("greeting", "hello from the demo", None, true).await?;
                        handle.force_mute_all(None).await?;
                    }
                    SessionEvent::Failed { fatal: true, .. } => break,
                    _ => {}
                }
            }
        }
    }

    info!("Shutdown signal received, disconnecting...");
    if handle.disconnect().await.is_ok() {
        wait_for_disconnect(&mut events).await;
    }

    handle.cancel();
    if let Err(e) = task.await {
        warn!(error = %e, "Session task join error");
    }

    info!("Session demo shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| observability.log_filter.clone().into());

    if observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::SignalReceived {
            signal_type,
            payload,
            from,
        } => info!(
            signal_type = %signal_type,
            payload_len = payload.len(),
            from = ?from,
            "Signal received"
        ),
        SessionEvent::Failed { error, fatal } => {
            warn!(error = %error, fatal, "Session failure");
        }
        other => info!(event = other.kind(), "Session event"),
    }
}

async fn wait_for_disconnect(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    let wait = async {
        while let Some(event) = events.recv().await {
            if event == SessionEvent::Disconnected {
                return;
            }
        }
    };

    if tokio::time::timeout(DISCONNECT_TIMEOUT, wait).await.is_err() {
        warn!(
            timeout_secs = DISCONNECT_TIMEOUT.as_secs(),
            "Disconnect not confirmed in time"
        );
    }
}

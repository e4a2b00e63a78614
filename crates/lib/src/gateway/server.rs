//! Gateway HTTP server (webhook + health on a single port).

use crate::channels::{
    verify_signature, ChannelHandle, InboundEvent, LineChannel, LineEvent, WebhookBody,
    SIGNATURE_HEADER,
};
use crate::config::{self, Config};
use crate::tour::{self, TourEngine};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Queue depth between the webhook handler and the processor task.
const INBOUND_QUEUE: usize = 64;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Resolved channel secret (env or config) used to verify X-Line-Signature.
    pub channel_secret: Arc<str>,
    /// Sender for verified inbound events. Processor task receives.
    pub inbound_tx: mpsc::Sender<InboundEvent>,
    pub engine: Arc<TourEngine>,
}

/// Answer one inbound event and log (not propagate) profile or delivery failures.
async fn process_inbound_event(
    engine: &TourEngine,
    channel: &dyn ChannelHandle,
    event: InboundEvent,
) {
    if let Err(e) = engine.handle_event(channel, &event).await {
        log::warn!(
            "inbound: event from {} on {} failed: {}",
            event.user_id,
            channel.id(),
            e
        );
    }
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Startup fails when no channel secret is configured, since no webhook could be verified.
/// Blocks until shutdown (e.g. Ctrl+C).
/// `config_path` is the path to the config file (used to resolve the tour script).
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let Some(channel_secret) = config::resolve_line_channel_secret(&config) else {
        anyhow::bail!(
            "refusing to start without a LINE channel secret (set CHANNEL_SECRET or channels.line.channelSecret)"
        );
    };
    let access_token = config::resolve_line_access_token(&config);
    if access_token.is_none() {
        log::warn!("no LINE channel access token configured; replies will fail (set CHANNEL_ACCESS_TOKEN)");
    }

    let engine = Arc::new(tour::engine_from_config(&config, &config_path)?);
    let channel: Arc<dyn ChannelHandle> = Arc::new(
        LineChannel::new(access_token, config.channels.line.api_base.clone())
            .context("building LINE API client")?,
    );

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundEvent>(INBOUND_QUEUE);
    let processor = {
        let engine = engine.clone();
        let channel = channel.clone();
        tokio::spawn(async move {
            while let Some(event) = inbound_rx.recv().await {
                process_inbound_event(&engine, channel.as_ref(), event).await;
            }
            log::debug!("inbound processor stopped");
        })
    };

    let state = GatewayState {
        config: Arc::new(config.clone()),
        channel_secret: Arc::from(channel_secret),
        inbound_tx,
        engine,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/callback", post(line_webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} (webhook at /callback)", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    // The router (and with it the last sender) is gone; let queued events drain.
    let _ = processor.await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /callback: receives LINE webhook JSON; verifies the signature, queues follow and text events.
async fn line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(&state.channel_secret, &body, signature) {
        log::info!("webhook: invalid signature, check the channel access token/channel secret");
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }
    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("webhook: malformed body: {}", e);
            return (StatusCode::BAD_REQUEST, "malformed body");
        }
    };
    log::debug!(
        "webhook: {} event(s) for {}",
        payload.events.len(),
        payload.destination.as_deref().unwrap_or("?")
    );
    for event in payload.events.into_iter().filter_map(LineEvent::into_inbound) {
        if state.inbound_tx.send(event).await.is_err() {
            return (StatusCode::SERVICE_UNAVAILABLE, "shutting down");
        }
    }
    (StatusCode::OK, "OK")
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "mode": state.engine.mode(),
        "sessions": state.engine.sessions().len().await,
    }))
}

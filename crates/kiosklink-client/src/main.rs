//! kiosklink client binary.
//!
//! - Config: `KIOSK_CONFIG` (default `kiosk.yaml`, missing file => defaults),
//!   plus `KIOSK_BACKEND_URL` / `KIOSK_VISION_URL` overrides
//! - Connects the backend and vision channels and keeps them alive
//! - Logs kiosk state transitions until Ctrl-C / SIGTERM

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiosklink_client::{app_state::AppState, config, transport::TungsteniteConnector};
use kiosklink_core::error::{KioskError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::var("KIOSK_CONFIG").unwrap_or_else(|_| "kiosk.yaml".into());
    let cfg = config::load_or_default(&path)?;

    let state = AppState::new(cfg, Arc::new(TungsteniteConnector))?;
    tracing::info!(
        backend = %state.backend().config().url,
        vision = %state.vision().config().url,
        "kiosklink-client starting"
    );

    let mut changes = state.bridge().subscribe();
    let watcher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let st = changes.borrow_and_update().clone();
            tracing::info!(
                scene = ?st.scene,
                progress = st.progress,
                game_active = st.game_active,
                backend_connected = st.backend_connected,
                vision_connected = st.vision_connected,
                system_error = ?st.system_error,
                "kiosk state"
            );
        }
    });

    state.start().await;
    shutdown_signal().await?;

    state.shutdown();
    watcher.abort();
    tracing::debug!(metrics = %state.metrics().render(), "final metrics");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| KioskError::Internal(format!("failed to install Ctrl+C handler: {e}")))
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| KioskError::Internal(format!("failed to install signal handler: {e}")))?
            .recv()
            .await;
        Ok::<(), KioskError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    let res = tokio::select! {
        r = ctrl_c => r,
        r = terminate => r,
    };
    tracing::info!("signal received, shutting down");
    res
}

use anyhow::{anyhow, Error};
use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{health::health, transcribe::transcribe_batch};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/transcribe", post(transcribe_batch))
        .route("/health", get(health))
        .with_state(state)
}

/// Serves `router` until ctrl-c.
pub async fn serve(router: Router, host: &str, port: u16) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|err| anyhow!("failed to bind {host}:{port}: {err}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| anyhow!("http server failed: {err}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

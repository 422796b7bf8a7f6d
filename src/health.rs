//! Liveness and readiness responder
//!
//! Runs beside the scrape as an independent task. It shares nothing with the
//! orchestrator except the cancellation token it shuts down on.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Builds the health router
///
/// Both probes answer `200 ok` for as long as the process is up.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(ok))
        .route("/ready", get(ok))
}

async fn ok() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Serves the health endpoints until `shutdown` is cancelled
///
/// # Arguments
///
/// * `port` - Port to bind on all interfaces
/// * `shutdown` - Token that stops the server gracefully
pub async fn serve(port: u16, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, shutdown).await
}

/// Serves the health endpoints on an already-bound listener
pub async fn serve_on(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "health server starting");

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::debug!(%addr, "health server stopped");
    Ok(())
}

/// Spawns the health server as a background task
///
/// Bind or serve failures are logged and never take the scrape down.
pub fn spawn(port: u16, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(port, shutdown).await {
            tracing::error!(port, error = %e, "health server error");
        }
    })
}

//! Termination signal handling
//!
//! A watcher task turns SIGINT or SIGTERM into a cancelled token and an
//! `errors{phase=signal}` metric. It shares nothing else with the run.

use crate::metrics::MetricsSink;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns a task that cancels `cancel` on SIGINT or SIGTERM
///
/// The run stops at its next page fetch, queue item, or delay; an in-flight
/// request is left to finish or time out.
pub fn spawn_signal_watcher(
    cancel: CancellationToken,
    metrics: Arc<dyn MetricsSink>,
) -> JoinHandle<()> {
    tokio::spawn(watch(shutdown_signal(), cancel, metrics))
}

/// Waits for `signal` to yield a signal name, then records it and cancels
///
/// Returns without recording anything if the token is cancelled first.
pub async fn watch<F>(signal: F, cancel: CancellationToken, metrics: Arc<dyn MetricsSink>)
where
    F: Future<Output = &'static str>,
{
    tokio::select! {
        name = signal => {
            tracing::warn!(signal = name, "Shutdown signal received, stopping harvest");
            metrics.record_count("errors", 1, &[("phase", "signal"), ("signal", name)]);
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

/// Resolves with the name of the first termination signal received
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "interrupt",
        _ = terminate => "terminated",
    }
}

//! Graceful Shutdown Module
//!
//! Background tasks are tracked in a JoinSet and stopped through a shared
//! cancellation token; the HTTP server drains through its handle.

use std::future::Future;
use std::time::Duration;

use axum_server::Handle;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shutdown coordinator for graceful termination
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Token cancelled when shutdown starts
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawns a background task that will be tracked
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();

        self.tasks.spawn(async move {
            tokio::select! {
                () = future => {
                    info!(task = name, "Background task completed");
                }
                () = token.cancelled() => {
                    info!(task = name, "Background task cancelled by shutdown");
                }
            }
        });
    }

    /// Cancels every task and waits up to `timeout` for them to finish,
    /// aborting whatever is left.
    pub async fn shutdown(mut self, timeout: Duration) {
        info!("Initiating graceful shutdown");
        self.token.cancel();

        let shutdown_result = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        if shutdown_result.is_err() {
            warn!("Shutdown timeout reached, aborting remaining tasks");
            self.tasks.abort_all();
        }

        info!("Shutdown complete");
    }

    /// Returns the number of active tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Runs `server` until it stops. A signal makes `handle` drain connections
/// for up to `shutdown_timeout`; background tasks are stopped afterwards.
///
/// # Errors
///
/// Returns the server's error, after background tasks have been stopped.
pub async fn run_with_graceful_shutdown<F>(
    server: F,
    handle: Handle,
    coordinator: ShutdownCoordinator,
    shutdown_timeout: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>> + Send,
{
    let watcher = tokio::spawn(async move {
        wait_for_signal().await;
        handle.graceful_shutdown(Some(shutdown_timeout));
    });

    let result = server.await;
    watcher.abort();

    match &result {
        Ok(()) => info!("Server stopped"),
        Err(e) => error!(error = %e, "Server error"),
    }

    coordinator.shutdown(shutdown_timeout).await;
    result
}

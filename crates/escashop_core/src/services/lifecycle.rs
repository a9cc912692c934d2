//! Pool lifecycle: ownership, graceful shutdown, and signal wiring.
//!
//! SIGTERM and SIGQUIT always shut down. Ctrl+C (SIGINT) only does in
//! production, so that a development file-watcher restarting the process
//! does not go through pool teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::ExecutionMode;
use crate::services::pool::DatabasePool;

/// How long shutdown waits for in-flight connections to be returned.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owner of the process-wide [`DatabasePool`].
///
/// Created once at startup and shared as `Arc<PoolManager>`. Shutdown is the
/// only lifecycle mutation and runs at most once.
pub struct PoolManager {
    pool: DatabasePool,
    shutting_down: AtomicBool,
    terminate: CancellationToken,
    drain_timeout: Duration,
}

impl PoolManager {
    /// Take ownership of a connected pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            shutting_down: AtomicBool::new(false),
            terminate: CancellationToken::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Set the drain timeout used by [`shutdown`](Self::shutdown).
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Borrow the pool.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Token cancelled once shutdown has finished; the process should exit.
    pub fn termination(&self) -> CancellationToken {
        self.terminate.clone()
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Close the pool, wait for in-flight work, then signal termination.
    ///
    /// Returns `false` without doing anything if shutdown already started,
    /// including when called concurrently.
    pub async fn shutdown(&self) -> bool {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already in progress");
            return false;
        }

        tracing::info!(in_use = self.pool.status().active(), "Closing database connection pool");
        self.pool.close();

        let deadline = Instant::now() + self.drain_timeout;
        while self.pool.status().size > 0 && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        let remaining = self.pool.status().size;
        if remaining > 0 {
            tracing::warn!(
                remaining,
                timeout_secs = self.drain_timeout.as_secs(),
                "Connections still in use after drain timeout"
            );
        }

        tracing::info!("Database connection pool closed");
        self.terminate.cancel();
        true
    }

    /// Spawn a task that shuts down on the first termination signal.
    pub fn listen_for_signals(self: &Arc<Self>, mode: ExecutionMode) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                signal = shutdown_signal(mode) => {
                    tracing::info!(signal, mode = mode.as_str(), "Received shutdown signal");
                    manager.shutdown().await;
                }
                () = manager.terminate.cancelled() => {}
            }
        })
    }
}

/// Waits for a shutdown signal and returns its name.
///
/// - SIGTERM, SIGQUIT (Unix): always
/// - SIGINT / Ctrl+C: production only
pub async fn shutdown_signal(mode: ExecutionMode) -> &'static str {
    let interrupt = async {
        if !mode.handles_interrupt() {
            return std::future::pending::<&'static str>().await;
        }
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(tokio::signal::unix::SignalKind::terminate(), "SIGTERM");
    #[cfg(unix)]
    let quit = unix_signal(tokio::signal::unix::SignalKind::quit(), "SIGQUIT");

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
        name = quit => name,
    }
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &'static str) -> &'static str {
    match tokio::signal::unix::signal(kind) {
        Ok(mut signal) => {
            signal.recv().await;
            name
        }
        Err(e) => {
            tracing::error!(signal = name, error = %e, "Failed to install signal handler");
            std::future::pending().await
        }
    }
}

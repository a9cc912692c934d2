//! Process-wide tracing setup for the bootstrap.
//!
//! Console output is always on. When a log directory is configured, a daily
//! rolling `escashop.*.log` file receives the same events without ANSI codes,
//! so startup failures and shutdown progress survive the terminal session.
//!
//! Filter priority: explicit filter, then `ESCASHOP_LOG`, then `RUST_LOG`,
//! then [`default_log_filter`].

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "ESCASHOP_LOG";

const LOG_FILE_PREFIX: &str = "escashop";

/// Where and how much the bootstrap logs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for rolling log files; `None` logs to the console only
    pub log_dir: Option<PathBuf>,
    /// Colorize console output
    pub ansi: bool,
    /// Filter directive overriding the environment
    pub log_filter: Option<String>,
}

impl LogConfig {
    /// Console plus rolling files under `log_dir`.
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir: Some(log_dir), ..Self::console() }
    }

    /// Console only. Colors are used when stdout is a terminal.
    pub fn console() -> Self {
        Self { log_dir: None, ansi: atty::is(atty::Stream::Stdout), log_filter: None }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Keeps the file writer alive; dropping it flushes buffered lines.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// A log directory that cannot be created degrades to console-only output
/// with a warning. Calling this twice leaves the first subscriber in place.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let (file, worker_guard, file_error) = match config.log_dir.as_deref().map(file_writer) {
        Some(Ok((writer, guard))) => (Some(writer), Some(guard), None),
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(false);
    let file_layer = file.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });

    let installed = tracing_subscriber::registry()
        .with(build_env_filter(config.log_filter.as_deref()))
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = installed {
        eprintln!("Logging already initialized: {e}");
    }
    if let (Some(dir), Some(e)) = (config.log_dir.as_deref(), file_error) {
        tracing::warn!(log_dir = %dir.display(), error = %e, "File logging disabled");
    }

    LoggingGuard { _worker_guard: worker_guard }
}

/// Open the daily rolling file writer under `log_dir`, creating it if needed.
fn file_writer(log_dir: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(io::Error::other)?;

    Ok(tracing_appender::non_blocking(appender))
}

fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Default filter: verbose for our crates in debug builds, driver noise muted.
pub fn default_log_filter() -> &'static str {
    #[cfg(debug_assertions)]
    {
        "info,escashop=debug,escashop_core=debug,tokio_postgres=warn,deadpool=warn"
    }
    #[cfg(not(debug_assertions))]
    {
        "info,tokio_postgres=warn,deadpool=warn"
    }
}

/// Default log directory, under the platform's local data directory.
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("escashop")
        .join("logs")
}

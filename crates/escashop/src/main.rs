//! EscaShop database bootstrap: resolve, connect, migrate, then hold the pool
//! until a termination signal arrives.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use config::Config;
use escashop_core::logging::{self, init_logging, LogConfig};
use escashop_core::services::diagnostics::CheckStatus;
use escashop_core::services::{initialize_database, redact_uri, resolve_connection};
use escashop_core::{
    DatabaseDiagnostics, DatabasePool, EscashopError, PoolManager, SystemResolver,
};

fn main() -> ExitCode {
    let config = Config::parse();

    let log_config = if config.no_log_file {
        LogConfig::console()
    } else {
        LogConfig::new(config.log_dir.clone().unwrap_or_else(logging::log_dir))
    };
    let log_config = match &config.log_filter {
        Some(filter) => log_config.with_filter(filter.clone()),
        None => log_config,
    };
    let _logging_guard = init_logging(log_config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> ExitCode {
    tracing::info!(
        mode = config.mode().as_str(),
        database_url = %redact_uri(&config.database_url),
        migration_path = %config.resolved_migration_path().display(),
        "Starting EscaShop"
    );

    let resolution = match resolve_connection(&config.database_url, &SystemResolver).await {
        Ok(resolution) => resolution,
        Err(e) => return startup_failed(&e),
    };

    let pool = match DatabasePool::connect(resolution.spec).await {
        Ok(pool) => pool,
        Err(e) => return startup_failed(&e),
    };
    let manager = Arc::new(PoolManager::new(pool));

    if config.diagnose {
        let report = DatabaseDiagnostics::collect(manager.pool(), &config.database_url).await;
        let code = match report.to_json() {
            Ok(json) => {
                println!("{json}");
                if report.status == CheckStatus::Connected {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render diagnostics");
                ExitCode::FAILURE
            }
        };
        manager.shutdown().await;
        return code;
    }

    match initialize_database(manager.pool(), &config.resolved_migration_path()).await {
        Ok(outcome) => tracing::info!(?outcome, "Database initialization finished"),
        Err(e) => {
            let code = startup_failed(&e);
            manager.shutdown().await;
            return code;
        }
    }

    let listener = manager.listen_for_signals(config.mode());
    let status = manager.pool().status();
    tracing::info!(
        max_size = status.max_size,
        size = status.size,
        in_use = status.active(),
        "Database ready, waiting for shutdown signal"
    );

    manager.termination().cancelled().await;
    if let Err(e) = listener.await {
        tracing::warn!(error = %e, "Signal listener ended abnormally");
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

fn startup_failed(error: &EscashopError) -> ExitCode {
    tracing::error!(
        category = error.category(),
        hint = ?error.hint(),
        code = ?error.pg_code(),
        position = ?error.position(),
        error = %error,
        "Startup failed"
    );
    ExitCode::FAILURE
}

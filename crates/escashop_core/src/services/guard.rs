//! Idempotent initialization guard.
//!
//! Decides whether the migration file needs to run by checking that the
//! core tables exist in the `public` schema.

use crate::error::EscashopError;
use crate::services::executor::SqlExecutor;

/// Tables whose presence marks the database as initialized.
pub const EXPECTED_TABLES: [&str; 3] = ["customers", "system_settings", "counters"];

/// Returns `true` unless every expected table is present.
///
/// A failing probe (missing privilege, transient error) is logged and
/// treated as "needs initialization"; the migration file is written to be
/// safe to re-run.
pub async fn needs_initialization(executor: &impl SqlExecutor) -> bool {
    match count_present_tables(executor).await {
        Ok(present) => {
            let initialized = present >= EXPECTED_TABLES.len();
            tracing::debug!(
                present,
                expected = EXPECTED_TABLES.len(),
                initialized,
                "Schema probe completed"
            );
            !initialized
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database check failed, proceeding with initialization");
            true
        }
    }
}

async fn count_present_tables(executor: &impl SqlExecutor) -> Result<usize, EscashopError> {
    let value = executor
        .query_scalar(&probe_sql())
        .await
        .map_err(|e| EscashopError::schema_probe("introspection query failed", Some(e)))?;

    let value = value.ok_or_else(|| EscashopError::schema_probe("probe returned no rows", None))?;
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| EscashopError::schema_probe(format!("unexpected probe result '{value}'"), None))
}

/// Introspection query counting the expected tables that exist.
///
/// Table names are compile-time constants, so they are inlined rather than
/// bound as parameters.
fn probe_sql() -> String {
    let names = EXPECTED_TABLES
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT COUNT(DISTINCT table_name) FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name IN ({names})"
    )
}

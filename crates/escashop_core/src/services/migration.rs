//! Migration application.
//!
//! Runs the single "complete migration" file when the initialization guard
//! reports a fresh database. Statements run one at a time, in file order,
//! with no wrapping transaction: the first failure aborts the run and
//! statements already applied stay applied.

use std::path::{Path, PathBuf};

use crate::error::EscashopError;
use crate::models::{InitOutcome, MigrationStatement};
use crate::services::executor::SqlExecutor;
use crate::services::guard::needs_initialization;
use crate::services::splitter::split_statements;

/// Migration file location, relative to the working directory.
pub const DEFAULT_MIGRATION_PATH: &str = "database/complete-migration.sql";

/// Read the migration file as UTF-8.
pub async fn load_migration_file(path: &Path) -> Result<String, EscashopError> {
    match tokio::fs::read_to_string(path).await {
        Ok(sql) => Ok(sql),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(EscashopError::migration_file_missing(path))
        }
        Err(e) => Err(EscashopError::io(
            format!("Failed to read migration file {}", path.display()),
            e,
        )),
    }
}

/// Execute `statements` sequentially, stopping at the first failure.
///
/// Returns the number of statements executed.
pub async fn apply_statements(
    executor: &impl SqlExecutor,
    statements: &[MigrationStatement],
) -> Result<usize, EscashopError> {
    let total = statements.len();
    for statement in statements {
        tracing::debug!(ordinal = statement.ordinal, total, "Applying migration statement");

        if let Err(e) = executor.batch_execute(statement.as_str()).await {
            tracing::error!(
                ordinal = statement.ordinal,
                total,
                error = %e,
                code = ?e.pg_code(),
                position = ?e.position(),
                "Migration statement failed, aborting"
            );
            return Err(EscashopError::migration_statement(statement.ordinal, statement.as_str(), e));
        }
    }
    Ok(total)
}

/// Bring a database to the initialized state.
///
/// Skips everything when the guard reports the schema present, and treats a
/// missing migration file as "applied out-of-band".
pub async fn initialize_database(
    executor: &impl SqlExecutor,
    migration_path: &Path,
) -> Result<InitOutcome, EscashopError> {
    tracing::info!("Checking database initialization status");

    if !needs_initialization(executor).await {
        tracing::info!("Database already initialized, skipping initialization");
        return Ok(InitOutcome::AlreadyInitialized);
    }

    let sql = match load_migration_file(migration_path).await {
        Ok(sql) => sql,
        Err(EscashopError::MigrationFileMissing { path }) => {
            tracing::info!(
                path = %path.display(),
                "No migration file found, assuming migrations were run separately"
            );
            return Ok(InitOutcome::MigrationFileMissing { path });
        }
        Err(e) => return Err(e),
    };

    let statements = split_statements(&sql);
    tracing::info!(
        path = %migration_path.display(),
        statements = statements.len(),
        "Running database initialization"
    );

    let applied = apply_statements(executor, &statements).await?;
    tracing::info!(statements = applied, "Database initialized successfully");

    Ok(InitOutcome::Applied { statements: applied })
}

/// Resolve the migration path against a base directory when relative.
pub fn migration_path(base: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        base.join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records executed SQL; fails any statement containing `INVALID`.
    #[derive(Default)]
    struct RecordingExecutor {
        present_tables: Option<&'static str>,
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlExecutor for RecordingExecutor {
        async fn batch_execute(&self, sql: &str) -> Result<(), EscashopError> {
            self.executed.lock().push(sql.to_string());
            if sql.contains("INVALID") {
                return Err(EscashopError::query(
                    "syntax error at or near \"INVALID\"",
                    None,
                    None,
                    Some(1),
                    Some("42601".to_string()),
                ));
            }
            Ok(())
        }

        async fn query_scalar(&self, _sql: &str) -> Result<Option<String>, EscashopError> {
            Ok(self.present_tables.map(String::from))
        }
    }

    fn statements(sqls: &[&str]) -> Vec<MigrationStatement> {
        sqls.iter().enumerate().map(|(i, sql)| MigrationStatement::new(i + 1, *sql)).collect()
    }

    #[tokio::test]
    async fn applies_in_order() {
        let executor = RecordingExecutor::default();
        let stmts = statements(&["CREATE TABLE a (id INT);", "CREATE TABLE b (id INT);"]);

        let applied = apply_statements(&executor, &stmts).await.unwrap();

        assert_eq!(applied, 2);
        assert_eq!(
            *executor.executed.lock(),
            vec!["CREATE TABLE a (id INT);", "CREATE TABLE b (id INT);"]
        );
    }

    #[tokio::test]
    async fn aborts_on_first_failure() {
        let executor = RecordingExecutor::default();
        let stmts =
            statements(&["CREATE TABLE a (id INT);", "INVALID SQL;", "CREATE TABLE b (id INT);"]);

        let err = apply_statements(&executor, &stmts).await.unwrap_err();

        assert_eq!(executor.executed.lock().len(), 2);
        match &err {
            EscashopError::MigrationStatement { ordinal, statement, source } => {
                assert_eq!(*ordinal, 2);
                assert_eq!(statement, "INVALID SQL;");
                assert!(matches!(**source, EscashopError::Query { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.pg_code(), Some("42601"));
        assert_eq!(err.position(), Some(1));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_migration_file(&dir.path().join("nope.sql")).await.unwrap_err();
        assert!(matches!(err, EscashopError::MigrationFileMissing { .. }));
    }

    #[tokio::test]
    async fn initialize_skips_when_schema_present() {
        let executor = RecordingExecutor { present_tables: Some("3"), ..Default::default() };
        let outcome = initialize_database(&executor, Path::new("does/not/matter.sql"))
            .await
            .unwrap();

        assert_eq!(outcome, InitOutcome::AlreadyInitialized);
        assert!(executor.executed.lock().is_empty());
    }

    #[tokio::test]
    async fn initialize_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complete-migration.sql");
        let executor = RecordingExecutor { present_tables: Some("0"), ..Default::default() };

        let outcome = initialize_database(&executor, &path).await.unwrap();

        assert_eq!(outcome, InitOutcome::MigrationFileMissing { path });
        assert!(!outcome.applied());
    }

    #[tokio::test]
    async fn initialize_applies_migration_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complete-migration.sql");
        std::fs::write(
            &path,
            "-- schema\nCREATE TABLE customers (id SERIAL);\n\
             CREATE FUNCTION f() RETURNS INT AS $$\nBEGIN\n  RETURN 1;\nEND;\n$$ LANGUAGE plpgsql;\n",
        )
        .unwrap();
        let executor = RecordingExecutor { present_tables: Some("1"), ..Default::default() };

        let outcome = initialize_database(&executor, &path).await.unwrap();

        assert_eq!(outcome, InitOutcome::Applied { statements: 2 });
        let executed = executor.executed.lock();
        assert_eq!(executed[0], "CREATE TABLE customers (id SERIAL);");
        assert!(executed[1].contains("RETURN 1;\nEND;\n$$ LANGUAGE plpgsql;"));
    }

    #[tokio::test]
    async fn initialize_surfaces_statement_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complete-migration.sql");
        std::fs::write(&path, "CREATE TABLE a (id INT);\nINVALID SQL;\nCREATE TABLE b (id INT);\n")
            .unwrap();
        let executor = RecordingExecutor::default();

        let err = initialize_database(&executor, &path).await.unwrap_err();

        assert!(matches!(err, EscashopError::MigrationStatement { ordinal: 2, .. }));
        assert_eq!(executor.executed.lock().len(), 2);
    }

    #[test]
    fn relative_paths_join_base() {
        let base = Path::new("/srv/escashop");
        assert_eq!(
            migration_path(base, Path::new(DEFAULT_MIGRATION_PATH)),
            PathBuf::from("/srv/escashop/database/complete-migration.sql")
        );
        assert_eq!(migration_path(base, Path::new("/etc/m.sql")), PathBuf::from("/etc/m.sql"));
    }
}

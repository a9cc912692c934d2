//! Migration statement and initialization outcome models.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// One self-contained SQL unit extracted from a migration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatement {
    /// 1-based position in the file
    pub ordinal: usize,
    /// Trimmed, non-empty statement text
    pub sql: String,
}

impl MigrationStatement {
    /// Create a statement.
    pub fn new(ordinal: usize, sql: impl Into<String>) -> Self {
        Self { ordinal, sql: sql.into() }
    }

    /// Statement text.
    pub fn as_str(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for MigrationStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Result of an initialization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InitOutcome {
    /// Expected tables already exist; nothing was executed.
    AlreadyInitialized,
    /// No migration file; migrations are assumed to be applied out-of-band.
    MigrationFileMissing {
        /// Path that was probed
        path: PathBuf,
    },
    /// Migration applied.
    Applied {
        /// Number of statements executed
        statements: usize,
    },
}

impl InitOutcome {
    /// Whether any statement was executed.
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

//! Statement execution seam shared by the initialization guard and the
//! migration runner.

use async_trait::async_trait;

use crate::error::EscashopError;

/// Executes unparameterized SQL over the simple query protocol.
///
/// The simple protocol never creates prepared statements, so it works
/// through transaction-pooling proxies and accepts dollar-quoted bodies
/// as-is.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run `sql` and discard any rows.
    async fn batch_execute(&self, sql: &str) -> Result<(), EscashopError>;

    /// Run `sql` and return the first column of the first row as text.
    ///
    /// `Ok(None)` when the query returns no rows or a NULL value.
    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, EscashopError>;
}

//! Database bootstrap for the EscaShop backend.
//!
//! This crate owns everything between `DATABASE_URL` and a ready pool:
//!
//! - **error**: Error handling with PostgreSQL-specific details
//! - **models**: Connection parameters, host classification, migration statements
//! - **services**: URI resolution, pooling, lifecycle, migrations, diagnostics
//! - **logging**: Structured logging setup

pub mod error;
pub mod logging;
pub mod models;
pub mod services;


pub use error::EscashopError;
pub use models::{
    ConfigWarning, ConnectionSpec, DnsOutcome, ExecutionMode, HostClassification, InitOutcome,
    MigrationStatement, PoolStatus, Resolution,
};
pub use services::{
    DatabaseDiagnostics, DatabasePool, HostResolver, PoolManager, SqlExecutor, SystemResolver,
};

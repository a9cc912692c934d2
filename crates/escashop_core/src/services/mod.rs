//! Database bootstrap services.
//!
//! - `dns` - IPv4-preferring host resolution
//! - `resolver` - Connection URI to ConnectionSpec
//! - `pool` - deadpool-postgres pool with startup health check
//! - `lifecycle` - Pool ownership, graceful shutdown, signal wiring
//! - `executor` - Statement execution seam
//! - `guard` - Schema probe deciding whether to migrate
//! - `splitter` - Migration file to statements
//! - `migration` - Sequential migration application
//! - `diagnostics` - Connectivity report

pub mod diagnostics;
pub mod dns;
pub mod executor;
pub mod guard;
pub mod lifecycle;
pub mod migration;
pub mod pool;
pub mod resolver;
pub mod splitter;

pub use diagnostics::DatabaseDiagnostics;
pub use dns::{HostResolver, SystemResolver};
pub use executor::SqlExecutor;
pub use guard::needs_initialization;
pub use lifecycle::PoolManager;
pub use migration::{apply_statements, initialize_database, load_migration_file};
pub use pool::{DatabasePool, PooledConnection};
pub use resolver::{parse_connection_uri, redact_uri, resolve_connection};
pub use splitter::split_statements;

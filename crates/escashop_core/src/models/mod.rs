//! Data models for the database bootstrap layer.
//!
//! - `connection` - ConnectionSpec, HostClassification, ConfigWarning, DnsOutcome, PoolStatus
//! - `migration` - MigrationStatement, InitOutcome

pub mod connection;
pub mod migration;

pub use connection::{
    ConfigWarning, ConnectionSpec, DnsOutcome, ExecutionMode, HostClassification, PoolStatus,
    Resolution,
};
pub use migration::{InitOutcome, MigrationStatement};

//! Database connectivity report for operators.
//!
//! Never includes the connection URI or credentials; the provider is derived
//! from the URI text and only its name is reported.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EscashopError;
use crate::models::{ConnectionSpec, PoolStatus};
use crate::services::pool::DatabasePool;

/// Hosting provider inferred from the connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provider {
    /// Supabase (direct or pooler)
    Supabase,
    /// Render managed PostgreSQL
    Render,
    /// Anything else
    Unknown,
}

impl Provider {
    /// Detect the provider from the raw connection string.
    pub fn detect(uri: &str) -> Self {
        if uri.contains("supabase") {
            Self::Supabase
        } else if uri.contains("render") {
            Self::Render
        } else {
            Self::Unknown
        }
    }
}

/// Connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Round trip succeeded
    Connected,
    /// Round trip failed
    Failed,
}

/// Serializable connectivity report.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseDiagnostics {
    /// When the report was produced
    pub timestamp: DateTime<Utc>,
    /// Connectivity result
    pub status: CheckStatus,
    /// Server clock, when connected
    pub server_time: Option<DateTime<Utc>>,
    /// Inferred provider
    pub provider: Provider,
    /// Connection parameters (no password)
    pub connection: ConnectionSpec,
    /// Pool counters at report time
    pub pool: PoolStatus,
    /// Failure message, when not connected
    pub error: Option<String>,
}

impl DatabaseDiagnostics {
    /// Query the server clock through the pool and assemble a report.
    pub async fn collect(pool: &DatabasePool, uri: &str) -> Self {
        let server_time = server_time(pool).await;
        if let Err(e) = &server_time {
            tracing::warn!(error = %e, "Diagnostic database check failed");
        }

        let (status, server_time, error) = match server_time {
            Ok(time) => (CheckStatus::Connected, Some(time), None),
            Err(e) => (CheckStatus::Failed, None, Some(e.to_string())),
        };

        Self {
            timestamp: Utc::now(),
            status,
            server_time,
            provider: Provider::detect(uri),
            connection: pool.spec().clone(),
            pool: pool.status(),
            error,
        }
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, EscashopError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EscashopError::internal(format!("Failed to render diagnostics: {e}")))
    }
}

async fn server_time(pool: &DatabasePool) -> Result<DateTime<Utc>, EscashopError> {
    let rows = pool.query("SELECT NOW() AS server_time", &[]).await?;
    let row = rows
        .first()
        .ok_or_else(|| EscashopError::internal("SELECT NOW() returned no rows"))?;
    row.try_get::<_, DateTime<Utc>>("server_time").map_err(EscashopError::from)
}

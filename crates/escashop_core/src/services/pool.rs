//! Database connection pooling with deadpool-postgres.
//!
//! Provides the process-wide pool with:
//! - Connection validation on pool creation (fail fast at startup)
//! - TLS without certificate verification for managed hosts
//! - Idle connection reaping
//! - Bounded acquisition time on pool exhaustion

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{
    Manager, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime, TimeoutType,
};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, SimpleQueryMessage, Socket};

use crate::error::EscashopError;
use crate::models::{ConnectionSpec, PoolStatus};
use crate::services::executor::SqlExecutor;

/// Application name reported to PostgreSQL.
pub const APPLICATION_NAME: &str = "escashop";

/// The shared connection pool.
///
/// Consumers borrow it; only the lifecycle manager closes it.
pub struct DatabasePool {
    /// Parameters the pool was built from
    spec: Arc<ConnectionSpec>,
    /// The actual connection pool
    pool: Pool,
}

impl DatabasePool {
    /// Build the pool and verify the database answers.
    ///
    /// Fails with `DatabaseUnreachable` when the health-check round trip does
    /// not complete.
    pub async fn connect(spec: ConnectionSpec) -> Result<Self, EscashopError> {
        let this = Self::build(spec)?;

        tracing::info!(
            resolved_host = %this.spec.host,
            port = this.spec.port,
            database = %this.spec.database,
            user = %this.spec.user,
            ssl = this.spec.ssl_enabled,
            "Creating database pool"
        );

        this.health_check().await?;
        this.spawn_idle_reaper();

        tracing::info!(
            host = %this.spec.host,
            database = %this.spec.database,
            max_size = this.spec.pool_size_max,
            "Database connection established"
        );

        Ok(this)
    }

    /// Build the pool without opening any connection.
    pub fn build(spec: ConnectionSpec) -> Result<Self, EscashopError> {
        spec.validate()?;

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&spec.host);
        pg_config.port(spec.port);
        pg_config.dbname(&spec.database);
        pg_config.user(&spec.user);
        pg_config.password(&spec.password);
        pg_config.application_name(APPLICATION_NAME);
        pg_config.connect_timeout(spec.connect_timeout);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(60));

        let pool = if spec.ssl_enabled {
            pg_config.ssl_mode(tokio_postgres::config::SslMode::Require);
            // Managed hosts present chains that cannot be verified here.
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| EscashopError::connection_with_source("Failed to create TLS connector", e))?;
            build_pool(pg_config, MakeTlsConnector::new(connector), &spec)?
        } else {
            pg_config.ssl_mode(tokio_postgres::config::SslMode::Disable);
            build_pool(pg_config, NoTls, &spec)?
        };

        Ok(Self { spec: Arc::new(spec), pool })
    }

    /// Acquire a connection and release it immediately after `SELECT 1`.
    pub async fn health_check(&self) -> Result<(), EscashopError> {
        let client = self.pool.get().await.map_err(|e| {
            tracing::error!(
                host = %self.spec.host,
                port = self.spec.port,
                error = %e,
                "Database connection failed"
            );
            EscashopError::unreachable(format!("Failed to establish connection: {e}"), e)
        })?;

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| EscashopError::unreachable(format!("Connection validation failed: {e}"), e))?;

        Ok(())
    }

    /// Get the connection parameters.
    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    /// Acquire a connection from the pool.
    ///
    /// Waits up to the connect timeout if the pool is exhausted.
    pub async fn get(&self) -> Result<PooledConnection, EscashopError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| acquire_error(e, self.status().waiting))?;

        Ok(PooledConnection { client })
    }

    /// Run a parameterized query on a pooled connection.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>, EscashopError> {
        self.get().await?.query(sql, params).await
    }

    /// Run a parameterized statement on a pooled connection.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, EscashopError> {
        self.get().await?.execute(sql, params).await
    }

    /// Get current pool status.
    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available as isize,
            waiting: status.waiting,
        }
    }

    /// Close the pool. In-flight connections are dropped when returned.
    pub(crate) fn close(&self) {
        self.pool.close();
    }

    /// Check if the pool is closed.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Drop idle connections older than the idle timeout until the pool closes.
    fn spawn_idle_reaper(&self) {
        let pool = self.pool.clone();
        let idle_timeout = self.spec.idle_timeout;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval((idle_timeout / 2).max(Duration::from_secs(1)));
            loop {
                ticker.tick().await;
                if pool.is_closed() {
                    break;
                }
                let reaped = pool.retain(|_, metrics| metrics.last_used() < idle_timeout);
                if !reaped.removed.is_empty() {
                    tracing::debug!(removed = reaped.removed.len(), "Reaped idle connections");
                }
            }
        });
    }
}

/// Only a wait timeout means the pool is exhausted; create and recycle
/// timeouts are slow connections to the server.
fn acquire_error(error: PoolError, waiting: usize) -> EscashopError {
    match error {
        PoolError::Timeout(TimeoutType::Wait) => {
            EscashopError::pool_timeout(format!("Pool exhausted after timeout: {error}"), waiting)
        }
        PoolError::Timeout(TimeoutType::Create) => {
            EscashopError::connection(format!("Timed out opening a connection: {error}"))
        }
        PoolError::Timeout(TimeoutType::Recycle) => {
            EscashopError::connection(format!("Timed out validating a pooled connection: {error}"))
        }
        other => EscashopError::connection(format!("Failed to acquire connection: {other}")),
    }
}

fn build_pool<T>(
    pg_config: tokio_postgres::Config,
    tls: T,
    spec: &ConnectionSpec,
) -> Result<Pool, EscashopError>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let manager = Manager::from_config(
        pg_config,
        tls,
        ManagerConfig { recycling_method: RecyclingMethod::Fast },
    );

    Pool::builder(manager)
        .max_size(spec.pool_size_max)
        .wait_timeout(Some(spec.connect_timeout))
        .create_timeout(Some(spec.connect_timeout))
        .recycle_timeout(Some(spec.connect_timeout))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| EscashopError::connection(format!("Failed to create pool: {e}")))
}

#[async_trait]
impl SqlExecutor for DatabasePool {
    async fn batch_execute(&self, sql: &str) -> Result<(), EscashopError> {
        let conn = self.get().await?;
        conn.client.batch_execute(sql).await.map_err(EscashopError::from)
    }

    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, EscashopError> {
        let conn = self.get().await?;
        let messages = conn.client.simple_query(sql).await.map_err(EscashopError::from)?;
        let first = messages.iter().find_map(|message| match message {
            SimpleQueryMessage::Row(row) => Some(row.get(0).map(String::from)),
            _ => None,
        });
        Ok(first.flatten())
    }
}

/// A connection acquired from the pool.
///
/// Automatically returns to the pool when dropped.
pub struct PooledConnection {
    client: deadpool_postgres::Client,
}

impl PooledConnection {
    /// Execute a query that returns rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>, EscashopError> {
        self.client.query(sql, params).await.map_err(EscashopError::from)
    }

    /// Execute a query that doesn't return rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, EscashopError> {
        self.client.execute(sql, params).await.map_err(EscashopError::from)
    }
}

//! Connection parameter, host classification, and pool status models.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::EscashopError;

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Database used when the URI has no path segment.
pub const DEFAULT_DATABASE: &str = "postgres";

/// Host used when the URI has no host.
pub const DEFAULT_HOST: &str = "localhost";

/// Port reserved for the Supabase transaction pooler.
pub const POOLER_PORT: u16 = 6543;

/// Host fragment identifying a Supabase pooler endpoint.
pub const POOLER_HOST_FRAGMENT: &str = "pooler.supabase.com";

/// Host suffix identifying a direct Supabase database endpoint.
pub const DIRECT_HOST_SUFFIX: &str = ".supabase.co";

/// Maximum connections held by the pool.
pub const DEFAULT_POOL_SIZE_MAX: usize = 20;

/// Idle connections older than this are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for establishing or acquiring a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved, ready-to-use connection parameters.
///
/// Built once at startup by the connection resolver and never mutated. The
/// password is excluded from both `Debug` and `Serialize` output.
#[derive(Clone, Serialize)]
pub struct ConnectionSpec {
    /// Hostname, or the resolved IPv4 literal
    pub host: String,
    /// Server port (never 0)
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login username
    pub user: String,
    /// Login password
    #[serde(skip)]
    pub password: String,
    /// Whether TLS is used (certificate verification relaxed)
    pub ssl_enabled: bool,
    /// Pool capacity
    pub pool_size_max: usize,
    /// Idle connection lifetime
    #[serde(serialize_with = "serialize_millis")]
    pub idle_timeout: Duration,
    /// Connect and acquire timeout
    #[serde(serialize_with = "serialize_millis")]
    pub connect_timeout: Duration,
}

impl ConnectionSpec {
    /// Create a spec with the pool-sizing defaults.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        ssl_enabled: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            ssl_enabled,
            pool_size_max: DEFAULT_POOL_SIZE_MAX,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Validate the invariants every consumer relies on.
    pub fn validate(&self) -> Result<(), EscashopError> {
        if self.host.is_empty() {
            return Err(EscashopError::malformed_uri("Host is required"));
        }
        if self.port == 0 {
            return Err(EscashopError::malformed_uri("Port must be a positive integer"));
        }
        if self.database.is_empty() {
            return Err(EscashopError::malformed_uri("Database name is required"));
        }
        if self.pool_size_max == 0 {
            return Err(EscashopError::config("Pool size must be at least 1"));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("ssl_enabled", &self.ssl_enabled)
            .field("pool_size_max", &self.pool_size_max)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Diagnostic facts about the target host.
///
/// Only used to produce [`ConfigWarning`]s; never blocks a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostClassification {
    /// Host is fronted by the connection pooler
    pub is_pooler_host: bool,
    /// Host is a direct provider endpoint
    pub is_direct_host: bool,
    /// URI carries `pgbouncer=true`
    pub has_pgbouncer_flag: bool,
    /// Raw `sslmode` query parameter, `"none"` when absent
    pub ssl_mode: String,
}

impl HostClassification {
    /// Classify a host from its name and the URI query parameters.
    pub fn classify(host: &str, pgbouncer: Option<&str>, ssl_mode: Option<&str>) -> Self {
        let is_pooler_host = host.contains(POOLER_HOST_FRAGMENT);
        Self {
            is_pooler_host,
            is_direct_host: host.ends_with(DIRECT_HOST_SUFFIX) && !is_pooler_host,
            has_pgbouncer_flag: pgbouncer == Some("true"),
            ssl_mode: ssl_mode.unwrap_or("none").to_string(),
        }
    }

    /// Check the classification against the port for known mismatches.
    pub fn warnings(&self, port: u16) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.is_pooler_host && port != POOLER_PORT {
            warnings.push(ConfigWarning::PoolerWrongPort { port });
        }
        if self.is_direct_host && port == POOLER_PORT {
            warnings.push(ConfigWarning::DirectHostOnPoolerPort);
        }
        if self.is_pooler_host && !self.has_pgbouncer_flag {
            warnings.push(ConfigWarning::PoolerWithoutPgBouncer);
        }
        warnings
    }
}

/// Advisory configuration mismatch. Logged, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    /// Pooler host on a port other than the pooler port
    PoolerWrongPort {
        /// Port found in the URI
        port: u16,
    },
    /// Direct host on the pooler port; the server will refuse connections
    DirectHostOnPoolerPort,
    /// Pooler host without `pgbouncer=true`
    PoolerWithoutPgBouncer,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolerWrongPort { port } => write!(
                f,
                "pooler host detected but port is {port}, expected {POOLER_PORT}"
            ),
            Self::DirectHostOnPoolerPort => write!(
                f,
                "direct database host on port {POOLER_PORT} will refuse connections"
            ),
            Self::PoolerWithoutPgBouncer => {
                write!(f, "pooler host without pgbouncer=true parameter")
            }
        }
    }
}

/// What happened to the host during IPv4 resolution.
#[derive(Debug)]
pub enum DnsOutcome {
    /// No lookup performed: IP literal or loopback name.
    Skipped {
        /// Host used as-is
        host: String,
    },
    /// Lookup succeeded.
    Resolved {
        /// Hostname from the URI
        original: String,
        /// First IPv4 answer
        address: Ipv4Addr,
    },
    /// Lookup failed; the original hostname is used.
    Fallback {
        /// Hostname from the URI, used as-is
        original: String,
        /// Why the lookup failed
        cause: EscashopError,
    },
}

impl DnsOutcome {
    /// Host value the pool should connect to.
    pub fn effective_host(&self) -> String {
        match self {
            Self::Skipped { host } => host.clone(),
            Self::Resolved { address, .. } => address.to_string(),
            Self::Fallback { original, .. } => original.clone(),
        }
    }

    /// Whether a DNS query was issued.
    pub fn attempted(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }
}

/// Complete result of resolving a connection URI.
#[derive(Debug)]
pub struct Resolution {
    /// Parameters for the pool
    pub spec: ConnectionSpec,
    /// Host classification computed from the URI
    pub classification: HostClassification,
    /// Advisory mismatches, already logged
    pub warnings: Vec<ConfigWarning>,
    /// How the host was resolved
    pub dns: DnsOutcome,
}

/// Process execution mode, controls interrupt handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Iterative development; Ctrl+C must not tear the pool down
    #[default]
    Development,
    /// Deployed service; Ctrl+C shuts down gracefully
    Production,
}

impl ExecutionMode {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Parse from string representation. Anything but "production" is development.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether an interactive interrupt should trigger shutdown.
    pub fn handles_interrupt(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Connection pool status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStatus {
    /// Maximum pool capacity
    pub max_size: usize,
    /// Current connections (idle + active)
    pub size: usize,
    /// Idle connections (can be negative during contention)
    pub available: isize,
    /// Tasks waiting for connections
    pub waiting: usize,
}

impl PoolStatus {
    /// Number of connections checked out of the pool.
    pub fn active(&self) -> usize {
        self.size.saturating_sub(self.available.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ConnectionSpec {
        ConnectionSpec::new("db.internal", 5432, "escashop", "admin", "s3cret!", true)
    }

    #[test]
    fn new_spec_applies_pool_defaults() {
        let spec = spec();
        assert_eq!(spec.pool_size_max, 20);
        assert_eq!(spec.idle_timeout, Duration::from_millis(30_000));
        assert_eq!(spec.connect_timeout, Duration::from_millis(10_000));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_host_and_zero_port() {
        let mut spec = spec();
        spec.host.clear();
        assert!(spec.validate().is_err());

        let mut spec = self::spec();
        spec.port = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn password_never_appears_in_debug_or_json() {
        let spec = spec();
        let debug = format!("{spec:?}");
        let json = serde_json::to_string(&spec).unwrap();

        assert!(!debug.contains("s3cret!"));
        assert!(!json.contains("s3cret!"));
        assert!(json.contains("\"idle_timeout\":30000"));
    }

    #[test]
    fn classify_pooler_host() {
        let c = HostClassification::classify(
            "aws-0-ap-southeast-1.pooler.supabase.com",
            Some("true"),
            Some("require"),
        );
        assert!(c.is_pooler_host);
        assert!(!c.is_direct_host);
        assert!(c.has_pgbouncer_flag);
        assert_eq!(c.ssl_mode, "require");
        assert!(c.warnings(POOLER_PORT).is_empty());
    }

    #[test]
    fn classify_direct_host_on_pooler_port_warns() {
        let c = HostClassification::classify("db.abcdefgh.supabase.co", None, None);
        assert!(c.is_direct_host);
        assert_eq!(c.ssl_mode, "none");
        assert_eq!(c.warnings(POOLER_PORT), vec![ConfigWarning::DirectHostOnPoolerPort]);
        assert!(c.warnings(5432).is_empty());
    }

    #[test]
    fn pgbouncer_flag_requires_literal_true() {
        let c = HostClassification::classify("x.pooler.supabase.com", Some("TRUE"), None);
        assert!(!c.has_pgbouncer_flag);
        assert_eq!(
            c.warnings(5432),
            vec![
                ConfigWarning::PoolerWrongPort { port: 5432 },
                ConfigWarning::PoolerWithoutPgBouncer,
            ]
        );
    }

    #[test]
    fn execution_mode_parse() {
        assert_eq!(ExecutionMode::parse("production"), ExecutionMode::Production);
        assert_eq!(ExecutionMode::parse(" production "), ExecutionMode::Production);
        assert_eq!(ExecutionMode::parse("development"), ExecutionMode::Development);
        assert_eq!(ExecutionMode::parse("staging"), ExecutionMode::Development);
        assert_eq!(ExecutionMode::parse("prod"), ExecutionMode::Development);
        assert_eq!(ExecutionMode::parse("Production"), ExecutionMode::Development);
        assert!(!ExecutionMode::Development.handles_interrupt());
    }

    #[test]
    fn pool_status_counts_checked_out_connections() {
        let status = PoolStatus { max_size: 20, size: 5, available: 1, waiting: 0 };
        assert_eq!(status.active(), 4);

        let contended = PoolStatus { max_size: 2, size: 2, available: -3, waiting: 3 };
        assert_eq!(contended.active(), 2);
    }
}

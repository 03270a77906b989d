//! Connection-related data models.
//!
//! This module defines the SQL dialects we can open and the options used
//! to open and tune a connection pool.

use crate::error::{DbError, DbResult};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Dialect used when a connection entry does not name one.
pub const DEFAULT_DIALECT: &str = "mysql";

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Includes MariaDB
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }
}

impl FromStr for Dialect {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(DbError::unsupported_dialect(s)),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Options for opening a connection pool.
///
/// Zero values for the pool limits and the lifetime mean "leave the driver
/// default in place".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Empty means [`DEFAULT_DIALECT`].
    pub dialect: String,
    /// Contains sensitive data - never log
    pub connect: String,
    /// Applied as the pool's minimum (warm) connection count, not an idle cap.
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    pub conn_max_lifetime: Duration,
}

impl ConnectionOptions {
    /// Create options for a connection string with default pool tuning.
    pub fn new(dialect: impl Into<String>, connect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            connect: connect.into(),
            ..Self::default()
        }
    }

    /// Resolve the dialect, falling back to MySQL when unset.
    pub fn dialect(&self) -> DbResult<Dialect> {
        if self.dialect.trim().is_empty() {
            return DEFAULT_DIALECT.parse();
        }
        self.dialect.parse()
    }

    /// Describe where this connection points without exposing credentials.
    ///
    /// Returns `scheme://host:port/path` for URL-style strings and
    /// `"<unparsed>"` for anything else.
    pub fn redacted_target(&self) -> String {
        match Url::parse(&self.connect) {
            // Opaque non-sqlite URLs are most likely DSNs with inline credentials.
            Ok(url) if url.cannot_be_a_base() && !url.scheme().starts_with("sqlite") => {
                "<unparsed>".to_string()
            }
            Ok(url) => {
                let mut target = format!("{}:", url.scheme());
                if let Some(host) = url.host_str() {
                    target.push_str("//");
                    target.push_str(host);
                    if let Some(port) = url.port() {
                        target.push_str(&format!(":{}", port));
                    }
                }
                target.push_str(url.path());
                target
            }
            Err(_) => "<unparsed>".to_string(),
        }
    }
}

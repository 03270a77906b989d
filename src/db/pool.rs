//! Connection pool opening.
//!
//! This module opens database-specific pools (MySqlPool, PgPool, SqlitePool)
//! from [`ConnectionOptions`] and applies pool tuning.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionOptions, Dialect};
use sqlx::pool::PoolOptions;
use sqlx::{
    Database, MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool,
    mysql::MySqlConnectOptions, postgres::PgConnectOptions, sqlite::SqliteConnectOptions,
};
use std::str::FromStr;
use tracing::{info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
///
/// Cloning is cheap and every clone shares the same underlying pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Whether [`close`](Self::close) has been called on this pool.
    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::MySql(pool) => pool.is_closed(),
            DbPool::Postgres(pool) => pool.is_closed(),
            DbPool::SQLite(pool) => pool.is_closed(),
        }
    }

    /// Get the dialect for this pool.
    pub fn dialect(&self) -> Dialect {
        match self {
            DbPool::MySql(_) => Dialect::MySql,
            DbPool::Postgres(_) => Dialect::Postgres,
            DbPool::SQLite(_) => Dialect::Sqlite,
        }
    }
}

impl From<MySqlPool> for DbPool {
    fn from(pool: MySqlPool) -> Self {
        DbPool::MySql(pool)
    }
}

impl From<PgPool> for DbPool {
    fn from(pool: PgPool) -> Self {
        DbPool::Postgres(pool)
    }
}

impl From<SqlitePool> for DbPool {
    fn from(pool: SqlitePool) -> Self {
        DbPool::SQLite(pool)
    }
}

/// Open a connection pool for the given options.
///
/// Fails with [`DbError::EmptyConnectionString`] before touching the driver
/// when `connect` is empty. Driver failures are returned unchanged.
pub async fn open(options: &ConnectionOptions) -> DbResult<DbPool> {
    if options.connect.is_empty() {
        return Err(DbError::EmptyConnectionString);
    }
    let dialect = options.dialect()?;

    info!(
        dialect = %dialect,
        target = %options.redacted_target(),
        max_open = options.max_open_conns,
        max_idle = options.max_idle_conns,
        max_lifetime_secs = options.conn_max_lifetime.as_secs(),
        "Opening connection pool"
    );

    let pool = match dialect {
        Dialect::MySql => {
            let connect = MySqlConnectOptions::from_str(&options.connect)?.charset("utf8mb4");
            DbPool::MySql(tuned_pool_options::<MySql>(options).connect_with(connect).await?)
        }
        Dialect::Postgres => {
            let connect = PgConnectOptions::from_str(&options.connect)?;
            DbPool::Postgres(tuned_pool_options::<Postgres>(options).connect_with(connect).await?)
        }
        Dialect::Sqlite => {
            let connect = SqliteConnectOptions::from_str(&options.connect)?;
            DbPool::SQLite(tuned_pool_options::<Sqlite>(options).connect_with(connect).await?)
        }
    };

    info!(dialect = %dialect, target = %options.redacted_target(), "Connected");
    Ok(pool)
}

/// Build pool options, applying only the tuning values that are set (> 0).
///
/// sqlx has no idle cap. `max_idle_conns` is mapped to `min_connections`,
/// which is the inverse knob: a floor of warm connections that the pool
/// opens eagerly and keeps even when idle, not a ceiling on idle ones. It
/// can never exceed the open limit, so a larger value is clamped with a
/// warning.
pub(crate) fn tuned_pool_options<DB: Database>(options: &ConnectionOptions) -> PoolOptions<DB> {
    let mut pool = PoolOptions::<DB>::new();

    if options.max_open_conns > 0 {
        pool = pool.max_connections(options.max_open_conns);
    }

    if options.max_idle_conns > 0 {
        let max_open = pool.get_max_connections();
        let idle = if options.max_idle_conns > max_open {
            warn!(
                max_idle = options.max_idle_conns,
                max_open = max_open,
                "maxIdleConns exceeds the open connection limit, clamping"
            );
            max_open
        } else {
            options.max_idle_conns
        };
        pool = pool.min_connections(idle);
    }

    if !options.conn_max_lifetime.is_zero() {
        pool = pool.max_lifetime(options.conn_max_lifetime);
    }

    pool
}

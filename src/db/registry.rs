//! Named connection registry.
//!
//! Maps logical database names to opened pools. The registry is an ordinary
//! value: create one at startup, share it by cloning (clones see the same
//! entries), and hand it to whatever needs a connection.

use crate::config::DbConfig;
use crate::db::pager::Pager;
use crate::db::pool::{self, DbPool};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionOptions;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    pools: Arc<RwLock<HashMap<String, DbPool>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open every configured connection and build a registry from them.
    pub async fn from_configs(configs: &[DbConfig]) -> DbResult<Self> {
        let registry = Self::new();
        registry.replace_all(configs).await?;
        Ok(registry)
    }

    /// Register a pool under `name`, replacing any existing entry.
    ///
    /// Returns the displaced pool, which is left open for whoever still
    /// holds it. An empty name is a fatal configuration error.
    pub async fn register(&self, name: &str, pool: DbPool) -> DbResult<Option<DbPool>> {
        if name.is_empty() {
            return Err(DbError::EmptyName);
        }

        let previous = {
            let mut pools = self.pools.write().await;
            pools.insert(name.to_string(), pool)
        };

        info!(
            name = %name,
            replaced = previous.is_some(),
            "Registered connection"
        );
        Ok(previous)
    }

    /// Open a pool from `options` and register it under `name`.
    ///
    /// The name is checked before any connection is attempted.
    pub async fn register_from_options(
        &self,
        name: &str,
        options: &ConnectionOptions,
    ) -> DbResult<()> {
        if name.is_empty() {
            return Err(DbError::EmptyName);
        }
        let pool = pool::open(options).await?;
        self.register(name, pool).await?;
        Ok(())
    }

    /// Look up a pool by name.
    pub async fn lookup(&self, name: &str) -> Option<DbPool> {
        let pools = self.pools.read().await;
        pools.get(name).cloned()
    }

    /// Start a pager on the named connection.
    pub async fn pager(&self, name: &str, page: i64, page_size: i64) -> DbResult<Pager> {
        let pool = self
            .lookup(name)
            .await
            .ok_or_else(|| DbError::connection_not_found(name))?;
        Ok(Pager::new(pool, page, page_size))
    }

    /// Replace the whole registry with connections opened from `configs`.
    ///
    /// Every connection is opened before the swap. If any entry fails the
    /// current set stays installed and the error is returned. Later entries
    /// win over earlier ones with the same name. An empty list clears the
    /// registry.
    pub async fn replace_all(&self, configs: &[DbConfig]) -> DbResult<()> {
        if configs.iter().any(|c| c.name.is_empty()) {
            return Err(DbError::EmptyName);
        }

        let opened = open_all(configs, |options| async move { pool::open(&options).await }).await?;
        self.replace_all_pools(opened).await
    }

    /// Replace the whole registry with already opened pools.
    ///
    /// Pools that were registered before stay open; callers holding them
    /// can keep using them.
    pub async fn replace_all_pools(
        &self,
        entries: impl IntoIterator<Item = (String, DbPool)>,
    ) -> DbResult<()> {
        let mut next = HashMap::new();
        for (name, pool) in entries {
            if name.is_empty() {
                return Err(DbError::EmptyName);
            }
            next.insert(name, pool);
        }

        let count = next.len();
        let previous = {
            let mut pools = self.pools.write().await;
            std::mem::replace(&mut *pools, next)
        };

        info!(
            count = count,
            previous = previous.len(),
            "Replaced connection registry"
        );
        Ok(())
    }

    /// List registered connection names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        let mut names: Vec<String> = pools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered connections.
    pub async fn len(&self) -> usize {
        let pools = self.pools.read().await;
        pools.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close all pools and clear the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(String, DbPool)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };

        for (name, pool) in drained {
            info!(name = %name, "Closing connection");
            pool.close().await;
        }
    }
}

/// Open every entry in order. On the first failure the pools opened so far
/// are closed and the error is returned.
async fn open_all<F, Fut>(configs: &[DbConfig], mut open: F) -> DbResult<Vec<(String, DbPool)>>
where
    F: FnMut(ConnectionOptions) -> Fut,
    Fut: Future<Output = DbResult<DbPool>>,
{
    let mut opened = Vec::with_capacity(configs.len());
    for config in configs {
        debug!(name = %config.name, "Opening configured connection");
        match open(config.options()).await {
            Ok(pool) => opened.push((config.name.clone(), pool)),
            Err(e) => {
                warn!(
                    name = %config.name,
                    error = %e,
                    opened = opened.len(),
                    "Failed to open configured connection"
                );
                for (name, pool) in opened {
                    debug!(name = %name, "Closing connection opened before the failure");
                    pool.close().await;
                }
                return Err(e);
            }
        }
    }
    Ok(opened)
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use crate::config::PostgresDbConfig;
use coral_error::WrappedSqlxError;
use coral_types::SchemaName;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-wide cache of per-tenant connection pools, keyed by schema name.
/// Each pool is configured with `search_path = <schema>,public` so
/// unqualified statements hit the tenant's tables and fall back to the shared
/// schema for cross-schema lookups.
///
/// Entries live until explicitly released; tenant cardinality is expected to
/// stay modest. An explicit object (not module state) so tests can inject a
/// substitute and shutdown ordering stays visible.
/// ## Notes
/// - Shareable: clones observe the same cache.
#[derive(Clone, Debug)]
pub struct TenantPools {
    config: PostgresDbConfig,
    // The map lock is held across pool construction so concurrent first-use
    // of one schema builds exactly one pool.
    pools: Arc<Mutex<HashMap<String, PgPool>>>,
}

impl TenantPools {
    pub fn new(config: PostgresDbConfig) -> Self {
        Self {
            config,
            pools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached pool for `schema`, constructing and caching it on
    /// first use. `PgPool` is itself a cheap handle; clones returned here all
    /// share the one underlying pool.
    pub async fn resolve(&self, schema: &SchemaName) -> Result<PgPool, WrappedSqlxError> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(schema.as_str()) {
            return Ok(pool.clone());
        }

        let options = self
            .config
            .connect_options()
            .options([("search_path", format!("{},{}", schema, crate::db::REGISTRY_SCHEMA))]);
        let pool = self.config.pool_options().connect_with(options).await?;
        tracing::debug!(schema = %schema, "Created tenant-scoped connection pool");
        pools.insert(schema.to_string(), pool.clone());
        Ok(pool)
    }

    /// Close and evict one schema's pool. No-op when absent.
    pub async fn release(&self, schema: &SchemaName) {
        let pool = {
            let mut pools = self.pools.lock().await;
            pools.remove(schema.as_str())
        };
        if let Some(pool) = pool {
            pool.close().await;
            tracing::debug!(schema = %schema, "Released tenant-scoped connection pool");
        }
    }

    /// Close every cached pool. Called once at process shutdown.
    pub async fn release_all(&self) {
        let drained: Vec<(String, PgPool)> = {
            let mut pools = self.pools.lock().await;
            pools.drain().collect()
        };
        for (schema, pool) in drained {
            pool.close().await;
            tracing::debug!(schema = %schema, "Released tenant-scoped connection pool");
        }
    }

    /// Number of live cached pools.
    pub async fn cached_count(&self) -> usize {
        self.pools.lock().await.len()
    }
}

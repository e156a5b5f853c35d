use std::time::Duration;

use crate::db::{PostgresCreationError, PostgresDb, REGISTRY_SCHEMA_NAME};
use crate::migrations::MigrationScope;
use crate::scoped::TenantPools;
use async_trait::async_trait;
use coral_config::{
    registry::{Injectable, Registry},
    Configurable,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::convert::Infallible;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_password() -> String {
    "postgres".to_string()
}

fn default_database() -> String {
    "coral_crm".to_string()
}

fn default_min_connections() -> u32 {
    2
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_sec() -> u64 {
    30
}

fn default_hash_type() -> MigrationHash {
    MigrationHash::MD5
}

fn default_migration_mode() -> MigrationMode {
    MigrationMode::Apply
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PostgresDbConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_sec")]
    pub acquire_timeout_sec: u64,
    #[serde(default = "default_hash_type")]
    pub hash_type: MigrationHash,
    #[serde(default = "default_migration_mode")]
    pub migration_mode: MigrationMode,
}

impl Default for PostgresDbConfig {
    fn default() -> Self {
        PostgresDbConfig {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            database: default_database(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_sec: default_acquire_timeout_sec(),
            hash_type: default_hash_type(),
            migration_mode: default_migration_mode(),
        }
    }
}

impl PostgresDbConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_sec))
    }
}

/// Migration mode for the registry schema at startup
/// - Apply: Apply unapplied migrations
/// - Validate: Fail if any unapplied migrations remain
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum MigrationMode {
    Apply,
    Validate,
}

/// The hash function to use for the migration files
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationHash {
    SHA256,
    MD5,
}

//////////////////////// Configurable Implementations ////////////////////////

impl Injectable for PostgresDb {}
impl Injectable for TenantPools {}

#[async_trait]
impl Configurable<PostgresDbConfig, PostgresCreationError> for PostgresDb {
    async fn try_from_config(
        config: &PostgresDbConfig,
        registry: &Registry,
    ) -> Result<Self, PostgresCreationError> {
        let conn = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(coral_error::WrappedSqlxError::from)?;
        let db = PostgresDb::new(conn, config.hash_type);

        let source = MigrationScope::Registry.get_source_migrations(&config.hash_type)?;
        match config.migration_mode {
            MigrationMode::Apply => {
                db.apply_latest(&REGISTRY_SCHEMA_NAME, MigrationScope::Registry.as_str(), &source)
                    .await?;
            }
            MigrationMode::Validate => {
                db.validate_migrations(
                    &REGISTRY_SCHEMA_NAME,
                    MigrationScope::Registry.as_str(),
                    &source,
                )
                .await?;
            }
        }

        registry.register(db.clone());
        Ok(db)
    }
}

#[async_trait]
impl Configurable<PostgresDbConfig, Infallible> for TenantPools {
    async fn try_from_config(
        config: &PostgresDbConfig,
        registry: &Registry,
    ) -> Result<Self, Infallible> {
        let pools = TenantPools::new(config.clone());
        registry.register(pools.clone());
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PostgresDbConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.migration_mode, MigrationMode::Apply);
    }

    #[test]
    fn test_migration_mode_deserializes_lowercase() {
        let mode: MigrationMode = serde_json::from_str("\"validate\"").unwrap();
        assert_eq!(mode, MigrationMode::Validate);
        let hash: MigrationHash = serde_json::from_str("\"sha256\"").unwrap();
        assert_eq!(hash, MigrationHash::SHA256);
    }
}

use crate::config::MigrationHash;
use crate::migrations::{GetSourceMigrationsError, Migration};
use coral_error::{CoralError, ErrorCodes, WrappedSqlxError};
use coral_types::SchemaName;
use sqlx::postgres::PgPool;
use sqlx::{Executor, Row};
use std::sync::LazyLock;
use thiserror::Error;

/// Name of the shared schema holding the tenant registry.
pub const REGISTRY_SCHEMA: &str = "public";

/// Reserved per-schema table tracking which migrations have been applied.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

pub static REGISTRY_SCHEMA_NAME: LazyLock<SchemaName> =
    LazyLock::new(|| SchemaName::new(REGISTRY_SCHEMA).expect("registry schema name is valid"));

/// Wrapper around the registry-database connection pool. Owns the namespace
/// (schema) primitives and the migration runner; per-tenant scoped pools live
/// in [`crate::scoped::TenantPools`].
/// ## Notes
/// - Shareable: cloning is cheap and clones observe the same pool.
#[derive(Clone, Debug)]
pub struct PostgresDb {
    conn: PgPool,
    hash_type: MigrationHash,
}

impl PostgresDb {
    pub fn new(conn: PgPool, hash_type: MigrationHash) -> Self {
        Self { conn, hash_type }
    }

    pub fn get_conn(&self) -> &PgPool {
        &self.conn
    }

    pub fn hash_type(&self) -> MigrationHash {
        self.hash_type
    }

    //////////////////////// Namespace Store ////////////////////////

    /// Check the engine catalog for a schema with the given name.
    pub async fn schema_exists(&self, name: &SchemaName) -> Result<bool, WrappedSqlxError> {
        let row = sqlx::query(
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = $1",
        )
        .bind(name.as_str())
        .fetch_optional(&self.conn)
        .await?;
        Ok(row.is_some())
    }

    /// Create an empty schema. The existence pre-check produces a clear
    /// application-level error; the `IF NOT EXISTS` keeps the engine-level
    /// mutation safe if a concurrent creator wins the race anyway.
    pub async fn create_schema(&self, name: &SchemaName) -> Result<(), SchemaError> {
        if self.schema_exists(name).await? {
            return Err(SchemaError::AlreadyExists(name.to_string()));
        }
        self.conn
            .execute(format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", name).as_str())
            .await
            .map_err(WrappedSqlxError::from)?;
        Ok(())
    }

    /// Drop a schema and everything inside it. Idempotent: succeeds when the
    /// schema does not exist.
    pub async fn drop_schema(&self, name: &SchemaName) -> Result<(), WrappedSqlxError> {
        self.conn
            .execute(format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", name).as_str())
            .await?;
        Ok(())
    }

    //////////////////////// Migration Runner ////////////////////////

    /// Create the per-schema migration log if it is missing. Idempotent.
    pub async fn initialize_migrations_table(
        &self,
        schema: &SchemaName,
    ) -> Result<(), WrappedSqlxError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{schema}".{MIGRATIONS_TABLE} (
                scope TEXT NOT NULL,
                version INTEGER NOT NULL,
                name TEXT NOT NULL,
                up_sql TEXT NOT NULL,
                down_sql TEXT NOT NULL,
                hash TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (scope, version)
            )
            "#
        );
        self.conn.execute(query.as_str()).await?;
        Ok(())
    }

    /// Read the applied log for one schema and scope, ascending by version.
    pub async fn get_applied_migrations(
        &self,
        schema: &SchemaName,
        scope: &str,
    ) -> Result<Vec<Migration>, WrappedSqlxError> {
        let query = format!(
            r#"
            SELECT scope, version, name, up_sql, down_sql, hash
            FROM "{schema}".{MIGRATIONS_TABLE}
            WHERE scope = $1
            ORDER BY version ASC
            "#
        );
        let rows = sqlx::query(&query)
            .bind(scope)
            .fetch_all(&self.conn)
            .await?;

        let mut migrations = Vec::with_capacity(rows.len());
        for row in rows {
            migrations.push(Migration {
                scope: row.get("scope"),
                version: row.get("version"),
                name: row.get("name"),
                up_sql: row.get("up_sql"),
                down_sql: row.get("down_sql"),
                hash: row.get("hash"),
            });
        }
        Ok(migrations)
    }

    /// Apply every source migration not yet in the applied log, in ascending
    /// version order, each inside its own transaction. A mid-sequence failure
    /// leaves earlier scripts applied and propagates; the caller decides
    /// whether to retry or tear the schema down. Returns how many scripts ran.
    pub async fn apply_latest(
        &self,
        schema: &SchemaName,
        scope: &str,
        source: &[Migration],
    ) -> Result<usize, ApplyMigrationsError> {
        self.initialize_migrations_table(schema).await?;
        let applied = self.get_applied_migrations(schema, scope).await?;
        let unapplied = validate_migrations_and_get_unapplied(&applied, source)?;

        let count = unapplied.len();
        for migration in unapplied {
            self.apply_one(schema, &migration)
                .await
                .map_err(|e| ApplyMigrationsError::Apply {
                    version: migration.version,
                    name: migration.name.clone(),
                    source: e.into(),
                })?;
            tracing::info!(
                schema = %schema,
                version = migration.version,
                name = %migration.name,
                "Applied migration"
            );
        }
        Ok(count)
    }

    async fn apply_one(&self, schema: &SchemaName, migration: &Migration) -> Result<(), sqlx::Error> {
        let mut tx = self.conn.begin().await?;
        // Unqualified names in the script resolve to the target schema.
        tx.execute(format!("SET LOCAL search_path TO \"{}\"", schema).as_str())
            .await?;
        tx.execute(migration.up_sql.as_str()).await?;

        // Bookkeeping
        let query = format!(
            r#"
            INSERT INTO "{schema}".{MIGRATIONS_TABLE} (scope, version, name, up_sql, down_sql, hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#
        );
        let query = sqlx::query(&query)
            .bind(&migration.scope)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.up_sql)
            .bind(&migration.down_sql)
            .bind(&migration.hash);
        tx.execute(query).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Undo only the most recently applied migration for this schema and
    /// scope, using the down script recorded in the log at apply time. The
    /// down transformation and the log deletion commit together.
    pub async fn rollback_last(
        &self,
        schema: &SchemaName,
        scope: &str,
    ) -> Result<Migration, RollbackMigrationError> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(WrappedSqlxError::from)?;
        let query = format!(
            r#"
            SELECT scope, version, name, up_sql, down_sql, hash
            FROM "{schema}".{MIGRATIONS_TABLE}
            WHERE scope = $1
            ORDER BY version DESC
            LIMIT 1
            "#
        );
        let row = sqlx::query(&query)
            .bind(scope)
            .fetch_optional(&mut *tx)
            .await
            .map_err(WrappedSqlxError::from)?;
        let migration = match row {
            Some(row) => Migration {
                scope: row.get("scope"),
                version: row.get("version"),
                name: row.get("name"),
                up_sql: row.get("up_sql"),
                down_sql: row.get("down_sql"),
                hash: row.get("hash"),
            },
            None => return Err(RollbackMigrationError::NothingApplied),
        };

        tx.execute(format!("SET LOCAL search_path TO \"{}\"", schema).as_str())
            .await
            .map_err(WrappedSqlxError::from)?;
        tx.execute(migration.down_sql.as_str())
            .await
            .map_err(WrappedSqlxError::from)?;

        let query = format!(
            "DELETE FROM \"{schema}\".{MIGRATIONS_TABLE} WHERE scope = $1 AND version = $2"
        );
        sqlx::query(&query)
            .bind(scope)
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(WrappedSqlxError::from)?;
        tx.commit().await.map_err(WrappedSqlxError::from)?;

        tracing::info!(
            schema = %schema,
            version = migration.version,
            name = %migration.name,
            "Rolled back migration"
        );
        Ok(migration)
    }

    /// Check that the applied log matches the source set exactly, with no
    /// unapplied scripts remaining.
    pub async fn validate_migrations(
        &self,
        schema: &SchemaName,
        scope: &str,
        source: &[Migration],
    ) -> Result<(), PostgresCreationError> {
        let applied = self.get_applied_migrations(schema, scope).await?;
        let unapplied = validate_migrations_and_get_unapplied(&applied, source)?;
        if !unapplied.is_empty() {
            return Err(PostgresCreationError::UnappliedMigrationsFound);
        }
        Ok(())
    }
}

/// Validate the applied log against the source scripts and return the suffix
/// that still needs to run. The applied log must be a prefix of the source
/// set, matching version and hash pairwise.
pub fn validate_migrations_and_get_unapplied(
    applied: &[Migration],
    source: &[Migration],
) -> Result<Vec<Migration>, MigrationValidationError> {
    for (applied_migration, source_migration) in applied.iter().zip(source.iter()) {
        if applied_migration.version != source_migration.version {
            return Err(MigrationValidationError::InconsistentVersion(
                applied_migration.version,
                source_migration.version,
            ));
        }
        if applied_migration.hash != source_migration.hash {
            return Err(MigrationValidationError::InconsistentHash(
                applied_migration.hash.clone(),
                source_migration.hash.clone(),
            ));
        }
    }
    if applied.len() > source.len() {
        return Err(MigrationValidationError::AppliedAheadOfSource(
            applied.len(),
            source.len(),
        ));
    }

    Ok(source[applied.len()..].to_vec())
}

//////////////////////// Error Types ////////////////////////

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema [{0}] already exists")]
    AlreadyExists(String),
    #[error(transparent)]
    Internal(#[from] WrappedSqlxError),
}

impl CoralError for SchemaError {
    fn code(&self) -> ErrorCodes {
        match self {
            SchemaError::AlreadyExists(_) => ErrorCodes::AlreadyExists,
            SchemaError::Internal(err) => err.code(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MigrationValidationError {
    #[error("Inconsistent version: applied={0}, source={1}")]
    InconsistentVersion(i32, i32),
    #[error("Inconsistent hash: applied={0}, source={1}")]
    InconsistentHash(String, String),
    #[error("Applied log has {0} entries but source only has {1}")]
    AppliedAheadOfSource(usize, usize),
}

impl CoralError for MigrationValidationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::FailedPrecondition
    }
}

#[derive(Error, Debug)]
pub enum ApplyMigrationsError {
    #[error(transparent)]
    Validation(#[from] MigrationValidationError),
    #[error("Failed to apply migration {version} [{name}]: {source}")]
    Apply {
        version: i32,
        name: String,
        #[source]
        source: WrappedSqlxError,
    },
    #[error(transparent)]
    Internal(#[from] WrappedSqlxError),
}

impl CoralError for ApplyMigrationsError {
    fn code(&self) -> ErrorCodes {
        match self {
            ApplyMigrationsError::Validation(err) => err.code(),
            ApplyMigrationsError::Apply { source, .. } => source.code(),
            ApplyMigrationsError::Internal(err) => err.code(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RollbackMigrationError {
    #[error("No applied migrations to roll back")]
    NothingApplied,
    #[error(transparent)]
    Internal(#[from] WrappedSqlxError),
}

impl CoralError for RollbackMigrationError {
    fn code(&self) -> ErrorCodes {
        match self {
            RollbackMigrationError::NothingApplied => ErrorCodes::FailedPrecondition,
            RollbackMigrationError::Internal(err) => err.code(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PostgresCreationError {
    #[error(transparent)]
    SqlxError(#[from] WrappedSqlxError),
    #[error(transparent)]
    GetSourceMigrations(#[from] GetSourceMigrationsError),
    #[error(transparent)]
    MigrationValidation(#[from] MigrationValidationError),
    #[error(transparent)]
    Apply(#[from] ApplyMigrationsError),
    #[error("Unapplied migrations found")]
    UnappliedMigrationsFound,
}

impl CoralError for PostgresCreationError {
    fn code(&self) -> ErrorCodes {
        match self {
            PostgresCreationError::SqlxError(err) => err.code(),
            PostgresCreationError::GetSourceMigrations(err) => err.code(),
            PostgresCreationError::MigrationValidation(err) => err.code(),
            PostgresCreationError::Apply(err) => err.code(),
            PostgresCreationError::UnappliedMigrationsFound => ErrorCodes::FailedPrecondition,
        }
    }
}

//////////////////////// Tests ////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationHash;

    fn migration(version: i32, name: &str, up_sql: &str) -> Migration {
        Migration::new(
            "tenant".to_string(),
            version,
            name.to_string(),
            up_sql.to_string(),
            format!("DROP TABLE IF EXISTS {name}"),
            &MigrationHash::MD5,
        )
    }

    #[test]
    fn test_validation_returns_unapplied_suffix() {
        let source = vec![
            migration(1, "contacts", "CREATE TABLE contacts ()"),
            migration(2, "conversations", "CREATE TABLE conversations ()"),
            migration(3, "messages", "CREATE TABLE messages ()"),
        ];
        let applied = source[..1].to_vec();
        let unapplied = validate_migrations_and_get_unapplied(&applied, &source)
            .expect("prefix should validate");
        assert_eq!(unapplied.len(), 2);
        assert_eq!(unapplied[0].name, "conversations");
        assert_eq!(unapplied[1].name, "messages");
    }

    #[test]
    fn test_validation_rejects_version_mismatch() {
        let source = vec![migration(2, "contacts", "CREATE TABLE contacts ()")];
        let applied = vec![migration(1, "contacts", "CREATE TABLE contacts ()")];
        let err = validate_migrations_and_get_unapplied(&applied, &source)
            .expect_err("version mismatch should fail");
        assert!(matches!(
            err,
            MigrationValidationError::InconsistentVersion(1, 2)
        ));
    }

    #[test]
    fn test_validation_rejects_tampered_script() {
        let source = vec![migration(1, "contacts", "CREATE TABLE contacts (id INT)")];
        let applied = vec![migration(1, "contacts", "CREATE TABLE contacts ()")];
        let err = validate_migrations_and_get_unapplied(&applied, &source)
            .expect_err("hash mismatch should fail");
        assert!(matches!(err, MigrationValidationError::InconsistentHash(_, _)));
    }

    #[test]
    fn test_validation_rejects_applied_ahead_of_source() {
        let applied = vec![
            migration(1, "contacts", "CREATE TABLE contacts ()"),
            migration(2, "conversations", "CREATE TABLE conversations ()"),
        ];
        let source = applied[..1].to_vec();
        let err = validate_migrations_and_get_unapplied(&applied, &source)
            .expect_err("longer applied log should fail");
        assert!(matches!(
            err,
            MigrationValidationError::AppliedAheadOfSource(2, 1)
        ));
    }
}

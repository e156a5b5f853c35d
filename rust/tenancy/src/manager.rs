use std::sync::Arc;

use coral_error::{CoralError, ErrorCodes};
use coral_postgres::db::PostgresDb;
use coral_postgres::migrations::{GetSourceMigrationsError, Migration, MigrationScope};
use coral_postgres::scoped::TenantPools;
use coral_types::{
    CreateTenantError, CreateTenantRequest, CreateTenantResponse, DeleteTenantError,
    DeleteTenantResponse, GetTenantError, ListTenantsError, ListTenantsResponse,
    ResolveTenantError, SchemaName, Tenant, TenantContext,
};
use sqlx::error::ErrorKind;
use sqlx::Executor;
use thiserror::Error;
use uuid::Uuid;

/// Registry rows whose stored schema name fails re-validation. Should never
/// happen outside manual database edits.
#[derive(Debug, Error)]
#[error("Tenant [{0}] has a corrupt schema name [{1}]")]
pub struct CorruptSchemaNameError(Uuid, String);

impl CoralError for CorruptSchemaNameError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Internal
    }
}

/// Orchestrates the tenant lifecycle across the two storage domains: the
/// registry row in the shared schema and the tenant's own schema. Provisioning
/// is a saga — the row is only committed once the schema and its tables are
/// ready, and a half-built schema is compensated away on failure.
/// ## Notes
/// - Shareable: clones observe the same pool and scoped-pool cache.
#[derive(Clone, Debug)]
pub struct TenantManager {
    db: PostgresDb,
    pools: TenantPools,
    tenant_migrations: Arc<Vec<Migration>>,
}

impl TenantManager {
    pub fn try_new(db: PostgresDb, pools: TenantPools) -> Result<Self, GetSourceMigrationsError> {
        let tenant_migrations = MigrationScope::Tenant.get_source_migrations(&db.hash_type())?;
        Ok(Self {
            db,
            pools,
            tenant_migrations: Arc::new(tenant_migrations),
        })
    }

    /// Like [`TenantManager::try_new`] but with an explicit tenant script
    /// set, substituting for the embedded one.
    pub fn with_tenant_migrations(
        db: PostgresDb,
        pools: TenantPools,
        tenant_migrations: Vec<Migration>,
    ) -> Self {
        Self {
            db,
            pools,
            tenant_migrations: Arc::new(tenant_migrations),
        }
    }

    ////////////////////////// Provision //////////////////////////

    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
    ) -> Result<CreateTenantResponse, CreateTenantError> {
        let schema_name = SchemaName::sanitize(&request.name)
            .ok_or_else(|| CreateTenantError::InvalidName(request.name.clone()))?;

        // Fast-path duplicate check for a clear error before any mutation.
        // The UNIQUE constraint on schema_name stays authoritative below.
        let existing = sqlx::query("SELECT id FROM tenants WHERE schema_name = $1")
            .bind(schema_name.as_str())
            .fetch_optional(self.db.get_conn())
            .await
            .map_err(|e| CreateTenantError::Internal(e.into()))?;
        if existing.is_some() {
            return Err(CreateTenantError::AlreadyExists(schema_name.into_string()));
        }

        let mut tx = self
            .db
            .get_conn()
            .begin()
            .await
            .map_err(|e| CreateTenantError::Internal(e.into()))?;
        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (name, schema_name) VALUES ($1, $2)
             RETURNING id, name, schema_name, created_at, updated_at",
        )
        .bind(&request.name)
        .bind(schema_name.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.kind() == ErrorKind::UniqueViolation => {
                CreateTenantError::AlreadyExists(schema_name.to_string())
            }
            _ => CreateTenantError::Internal(e.into()),
        })?;

        // Schema DDL and migrations run outside the registry transaction and
        // cannot be rolled back by it; on failure we rescind the row and
        // compensate with a best-effort drop of whatever was half-built.
        if let Err(err) = self.build_tenant_schema(&schema_name).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    schema = %schema_name,
                    error = %rollback_err,
                    "Failed to roll back registry transaction during compensation"
                );
            }
            if let Err(drop_err) = self.db.drop_schema(&schema_name).await {
                tracing::error!(
                    schema = %schema_name,
                    error = %drop_err,
                    "Failed to drop schema while compensating a failed provision"
                );
            }
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| CreateTenantError::Internal(e.into()))?;

        tracing::info!(tenant_id = %tenant.id, schema = %schema_name, "Provisioned tenant");
        Ok(tenant)
    }

    async fn build_tenant_schema(&self, schema_name: &SchemaName) -> Result<(), CreateTenantError> {
        self.db
            .create_schema(schema_name)
            .await
            .map_err(|e| CreateTenantError::Schema(e.boxed()))?;
        self.db
            .apply_latest(
                schema_name,
                MigrationScope::Tenant.as_str(),
                &self.tenant_migrations,
            )
            .await
            .map_err(|e| CreateTenantError::Migration(e.boxed()))?;
        Ok(())
    }

    ////////////////////////// Deprovision //////////////////////////

    pub async fn delete_tenant(&self, id: Uuid) -> Result<DeleteTenantResponse, DeleteTenantError> {
        let tenant = self.get_tenant(id).await.map_err(|e| match e {
            GetTenantError::NotFound(id) => DeleteTenantError::NotFound(id),
            GetTenantError::Internal(err) => DeleteTenantError::Internal(err),
        })?;
        let schema_name = SchemaName::new(tenant.schema_name.clone()).ok_or_else(|| {
            DeleteTenantError::Internal(CorruptSchemaNameError(id, tenant.schema_name).boxed())
        })?;

        // Postgres DDL is transactional, so the row delete and the schema
        // drop commit or roll back together; a failed drop leaves no
        // half-deleted tenant behind.
        let mut tx = self
            .db
            .get_conn()
            .begin()
            .await
            .map_err(|e| DeleteTenantError::Internal(e.into()))?;
        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DeleteTenantError::Internal(e.into()))?;
        tx.execute(format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema_name).as_str())
            .await
            .map_err(|e| DeleteTenantError::Internal(e.into()))?;
        tx.commit()
            .await
            .map_err(|e| DeleteTenantError::Internal(e.into()))?;

        self.pools.release(&schema_name).await;

        tracing::info!(tenant_id = %id, schema = %schema_name, "Deprovisioned tenant");
        Ok(DeleteTenantResponse {})
    }

    ////////////////////////// Lookup / Resolution //////////////////////////

    pub async fn get_tenant(&self, id: Uuid) -> Result<Tenant, GetTenantError> {
        sqlx::query_as::<_, Tenant>(
            "SELECT id, name, schema_name, created_at, updated_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.get_conn())
        .await
        .map_err(|e| GetTenantError::Internal(e.into()))?
        .ok_or(GetTenantError::NotFound(id))
    }

    pub async fn list_tenants(&self) -> Result<ListTenantsResponse, ListTenantsError> {
        sqlx::query_as::<_, Tenant>(
            "SELECT id, name, schema_name, created_at, updated_at FROM tenants
             ORDER BY created_at DESC",
        )
        .fetch_all(self.db.get_conn())
        .await
        .map_err(|e| ListTenantsError::Internal(e.into()))
    }

    /// Resolve a tenant identifier into the bundle downstream CRUD handlers
    /// use for the rest of the request.
    pub async fn resolve_tenant(&self, id: Uuid) -> Result<TenantContext, ResolveTenantError> {
        let tenant = self.get_tenant(id).await.map_err(|e| match e {
            GetTenantError::NotFound(id) => ResolveTenantError::NotFound(id),
            GetTenantError::Internal(err) => ResolveTenantError::Internal(err),
        })?;
        let schema_name = SchemaName::new(tenant.schema_name.clone()).ok_or_else(|| {
            ResolveTenantError::Internal(CorruptSchemaNameError(id, tenant.schema_name).boxed())
        })?;
        let pool = self
            .pools
            .resolve(&schema_name)
            .await
            .map_err(|e| ResolveTenantError::Internal(e.boxed()))?;
        Ok(TenantContext {
            tenant_id: tenant.id,
            schema_name,
            pool,
        })
    }
}

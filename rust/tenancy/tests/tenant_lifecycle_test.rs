//! Tenant lifecycle tests against a live Postgres.
//!
//! Ignored by default; run with a reachable server holding an empty test
//! database: `CORAL_TEST_DB=coral_crm_test cargo test -p coral-tenancy -- --ignored`

use coral_postgres::config::{MigrationHash, PostgresDbConfig};
use coral_postgres::db::{PostgresDb, REGISTRY_SCHEMA_NAME};
use coral_postgres::migrations::{Migration, MigrationScope};
use coral_postgres::scoped::TenantPools;
use coral_tenancy::TenantManager;
use coral_types::{CreateTenantError, CreateTenantRequest, GetTenantError, SchemaName};
use uuid::Uuid;

fn test_config() -> PostgresDbConfig {
    PostgresDbConfig {
        database: std::env::var("CORAL_TEST_DB").unwrap_or("coral_crm_test".to_string()),
        ..PostgresDbConfig::default()
    }
}

async fn test_harness() -> (PostgresDb, TenantPools, TenantManager) {
    let config = test_config();
    let conn = config
        .pool_options()
        .connect_with(config.connect_options())
        .await
        .expect("test database should be reachable");
    let db = PostgresDb::new(conn, MigrationHash::MD5);
    let registry_source = MigrationScope::Registry
        .get_source_migrations(&db.hash_type())
        .unwrap();
    db.apply_latest(
        &REGISTRY_SCHEMA_NAME,
        MigrationScope::Registry.as_str(),
        &registry_source,
    )
    .await
    .expect("registry migrations should apply");
    let pools = TenantPools::new(config);
    let manager = TenantManager::try_new(db.clone(), pools.clone()).unwrap();
    (db, pools, manager)
}

fn unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_provision_creates_row_schema_and_tables() {
    let (db, pools, manager) = test_harness().await;

    let name = unique_name("Acme Corp");
    let tenant = manager
        .create_tenant(CreateTenantRequest::try_new(name.clone()).unwrap())
        .await
        .expect("provisioning should succeed");
    assert!(tenant.schema_name.starts_with("acme_corp_"));

    let schema = SchemaName::new(tenant.schema_name.clone()).unwrap();
    assert!(db.schema_exists(&schema).await.unwrap());

    let fetched = manager.get_tenant(tenant.id).await.unwrap();
    assert_eq!(fetched.name, name);

    let applied = db
        .get_applied_migrations(&schema, MigrationScope::Tenant.as_str())
        .await
        .unwrap();
    let names: Vec<&str> = applied.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["contacts", "conversations", "messages"]);

    manager.delete_tenant(tenant.id).await.unwrap();
    pools.release_all().await;
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_duplicate_name_conflicts_without_leaving_a_schema() {
    let (db, pools, manager) = test_harness().await;

    let name = unique_name("Duplicated");
    let first = manager
        .create_tenant(CreateTenantRequest::try_new(name.clone()).unwrap())
        .await
        .unwrap();

    let err = manager
        .create_tenant(CreateTenantRequest::try_new(name).unwrap())
        .await
        .expect_err("second provisioning should conflict");
    assert!(matches!(err, CreateTenantError::AlreadyExists(_)));

    // The winner's schema is untouched and no extra schema appeared.
    let schema = SchemaName::new(first.schema_name.clone()).unwrap();
    assert!(db.schema_exists(&schema).await.unwrap());

    manager.delete_tenant(first.id).await.unwrap();
    pools.release_all().await;
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_invalid_name_is_rejected_before_any_mutation() {
    let (_db, _pools, manager) = test_harness().await;
    let err = manager
        .create_tenant(CreateTenantRequest::try_new("!!!".to_string()).unwrap())
        .await
        .expect_err("unsanitizable name should fail");
    assert!(matches!(err, CreateTenantError::InvalidName(_)));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_failed_migration_compensates_row_and_schema() {
    let (db, pools, manager) = test_harness().await;

    // Substitute a script set whose last script cannot apply.
    let mut source = MigrationScope::Tenant
        .get_source_migrations(&db.hash_type())
        .unwrap();
    source.push(Migration::new(
        "tenant".to_string(),
        4,
        "broken".to_string(),
        "CREATE TABLE broken (id REFERENCES does_not_exist)".to_string(),
        "DROP TABLE IF EXISTS broken".to_string(),
        &db.hash_type(),
    ));
    let failing_manager = TenantManager::with_tenant_migrations(db.clone(), pools.clone(), source);

    let name = unique_name("Doomed");
    let err = failing_manager
        .create_tenant(CreateTenantRequest::try_new(name.clone()).unwrap())
        .await
        .expect_err("provisioning should fail on the broken script");
    assert!(matches!(err, CreateTenantError::Migration(_)));

    // Neither the schema nor the registry row survived.
    let schema = SchemaName::sanitize(&name).unwrap();
    assert!(!db.schema_exists(&schema).await.unwrap());
    let row = sqlx::query("SELECT id FROM tenants WHERE schema_name = $1")
        .bind(schema.as_str())
        .fetch_optional(db.get_conn())
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_deprovision_removes_row_and_schema() {
    let (db, pools, manager) = test_harness().await;

    let tenant = manager
        .create_tenant(CreateTenantRequest::try_new(unique_name("Ephemeral")).unwrap())
        .await
        .unwrap();
    let schema = SchemaName::new(tenant.schema_name.clone()).unwrap();

    manager.delete_tenant(tenant.id).await.unwrap();

    let err = manager.get_tenant(tenant.id).await.expect_err("row should be gone");
    assert!(matches!(err, GetTenantError::NotFound(_)));
    assert!(!db.schema_exists(&schema).await.unwrap());

    pools.release_all().await;
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_resolution_returns_scoped_context() {
    let (_db, pools, manager) = test_harness().await;

    let tenant = manager
        .create_tenant(CreateTenantRequest::try_new(unique_name("Resolvable")).unwrap())
        .await
        .unwrap();

    let context = manager.resolve_tenant(tenant.id).await.unwrap();
    assert_eq!(context.tenant_id, tenant.id);
    assert_eq!(context.schema_name.as_str(), tenant.schema_name);

    // The scoped pool sees the tenant's tables without qualification.
    let count: (i64,) = sqlx::query_as("SELECT count(*) FROM contacts")
        .fetch_one(&context.pool)
        .await
        .expect("scoped pool should default to the tenant schema");
    assert_eq!(count.0, 0);

    manager.delete_tenant(tenant.id).await.unwrap();
    pools.release_all().await;
}

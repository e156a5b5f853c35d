//! CRUD service tests against a live Postgres, exercising a freshly
//! provisioned tenant end to end.
//!
//! Ignored by default; run with a reachable server:
//! `CORAL_TEST_DB=coral_crm_test cargo test -p coral-frontend -- --ignored`

use coral_frontend::{ContactService, ConversationService, MessageService};
use coral_postgres::config::{MigrationHash, PostgresDbConfig};
use coral_postgres::db::{PostgresDb, REGISTRY_SCHEMA_NAME};
use coral_postgres::migrations::MigrationScope;
use coral_postgres::scoped::TenantPools;
use coral_tenancy::TenantManager;
use coral_types::{
    ConversationStatus, CreateContactRequest, CreateMessageRequest, CreateTenantRequest,
    CreateMessageError, SenderType, TenantContext, UpdateConversationStatusRequest,
};
use uuid::Uuid;

fn test_config() -> PostgresDbConfig {
    PostgresDbConfig {
        database: std::env::var("CORAL_TEST_DB").unwrap_or("coral_crm_test".to_string()),
        ..PostgresDbConfig::default()
    }
}

struct Harness {
    manager: TenantManager,
    pools: TenantPools,
    tenant_id: Uuid,
    context: TenantContext,
}

async fn provision_tenant() -> Harness {
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
    .unwrap();

    let pools = TenantPools::new(config);
    let manager = TenantManager::try_new(db, pools.clone()).unwrap();
    let tenant = manager
        .create_tenant(
            CreateTenantRequest::try_new(format!("Crud Test {}", Uuid::new_v4().simple())).unwrap(),
        )
        .await
        .unwrap();
    let context = manager.resolve_tenant(tenant.id).await.unwrap();
    Harness {
        manager,
        pools,
        tenant_id: tenant.id,
        context,
    }
}

impl Harness {
    async fn teardown(self) {
        self.manager.delete_tenant(self.tenant_id).await.unwrap();
        self.pools.release_all().await;
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_contact_creation_opens_initial_conversation() {
    let harness = provision_tenant().await;
    let contacts = ContactService::new(harness.context.clone());

    let created = contacts
        .create_contact(
            CreateContactRequest::try_new(
                "Ada Lovelace".to_string(),
                Some("ada@example.com".to_string()),
                None,
                None,
            )
            .unwrap(),
        )
        .await
        .expect("contact creation should succeed");

    assert_eq!(created.conversation.contact_id, created.contact.id);
    assert_eq!(created.conversation.status, ConversationStatus::Active);
    assert!(created.conversation.last_message_at.is_none());

    harness.teardown().await;
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_message_creation_stamps_last_message_at() {
    let harness = provision_tenant().await;
    let contacts = ContactService::new(harness.context.clone());
    let conversations = ConversationService::new(harness.context.clone());
    let messages = MessageService::new(harness.context.clone());

    let created = contacts
        .create_contact(
            CreateContactRequest::try_new("Grace Hopper".to_string(), None, None, None).unwrap(),
        )
        .await
        .unwrap();

    let message = messages
        .create_message(
            CreateMessageRequest::try_new(
                created.conversation.id,
                SenderType::Contact,
                None,
                "Hello there".to_string(),
            )
            .unwrap(),
        )
        .await
        .expect("message creation should succeed");

    let refreshed = conversations
        .get_conversation(created.conversation.id)
        .await
        .unwrap();
    assert_eq!(refreshed.conversation.last_message_at, Some(message.created_at));
    assert_eq!(refreshed.messages.len(), 1);
    assert_eq!(refreshed.messages[0].content, "Hello there");

    harness.teardown().await;
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_message_against_missing_conversation_leaves_nothing_behind() {
    let harness = provision_tenant().await;
    let messages = MessageService::new(harness.context.clone());

    let missing = Uuid::new_v4();
    let err = messages
        .create_message(
            CreateMessageRequest::try_new(
                missing,
                SenderType::User,
                Some("agent-1".to_string()),
                "Orphan".to_string(),
            )
            .unwrap(),
        )
        .await
        .expect_err("missing conversation should fail");
    assert!(matches!(err, CreateMessageError::ConversationNotFound(_)));

    let count: (i64,) = sqlx::query_as("SELECT count(*) FROM messages")
        .fetch_one(&harness.context.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    harness.teardown().await;
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn test_conversation_status_update_and_contact_cascade() {
    let harness = provision_tenant().await;
    let contacts = ContactService::new(harness.context.clone());
    let conversations = ConversationService::new(harness.context.clone());

    let created = contacts
        .create_contact(
            CreateContactRequest::try_new("Katherine Johnson".to_string(), None, None, None)
                .unwrap(),
        )
        .await
        .unwrap();

    let updated = conversations
        .update_status(
            created.conversation.id,
            UpdateConversationStatusRequest {
                status: ConversationStatus::Archived,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, ConversationStatus::Archived);

    // Deleting the contact cascades to its conversations.
    contacts.delete_contact(created.contact.id).await.unwrap();
    let err = conversations
        .get_conversation(created.conversation.id)
        .await
        .expect_err("conversation should be gone");
    assert!(matches!(
        err,
        coral_types::GetConversationError::NotFound(_)
    ));

    harness.teardown().await;
}

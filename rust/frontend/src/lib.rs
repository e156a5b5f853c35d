mod config;
mod errors;
mod server;
mod services;
mod tenant_middleware;

pub use config::FrontendConfig;
pub use server::CoralServer;
pub use services::{ContactService, ConversationService, MessageService};
pub use tenant_middleware::TENANT_ID_HEADER;

use coral_config::registry::Registry;
use coral_config::Configurable;
use coral_postgres::{PostgresDb, TenantPools};
use coral_tenancy::TenantManager;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_stdout_tracing() {
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Wire the service from config and run it until shutdown. Startup failures
/// are fatal by design; once serving, errors surface per request.
pub async fn coral_server_entrypoint() {
    init_stdout_tracing();

    let config = FrontendConfig::load();
    let registry = Registry::new();
    let db = PostgresDb::try_from_config(&config.postgres, &registry)
        .await
        .expect("Failed to initialize the registry database");
    let pools = TenantPools::try_from_config(&config.postgres, &registry)
        .await
        .expect("Failed to initialize the tenant pool registry");
    let manager =
        TenantManager::try_new(db, pools.clone()).expect("Failed to load tenant migrations");

    let server = CoralServer::new(config, manager, pools.clone());
    CoralServer::run(server).await;

    // Drain every tenant-scoped pool before the process exits.
    let open = pools.cached_count().await;
    tracing::info!(pools = open, "Draining tenant-scoped connection pools");
    pools.release_all().await;
}

use crate::config::FrontendConfig;
use crate::errors::ServerError;
use crate::services::{ContactService, ConversationService, MessageService};
use crate::tenant_middleware::tenant_middleware;
use axum::{
    extract::{Extension, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use coral_postgres::TenantPools;
use coral_tenancy::TenantManager;
use coral_types::{
    CreateContactRequest, CreateContactResponse, CreateMessageRequest, CreateTenantRequest,
    DeleteTenantResponse, SenderType, Tenant, TenantContext, UpdateContactRequest,
    UpdateConversationStatusRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct CoralServer {
    config: FrontendConfig,
    manager: TenantManager,
    #[allow(dead_code)]
    pools: TenantPools,
}

impl CoralServer {
    pub fn new(config: FrontendConfig, manager: TenantManager, pools: TenantPools) -> CoralServer {
        CoralServer {
            config,
            manager,
            pools,
        }
    }

    pub fn manager(&self) -> &TenantManager {
        &self.manager
    }

    pub fn router(server: CoralServer) -> Router {
        let tenant_scoped = Router::new()
            .route("/contacts", post(create_contact).get(list_contacts))
            .route(
                "/contacts/{id}",
                get(get_contact).put(update_contact).delete(delete_contact),
            )
            .route(
                "/contacts/{id}/conversations",
                get(list_conversations_by_contact),
            )
            .route("/conversations/{id}", get(get_conversation))
            .route("/conversations/{id}/status", put(update_conversation_status))
            .route("/conversations/{id}/messages", get(list_messages))
            .route("/messages", post(create_message))
            .route("/messages/{id}", get(get_message).delete(delete_message))
            .route_layer(axum::middleware::from_fn_with_state(
                server.clone(),
                tenant_middleware,
            ));

        Router::new()
            .route("/", get(root))
            .route("/tenants", post(create_tenant).get(list_tenants))
            .route("/tenants/{id}", get(get_tenant).delete(delete_tenant))
            .merge(tenant_scoped)
            .layer(Self::cors_layer(&server.config))
            .layer(TraceLayer::new_for_http())
            .with_state(server)
    }

    fn cors_layer(config: &FrontendConfig) -> CorsLayer {
        let origins: Vec<HeaderValue> = config
            .cors_allow_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-tenant-id"),
            ])
            .allow_credentials(true)
    }

    pub async fn run(server: CoralServer) {
        let listen_address = server.config.listen_address.clone();
        let app = Self::router(server);
        let listener = tokio::net::TcpListener::bind(&listen_address)
            .await
            .expect("Failed to bind the listen address");
        tracing::info!(address = %listen_address, "coral server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .expect("Server exited with an error");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install the shutdown signal handler");
    tracing::info!("Shutdown signal received");
}

////////////////////////// Method Handlers //////////////////////////
// These handlers proxy the call and the relevant inputs into the tenant
// manager or the per-tenant CRUD services.

#[derive(Serialize)]
struct RootResponsePayload {
    message: &'static str,
    version: &'static str,
}

async fn root() -> Json<RootResponsePayload> {
    Json(RootResponsePayload {
        message: "Coral Multi-Tenant CRM API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

////////////////////////// Tenants //////////////////////////

#[derive(Deserialize, Debug)]
struct CreateTenantPayload {
    name: String,
}

async fn create_tenant(
    State(server): State<CoralServer>,
    Json(payload): Json<CreateTenantPayload>,
) -> Result<(StatusCode, Json<Tenant>), ServerError> {
    tracing::info!(name = %payload.name, "Creating tenant");
    let request = CreateTenantRequest::try_new(payload.name)?;
    let tenant = server.manager.create_tenant(request).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

async fn list_tenants(
    State(server): State<CoralServer>,
) -> Result<Json<Vec<Tenant>>, ServerError> {
    let tenants = server.manager.list_tenants().await?;
    Ok(Json(tenants))
}

async fn get_tenant(
    Path(id): Path<Uuid>,
    State(server): State<CoralServer>,
) -> Result<Json<Tenant>, ServerError> {
    let tenant = server.manager.get_tenant(id).await?;
    Ok(Json(tenant))
}

async fn delete_tenant(
    Path(id): Path<Uuid>,
    State(server): State<CoralServer>,
) -> Result<Json<DeleteTenantResponse>, ServerError> {
    tracing::info!(tenant_id = %id, "Deleting tenant");
    let response = server.manager.delete_tenant(id).await?;
    Ok(Json(response))
}

////////////////////////// Contacts //////////////////////////

#[derive(Deserialize, Debug)]
struct CreateContactPayload {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    metadata: Option<Value>,
}

async fn create_contact(
    Extension(context): Extension<TenantContext>,
    Json(payload): Json<CreateContactPayload>,
) -> Result<(StatusCode, Json<CreateContactResponse>), ServerError> {
    let request = CreateContactRequest::try_new(
        payload.name,
        payload.email,
        payload.phone,
        payload.metadata,
    )?;
    let response = ContactService::new(context).create_contact(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_contacts(
    Extension(context): Extension<TenantContext>,
) -> Result<Json<Vec<coral_types::Contact>>, ServerError> {
    let contacts = ContactService::new(context).list_contacts().await?;
    Ok(Json(contacts))
}

async fn get_contact(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<coral_types::Contact>, ServerError> {
    let contact = ContactService::new(context).get_contact(id).await?;
    Ok(Json(contact))
}

async fn update_contact(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
    Json(request): Json<UpdateContactRequest>,
) -> Result<Json<coral_types::Contact>, ServerError> {
    let contact = ContactService::new(context).update_contact(id, request).await?;
    Ok(Json(contact))
}

async fn delete_contact(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<StatusCode, ServerError> {
    ContactService::new(context).delete_contact(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

////////////////////////// Conversations //////////////////////////

async fn list_conversations_by_contact(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<coral_types::ListConversationsResponse>, ServerError> {
    let conversations = ConversationService::new(context)
        .get_conversations_by_contact(id)
        .await?;
    Ok(Json(conversations))
}

async fn get_conversation(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<coral_types::GetConversationResponse>, ServerError> {
    let conversation = ConversationService::new(context).get_conversation(id).await?;
    Ok(Json(conversation))
}

async fn update_conversation_status(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
    Json(request): Json<UpdateConversationStatusRequest>,
) -> Result<Json<coral_types::Conversation>, ServerError> {
    let conversation = ConversationService::new(context)
        .update_status(id, request)
        .await?;
    Ok(Json(conversation))
}

////////////////////////// Messages //////////////////////////

#[derive(Deserialize, Debug)]
struct CreateMessagePayload {
    conversation_id: Uuid,
    sender_type: SenderType,
    sender_id: Option<String>,
    content: String,
}

async fn create_message(
    Extension(context): Extension<TenantContext>,
    Json(payload): Json<CreateMessagePayload>,
) -> Result<(StatusCode, Json<coral_types::Message>), ServerError> {
    let request = CreateMessageRequest::try_new(
        payload.conversation_id,
        payload.sender_type,
        payload.sender_id,
        payload.content,
    )?;
    let message = MessageService::new(context).create_message(request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<Vec<coral_types::Message>>, ServerError> {
    let messages = MessageService::new(context)
        .get_messages_by_conversation(id)
        .await?;
    Ok(Json(messages))
}

async fn get_message(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<coral_types::Message>, ServerError> {
    let message = MessageService::new(context).get_message(id).await?;
    Ok(Json(message))
}

async fn delete_message(
    Path(id): Path<Uuid>,
    Extension(context): Extension<TenantContext>,
) -> Result<StatusCode, ServerError> {
    MessageService::new(context).delete_message(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

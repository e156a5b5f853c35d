use crate::errors::ErrorResponse;
use crate::server::CoralServer;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

/// Header carrying the tenant identifier on every tenant-scoped request.
pub const TENANT_ID_HEADER: &str = "X-Tenant-Id";

fn unauthenticated(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: StatusCode::UNAUTHORIZED.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Resolve the `X-Tenant-Id` header into a [`coral_types::TenantContext`]
/// request extension. A missing, malformed, or unknown identifier is rejected
/// with 401 before any handler runs.
pub(crate) async fn tenant_middleware(
    State(server): State<CoralServer>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(TENANT_ID_HEADER)
        .and_then(|value| value.to_str().ok());
    let raw = match header {
        Some(raw) => raw,
        None => return unauthenticated("Missing X-Tenant-Id header"),
    };
    let tenant_id = match Uuid::parse_str(raw) {
        Ok(tenant_id) => tenant_id,
        Err(_) => return unauthenticated("Invalid tenant"),
    };

    match server.manager().resolve_tenant(tenant_id).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(tenant_id = %tenant_id, error = %err, "Tenant resolution failed");
            unauthenticated("Invalid tenant")
        }
    }
}

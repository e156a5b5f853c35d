use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the shared-schema tenant registry. `schema_name` is derived from
/// `name` at provisioning time and is immutable afterwards; it uniquely
/// identifies the tenant's isolated schema.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub schema_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

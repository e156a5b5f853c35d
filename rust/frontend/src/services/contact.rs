use coral_types::{
    Contact, Conversation, CreateContactError, CreateContactRequest, CreateContactResponse,
    GetContactError, ListContactsResponse, TenantContext, UpdateContactRequest,
    UpdateContactResponse,
};
use uuid::Uuid;

const CONTACT_COLUMNS: &str = "id, name, email, phone, metadata, created_at, updated_at";

/// Contact CRUD against one tenant's schema. All statements go through the
/// resolved scoped pool, so table names stay unqualified.
pub struct ContactService {
    context: TenantContext,
}

impl ContactService {
    pub fn new(context: TenantContext) -> Self {
        Self { context }
    }

    /// Creating a contact also opens its initial active conversation; the
    /// two inserts commit together.
    pub async fn create_contact(
        &self,
        request: CreateContactRequest,
    ) -> Result<CreateContactResponse, CreateContactError> {
        let mut tx = self
            .context
            .pool
            .begin()
            .await
            .map_err(|e| CreateContactError::Internal(e.into()))?;

        let metadata = request.metadata.unwrap_or_else(|| serde_json::json!({}));
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "INSERT INTO contacts (name, email, phone, metadata)
             VALUES ($1, $2, $3, $4)
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CreateContactError::Internal(e.into()))?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (contact_id, status)
             VALUES ($1, 'active')
             RETURNING id, contact_id, status, last_message_at, created_at, updated_at",
        )
        .bind(contact.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CreateContactError::Internal(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| CreateContactError::Internal(e.into()))?;

        Ok(CreateContactResponse {
            contact,
            conversation,
        })
    }

    pub async fn get_contact(&self, id: Uuid) -> Result<Contact, GetContactError> {
        sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.context.pool)
        .await
        .map_err(|e| GetContactError::Internal(e.into()))?
        .ok_or(GetContactError::NotFound(id))
    }

    pub async fn list_contacts(&self) -> Result<ListContactsResponse, GetContactError> {
        sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.context.pool)
        .await
        .map_err(|e| GetContactError::Internal(e.into()))
    }

    /// Partial update; absent fields keep their current value.
    pub async fn update_contact(
        &self,
        id: Uuid,
        request: UpdateContactRequest,
    ) -> Result<UpdateContactResponse, GetContactError> {
        sqlx::query_as::<_, Contact>(&format!(
            "UPDATE contacts
             SET name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 phone = COALESCE($4, phone),
                 metadata = COALESCE($5, metadata),
                 updated_at = now()
             WHERE id = $1
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.metadata)
        .fetch_optional(&self.context.pool)
        .await
        .map_err(|e| GetContactError::Internal(e.into()))?
        .ok_or(GetContactError::NotFound(id))
    }

    /// Deleting a contact cascades to its conversations and their messages.
    pub async fn delete_contact(&self, id: Uuid) -> Result<(), GetContactError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.context.pool)
            .await
            .map_err(|e| GetContactError::Internal(e.into()))?;
        if result.rows_affected() == 0 {
            return Err(GetContactError::NotFound(id));
        }
        Ok(())
    }
}

use crate::{Contact, Conversation, ConversationStatus, Message, SchemaName, SenderType, Tenant};
use coral_error::{CoralError, CoralValidationError, ErrorCodes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

//////////////////////// Tenant Operations ////////////////////////

#[non_exhaustive]
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

impl CreateTenantRequest {
    pub fn try_new(name: String) -> Result<Self, CoralValidationError> {
        let request = Self { name };
        request.validate().map_err(CoralValidationError::from)?;
        Ok(request)
    }
}

pub type CreateTenantResponse = Tenant;

#[derive(Debug, Error)]
pub enum CreateTenantError {
    #[error("Tenant name [{0}] does not reduce to a usable schema name")]
    InvalidName(String),
    #[error("Tenant with schema name [{0}] already exists")]
    AlreadyExists(String),
    #[error("Failed to provision schema: {0}")]
    Schema(#[source] Box<dyn CoralError>),
    #[error("Failed to migrate tenant schema: {0}")]
    Migration(#[source] Box<dyn CoralError>),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for CreateTenantError {
    fn code(&self) -> ErrorCodes {
        match self {
            CreateTenantError::InvalidName(_) => ErrorCodes::InvalidArgument,
            CreateTenantError::AlreadyExists(_) => ErrorCodes::AlreadyExists,
            CreateTenantError::Schema(err) => err.code(),
            CreateTenantError::Migration(err) => err.code(),
            CreateTenantError::Internal(err) => err.code(),
        }
    }
}

pub struct GetTenantRequest {
    pub tenant_id: Uuid,
}

pub type GetTenantResponse = Tenant;

#[derive(Debug, Error)]
pub enum GetTenantError {
    #[error("Tenant [{0}] not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for GetTenantError {
    fn code(&self) -> ErrorCodes {
        match self {
            GetTenantError::NotFound(_) => ErrorCodes::NotFound,
            GetTenantError::Internal(err) => err.code(),
        }
    }
}

pub type ListTenantsResponse = Vec<Tenant>;

#[derive(Debug, Error)]
pub enum ListTenantsError {
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for ListTenantsError {
    fn code(&self) -> ErrorCodes {
        match self {
            ListTenantsError::Internal(err) => err.code(),
        }
    }
}

#[derive(Serialize)]
pub struct DeleteTenantResponse {}

#[derive(Debug, Error)]
pub enum DeleteTenantError {
    #[error("Tenant [{0}] not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for DeleteTenantError {
    fn code(&self) -> ErrorCodes {
        match self {
            DeleteTenantError::NotFound(_) => ErrorCodes::NotFound,
            DeleteTenantError::Internal(err) => err.code(),
        }
    }
}

/// Everything downstream CRUD handlers need to operate on one tenant's data
/// for the remainder of a request. `pool` defaults unqualified statements to
/// the tenant's schema with the shared schema as fallback.
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub schema_name: SchemaName,
    pub pool: sqlx::PgPool,
}

#[derive(Debug, Error)]
pub enum ResolveTenantError {
    #[error("Unknown tenant [{0}]")]
    NotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for ResolveTenantError {
    fn code(&self) -> ErrorCodes {
        match self {
            ResolveTenantError::NotFound(_) => ErrorCodes::Unauthenticated,
            ResolveTenantError::Internal(err) => err.code(),
        }
    }
}

//////////////////////// Contact Operations ////////////////////////

#[non_exhaustive]
#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub metadata: Option<Value>,
}

impl CreateContactRequest {
    pub fn try_new(
        name: String,
        email: Option<String>,
        phone: Option<String>,
        metadata: Option<Value>,
    ) -> Result<Self, CoralValidationError> {
        let request = Self {
            name,
            email,
            phone,
            metadata,
        };
        request.validate().map_err(CoralValidationError::from)?;
        Ok(request)
    }
}

/// Creating a contact also opens its initial conversation; both come back.
#[derive(Debug, Serialize)]
pub struct CreateContactResponse {
    pub contact: Contact,
    pub conversation: Conversation,
}

#[derive(Debug, Error)]
pub enum CreateContactError {
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for CreateContactError {
    fn code(&self) -> ErrorCodes {
        match self {
            CreateContactError::Internal(err) => err.code(),
        }
    }
}

pub type GetContactResponse = Contact;
pub type ListContactsResponse = Vec<Contact>;

#[derive(Debug, Error)]
pub enum GetContactError {
    #[error("Contact [{0}] not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for GetContactError {
    fn code(&self) -> ErrorCodes {
        match self {
            GetContactError::NotFound(_) => ErrorCodes::NotFound,
            GetContactError::Internal(err) => err.code(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub metadata: Option<Value>,
}

pub type UpdateContactResponse = Contact;

//////////////////////// Conversation Operations ////////////////////////

pub type GetConversationResponse = crate::ConversationWithMessages;
pub type ListConversationsResponse = Vec<crate::ConversationWithMessages>;

#[derive(Debug, Error)]
pub enum GetConversationError {
    #[error("Conversation [{0}] not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for GetConversationError {
    fn code(&self) -> ErrorCodes {
        match self {
            GetConversationError::NotFound(_) => ErrorCodes::NotFound,
            GetConversationError::Internal(err) => err.code(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationStatusRequest {
    pub status: ConversationStatus,
}

pub type UpdateConversationStatusResponse = Conversation;

//////////////////////// Message Operations ////////////////////////

#[non_exhaustive]
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    pub conversation_id: Uuid,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    #[validate(length(min = 1))]
    pub content: String,
}

impl CreateMessageRequest {
    pub fn try_new(
        conversation_id: Uuid,
        sender_type: SenderType,
        sender_id: Option<String>,
        content: String,
    ) -> Result<Self, CoralValidationError> {
        let request = Self {
            conversation_id,
            sender_type,
            sender_id,
            content,
        };
        request.validate().map_err(CoralValidationError::from)?;
        Ok(request)
    }
}

pub type CreateMessageResponse = Message;
pub type GetMessageResponse = Message;
pub type ListMessagesResponse = Vec<Message>;

#[derive(Debug, Error)]
pub enum CreateMessageError {
    #[error("Conversation [{0}] not found")]
    ConversationNotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for CreateMessageError {
    fn code(&self) -> ErrorCodes {
        match self {
            CreateMessageError::ConversationNotFound(_) => ErrorCodes::NotFound,
            CreateMessageError::Internal(err) => err.code(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GetMessageError {
    #[error("Message [{0}] not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Internal(#[from] Box<dyn CoralError>),
}

impl CoralError for GetMessageError {
    fn code(&self) -> ErrorCodes {
        match self {
            GetMessageError::NotFound(_) => ErrorCodes::NotFound,
            GetMessageError::Internal(err) => err.code(),
        }
    }
}

#[derive(Serialize)]
pub struct DeleteMessageResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tenant_request_rejects_empty_name() {
        assert!(CreateTenantRequest::try_new("".to_string()).is_err());
        assert!(CreateTenantRequest::try_new("Acme Corp".to_string()).is_ok());
    }

    #[test]
    fn test_create_message_request_rejects_empty_content() {
        let err = CreateMessageRequest::try_new(
            Uuid::new_v4(),
            SenderType::User,
            None,
            "".to_string(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_error_codes() {
        let err = GetTenantError::NotFound(Uuid::nil());
        assert_eq!(err.code(), ErrorCodes::NotFound);
        let err = CreateTenantError::InvalidName("!!!".to_string());
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
        let err = ResolveTenantError::NotFound(Uuid::nil());
        assert_eq!(err.code(), ErrorCodes::Unauthenticated);
    }
}

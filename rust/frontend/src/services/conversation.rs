use coral_types::{
    Conversation, ConversationWithMessages, GetContactError, GetConversationError,
    GetConversationResponse, ListConversationsResponse, Message, TenantContext,
    UpdateConversationStatusRequest, UpdateConversationStatusResponse,
};
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = "id, contact_id, status, last_message_at, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_type, sender_id, content, created_at";

pub struct ConversationService {
    context: TenantContext,
}

impl ConversationService {
    pub fn new(context: TenantContext) -> Self {
        Self { context }
    }

    /// All conversations for a contact, newest first, each carrying its
    /// messages oldest first.
    pub async fn get_conversations_by_contact(
        &self,
        contact_id: Uuid,
    ) -> Result<ListConversationsResponse, GetContactError> {
        let contact = sqlx::query("SELECT id FROM contacts WHERE id = $1")
            .bind(contact_id)
            .fetch_optional(&self.context.pool)
            .await
            .map_err(|e| GetContactError::Internal(e.into()))?;
        if contact.is_none() {
            return Err(GetContactError::NotFound(contact_id));
        }

        let conversations = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE contact_id = $1 ORDER BY created_at DESC"
        ))
        .bind(contact_id)
        .fetch_all(&self.context.pool)
        .await
        .map_err(|e| GetContactError::Internal(e.into()))?;

        let mut out = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let messages = self
                .messages_for(conversation.id)
                .await
                .map_err(|e| GetContactError::Internal(e.into()))?;
            out.push(ConversationWithMessages {
                conversation,
                messages,
            });
        }
        Ok(out)
    }

    pub async fn get_conversation(
        &self,
        id: Uuid,
    ) -> Result<GetConversationResponse, GetConversationError> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.context.pool)
        .await
        .map_err(|e| GetConversationError::Internal(e.into()))?
        .ok_or(GetConversationError::NotFound(id))?;

        let messages = self
            .messages_for(conversation.id)
            .await
            .map_err(|e| GetConversationError::Internal(e.into()))?;
        Ok(ConversationWithMessages {
            conversation,
            messages,
        })
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateConversationStatusRequest,
    ) -> Result<UpdateConversationStatusResponse, GetConversationError> {
        sqlx::query_as::<_, Conversation>(&format!(
            "UPDATE conversations SET status = $2, updated_at = now()
             WHERE id = $1
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(id)
        .bind(request.status)
        .fetch_optional(&self.context.pool)
        .await
        .map_err(|e| GetConversationError::Internal(e.into()))?
        .ok_or(GetConversationError::NotFound(id))
    }

    async fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1 ORDER BY created_at ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.context.pool)
        .await
    }
}

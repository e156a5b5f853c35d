use coral_types::{
    CreateMessageError, CreateMessageRequest, CreateMessageResponse, GetMessageError,
    ListMessagesResponse, Message, TenantContext,
};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_type, sender_id, content, created_at";

pub struct MessageService {
    context: TenantContext,
}

impl MessageService {
    pub fn new(context: TenantContext) -> Self {
        Self { context }
    }

    /// Insert a message and stamp its conversation's `last_message_at` with
    /// the message's creation time. Both writes commit together.
    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<CreateMessageResponse, CreateMessageError> {
        let mut tx = self
            .context
            .pool
            .begin()
            .await
            .map_err(|e| CreateMessageError::Internal(e.into()))?;

        let conversation = sqlx::query("SELECT id FROM conversations WHERE id = $1")
            .bind(request.conversation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| CreateMessageError::Internal(e.into()))?;
        if conversation.is_none() {
            return Err(CreateMessageError::ConversationNotFound(
                request.conversation_id,
            ));
        }

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (conversation_id, sender_type, sender_id, content)
             VALUES ($1, $2, $3, $4)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(request.conversation_id)
        .bind(request.sender_type)
        .bind(&request.sender_id)
        .bind(&request.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CreateMessageError::Internal(e.into()))?;

        sqlx::query(
            "UPDATE conversations SET last_message_at = $2, updated_at = now() WHERE id = $1",
        )
        .bind(request.conversation_id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CreateMessageError::Internal(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| CreateMessageError::Internal(e.into()))?;

        Ok(message)
    }

    pub async fn get_messages_by_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<ListMessagesResponse, GetMessageError> {
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1 ORDER BY created_at ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.context.pool)
        .await
        .map_err(|e| GetMessageError::Internal(e.into()))
    }

    pub async fn get_message(&self, id: Uuid) -> Result<Message, GetMessageError> {
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.context.pool)
        .await
        .map_err(|e| GetMessageError::Internal(e.into()))?
        .ok_or(GetMessageError::NotFound(id))
    }

    pub async fn delete_message(&self, id: Uuid) -> Result<(), GetMessageError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.context.pool)
            .await
            .map_err(|e| GetMessageError::Internal(e.into()))?;
        if result.rows_affected() == 0 {
            return Err(GetMessageError::NotFound(id));
        }
        Ok(())
    }
}

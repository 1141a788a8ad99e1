use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use soko_core::chat::{ChatError, ChatSide, Conversation, Message, MessageRepository};

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(e: sqlx::Error) -> ChatError {
    ChatError::Storage(e.to_string())
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    retailer_id: Uuid,
    retailer_name: String,
    customer_id: Uuid,
    customer_name: String,
    last_message: Option<String>,
    unread_count: i64,
    timestamp: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            retailer_id: row.retailer_id,
            retailer_name: row.retailer_name,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            last_message: row.last_message,
            unread_count: row.unread_count,
            timestamp: row.timestamp,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    text: String,
    read: bool,
    timestamp: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            text: row.text,
            read: row.read,
            timestamp: row.timestamp,
        }
    }
}

const SELECT_CONVERSATION: &str = "SELECT id, retailer_id, retailer_name, customer_id, customer_name, last_message, unread_count, timestamp FROM conversations";

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Uuid, ChatError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, retailer_id, retailer_name, customer_id, customer_name, last_message, unread_count, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.retailer_id)
        .bind(&conversation.retailer_name)
        .bind(conversation.customer_id)
        .bind(&conversation.customer_name)
        .bind(&conversation.last_message)
        .bind(conversation.unread_count)
        .bind(conversation.timestamp)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(conversation.id)
    }

    async fn conversations_for(
        &self,
        user_id: Uuid,
        side: ChatSide,
    ) -> Result<Vec<Conversation>, ChatError> {
        let column = match side {
            ChatSide::Retailer => "retailer_id",
            ChatSide::Customer => "customer_id",
        };
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "{SELECT_CONVERSATION} WHERE {column} = $1 ORDER BY timestamp DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, ChatError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "{SELECT_CONVERSATION} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(Conversation::from))
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ChatError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, text, read, timestamp FROM messages WHERE conversation_id = $1 ORDER BY timestamp ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> Result<i64, ChatError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "UPDATE messages SET read = TRUE WHERE conversation_id = $1 AND sender_id <> $2 AND read = FALSE",
        )
        .bind(conversation_id)
        .bind(reader)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let unread: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND sender_id <> $2 AND read = FALSE",
        )
        .bind(conversation_id)
        .bind(reader)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query("UPDATE conversations SET unread_count = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(unread)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(unread)
    }

    async fn append_message(&self, message: &Message) -> Result<Uuid, ChatError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, text, read, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.text)
        .bind(message.read)
        .bind(message.timestamp)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            // Foreign key miss means the thread does not exist.
            if let sqlx::Error::Database(ref db) = e {
                if db.is_foreign_key_violation() {
                    return Err(ChatError::NotFound(message.conversation_id));
                }
            }
            return Err(storage(e));
        }

        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = $2, timestamp = $3, unread_count = unread_count + 1
            WHERE id = $1
            "#,
        )
        .bind(message.conversation_id)
        .bind(&message.text)
        .bind(message.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(message.id)
    }
}

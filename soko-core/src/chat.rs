use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of a conversation a user sits on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatSide {
    Retailer,
    Customer,
}

/// A retailer/customer thread. Names are denormalized so the inbox list
/// renders without joining the accounts table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub retailer_id: Uuid,
    pub retailer_name: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub last_message: Option<String>,
    pub unread_count: i64,
    pub timestamp: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        retailer_id: Uuid,
        retailer_name: String,
        customer_id: Uuid,
        customer_name: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            retailer_id,
            retailer_name,
            customer_id,
            customer_name,
            last_message: None,
            unread_count: 0,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender_id: Uuid, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            text,
            read: false,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("conversation not found: {0}")]
    NotFound(Uuid),

    #[error("chat storage failure: {0}")]
    Storage(String),
}

/// Repository trait for conversation and message storage
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Uuid, ChatError>;

    async fn conversations_for(
        &self,
        user_id: Uuid,
        side: ChatSide,
    ) -> Result<Vec<Conversation>, ChatError>;

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, ChatError>;

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ChatError>;

    /// Mark the other party's messages as read and return the refreshed
    /// unread count for `reader`.
    async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> Result<i64, ChatError>;

    /// Append a message, updating the conversation's preview, timestamp and
    /// unread counter in the same write.
    async fn append_message(&self, message: &Message) -> Result<Uuid, ChatError>;
}

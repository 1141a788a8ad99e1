use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use soko_core::chat::{ChatError, ChatSide, Conversation, Message};
use soko_core::identity::{AccountError, User};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations", post(create_conversation))
        .route("/conversations/{id}", get(get_conversation))
        .route("/conversations/{id}/messages", post(post_message))
}

#[derive(Debug, Deserialize)]
struct SideQuery {
    #[serde(default = "default_side")]
    side: ChatSide,
}

fn default_side() -> ChatSide {
    ChatSide::Customer
}

#[derive(Debug, Deserialize)]
struct CreateConversationRequest {
    retailer_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct PostMessageRequest {
    text: String,
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<SideQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conversations = state.chat.conversations_for(user.id, query.side).await?;
    Ok(Json(json!({
        "success": true,
        "conversations": conversations,
    })))
}

async fn create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let retailer = state
        .users
        .get_user(req.retailer_id)
        .await?
        .ok_or(AccountError::NotFound(req.retailer_id))?;

    let conversation = Conversation::new(
        retailer.id,
        format!("{} {}", retailer.first_name, retailer.last_name),
        user.id,
        format!("{} {}", user.first_name, user.last_name),
    );
    state.chat.create_conversation(&conversation).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "conversation": conversation,
        })),
    ))
}

async fn get_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conversation = state
        .chat
        .get_conversation(id)
        .await?
        .ok_or(ChatError::NotFound(id))?;

    if conversation.customer_id != user.id && conversation.retailer_id != user.id {
        return Err(ChatError::NotFound(id).into());
    }

    // Opening a thread marks the other party's messages as read.
    conversation.unread_count = state.chat.mark_read(id, user.id).await?;
    let messages = state.chat.messages(id).await?;

    Ok(Json(json!({
        "success": true,
        "conversation": conversation,
        "messages": messages,
    })))
}

async fn post_message(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("Message text is required".into()));
    }

    let conversation = state
        .chat
        .get_conversation(id)
        .await?
        .ok_or(ChatError::NotFound(id))?;
    if conversation.customer_id != user.id && conversation.retailer_id != user.id {
        return Err(ChatError::NotFound(id).into());
    }

    let message = Message::new(id, user.id, req.text.trim().to_string());
    state.chat.append_message(&message).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": message,
        })),
    ))
}

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::{Message, SeenEntry};
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenByDto {
    pub user: Uuid,
    pub seen_at: DateTime<Utc>,
}

/// A message as clients see it: content decrypted, seen ledger attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub seen_by: Vec<SeenByDto>,
    pub created_at: DateTime<Utc>,
}

impl MessageDto {
    pub fn from_parts(message: &Message, content: String, seen: Vec<SeenEntry>) -> Self {
        MessageDto {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content,
            seen_by: seen
                .into_iter()
                .map(|entry| SeenByDto {
                    user: entry.user_id,
                    seen_at: entry.seen_at,
                })
                .collect(),
            created_at: message.created_at,
        }
    }
}

/// Decrypt a batch of stored messages and attach their seen ledgers with a
/// single lookup.
pub async fn message_dtos(
    state: &AppState,
    messages: &[Message],
) -> Result<Vec<MessageDto>, AppError> {
    let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
    let mut seen = MessageService::seen_entries(&state.db, &ids).await?;

    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let content = state.encryption.decrypt_content(&message.content)?;
        let entries = seen.remove(&message.id).unwrap_or_default();
        out.push(MessageDto::from_parts(message, content, entries));
    }
    Ok(out)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    pub conversation_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message: String,
    pub message_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSeenResponse {
    pub message: String,
    pub marked_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

/// GET /api/chat/messages/:conversation_id
pub async fn get_message_history(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    ConversationService::require_participant(&state.db, conversation_id, user.id).await?;

    let messages = MessageService::list_messages(&state.db, conversation_id).await?;
    let dtos = message_dtos(&state, &messages).await?;
    Ok(Json(dtos))
}

/// POST /api/chat/messages
///
/// HTTP fallback for clients without a live socket. The message lands in
/// the same store as gateway sends; recipients pick it up on their next
/// fetch or poll. No realtime fan-out happens here.
pub async fn send_message(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), AppError> {
    if body.content.is_empty() {
        return Err(AppError::BadRequest("message content is required".into()));
    }
    ConversationService::require_participant(&state.db, body.conversation_id, user.id).await?;

    let ciphertext = state.encryption.encrypt_content(&body.content)?;
    let message =
        MessageService::append_message(&state.db, body.conversation_id, user.id, &ciphertext)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully".to_string(),
            message_id: message.id,
        }),
    ))
}

/// POST /api/chat/messages/:conversation_id/seen
pub async fn mark_messages_seen(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MarkSeenResponse>, AppError> {
    ConversationService::require_participant(&state.db, conversation_id, user.id).await?;

    let marked_count = MessageService::mark_seen(&state.db, conversation_id, user.id).await?;
    Ok(Json(MarkSeenResponse {
        message: "Messages marked as seen".to_string(),
        marked_count,
    }))
}

/// GET /api/chat/unread-count
pub async fn get_unread_count(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread_count = MessageService::unread_count(&state.db, user.id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_dto_serializes_camel_case() {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "ignored".to_string(),
            created_at: Utc::now(),
        };
        let seen = vec![SeenEntry {
            message_id: message.id,
            user_id: Uuid::new_v4(),
            seen_at: Utc::now(),
        }];
        let dto = MessageDto::from_parts(&message, "hello".to_string(), seen);
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["content"], "hello");
        assert!(json.get("conversationId").is_some());
        assert!(json.get("senderId").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["seenBy"].as_array().unwrap().len(), 1);
        assert!(json["seenBy"][0].get("seenAt").is_some());
    }
}

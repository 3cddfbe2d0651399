use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::{Conversation, Message};
use crate::routes::messages::{message_dtos, MessageDto};
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
pub struct ConversationDto {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub last_message: Option<MessageDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub participant_id: Uuid,
}

async fn conversation_dto(
    state: &AppState,
    conversation: Conversation,
    latest: Option<Message>,
) -> Result<ConversationDto, AppError> {
    let last_message = match latest {
        Some(message) => message_dtos(state, std::slice::from_ref(&message))
            .await?
            .pop(),
        None => None,
    };
    Ok(ConversationDto {
        id: conversation.id,
        participants: conversation.participants(),
        last_message,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    })
}

/// GET /api/chat/conversations
///
/// All of the caller's conversations, most recently active first, each
/// with its latest message for preview rendering.
pub async fn list_conversations(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<Vec<ConversationDto>>, AppError> {
    let rows = ConversationService::list_with_latest(&state.db, user.id).await?;

    let mut out = Vec::with_capacity(rows.len());
    for (conversation, latest) in rows {
        out.push(conversation_dto(&state, conversation, latest).await?);
    }
    Ok(Json(out))
}

/// GET /api/chat/conversations/:id
pub async fn get_conversation(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDto>, AppError> {
    let conversation = ConversationService::require_participant(&state.db, id, user.id).await?;
    let latest = MessageService::latest_message(&state.db, id).await?;
    Ok(Json(conversation_dto(&state, conversation, latest).await?))
}

/// POST /api/chat/conversations
///
/// Find-or-create: at most one conversation exists per user pair, so a
/// repeat request returns the existing one instead of a duplicate.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationDto>), AppError> {
    let conversation =
        ConversationService::find_or_create(&state.db, user.id, body.participant_id).await?;
    let latest = MessageService::latest_message(&state.db, conversation.id).await?;
    let dto = conversation_dto(&state, conversation, latest).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Message, MessageStatus};
use crate::state::AppState;

#[derive(Serialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub content: String,
    pub sender_id: Uuid,
    pub timestamp: String,
    pub status: MessageStatus,
    pub seen_by: Vec<Uuid>,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            content: message.content,
            sender_id: message.sender_id,
            timestamp: message.created_at.to_rfc3339(),
            status: message.status,
            seen_by: message.seen_by,
        }
    }
}

/// History of a room in creation order; participants only.
pub async fn get_message_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    if state.store.find_room(room_id).await?.is_none() {
        return Err(AppError::RoomNotFound);
    }
    if !state.store.is_participant(room_id, user.id).await? {
        return Err(AppError::AccessDenied);
    }

    let messages = state.store.room_messages(room_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

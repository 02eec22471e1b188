use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::ChatRoom;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OpenDirectRoomRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct RoomDto {
    pub id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ChatRoom> for RoomDto {
    fn from(room: ChatRoom) -> Self {
        Self {
            id: room.id,
            name: room.name,
            is_group: room.is_group,
            participants: room.participants,
            created_at: room.created_at,
        }
    }
}

/// Resolves (or creates) the direct room between the caller and a peer.
pub async fn open_direct_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<OpenDirectRoomRequest>,
) -> Result<Json<RoomDto>, AppError> {
    let room = state
        .store
        .find_or_create_direct_room(user.id, body.user_id)
        .await?;
    Ok(Json(room.into()))
}

/// Caller's rooms, most recent message activity first.
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<RoomDto>>, AppError> {
    let rooms = state.store.rooms_for_user(user.id).await?;
    Ok(Json(rooms.into_iter().map(Into::into).collect()))
}

#[derive(Serialize)]
pub struct PresenceDto {
    pub user_id: Uuid,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

/// Presence of a room's users; participants only.
pub async fn get_room_presence(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<PresenceDto>>, AppError> {
    if state.store.find_room(room_id).await?.is_none() {
        return Err(AppError::RoomNotFound);
    }
    if !state.store.is_participant(room_id, user.id).await? {
        return Err(AppError::AccessDenied);
    }

    let rows = state.store.room_presence(room_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|p| PresenceDto {
                user_id: p.user_id,
                is_online: p.is_online,
                last_seen: p.last_seen,
            })
            .collect(),
    ))
}

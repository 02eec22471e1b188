use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Online state of one user in one room. At most one row per
/// (user, room) pair; `last_seen` is refreshed on every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPresence {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

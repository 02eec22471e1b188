use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A direct or group chat room. Exactly one direct room exists per
/// unordered pair of users, enforced by the store's find-or-create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

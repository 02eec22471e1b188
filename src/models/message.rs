use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery lifecycle of a message. Transitions are monotonic:
/// Pending → Delivered → Seen, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Delivered,
    Seen,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Seen => "seen",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MessageStatus::Pending),
            "delivered" => Some(MessageStatus::Delivered),
            "seen" => Some(MessageStatus::Seen),
            _ => None,
        }
    }

    /// Whether moving from `self` to `to` goes forward in the lifecycle.
    pub fn can_transition_to(self, to: MessageStatus) -> bool {
        matches!(
            (self, to),
            (MessageStatus::Pending, MessageStatus::Delivered)
                | (MessageStatus::Pending, MessageStatus::Seen)
                | (MessageStatus::Delivered, MessageStatus::Seen)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
    /// Users who have observed this message. The sender is never included.
    pub seen_by: Vec<Uuid>,
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ChatRoom, Message, MessageStatus, RoomPresence};

pub mod memory;
pub mod postgres;

/// Durable state behind the messaging core: messages and their delivery
/// lifecycle, room membership, and per-room presence.
///
/// The core only relies on two atomicity guarantees from implementations:
/// a single status transition together with its timestamp write, and the
/// candidate-selection-plus-update performed by `mark_seen`.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<ChatRoom>>;

    async fn is_participant(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    /// Returns the direct room for the unordered pair `(a, b)`, creating it
    /// on first use. Symmetric and idempotent; rejects `a == b`.
    async fn find_or_create_direct_room(&self, a: Uuid, b: Uuid) -> AppResult<ChatRoom>;

    /// Rooms the user participates in, most recent message activity first.
    async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<ChatRoom>>;

    /// Persists a new message with status `Pending`.
    async fn create_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message>;

    /// Moves a message forward in its lifecycle. A non-monotonic request is
    /// a no-op returning `false`, not an error. `delivered_at` is written on
    /// the Pending→Delivered transition, `seen_at` on the first transition
    /// to Seen.
    async fn transition_status(&self, message_id: Uuid, to: MessageStatus) -> AppResult<bool>;

    /// Marks every Delivered message in the room that `user_id` did not send
    /// and has not yet seen: status becomes Seen, `seen_at` is set once, and
    /// the user is added to `seen_by`. Returns the affected message ids.
    /// Selection and update happen atomically, so concurrent callers never
    /// report the same message twice.
    async fn mark_seen(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// All messages of a room in creation order.
    async fn room_messages(&self, room_id: Uuid) -> AppResult<Vec<Message>>;

    /// Upserts the (user, room) presence row; `last_seen` is refreshed on
    /// every call.
    async fn upsert_presence(&self, user_id: Uuid, room_id: Uuid, online: bool) -> AppResult<()>;

    async fn room_presence(&self, room_id: Uuid) -> AppResult<Vec<RoomPresence>>;
}

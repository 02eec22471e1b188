use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ChatRoom, Message, MessageStatus, RoomPresence};
use crate::storage::ChatStore;

/// In-memory store used by tests and local development. A single lock
/// around the state makes every operation, including mark-seen, trivially
/// atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<Uuid, ChatRoom>,
    messages: Vec<Message>,
    presence: HashMap<(Uuid, Uuid), RoomPresence>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<ChatRoom>> {
        Ok(self.inner.lock().await.rooms.get(&room_id).cloned())
    }

    async fn is_participant(&self, room_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .rooms
            .get(&room_id)
            .is_some_and(|room| room.participants.contains(&user_id)))
    }

    async fn find_or_create_direct_room(&self, a: Uuid, b: Uuid) -> AppResult<ChatRoom> {
        if a == b {
            return Err(AppError::BadRequest(
                "cannot open a direct room with yourself".into(),
            ));
        }

        let mut inner = self.inner.lock().await;
        if let Some(room) = inner.rooms.values().find(|room| {
            !room.is_group && room.participants.contains(&a) && room.participants.contains(&b)
        }) {
            return Ok(room.clone());
        }

        let room = ChatRoom {
            id: Uuid::new_v4(),
            name: None,
            is_group: false,
            participants: vec![a, b],
            created_at: Utc::now(),
        };
        inner.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<ChatRoom>> {
        let inner = self.inner.lock().await;
        let mut rooms: Vec<ChatRoom> = inner
            .rooms
            .values()
            .filter(|room| room.participants.contains(&user_id))
            .cloned()
            .collect();
        rooms.sort_by_key(|room| {
            let latest = inner
                .messages
                .iter()
                .filter(|m| m.room_id == room.id)
                .map(|m| m.created_at)
                .max();
            std::cmp::Reverse((latest, room.created_at))
        });
        Ok(rooms)
    }

    async fn create_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let mut inner = self.inner.lock().await;
        if !inner.rooms.contains_key(&room_id) {
            return Err(AppError::RoomNotFound);
        }
        let message = Message {
            id: Uuid::new_v4(),
            room_id,
            sender_id,
            content: content.to_string(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
            delivered_at: None,
            seen_at: None,
            seen_by: Vec::new(),
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn transition_status(&self, message_id: Uuid, to: MessageStatus) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(message) = inner.messages.iter_mut().find(|m| m.id == message_id) else {
            return Ok(false);
        };
        if !message.status.can_transition_to(to) {
            return Ok(false);
        }
        message.status = to;
        match to {
            MessageStatus::Delivered => message.delivered_at = Some(Utc::now()),
            MessageStatus::Seen => {
                message.seen_at.get_or_insert_with(Utc::now);
            }
            MessageStatus::Pending => unreachable!("can_transition_to never allows pending"),
        }
        Ok(true)
    }

    async fn mark_seen(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let mut inner = self.inner.lock().await;
        let mut affected = Vec::new();
        for message in inner.messages.iter_mut().filter(|m| {
            m.room_id == room_id
                && m.status == MessageStatus::Delivered
                && m.sender_id != user_id
                && !m.seen_by.contains(&user_id)
        }) {
            message.status = MessageStatus::Seen;
            message.seen_at.get_or_insert_with(Utc::now);
            message.seen_by.push(user_id);
            affected.push(message.id);
        }
        Ok(affected)
    }

    async fn room_messages(&self, room_id: Uuid) -> AppResult<Vec<Message>> {
        Ok(self
            .inner
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn upsert_presence(&self, user_id: Uuid, room_id: Uuid, online: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.presence.insert(
            (user_id, room_id),
            RoomPresence {
                user_id,
                room_id,
                is_online: online,
                last_seen: Utc::now(),
            },
        );
        Ok(())
    }

    async fn room_presence(&self, room_id: Uuid) -> AppResult<Vec<RoomPresence>> {
        Ok(self
            .inner
            .lock()
            .await
            .presence
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn direct_room_is_symmetric_and_idempotent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.find_or_create_direct_room(a, b).await.unwrap();
        let swapped = store.find_or_create_direct_room(b, a).await.unwrap();
        let again = store.find_or_create_direct_room(a, b).await.unwrap();

        assert_eq!(first.id, swapped.id);
        assert_eq!(first.id, again.id);
        assert!(!first.is_group);
    }

    #[tokio::test]
    async fn direct_room_with_self_is_rejected() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        assert!(matches!(
            store.find_or_create_direct_room(a, a).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn status_never_regresses() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room = store.find_or_create_direct_room(a, b).await.unwrap();
        let message = store.create_message(room.id, a, "hi").await.unwrap();

        assert!(store
            .transition_status(message.id, MessageStatus::Delivered)
            .await
            .unwrap());
        // Repeating the same transition is a no-op, not an error.
        assert!(!store
            .transition_status(message.id, MessageStatus::Delivered)
            .await
            .unwrap());
        assert!(store
            .transition_status(message.id, MessageStatus::Seen)
            .await
            .unwrap());
        assert!(!store
            .transition_status(message.id, MessageStatus::Pending)
            .await
            .unwrap());

        let stored = &store.room_messages(room.id).await.unwrap()[0];
        assert_eq!(stored.status, MessageStatus::Seen);
        assert!(stored.delivered_at.is_some());
        assert!(stored.seen_at.is_some());
    }

    #[tokio::test]
    async fn mark_seen_skips_own_messages_and_is_idempotent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room = store.find_or_create_direct_room(a, b).await.unwrap();

        let from_a = store.create_message(room.id, a, "from a").await.unwrap();
        store
            .transition_status(from_a.id, MessageStatus::Delivered)
            .await
            .unwrap();
        let from_b = store.create_message(room.id, b, "from b").await.unwrap();
        store
            .transition_status(from_b.id, MessageStatus::Delivered)
            .await
            .unwrap();

        // The sender marking seen only affects the peer's message.
        let seen_by_a = store.mark_seen(room.id, a).await.unwrap();
        assert_eq!(seen_by_a, vec![from_b.id]);

        let messages = store.room_messages(room.id).await.unwrap();
        let stored_b = messages.iter().find(|m| m.id == from_b.id).unwrap();
        assert_eq!(stored_b.status, MessageStatus::Seen);
        assert_eq!(stored_b.seen_by, vec![a]);
        assert!(!stored_b.seen_by.contains(&b));

        // Second pass finds nothing new.
        assert!(store.mark_seen(room.id, a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn presence_upserts_one_row_per_user_room() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room = store.find_or_create_direct_room(a, b).await.unwrap();

        store.upsert_presence(a, room.id, true).await.unwrap();
        let online = store.room_presence(room.id).await.unwrap();
        assert_eq!(online.len(), 1);
        assert!(online[0].is_online);
        let first_seen = online[0].last_seen;

        store.upsert_presence(a, room.id, false).await.unwrap();
        let rows = store.room_presence(room.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_online);
        assert!(rows[0].last_seen >= first_seen);
    }
}

use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

pub mod broadcast;
pub mod events;
pub mod handlers;
pub mod session;

pub use broadcast::Broadcaster;
pub use session::RoomSession;

/// One live websocket connection subscribed to a room, tagged with the user
/// who owns it. A user may hold several connections at once (multi-tab).
#[derive(Clone)]
pub struct RoomConnection {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub sender: UnboundedSender<Message>,
}

/// In-memory map from room id to its live connections. Process-lifetime
/// only; after a restart clients reconnect and rejoin.
///
/// DashMap gives per-shard locking, so sessions joining and leaving
/// different rooms never contend on one global lock.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<Uuid, Vec<RoomConnection>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the room's set, creating the set on first join.
    /// Idempotent per connection id, so a reconnect race cannot produce
    /// duplicate entries.
    pub fn join(&self, room_id: Uuid, connection: RoomConnection) {
        let mut members = self.rooms.entry(room_id).or_default();
        if members
            .iter()
            .any(|c| c.connection_id == connection.connection_id)
        {
            return;
        }
        members.push(connection);
    }

    /// Removes a connection; empty member sets are pruned.
    pub fn leave(&self, room_id: Uuid, connection_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(&room_id) {
            members.retain(|c| c.connection_id != connection_id);
            let empty = members.is_empty();
            drop(members);
            if empty {
                self.rooms.remove_if(&room_id, |_, members| members.is_empty());
            }
        }
    }

    /// Current connections of a room; an unknown room is an empty set, not
    /// an error.
    pub fn members_of(&self, room_id: Uuid) -> Vec<RoomConnection> {
        self.rooms
            .get(&room_id)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self, room_id: Uuid) -> usize {
        self.rooms.get(&room_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn connection(user_id: Uuid) -> (RoomConnection, tokio::sync::mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded_channel();
        (
            RoomConnection {
                connection_id: Uuid::new_v4(),
                user_id,
                sender: tx,
            },
            rx,
        )
    }

    #[test]
    fn join_is_idempotent_per_connection() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (conn, _rx) = connection(Uuid::new_v4());

        registry.join(room, conn.clone());
        registry.join(room, conn);

        assert_eq!(registry.connection_count(room), 1);
    }

    #[test]
    fn leave_prunes_empty_rooms() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let (conn, _rx) = connection(Uuid::new_v4());
        let id = conn.connection_id;

        registry.join(room, conn);
        registry.leave(room, id);

        assert_eq!(registry.connection_count(room), 0);
        assert!(registry.rooms.get(&room).is_none());
    }

    #[test]
    fn unknown_room_yields_empty_set() {
        let registry = RoomRegistry::new();
        assert!(registry.members_of(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn leaving_one_connection_keeps_the_users_others() {
        let registry = RoomRegistry::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();
        let (first, _rx1) = connection(user);
        let (second, _rx2) = connection(user);
        let first_id = first.connection_id;

        registry.join(room, first);
        registry.join(room, second);
        registry.leave(room, first_id);

        let members = registry.members_of(room);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, user);
    }
}

use axum::extract::ws::Message;
use tracing::error;
use uuid::Uuid;

use crate::websocket::events::OutboundEvent;
use crate::websocket::RoomRegistry;

/// Fans an event out to a room's live connections.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RoomRegistry,
}

impl Broadcaster {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    /// Serializes the event once and sends it to every member connection,
    /// independently per connection. Exclusion is by user identity: all of
    /// an excluded user's connections are skipped together. An empty room
    /// is a no-op. Returns the number of connections reached.
    pub fn broadcast(&self, room_id: Uuid, event: &OutboundEvent, exclude: Option<Uuid>) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, %room_id, "failed to serialize outbound event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        for connection in self.registry.members_of(room_id) {
            if exclude.is_some_and(|user_id| user_id == connection.user_id) {
                continue;
            }
            if connection.sender.send(Message::Text(payload.clone())).is_ok() {
                delivered += 1;
            } else {
                // Receiver dropped without a clean leave; forget it.
                stale.push(connection.connection_id);
            }
        }
        for connection_id in stale {
            self.registry.leave(room_id, connection_id);
        }
        delivered
    }
}

use axum::extract::ws::Message;
use chrono::Utc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::MessageStatus;
use crate::state::AppState;
use crate::websocket::events::{InboundEvent, OutboundEvent};
use crate::websocket::RoomConnection;

/// Server-side actor owning one connection's participation in one room.
///
/// Lifecycle is Connecting → Joined → Closed: `connect` performs the join,
/// events arrive one at a time through `handle_text`, and `disconnect`
/// consumes the session so it cannot be re-entered. All cross-session
/// effects go through the store, the registry, or the broadcaster.
pub struct RoomSession {
    state: AppState,
    user: AuthUser,
    room_id: Uuid,
    connection_id: Uuid,
    sender: UnboundedSender<Message>,
}

impl RoomSession {
    /// Joins the room and returns the session together with the receiver
    /// carrying its outbound frames.
    ///
    /// The room must resolve; membership is only enforced where it matters
    /// (send and mark-seen), so a join ahead of membership is allowed. On
    /// success the peer connections get `user_joined`, presence goes
    /// online, and any messages delivered while this user was away are
    /// marked seen.
    pub async fn connect(
        state: &AppState,
        user: AuthUser,
        room_id: Uuid,
    ) -> Result<(Self, UnboundedReceiver<Message>), AppError> {
        if state.store.find_room(room_id).await?.is_none() {
            return Err(AppError::RoomNotFound);
        }

        let (tx, rx) = unbounded_channel();
        let connection_id = Uuid::new_v4();
        state.registry.join(
            room_id,
            RoomConnection {
                connection_id,
                user_id: user.id,
                sender: tx.clone(),
            },
        );

        let session = Self {
            state: state.clone(),
            user,
            room_id,
            connection_id,
            sender: tx,
        };

        if let Err(e) = session
            .state
            .store
            .upsert_presence(session.user.id, room_id, true)
            .await
        {
            warn!(error = %e, user_id = %session.user.id, "failed to record presence on connect");
        }

        session.state.broadcaster.broadcast(
            room_id,
            &OutboundEvent::UserJoined {
                username: session.user.username.clone(),
                timestamp: Utc::now().to_rfc3339(),
            },
            Some(session.user.id),
        );

        session.mark_seen_and_notify(false).await;

        Ok((session, rx))
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Entry point for one inbound frame. An unparseable payload yields an
    /// in-band `error` on this connection only; the session stays open.
    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<InboundEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(_) => self.send_error("Invalid message format"),
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message { message } => self.handle_send(&message).await,
            InboundEvent::MarkSeen => self.mark_seen_and_notify(true).await,
            InboundEvent::Typing { is_typing } => {
                self.state.broadcaster.broadcast(
                    self.room_id,
                    &OutboundEvent::Typing {
                        username: self.user.username.clone(),
                        is_typing,
                    },
                    Some(self.user.id),
                );
            }
        }
    }

    async fn handle_send(&self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }

        if !self.require_participant(true).await {
            return;
        }

        // Durability precedes notification: nothing is broadcast unless the
        // message was persisted.
        let message = match self
            .state
            .store
            .create_message(self.room_id, self.user.id, content)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, room_id = %self.room_id, "failed to persist message");
                self.send_error("Failed to send message");
                return;
            }
        };

        match self
            .state
            .store
            .transition_status(message.id, MessageStatus::Delivered)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(message_id = %message.id, "message was not pending at delivery transition")
            }
            Err(e) => {
                warn!(error = %e, message_id = %message.id, "failed to mark message delivered")
            }
        }

        self.state.broadcaster.broadcast(
            self.room_id,
            &OutboundEvent::Message {
                message: content.to_string(),
                username: self.user.username.clone(),
                timestamp: message.created_at.to_rfc3339(),
            },
            Some(self.user.id),
        );
    }

    /// Runs the mark-seen pass and notifies the room when anything changed.
    /// `surface_errors` controls whether failures become in-band `error`
    /// events (explicit `mark_seen` requests) or are only logged (the
    /// best-effort pass during connect).
    async fn mark_seen_and_notify(&self, surface_errors: bool) {
        match self
            .state
            .store
            .is_participant(self.room_id, self.user.id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                if surface_errors {
                    self.send_error("Access denied");
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, room_id = %self.room_id, "membership check failed");
                if surface_errors {
                    self.send_error("Failed to update seen state");
                }
                return;
            }
        }

        match self.state.store.mark_seen(self.room_id, self.user.id).await {
            Ok(ids) if !ids.is_empty() => {
                self.state.broadcaster.broadcast(
                    self.room_id,
                    &OutboundEvent::MessagesSeen {
                        seen_message_ids: ids,
                        seen_by: self.user.username.clone(),
                    },
                    None,
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, room_id = %self.room_id, "mark-seen failed");
                if surface_errors {
                    self.send_error("Failed to update seen state");
                }
            }
        }
    }

    async fn require_participant(&self, surface_errors: bool) -> bool {
        match self
            .state
            .store
            .is_participant(self.room_id, self.user.id)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                if surface_errors {
                    self.send_error("Access denied");
                }
                false
            }
            Err(e) => {
                warn!(error = %e, room_id = %self.room_id, "membership check failed");
                if surface_errors {
                    self.send_error("Failed to send message");
                }
                false
            }
        }
    }

    /// Structured error to this connection only.
    fn send_error(&self, message: &str) {
        let event = OutboundEvent::Error {
            message: message.to_string(),
        };
        if let Ok(payload) = serde_json::to_string(&event) {
            let _ = self.sender.send(Message::Text(payload));
        }
    }

    /// Closes the session: presence offline, `user_left` to the peers, and
    /// deregistration. Broadcast failure never blocks cleanup. Consuming
    /// `self` makes re-entry impossible.
    pub async fn disconnect(self) {
        if let Err(e) = self
            .state
            .store
            .upsert_presence(self.user.id, self.room_id, false)
            .await
        {
            warn!(error = %e, user_id = %self.user.id, "failed to record presence on disconnect");
        }

        self.state.broadcaster.broadcast(
            self.room_id,
            &OutboundEvent::UserLeft {
                username: self.user.username.clone(),
                timestamp: Utc::now().to_rfc3339(),
            },
            Some(self.user.id),
        );

        self.state.registry.leave(self.room_id, self.connection_id);
    }
}

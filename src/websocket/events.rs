//! Wire protocol for room sessions.
//!
//! Every frame is a JSON object tagged by a `type` field. Inbound and
//! outbound vocabularies are separate enums so a client can never inject a
//! server-only event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "message")]
    Message { message: String },

    #[serde(rename = "mark_seen")]
    MarkSeen,

    #[serde(rename = "typing")]
    Typing { is_typing: bool },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    #[serde(rename = "message")]
    Message {
        message: String,
        username: String,
        timestamp: String,
    },

    #[serde(rename = "user_joined")]
    UserJoined { username: String, timestamp: String },

    #[serde(rename = "user_left")]
    UserLeft { username: String, timestamp: String },

    #[serde(rename = "typing")]
    Typing { username: String, is_typing: bool },

    #[serde(rename = "messages_seen")]
    MessagesSeen {
        seen_message_ids: Vec<Uuid>,
        seen_by: String,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inbound_events_parse_by_type_tag() {
        let send: InboundEvent = serde_json::from_str(r#"{"type":"message","message":"hi"}"#).unwrap();
        assert!(matches!(send, InboundEvent::Message { message } if message == "hi"));

        let seen: InboundEvent = serde_json::from_str(r#"{"type":"mark_seen"}"#).unwrap();
        assert!(matches!(seen, InboundEvent::MarkSeen));

        let typing: InboundEvent =
            serde_json::from_str(r#"{"type":"typing","is_typing":true}"#).unwrap();
        assert!(matches!(typing, InboundEvent::Typing { is_typing: true }));
    }

    #[test]
    fn unknown_or_malformed_payloads_fail_to_parse() {
        assert!(serde_json::from_str::<InboundEvent>("not-json").is_err());
        assert!(serde_json::from_str::<InboundEvent>(r#"{"type":"delete_all"}"#).is_err());
        assert!(serde_json::from_str::<InboundEvent>(r#"{"message":"no tag"}"#).is_err());
    }

    #[test]
    fn outbound_events_carry_the_wire_shape() {
        let event = OutboundEvent::MessagesSeen {
            seen_message_ids: vec![Uuid::nil()],
            seen_by: "bob".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["type"], "messages_seen");
        assert_eq!(value["seen_by"], "bob");
        assert_eq!(value["seen_message_ids"], json!([Uuid::nil().to_string()]));

        let error = OutboundEvent::Error {
            message: "Invalid message format".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&error).unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "Invalid message format");
    }
}

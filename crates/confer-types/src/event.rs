//! Live channel event types.
//!
//! Every frame on the live channel is one JSON object tagged by `"type"`.
//! [`ChannelEvent`] is what the relay pushes to clients; [`ClientEvent`] is
//! what clients send to the relay. The tag strings double as subjects for
//! logging (`event.kind()`).
//!
//! ```text
//!   client ── session:join / message:send / typing:* ──▶ relay
//!   client ◀── message:new / presence:* / typing:* ───── relay
//! ```

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::ids::SessionId;
use crate::message::ChatMessage;
use crate::user::{OnlineUser, TypingUser};

// ============================================================================
// Inbound (relay → client)
// ============================================================================

/// Events pushed from the relay to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type")]
pub enum ChannelEvent {
    /// A message was accepted by the relay.
    #[serde(rename = "message:new")]
    #[strum(serialize = "message:new")]
    MessageNew(ChatMessage),

    /// Full roster, sent on (re)connect.
    #[serde(rename = "presence:snapshot")]
    #[strum(serialize = "presence:snapshot")]
    PresenceSnapshot { users: Vec<OnlineUser> },

    /// A participant came online.
    #[serde(rename = "presence:join")]
    #[strum(serialize = "presence:join")]
    PresenceJoin(OnlineUser),

    /// A participant went offline.
    #[serde(rename = "presence:leave")]
    #[strum(serialize = "presence:leave")]
    PresenceLeave(OnlineUser),

    /// A remote participant started composing.
    #[serde(rename = "typing:start")]
    #[strum(serialize = "typing:start")]
    TypingStart(TypingUser),

    /// A remote participant stopped composing.
    #[serde(rename = "typing:stop")]
    #[strum(serialize = "typing:stop")]
    TypingStop(TypingUser),
}

impl ChannelEvent {
    /// The wire tag, e.g. `"presence:join"`.
    pub fn kind(&self) -> &str {
        self.as_ref()
    }
}

// ============================================================================
// Outbound (client → relay)
// ============================================================================

/// Events sent from a client to the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Announce who we are and which session we want. Sent on every
    /// (re)connect; the relay answers with a `presence:snapshot`.
    #[serde(rename = "session:join", rename_all = "camelCase")]
    #[strum(serialize = "session:join")]
    SessionJoin {
        session_id: SessionId,
        user: OnlineUser,
    },

    /// Publish a chat message. The relay assigns id and timestamp.
    #[serde(rename = "message:send")]
    #[strum(serialize = "message:send")]
    MessageSend { text: String },

    #[serde(rename = "typing:start")]
    #[strum(serialize = "typing:start")]
    TypingStart,

    #[serde(rename = "typing:stop")]
    #[strum(serialize = "typing:stop")]
    TypingStop,
}

impl ClientEvent {
    /// The wire tag, e.g. `"message:send"`.
    pub fn kind(&self) -> &str {
        self.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_new_is_flattened() {
        let ev = ChannelEvent::MessageNew(ChatMessage::new("m1", "u1", "Ada", "hi", 7));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "message:new");
        assert_eq!(json["id"], "m1");
        assert_eq!(json["message"], "hi");
    }

    #[test]
    fn test_parse_inbound_events() {
        let snapshot = r#"{"type":"presence:snapshot","users":[{"userId":"u1","firstName":"Ada","lastName":"","email":""}]}"#;
        match serde_json::from_str::<ChannelEvent>(snapshot).unwrap() {
            ChannelEvent::PresenceSnapshot { users } => assert_eq!(users.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        let typing = r#"{"type":"typing:start","userId":"u2","name":"Grace"}"#;
        assert_eq!(
            serde_json::from_str::<ChannelEvent>(typing).unwrap(),
            ChannelEvent::TypingStart(TypingUser::new("u2", "Grace"))
        );
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        assert!(serde_json::from_str::<ChannelEvent>(r#"{"type":"message:edit"}"#).is_err());
    }

    #[test]
    fn test_outbound_wire_shapes() {
        let json = serde_json::to_value(ClientEvent::TypingStart).unwrap();
        assert_eq!(json, serde_json::json!({"type": "typing:start"}));

        let json = serde_json::to_value(ClientEvent::MessageSend { text: "hello".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "message:send", "text": "hello"}));

        let join = ClientEvent::SessionJoin {
            session_id: SessionId::from("room-1"),
            user: OnlineUser::new("u1", "Ada", "Lovelace", "ada@example.com"),
        };
        let json = serde_json::to_value(&join).unwrap();
        assert_eq!(json["sessionId"], "room-1");
        assert_eq!(json["user"]["userId"], "u1");
    }

    #[test]
    fn test_kinds_match_wire_tags() {
        assert_eq!(ClientEvent::TypingStop.kind(), "typing:stop");
        assert_eq!(
            ChannelEvent::PresenceLeave(OnlineUser::new("u", "", "", "")).kind(),
            "presence:leave"
        );
    }
}

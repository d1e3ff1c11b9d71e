//! Chat message type.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, UserId};

/// One chat message.
///
/// Immutable once created. The same message may arrive twice, once from
/// the history pull and once replayed on the live channel, carrying the
/// same `id` both times.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub from_user_id: UserId,
    /// Denormalized display name of the author at send time.
    pub from_user_name: String,
    /// Raw text, may contain mention markup.
    pub message: String,
    /// Unix millis.
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(
        id: impl Into<MessageId>,
        from_user_id: impl Into<UserId>,
        from_user_name: impl Into<String>,
        message: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            id: id.into(),
            from_user_id: from_user_id.into(),
            from_user_name: from_user_name.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Canonical display order: timestamp ascending, id breaks ties.
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.id.cmp(&other.id))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_order_by_timestamp() {
        let a = ChatMessage::new("b", "u", "U", "x", 100);
        let b = ChatMessage::new("a", "u", "U", "y", 101);
        assert_eq!(a.display_order(&b), Ordering::Less);
    }

    #[test]
    fn test_display_order_tie_breaks_on_id() {
        let a = ChatMessage::new("a", "u", "U", "x", 100);
        let b = ChatMessage::new("b", "u", "U", "y", 100);
        assert_eq!(a.display_order(&b), Ordering::Less);
        assert_eq!(b.display_order(&a), Ordering::Greater);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let m = ChatMessage::new("m1", "u1", "Ada", "hi", 5);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["fromUserId"], "u1");
        assert_eq!(json["fromUserName"], "Ada");
        assert_eq!(json["timestamp"], 5);
    }
}

//! Persisted message records, as returned by the history API.
//!
//! The history endpoint speaks its own shape (nested author, RFC 3339
//! `createdAt`). Converting into [`ChatMessage`] happens here so the
//! reconciliation engine only ever sees one message type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, UserId};
use crate::message::ChatMessage;
use crate::user::compose_display_name;

/// One persisted message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: MessageId,
    pub user_id: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub user: HistoryUser,
}

/// Author details embedded in a [`HistoryRecord`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryUser {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl HistoryUser {
    pub fn display_name(&self) -> String {
        compose_display_name(
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default(),
            self.email.as_deref().unwrap_or_default(),
        )
    }
}

impl From<HistoryRecord> for ChatMessage {
    fn from(record: HistoryRecord) -> Self {
        let from_user_name = record.user.display_name();
        ChatMessage {
            id: record.id,
            from_user_id: record.user_id,
            from_user_name,
            message: record.message,
            // Pre-epoch timestamps clamp to zero
            timestamp: record.created_at.timestamp_millis().max(0) as u64,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Shared message, presence, and wire event types for confer.
//!
//! This crate is the vocabulary every other confer crate speaks: typed IDs,
//! chat messages, roster entries, and the JSON events exchanged over the live
//! channel. It has **no internal confer dependencies**: a pure leaf crate
//! that the client core and the relay both build on.
//!
//! # Entity Overview
//!
//! ```text
//! Session (SessionId) ← one collaboration room
//!     └── OnlineUser (UserId) joins / leaves, owned by the presence roster
//!     └── ChatMessage (MessageId) authored by a UserId, immutable
//!     └── TypingUser (UserId) exists only while that user is composing
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`ChatMessage`]   | One message, from history or the live feed  |
//! | [`OnlineUser`]    | Presence roster entry                        |
//! | [`TypingUser`]    | Remote participant currently composing       |
//! | [`HistoryRecord`] | Persisted message as the history API returns |
//! | [`ChannelEvent`]  | Inbound live channel event                   |
//! | [`ClientEvent`]   | Outbound live channel event                  |
//! | [`FrameCodec`]    | Newline framing that skips oversized lines   |
//! |-------------------|----------------------------------------------|

pub mod event;
pub mod frame;
pub mod history;
pub mod ids;
pub mod message;
pub mod user;

// Re-export primary types at crate root for convenience.
pub use event::{ChannelEvent, ClientEvent};
pub use frame::{Frame, FrameCodec};
pub use history::{HistoryRecord, HistoryUser};
pub use ids::{MessageId, SessionId, UserId};
pub use message::ChatMessage;
pub use user::{OnlineUser, TypingUser, compose_display_name};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

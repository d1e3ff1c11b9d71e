//! Typed identifiers for messages, users, and collaboration sessions.
//!
//! All three wrap opaque strings: the history API and the live channel both
//! hand us ids minted elsewhere, so we never assume a format. Ordering is
//! plain lexicographic string ordering, which the reconciliation engine uses
//! to break timestamp ties.
//!
//! `MessageId::generate()` mints UUIDv7 text, so relay-minted ids sort in
//! creation order.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A chat message identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

/// A participant identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// A collaboration session (room) identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap an existing id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the raw id string.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// First 8 characters, for log lines only.
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }

            /// Whether the id is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $T {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $T {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $T {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_string_id!(MessageId, "MessageId");
impl_string_id!(UserId, "UserId");
impl_string_id!(SessionId, "SessionId");

impl MessageId {
    /// Mint a fresh time-ordered id (UUIDv7 text).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

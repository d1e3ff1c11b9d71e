//! Roster and typing participant types.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A participant currently connected to a collaboration session.
///
/// Owned by the presence roster; everything else only reads it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl OnlineUser {
    pub fn new(
        user_id: impl Into<UserId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    /// "First Last", trimmed, falling back to the email when both are blank.
    pub fn display_name(&self) -> String {
        compose_display_name(&self.first_name, &self.last_name, &self.email)
    }

    /// The typing-indicator view of this user.
    pub fn as_typing(&self) -> TypingUser {
        TypingUser {
            user_id: self.user_id.clone(),
            name: self.display_name(),
        }
    }
}

/// A remote participant who is actively composing a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUser {
    pub user_id: UserId,
    pub name: String,
}

impl TypingUser {
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

/// Build a display name the same way everywhere.
///
/// Joins first and last name with a single space and trims the result. When
/// both are blank the email stands in, so a participant is never nameless.
pub fn compose_display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let joined = format!("{} {}", first_name.trim(), last_name.trim());
    let joined = joined.trim();
    if joined.is_empty() {
        email.trim().to_string()
    } else {
        joined.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_joins_and_trims() {
        let u = OnlineUser::new("u1", " Ada ", "Lovelace ", "ada@example.com");
        assert_eq!(u.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_display_name_single_part() {
        assert_eq!(compose_display_name("", "Turing", "a@t.org"), "Turing");
        assert_eq!(compose_display_name("Alan", "  ", "a@t.org"), "Alan");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let u = OnlineUser::new("u2", "  ", "", "grace@example.com");
        assert_eq!(u.display_name(), "grace@example.com");
    }

    #[test]
    fn test_online_user_wire_shape() {
        let u = OnlineUser::new("u1", "Ada", "Lovelace", "ada@example.com");
        let json = serde_json::to_value(&u).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["lastName"], "Lovelace");
    }

    #[test]
    fn test_online_user_missing_names_default() {
        let u: OnlineUser = serde_json::from_str(r#"{"userId":"u3","email":"x@y.z"}"#).unwrap();
        assert_eq!(u.display_name(), "x@y.z");
    }

    #[test]
    fn test_as_typing() {
        let u = OnlineUser::new("u1", "Ada", "Lovelace", "");
        assert_eq!(u.as_typing(), TypingUser::new("u1", "Ada Lovelace"));
    }
}

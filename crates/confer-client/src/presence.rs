//! Online roster for one collaboration session.
//!
//! Purely reactive: the only writes are live channel events (snapshot, join,
//! leave) and a wholesale clear on disconnect. Everything else reads.

use confer_types::{OnlineUser, UserId};
use indexmap::IndexMap;
use tracing::{debug, trace};

/// The live roster, in join order.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    users: IndexMap<UserId, OnlineUser>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster wholesale. Sent by the relay on every (re)connect.
    pub fn apply_snapshot(&mut self, users: Vec<OnlineUser>) {
        self.users.clear();
        for user in users {
            self.users.insert(user.user_id.clone(), user);
        }
        debug!("Presence snapshot: {} online", self.users.len());
    }

    /// Add a user, or refresh their details if already present.
    ///
    /// Returns `true` if the user was not online before.
    pub fn apply_join(&mut self, user: OnlineUser) -> bool {
        trace!("Presence join: {}", user.user_id);
        self.users.insert(user.user_id.clone(), user).is_none()
    }

    /// Remove a user. Returns the removed entry, if any.
    pub fn apply_leave(&mut self, user_id: &UserId) -> Option<OnlineUser> {
        trace!("Presence leave: {}", user_id);
        // shift_remove keeps the remaining join order intact
        self.users.shift_remove(user_id)
    }

    /// Forget everyone. Called when the channel drops; the roster is stale
    /// until the next snapshot.
    pub fn clear(&mut self) {
        self.users.clear();
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&OnlineUser> {
        self.users.get(user_id)
    }

    /// Everyone online, in join order.
    pub fn users(&self) -> impl Iterator<Item = &OnlineUser> {
        self.users.values()
    }

    /// Everyone online except `local`.
    pub fn others<'a>(&'a self, local: &'a UserId) -> impl Iterator<Item = &'a OnlineUser> + 'a {
        self.users.values().filter(move |u| &u.user_id != local)
    }

    /// Find an online user by display name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&OnlineUser> {
        let needle = name.to_lowercase();
        self.users
            .values()
            .find(|u| u.display_name().to_lowercase() == needle)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

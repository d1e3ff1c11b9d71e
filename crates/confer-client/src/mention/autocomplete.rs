//! Mention autocomplete for the message composer.
//!
//! Watches composer text and caret, opens a candidate list when the caret
//! sits inside an in-progress `@mention`, and applies the keyboard contract:
//!
//! | Key            | Open                         | Closed        |
//! |----------------|------------------------------|---------------|
//! | ArrowDown / Up | move selection (clamped)     | pass through  |
//! | Enter / Tab    | commit selection (no-op if 0)| Enter = send  |
//! | Shift+Enter    | commit selection             | pass through  |
//! | Escape         | close without committing     | pass through  |
//!
//! Caret and anchor positions are **char** indices into the composer text,
//! matching what text widgets report.

use std::sync::LazyLock;

use confer_types::{OnlineUser, UserId};
use regex::Regex;
use tracing::trace;

use crate::mention::tokenizer::mention_markup;
use crate::presence::PresenceTracker;

/// Allowed shape of the text between `@` and the caret (whitespace is then
/// rejected separately, leaving word characters only).
static QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\s]*$").expect("query pattern is valid"));

/// Autocomplete state for one composition session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionState {
    pub is_open: bool,
    pub search_query: String,
    /// Index into the candidate list; only meaningful while open with
    /// at least one candidate.
    pub selected_index: usize,
    /// Char index of the triggering `@`.
    pub cursor_anchor: usize,
}

/// Keys the composer forwards to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKey {
    ArrowUp,
    ArrowDown,
    Enter { shift: bool },
    Tab,
    Escape,
    Other,
}

/// Text edit produced by committing a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// New composer text.
    pub text: String,
    /// New caret (char index), just after the inserted mention and space.
    pub caret: usize,
    pub user_id: UserId,
}

/// What the composer should do with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Consumed by the autocomplete; suppress default handling.
    Handled,
    /// A candidate was committed; apply the edit.
    Committed(Committed),
    /// Send the message.
    Send,
    /// Not ours; let the composer handle it.
    Ignored,
}

/// Find an in-progress mention ending at `caret`.
///
/// Returns `(anchor, query)` where `anchor` is the char index of the `@`.
pub fn detect_trigger(text: &str, caret: usize) -> Option<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let caret = caret.min(chars.len());
    let anchor = chars[..caret].iter().rposition(|&c| c == '@')?;
    let query: String = chars[anchor + 1..caret].iter().collect();

    if !QUERY_RE.is_match(&query) || query.chars().any(char::is_whitespace) {
        return None;
    }
    Some((anchor, query))
}

/// Online users eligible for a mention query.
///
/// Excludes `local`, keeps users whose display name contains `query`
/// (case-insensitive), and ranks names that *start* with the query first.
/// Roster order is preserved within each band.
pub fn filter_candidates<'a>(
    users: impl IntoIterator<Item = &'a OnlineUser>,
    local: &UserId,
    query: &str,
) -> Vec<OnlineUser> {
    let needle = query.to_lowercase();
    let mut ranked: Vec<(bool, OnlineUser)> = users
        .into_iter()
        .filter(|u| &u.user_id != local)
        .filter_map(|u| {
            let name = u.display_name().to_lowercase();
            name.contains(&needle)
                .then(|| (!name.starts_with(&needle), u.clone()))
        })
        .collect();
    // Stable: false (prefix match) sorts before true
    ranked.sort_by_key(|(not_prefix, _)| *not_prefix);
    ranked.into_iter().map(|(_, u)| u).collect()
}

/// Drives the candidate list from composer input and keys.
#[derive(Debug, Clone, Default)]
pub struct MentionAutocomplete {
    state: MentionState,
    candidates: Vec<OnlineUser>,
}

impl MentionAutocomplete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MentionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    /// Current candidates (empty while closed).
    pub fn candidates(&self) -> &[OnlineUser] {
        &self.candidates
    }

    /// The highlighted candidate, if open with a non-empty list.
    pub fn selected(&self) -> Option<&OnlineUser> {
        if !self.state.is_open {
            return None;
        }
        self.candidates.get(self.state.selected_index)
    }

    /// Re-evaluate after every composer change. Returns whether the list is open.
    pub fn on_input(
        &mut self,
        text: &str,
        caret: usize,
        roster: &PresenceTracker,
        local: &UserId,
    ) -> bool {
        match detect_trigger(text, caret) {
            Some((anchor, query)) => {
                let query_changed = !self.state.is_open
                    || self.state.cursor_anchor != anchor
                    || self.state.search_query != query;
                self.state.is_open = true;
                self.state.cursor_anchor = anchor;
                self.state.search_query = query;
                if query_changed {
                    self.state.selected_index = 0;
                }
                self.refresh_candidates(roster, local);
                trace!(
                    "Mention query {:?} at {}: {} candidates",
                    self.state.search_query,
                    anchor,
                    self.candidates.len()
                );
            }
            None => self.close(),
        }
        self.state.is_open
    }

    /// Recompute candidates against the current roster (e.g. after a join
    /// or leave) and re-clamp the selection.
    pub fn refresh_candidates(&mut self, roster: &PresenceTracker, local: &UserId) {
        if !self.state.is_open {
            return;
        }
        self.candidates = filter_candidates(roster.users(), local, &self.state.search_query);
        self.clamp_selection();
    }

    /// Apply the keyboard contract. `text`/`caret` are the current composer
    /// contents, needed to build the edit on commit.
    pub fn handle_key(&mut self, key: ComposerKey, text: &str, caret: usize) -> KeyOutcome {
        if !self.state.is_open {
            return match key {
                ComposerKey::Enter { shift: false } => KeyOutcome::Send,
                _ => KeyOutcome::Ignored,
            };
        }

        match key {
            ComposerKey::ArrowDown => {
                let last = self.candidates.len().saturating_sub(1);
                self.state.selected_index = (self.state.selected_index + 1).min(last);
                KeyOutcome::Handled
            }
            ComposerKey::ArrowUp => {
                self.state.selected_index = self.state.selected_index.saturating_sub(1);
                KeyOutcome::Handled
            }
            ComposerKey::Enter { .. } | ComposerKey::Tab => match self.commit(text, caret) {
                Some(edit) => KeyOutcome::Committed(edit),
                None => KeyOutcome::Handled,
            },
            ComposerKey::Escape => {
                self.close();
                KeyOutcome::Handled
            }
            ComposerKey::Other => KeyOutcome::Ignored,
        }
    }

    /// Replace `@query` with the selected candidate's mention markup plus a
    /// trailing space, then close. No-op (returns `None`) with no selection.
    pub fn commit(&mut self, text: &str, caret: usize) -> Option<Committed> {
        let user = self.selected()?.clone();
        let markup = mention_markup(&user.display_name());

        let chars: Vec<char> = text.chars().collect();
        let caret = caret.min(chars.len());
        let anchor = self.state.cursor_anchor.min(caret);

        let mut out: String = chars[..anchor].iter().collect();
        out.push_str(&markup);
        out.push(' ');
        let new_caret = anchor + markup.chars().count() + 1;
        out.extend(&chars[caret..]);

        self.close();
        Some(Committed { text: out, caret: new_caret, user_id: user.user_id })
    }

    /// Close without committing.
    pub fn close(&mut self) {
        self.state = MentionState::default();
        self.candidates.clear();
    }

    /// Unconditional reset, used when a message is sent.
    pub fn reset(&mut self) {
        self.close();
    }

    fn clamp_selection(&mut self) {
        let last = self.candidates.len().saturating_sub(1);
        self.state.selected_index = self.state.selected_index.min(last);
    }
}

// ============================================================================
// Tests
// ============================================================================

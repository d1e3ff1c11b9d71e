//! History/live message reconciliation.
//!
//! Two sources deliver messages independently: the one-shot history pull
//! (on session open) and the live channel (push, for the whole session). They
//! overlap: a message persisted and then replayed on the channel before the
//! history fetch resolves arrives from both. [`merge`] folds them into one
//! canonical sequence; [`Reconciler`] keeps both inputs and republishes the
//! merged list whenever either changes.
//!
//! # Merge Rules
//!
//! - One entry per message id (union of both inputs)
//! - Live copy wins over the historical copy of the same id
//! - Sorted by timestamp ascending, ties broken by id (lexicographic)
//!
//! The result is idempotent: `merge(h, merge(h, l)) == merge(h, l)`.

use std::collections::HashMap;

use confer_types::{ChatMessage, MessageId};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Merge a history snapshot with the live messages received so far.
pub fn merge(history: &[ChatMessage], live: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut by_id: HashMap<&MessageId, &ChatMessage> =
        HashMap::with_capacity(history.len() + live.len());
    for msg in history {
        by_id.insert(&msg.id, msg);
    }
    // Live second so it overwrites
    for msg in live {
        by_id.insert(&msg.id, msg);
    }

    let mut merged: Vec<ChatMessage> = by_id.into_values().cloned().collect();
    merged.sort_by(ChatMessage::display_order);
    merged
}

/// Where the one-shot history pull stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryState {
    /// Fetch still in flight.
    #[default]
    Pending,
    /// Snapshot applied.
    Loaded { count: usize },
    /// Fetch failed; the session runs on live messages alone.
    Failed,
}

/// Result of applying one live message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New id, the merged list grew.
    Inserted,
    /// Known id with different content; the live copy replaced it.
    Replaced,
    /// Known id with identical content; nothing visible changed.
    Duplicate,
}

/// Holds both message sources for one session and the merged view.
///
/// # State Machine
///
/// ```text
/// +----------------+  apply_history()   +----------------+
/// |    Pending     | -----------------> |     Loaded     |
/// | (live only)    |                    | (history+live) |
/// +-------+--------+                    +----------------+
///         | history_failed()
///         v
/// +----------------+
/// |     Failed     |  live only, not an error state
/// +----------------+
/// ```
///
/// Live messages are accepted in every state.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    history: Vec<ChatMessage>,
    live: IndexMap<MessageId, ChatMessage>,
    history_state: HistoryState,
    merged: Vec<ChatMessage>,
    /// Bumped whenever `merged` changes.
    version: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current merged, ordered, deduplicated sequence.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.merged
    }

    pub fn history_state(&self) -> HistoryState {
        self.history_state
    }

    /// Version counter for change detection.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of distinct live messages received.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Apply the history snapshot.
    ///
    /// History is pulled exactly once per session; a second snapshot (or one
    /// arriving after the fetch was declared failed) is ignored and `false`
    /// is returned.
    pub fn apply_history(&mut self, history: Vec<ChatMessage>) -> bool {
        if self.history_state != HistoryState::Pending {
            warn!(
                "Ignoring history snapshot of {} messages: history already {:?}",
                history.len(),
                self.history_state
            );
            return false;
        }
        let count = history.len();
        self.history = history;
        self.history_state = HistoryState::Loaded { count };
        self.rebuild();
        info!("History applied: {} persisted, {} merged", count, self.merged.len());
        true
    }

    /// Record that the history pull failed. The merged list is untouched.
    pub fn history_failed(&mut self) {
        if self.history_state == HistoryState::Pending {
            self.history_state = HistoryState::Failed;
        }
    }

    /// Apply one message from the live channel.
    pub fn apply_live(&mut self, msg: ChatMessage) -> MergeOutcome {
        let outcome = match self.current(&msg.id) {
            None => MergeOutcome::Inserted,
            Some(existing) if *existing == msg => MergeOutcome::Duplicate,
            Some(_) => MergeOutcome::Replaced,
        };

        debug!("Live message {} -> {:?}", msg.id.short(), outcome);
        self.live.insert(msg.id.clone(), msg);

        if outcome != MergeOutcome::Duplicate {
            self.rebuild();
        }
        outcome
    }

    /// Drop everything (session end).
    pub fn reset(&mut self) {
        self.history.clear();
        self.live.clear();
        self.merged.clear();
        self.history_state = HistoryState::Pending;
        self.version += 1;
    }

    /// The copy currently shown for `id`, live first.
    fn current(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.live
            .get(id)
            .or_else(|| self.history.iter().find(|m| &m.id == id))
    }

    fn rebuild(&mut self) {
        let live: Vec<ChatMessage> = self.live.values().cloned().collect();
        self.merged = merge(&self.history, &live);
        self.version += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================

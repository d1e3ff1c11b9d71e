//! Typing indicators: local debounce and remote roster.
//!
//! [`TypingController`] turns keystroke activity into two discrete outbound
//! signals, `typing:start` and `typing:stop`. [`TypingRoster`] tracks which
//! *other* participants are typing, and [`typing_label`] renders them.
//!
//! # Local State Machine
//!
//! ```text
//!             input non-empty (emit Start)
//!   +------+ ---------------------------> +--------+
//!   | Idle |                              | Typing | --+ keystroke:
//!   +------+ <--------------------------- +--------+ <-+ timer reset
//!             timer elapsed / input empty /
//!             sent / shutdown (emit Stop)
//! ```
//!
//! The controller owns at most one [`DebounceTimer`]. Arming a new timer
//! drops (and so aborts) the previous one. Each timer carries a generation;
//! a [`TimerFired`] from a superseded timer is ignored, which covers the
//! window where an aborted timer had already sent its notification.

use std::time::Duration;

use confer_types::{ClientEvent, TypingUser, UserId};
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

// ============================================================================
// Signals
// ============================================================================

/// A transition the caller must publish on the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

impl From<TypingSignal> for ClientEvent {
    fn from(signal: TypingSignal) -> Self {
        match signal {
            TypingSignal::Start => ClientEvent::TypingStart,
            TypingSignal::Stop => ClientEvent::TypingStop,
        }
    }
}

/// Notification that a debounce timer ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    generation: u64,
}

// ============================================================================
// Debounce Timer
// ============================================================================

/// Handle to one pending debounce timer. Dropping it cancels the timer.
#[derive(Debug)]
struct DebounceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl DebounceTimer {
    fn arm(generation: u64, timeout: Duration, fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        // Deadline fixed at arm time, not at first poll
        let deadline = Instant::now() + timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = fired_tx.send(TimerFired { generation });
        });
        Self { generation, handle }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Typing Controller
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypingState {
    #[default]
    Idle,
    Typing,
}

/// Per-composer debounce state machine.
///
/// Must be driven from inside a tokio runtime: arming a timer spawns a task.
/// Timer expiry is delivered on the receiver returned by [`channel`](Self::channel)
/// and fed back through [`on_timer`](Self::on_timer).
#[derive(Debug)]
pub struct TypingController {
    state: TypingState,
    timeout: Duration,
    timer: Option<DebounceTimer>,
    next_generation: u64,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TypingController {
    /// Create a controller and the receiver its timers report on.
    pub fn channel(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let controller = Self {
            state: TypingState::Idle,
            timeout,
            timer: None,
            next_generation: 0,
            fired_tx,
        };
        (controller, fired_rx)
    }

    pub fn state(&self) -> TypingState {
        self.state
    }

    pub fn is_typing(&self) -> bool {
        self.state == TypingState::Typing
    }

    /// Whether a debounce timer is currently pending.
    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Feed a composer change. `is_composing` is "input is non-empty".
    pub fn on_input(&mut self, is_composing: bool) -> Option<TypingSignal> {
        if !is_composing {
            return self.force_stop();
        }

        self.rearm();
        match self.state {
            TypingState::Idle => {
                self.state = TypingState::Typing;
                debug!("Typing started");
                Some(TypingSignal::Start)
            }
            TypingState::Typing => None,
        }
    }

    /// Handle a timer notification.
    pub fn on_timer(&mut self, fired: TimerFired) -> Option<TypingSignal> {
        match &self.timer {
            Some(timer) if timer.generation == fired.generation => {
                // Task already finished; dropping the handle is enough
                self.timer = None;
                debug!("Typing timed out");
                self.leave_typing()
            }
            _ => {
                trace!("Ignoring stale typing timer {}", fired.generation);
                None
            }
        }
    }

    /// Leave Typing immediately (input cleared or message sent).
    pub fn force_stop(&mut self) -> Option<TypingSignal> {
        self.timer = None;
        self.leave_typing()
    }

    /// Teardown: cancel the timer and flush a pending stop.
    pub fn shutdown(&mut self) -> Option<TypingSignal> {
        self.force_stop()
    }

    fn rearm(&mut self) {
        self.next_generation += 1;
        // Assigning drops the previous timer, which aborts it
        self.timer = Some(DebounceTimer::arm(
            self.next_generation,
            self.timeout,
            self.fired_tx.clone(),
        ));
    }

    fn leave_typing(&mut self) -> Option<TypingSignal> {
        match self.state {
            TypingState::Typing => {
                self.state = TypingState::Idle;
                Some(TypingSignal::Stop)
            }
            TypingState::Idle => None,
        }
    }
}

// ============================================================================
// Remote Typing Roster
// ============================================================================

#[derive(Debug, Clone)]
struct RemoteTyper {
    user: TypingUser,
    expires_at: Instant,
}

/// Remote participants currently typing, in the order they started.
///
/// Entries leave on an explicit stop, when the user goes offline, on
/// disconnect, or when `ttl` passes without a refresh.
#[derive(Debug, Clone)]
pub struct TypingRoster {
    typers: IndexMap<UserId, RemoteTyper>,
    ttl: Duration,
}

impl TypingRoster {
    pub fn new(ttl: Duration) -> Self {
        Self { typers: IndexMap::new(), ttl }
    }

    /// Record (or refresh) a typing participant. Returns `true` if new.
    pub fn apply_start(&mut self, user: TypingUser, now: Instant) -> bool {
        let expires_at = now + self.ttl;
        match self.typers.get_mut(&user.user_id) {
            Some(existing) => {
                existing.user = user;
                existing.expires_at = expires_at;
                false
            }
            None => {
                self.typers
                    .insert(user.user_id.clone(), RemoteTyper { user, expires_at });
                true
            }
        }
    }

    /// Remove a participant. Returns `true` if they were listed.
    pub fn remove(&mut self, user_id: &UserId) -> bool {
        self.typers.shift_remove(user_id).is_some()
    }

    pub fn clear(&mut self) {
        self.typers.clear();
    }

    /// Keep only participants for whom `keep` holds. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&UserId) -> bool) -> usize {
        let before = self.typers.len();
        self.typers.retain(|id, _| keep(id));
        before - self.typers.len()
    }

    /// Drop entries whose TTL has passed. Returns how many were dropped.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.typers.len();
        self.typers.retain(|_, t| t.expires_at > now);
        before - self.typers.len()
    }

    /// Earliest pending expiry, for scheduling the next prune.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.typers.values().map(|t| t.expires_at).min()
    }

    /// Typing participants, excluding `local`.
    pub fn users_excluding(&self, local: &UserId) -> Vec<TypingUser> {
        self.typers
            .values()
            .filter(|t| &t.user.user_id != local)
            .map(|t| t.user.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.typers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.typers.is_empty()
    }
}

// ============================================================================
// Label
// ============================================================================

/// Render the "is typing…" line, excluding the local user.
///
/// Returns `None` when nobody else is typing.
pub fn typing_label(users: &[TypingUser], local: &UserId) -> Option<String> {
    let names: Vec<&str> = users
        .iter()
        .filter(|u| &u.user_id != local)
        .map(|u| u.name.as_str())
        .collect();

    match names.as_slice() {
        [] => None,
        [one] => Some(format!("{one} is typing…")),
        [a, b] => Some(format!("{a} and {b} are typing…")),
        [a, b, rest @ ..] => {
            let n = rest.len();
            let others = if n == 1 { "other" } else { "others" };
            Some(format!("{a}, {b}, and {n} {others} are typing…"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

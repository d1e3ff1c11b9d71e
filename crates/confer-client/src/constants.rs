//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.
//! [`SessionConfig`](crate::SessionConfig) defaults to these.

use std::time::Duration;

/// Inactivity window after the last keystroke before `typing:stop` is sent.
pub const TYPING_TIMEOUT: Duration = Duration::from_millis(2000);

/// How long a remote "is typing" indicator survives without a refresh.
/// Covers peers that vanish without sending `typing:stop`.
pub const REMOTE_TYPING_TTL: Duration = Duration::from_millis(5000);

/// Timeout for a single TCP connect attempt to the relay.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before the first reconnect attempt; grows linearly per attempt.
pub const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Give up reconnecting after this many consecutive failures.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 8;

/// Upper bound on one newline-delimited JSON frame.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Timeout for the one-shot history pull.
pub const HISTORY_TIMEOUT: Duration = Duration::from_secs(15);

/// How long `close()` waits for the transport to flush queued events.
pub const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

//! Confer collaboration client core
//!
//! Merges pulled history with the live event stream, tracks presence and
//! typing, and drives @-mention autocomplete. [`CollabSession`] is the single
//! entry point; the other modules are usable on their own.

pub mod config;
pub mod constants;
pub mod mention;
pub mod presence;
pub mod reconcile;
pub mod session;
pub mod transport;
pub mod typing;

use std::sync::Arc;

pub use config::{ConfigError, ReconnectPolicy, SessionConfig};
pub use mention::{
    ComposerKey, Committed, KeyOutcome, MentionAutocomplete, MentionSegment, MentionState,
    mention_markup, mentioned_names, tokenize,
};
pub use presence::PresenceTracker;
pub use reconcile::{HistoryState, MergeOutcome, Reconciler, merge};
pub use session::{CollabSession, SessionError, SessionUpdate};
pub use transport::{
    ChannelError, ConnectionStatus, HistoryError, HistorySource, HttpHistory, LiveTransport,
    MemoryTransport, StaticHistory, TcpTransport, TransportEvent, TransportLink,
};
pub use typing::{TypingController, TypingRoster, TypingSignal, TypingState, typing_label};

use confer_types::{OnlineUser, SessionId};

/// Open a session against a TCP relay, pulling history over HTTP.
///
/// This is the main entry point for connecting to a confer relay. Without a
/// `history_url` the session starts with an empty history.
pub async fn connect_tcp(
    config: &SessionConfig,
    local: OnlineUser,
    session_id: SessionId,
    relay_addr: &str,
    history_url: Option<&str>,
) -> Result<CollabSession, ConnectError> {
    let history: Arc<dyn HistorySource> = match history_url {
        Some(url) => Arc::new(HttpHistory::new(url)?),
        None => Arc::new(StaticHistory::empty()),
    };
    let transport = TcpTransport::new(relay_addr, config.reconnect.clone());
    let session = CollabSession::open(config, local, session_id, history, &transport).await?;
    Ok(session)
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("history error: {0}")]
    History(#[from] HistoryError),
}

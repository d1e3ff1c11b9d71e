//! External collaborators: the live channel and the history pull.
//!
//! Both are traits so the session core never knows what is on the other end.
//!
//! ```text
//!   CollabSession                 TransportLink                 relay
//!   ┌──────────────┐  outbound   ┌──────────────┐   socket   ┌────────┐
//!   │ send_message │ ──────────▶ │ writer task  │ ─────────▶ │        │
//!   │ next_update  │ ◀────────── │ reader task  │ ◀───────── │        │
//!   └──────────────┘  inbound    └──────────────┘            └────────┘
//! ```
//!
//! Reconnection and heartbeats belong to the transport. The session only
//! sees [`ConnectionStatus`] changes and reacts by clearing stale presence.

pub mod history;
pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use confer_types::{ChannelEvent, ClientEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use history::{HistoryError, HistorySource, HttpHistory, StaticHistory};
pub use memory::{MemoryTransport, RemoteEnd, memory_pair};
pub use tcp::TcpTransport;

/// Connection lifecycle status.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    /// The transport gave up; no further events will arrive.
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Everything a transport delivers to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Event(ChannelEvent),
    Status(ConnectionStatus),
}

/// Errors from the live channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out")]
    Timeout,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel closed")]
    Closed,
}

/// Both directions of an open live channel.
///
/// Dropping `outbound` is the unsubscribe signal: the transport flushes what
/// is already queued and shuts down. `driver`, when present, completes once
/// that flush is done.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<ClientEvent>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
    pub driver: Option<JoinHandle<()>>,
}

/// A live channel that can be opened for a session.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    async fn connect(&self) -> Result<TransportLink, ChannelError>;
}

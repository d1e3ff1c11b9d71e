//! In-process transport: the other end of the channel is a [`RemoteEnd`]
//! held by the caller (tests, demos, embedding in a host that already owns
//! the socket).

use async_trait::async_trait;
use confer_types::{ChannelEvent, ClientEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{ChannelError, ConnectionStatus, LiveTransport, TransportEvent, TransportLink};

/// Create a connected transport/remote pair.
pub fn memory_pair() -> (MemoryTransport, RemoteEnd) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let transport = MemoryTransport {
        link: Mutex::new(Some(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
            driver: None,
        })),
    };
    let remote = RemoteEnd { from_client: out_rx, to_client: in_tx };
    (transport, remote)
}

/// Single-use transport handing out a pre-built link.
#[derive(Debug)]
pub struct MemoryTransport {
    link: Mutex<Option<TransportLink>>,
}

#[async_trait]
impl LiveTransport for MemoryTransport {
    async fn connect(&self) -> Result<TransportLink, ChannelError> {
        self.link
            .lock()
            .take()
            .ok_or_else(|| ChannelError::Connect("memory transport already connected".into()))
    }
}

/// The relay side of a [`memory_pair`].
#[derive(Debug)]
pub struct RemoteEnd {
    from_client: mpsc::UnboundedReceiver<ClientEvent>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl RemoteEnd {
    /// Push an event to the client. Returns `false` if the client is gone.
    pub fn push(&self, event: ChannelEvent) -> bool {
        self.to_client.send(TransportEvent::Event(event)).is_ok()
    }

    /// Report a connection status change to the client.
    pub fn status(&self, status: ConnectionStatus) -> bool {
        self.to_client.send(TransportEvent::Status(status)).is_ok()
    }

    /// Next event the client sent; `None` once the client unsubscribed and
    /// everything queued has been drained.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.from_client.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.from_client.try_recv().ok()
    }

    /// Drain everything currently queued from the client.
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Whether the client has dropped its sending half.
    pub fn is_client_closed(&self) -> bool {
        self.from_client.is_closed()
    }
}

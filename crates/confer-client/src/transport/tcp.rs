//! Newline-delimited JSON over TCP.
//!
//! One [`ClientEvent`] or [`ChannelEvent`] per line. A single driver task
//! owns the socket: it multiplexes the outbound queue and inbound lines, and
//! on connection loss walks the [`ReconnectPolicy`] ladder, reporting each
//! step as a [`ConnectionStatus`].
//!
//! Outbound events queued while disconnected are dropped with a warning.
//! Typing signals are ephemeral and the relay has no delivery guarantee to
//! offer for a message the user sent into a dead socket.

use async_trait::async_trait;
use confer_types::{ChannelEvent, ClientEvent, Frame, FrameCodec};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::{ChannelError, ConnectionStatus, LiveTransport, TransportEvent, TransportLink};
use crate::config::ReconnectPolicy;

type LineStream = Framed<TcpStream, FrameCodec>;

/// Live channel to a relay over TCP.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    addr: String,
    policy: ReconnectPolicy,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self { addr: addr.into(), policy }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl LiveTransport for TcpTransport {
    async fn connect(&self) -> Result<TransportLink, ChannelError> {
        let stream = open(&self.addr, &self.policy).await?;
        info!(addr = %self.addr, "connected to relay");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(
            self.addr.clone(),
            self.policy.clone(),
            stream,
            out_rx,
            in_tx,
        ));

        Ok(TransportLink { outbound: out_tx, inbound: in_rx, driver: Some(driver) })
    }
}

async fn open(addr: &str, policy: &ReconnectPolicy) -> Result<LineStream, ChannelError> {
    let stream = timeout(policy.connect_timeout(), TcpStream::connect(addr))
        .await
        .map_err(|_| ChannelError::Timeout)?
        .map_err(|e| ChannelError::Connect(format!("{addr}: {e}")))?;
    stream.set_nodelay(true)?;
    Ok(Framed::new(stream, FrameCodec::new(policy.max_frame_length)))
}

// ============================================================================
// Driver
// ============================================================================

/// Why a single connection stopped.
enum ConnectionEnd {
    /// The session dropped its outbound sender (or its inbound receiver).
    Unsubscribed,
    Lost(String),
}

async fn drive(
    addr: String,
    policy: ReconnectPolicy,
    first: LineStream,
    mut out_rx: mpsc::UnboundedReceiver<ClientEvent>,
    in_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut next = Some(first);
    loop {
        let stream = match next.take() {
            Some(stream) => stream,
            None => match reconnect(&addr, &policy, &mut out_rx, &in_tx).await {
                Some(stream) => {
                    if in_tx.send(TransportEvent::Status(ConnectionStatus::Connected)).is_err() {
                        return;
                    }
                    stream
                }
                None => return,
            },
        };

        match run_connection(stream, &mut out_rx, &in_tx).await {
            ConnectionEnd::Unsubscribed => {
                debug!(addr = %addr, "transport unsubscribed");
                return;
            }
            ConnectionEnd::Lost(reason) => {
                warn!(addr = %addr, reason = %reason, "relay connection lost");
                if in_tx.send(TransportEvent::Status(ConnectionStatus::Disconnected)).is_err() {
                    return;
                }
            }
        }
    }
}

async fn run_connection(
    stream: LineStream,
    out_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    in_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> ConnectionEnd {
    let (mut sink, mut lines) = stream.split();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(event) => {
                    let line = match serde_json::to_string(&event) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(kind = event.kind(), error = %e, "failed to encode event");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(line).await {
                        return ConnectionEnd::Lost(e.to_string());
                    }
                }
                None => {
                    // Everything queued before the unsubscribe has been written.
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "error closing relay socket");
                    }
                    return ConnectionEnd::Unsubscribed;
                }
            },
            inbound = lines.next() => match inbound {
                Some(Ok(Frame::Line(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ChannelEvent>(&line) {
                        Ok(event) => {
                            if in_tx.send(TransportEvent::Event(event)).is_err() {
                                return ConnectionEnd::Unsubscribed;
                            }
                        }
                        Err(e) => warn!(error = %e, "skipping undecodable relay frame"),
                    }
                }
                Some(Ok(Frame::Oversized)) => warn!("skipping oversized relay frame"),
                Some(Err(e)) => return ConnectionEnd::Lost(e.to_string()),
                None => return ConnectionEnd::Lost("closed by relay".into()),
            },
        }
    }
}

/// Walk the backoff ladder. `None` means give up (status already reported)
/// or the session went away.
async fn reconnect(
    addr: &str,
    policy: &ReconnectPolicy,
    out_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    in_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<LineStream> {
    for attempt in 1..=policy.max_attempts {
        let status = ConnectionStatus::Reconnecting { attempt };
        if in_tx.send(TransportEvent::Status(status)).is_err() {
            return None;
        }

        let deadline = Instant::now() + policy.delay_for(attempt);
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                outbound = out_rx.recv() => match outbound {
                    Some(event) => {
                        warn!(kind = event.kind(), "dropping outbound event while disconnected");
                    }
                    None => return None,
                },
            }
        }

        match open(addr, policy).await {
            Ok(stream) => {
                info!(addr = %addr, attempt, "reconnected to relay");
                return Some(stream);
            }
            Err(e) => warn!(addr = %addr, attempt, error = %e, "reconnect failed"),
        }
    }

    let reason = format!("gave up after {} reconnect attempts", policy.max_attempts);
    let _ = in_tx.send(TransportEvent::Status(ConnectionStatus::Error(reason)));
    None
}

// ============================================================================
// Tests
// ============================================================================

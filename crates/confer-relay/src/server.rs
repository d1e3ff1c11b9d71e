//! TCP front end: one task per socket, newline-delimited JSON both ways.

use std::net::SocketAddr;

use confer_types::{ClientEvent, Frame, FrameCodec};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::RelayError;
use crate::config::RelayConfig;
use crate::hub::HubHandle;

/// Relay server
pub struct RelayServer {
    listener: TcpListener,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    max_line_length: usize,
}

impl RelayServer {
    /// Bind the listener and start the hub.
    pub async fn bind(config: &RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(&config.bind).await?;
        let (hub, hub_task) = HubHandle::spawn(config.channel_capacity, config.max_line_length);
        Ok(Self {
            listener,
            hub,
            hub_task,
            max_line_length: config.max_line_length,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Accept connections until the task is cancelled.
    pub async fn run(self) -> Result<(), RelayError> {
        info!("Starting relay on {}", self.local_addr()?);
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let hub = self.hub.clone();
                    let max = self.max_line_length;
                    tokio::spawn(handle_connection(stream, peer, hub, max));
                }
                Err(e) => {
                    // Usually fd exhaustion; the listener itself is still fine
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.hub_task.abort();
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, hub: HubHandle, max_line_length: usize) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "set_nodelay failed");
    }
    let mut conn = match hub.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(peer = %peer, error = %e, "hub unavailable, dropping connection");
            return;
        }
    };
    info!(peer = %peer, conn = conn.id(), "client connected");

    let framed = Framed::new(stream, FrameCodec::new(max_line_length));
    let (mut sink, mut lines) = framed.split();

    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(Frame::Line(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ClientEvent>(&line) {
                        Ok(event) => {
                            if conn.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(peer = %peer, error = %e, "skipping undecodable frame"),
                    }
                }
                Some(Ok(Frame::Oversized)) => {
                    warn!(peer = %peer, max = max_line_length, "skipping oversized frame");
                }
                Some(Err(e)) => {
                    debug!(peer = %peer, error = %e, "read failed");
                    break;
                }
                None => break,
            },
            event = conn.recv() => match event {
                Some(event) => {
                    let line = match serde_json::to_string(&event) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(kind = event.kind(), error = %e, "failed to encode event");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(line).await {
                        debug!(peer = %peer, error = %e, "write failed");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    info!(peer = %peer, conn = conn.id(), "client disconnected");
    conn.disconnect().await;
}

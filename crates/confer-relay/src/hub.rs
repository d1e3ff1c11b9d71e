//! Session hub: the relay's single source of truth for rooms and presence.
//!
//! One task owns all state and processes commands sequentially, so there are
//! no locks. Connection tasks talk to it through a cloneable [`HubHandle`].
//!
//! ```text
//!   HubConnection (per socket)   mpsc       Hub (single task)
//!   ┌────────────────────┐   ──────────▶  ┌───────────────────────────┐
//!   │ .send(ClientEvent) │                │ rooms: SessionId → Room    │
//!   │ .recv()            │   ◀──────────  │ members: ConnId → Member   │
//!   └────────────────────┘   unbounded    └───────────────────────────┘
//! ```
//!
//! A user may hold several connections in one room (tabs, reconnect races).
//! Presence is per user: `presence:join` goes out on their first connection
//! and `presence:leave` after their last. Typing is tracked per connection
//! and announced per user: `typing:start` when the first of their
//! connections starts, `typing:stop` when the last typing one stops or goes
//! away.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use confer_types::{
    ChannelEvent, ChatMessage, ClientEvent, MessageId, OnlineUser, SessionId, UserId, now_millis,
};
use indexmap::{IndexMap, IndexSet};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::RelayError;

/// Hub-assigned connection id.
pub type ConnId = u64;

// ============================================================================
// Commands (internal)
// ============================================================================

enum HubCommand {
    Register {
        conn: ConnId,
        tx: mpsc::UnboundedSender<ChannelEvent>,
    },
    Client {
        conn: ConnId,
        event: ClientEvent,
    },
    Disconnect {
        conn: ConnId,
    },
    RoomMembers {
        session: SessionId,
        reply: oneshot::Sender<Vec<OnlineUser>>,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
}

// ============================================================================
// HubHandle (public API)
// ============================================================================

/// Cloneable handle to the hub task. The hub stops once every handle (and
/// every [`HubConnection`]) is dropped.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    next_conn: Arc<AtomicU64>,
}

impl HubHandle {
    /// Spawn the hub task. `max_line_length` is the framing limit clients
    /// read with; messages whose `message:new` frame would exceed it are not
    /// relayed.
    pub fn spawn(capacity: usize, max_line_length: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(Hub::new(rx, max_line_length).run());
        let handle = Self {
            tx,
            next_conn: Arc::new(AtomicU64::new(1)),
        };
        (handle, task)
    }

    /// Register a new connection.
    pub async fn connect(&self) -> Result<HubConnection, RelayError> {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();
        self.send(HubCommand::Register { conn, tx }).await?;
        Ok(HubConnection {
            id: conn,
            hub: self.clone(),
            events,
        })
    }

    /// Distinct users currently in `session`, in join order.
    pub async fn room_members(&self, session: &SessionId) -> Result<Vec<OnlineUser>, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::RoomMembers {
            session: session.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    /// Counters. Also a barrier: every command queued before this one has
    /// been processed when it returns.
    pub async fn stats(&self) -> Result<HubStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply }).await?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), RelayError> {
        self.tx.send(cmd).await.map_err(|_| RelayError::HubClosed)
    }
}

/// One client connection's view of the hub.
#[derive(Debug)]
pub struct HubConnection {
    id: ConnId,
    hub: HubHandle,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl HubConnection {
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Forward a client event to the hub.
    pub async fn send(&self, event: ClientEvent) -> Result<(), RelayError> {
        self.hub
            .send(HubCommand::Client {
                conn: self.id,
                event,
            })
            .await
    }

    /// Next event addressed to this connection.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    /// Unregister. Presence and typing are cleaned up by the hub.
    pub async fn disconnect(self) {
        let conn = self.id;
        if self.hub.send(HubCommand::Disconnect { conn }).await.is_err() {
            debug!(conn, "hub already stopped");
        }
    }
}

// ============================================================================
// Hub (single task)
// ============================================================================

#[derive(Debug, Clone)]
struct Joined {
    session: SessionId,
    user_id: UserId,
}

struct Member {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    joined: Option<Joined>,
}

struct RoomUser {
    user: OnlineUser,
    connections: usize,
    /// Connections of this user currently composing.
    typing: IndexSet<ConnId>,
}

impl RoomUser {
    fn is_typing(&self) -> bool {
        !self.typing.is_empty()
    }
}

/// What removing a connection changed for its user.
struct Departure {
    user: OnlineUser,
    /// The connection was the user's last typing one.
    stopped_typing: bool,
    /// The connection was the user's last one in the room.
    left: bool,
}

#[derive(Default)]
struct Room {
    /// Connection → user, in join order.
    conns: IndexMap<ConnId, UserId>,
    /// Distinct users, in first-join order.
    users: IndexMap<UserId, RoomUser>,
}

impl Room {
    /// Returns `true` when this is the user's first connection.
    fn add(&mut self, conn: ConnId, user: OnlineUser) -> bool {
        self.conns.insert(conn, user.user_id.clone());
        match self.users.get_mut(&user.user_id) {
            Some(existing) => {
                existing.connections += 1;
                existing.user = user;
                false
            }
            None => {
                self.users.insert(
                    user.user_id.clone(),
                    RoomUser {
                        user,
                        connections: 1,
                        typing: IndexSet::new(),
                    },
                );
                true
            }
        }
    }

    fn remove(&mut self, conn: ConnId) -> Option<Departure> {
        let user_id = self.conns.shift_remove(&conn)?;
        let entry = self.users.get_mut(&user_id)?;
        entry.connections -= 1;
        let stopped_typing = entry.typing.shift_remove(&conn) && entry.typing.is_empty();
        let departure = Departure {
            user: entry.user.clone(),
            stopped_typing,
            left: entry.connections == 0,
        };
        if departure.left {
            self.users.shift_remove(&user_id);
        }
        Some(departure)
    }

    fn snapshot(&self) -> Vec<OnlineUser> {
        self.users.values().map(|u| u.user.clone()).collect()
    }

    fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

struct Hub {
    rx: mpsc::Receiver<HubCommand>,
    members: HashMap<ConnId, Member>,
    rooms: HashMap<SessionId, Room>,
    max_line_length: usize,
}

impl Hub {
    fn new(rx: mpsc::Receiver<HubCommand>, max_line_length: usize) -> Self {
        Self {
            rx,
            members: HashMap::new(),
            rooms: HashMap::new(),
            max_line_length,
        }
    }

    async fn run(mut self) {
        info!("hub started");
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        info!("hub stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { conn, tx } => {
                debug!(conn, "connection registered");
                self.members.insert(conn, Member { tx, joined: None });
            }
            HubCommand::Client { conn, event } => self.on_client_event(conn, event),
            HubCommand::Disconnect { conn } => {
                self.leave(conn);
                if self.members.remove(&conn).is_some() {
                    debug!(conn, "connection unregistered");
                }
            }
            HubCommand::RoomMembers { session, reply } => {
                let users = self
                    .rooms
                    .get(&session)
                    .map(Room::snapshot)
                    .unwrap_or_default();
                let _ = reply.send(users);
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(HubStats {
                    connections: self.members.len(),
                    rooms: self.rooms.len(),
                });
            }
        }
    }

    fn on_client_event(&mut self, conn: ConnId, event: ClientEvent) {
        trace!(conn, kind = event.kind(), "client event");
        match event {
            ClientEvent::SessionJoin { session_id, user } => self.join(conn, session_id, user),
            ClientEvent::MessageSend { text } => self.message(conn, text),
            ClientEvent::TypingStart => self.typing(conn, true),
            ClientEvent::TypingStop => self.typing(conn, false),
        }
    }

    fn join(&mut self, conn: ConnId, session: SessionId, user: OnlineUser) {
        let Some(previous) = self.members.get(&conn).map(|m| m.joined.clone()) else {
            warn!(conn, "session:join from unregistered connection");
            return;
        };
        if user.user_id.is_empty() || session.is_empty() {
            warn!(conn, "rejecting session:join with empty user or session id");
            return;
        }

        if let Some(joined) = previous {
            if joined.session == session && joined.user_id == user.user_id {
                // Re-announce on the same socket: just refresh the client
                self.send_snapshot(conn, &session);
                return;
            }
            self.leave(conn);
        }

        let first = self.rooms.entry(session.clone()).or_default().add(conn, user.clone());
        if let Some(member) = self.members.get_mut(&conn) {
            member.joined = Some(Joined {
                session: session.clone(),
                user_id: user.user_id.clone(),
            });
        }
        info!(conn, session = %session, user = %user.user_id, first, "joined session");

        self.send_snapshot(conn, &session);
        if first {
            let user_id = user.user_id.clone();
            self.broadcast(&session, Some(&user_id), ChannelEvent::PresenceJoin(user));
        }
    }

    /// Remove `conn` from its room. Announces `typing:stop` if it was the
    /// user's last typing connection and `presence:leave` if it was their
    /// last connection.
    fn leave(&mut self, conn: ConnId) {
        let Some(joined) = self.members.get_mut(&conn).and_then(|m| m.joined.take()) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&joined.session) else {
            return;
        };
        let departure = room.remove(conn);
        if room.is_empty() {
            self.rooms.remove(&joined.session);
            debug!(session = %joined.session, "room closed");
        }

        let Some(departure) = departure else {
            return;
        };
        if departure.stopped_typing {
            let stop = ChannelEvent::TypingStop(departure.user.as_typing());
            self.broadcast(&joined.session, Some(&joined.user_id), stop);
        }
        if departure.left {
            info!(session = %joined.session, user = %joined.user_id, "left session");
            self.broadcast(&joined.session, None, ChannelEvent::PresenceLeave(departure.user));
        }
    }

    fn message(&mut self, conn: ConnId, text: String) {
        let Some(joined) = self.joined(conn, "message:send") else {
            return;
        };
        if text.trim().is_empty() {
            debug!(conn, "dropping blank message");
            return;
        }
        let Some(author) = self
            .rooms
            .get(&joined.session)
            .and_then(|r| r.users.get(&joined.user_id))
        else {
            return;
        };

        let msg = ChatMessage::new(
            MessageId::generate(),
            joined.user_id.clone(),
            author.user.display_name(),
            text,
            now_millis(),
        );
        let id = msg.id.clone();
        let event = ChannelEvent::MessageNew(msg);
        match serde_json::to_string(&event) {
            Ok(frame) if frame.len() > self.max_line_length => {
                warn!(
                    conn,
                    len = frame.len(),
                    max = self.max_line_length,
                    "rejecting message too large to relay"
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(conn, error = %e, "failed to encode message");
                return;
            }
        }
        debug!(session = %joined.session, id = %id, "message relayed");
        self.broadcast(&joined.session, None, event);
    }

    fn typing(&mut self, conn: ConnId, start: bool) {
        let kind = if start { "typing:start" } else { "typing:stop" };
        let Some(joined) = self.joined(conn, kind) else {
            return;
        };
        let Some(entry) = self
            .rooms
            .get_mut(&joined.session)
            .and_then(|r| r.users.get_mut(&joined.user_id))
        else {
            return;
        };
        let was_typing = entry.is_typing();
        if start {
            entry.typing.insert(conn);
        } else {
            entry.typing.shift_remove(&conn);
        }
        if entry.is_typing() == was_typing {
            trace!(conn, kind, "typing state unchanged for user");
            return;
        }

        let typer = entry.user.as_typing();
        let event = if start {
            ChannelEvent::TypingStart(typer)
        } else {
            ChannelEvent::TypingStop(typer)
        };
        self.broadcast(&joined.session, Some(&joined.user_id), event);
    }

    /// The connection's room membership, or a warning if it never joined.
    fn joined(&self, conn: ConnId, kind: &str) -> Option<Joined> {
        let joined = self.members.get(&conn).and_then(|m| m.joined.clone());
        if joined.is_none() {
            warn!(conn, kind, "rejecting event before session:join");
        }
        joined
    }

    /// Full roster plus anyone already typing, to one connection.
    fn send_snapshot(&self, conn: ConnId, session: &SessionId) {
        let Some(room) = self.rooms.get(session) else {
            return;
        };
        let own = room.conns.get(&conn);
        self.deliver(conn, ChannelEvent::PresenceSnapshot { users: room.snapshot() });
        for entry in room.users.values() {
            if entry.is_typing() && Some(&entry.user.user_id) != own {
                self.deliver(conn, ChannelEvent::TypingStart(entry.user.as_typing()));
            }
        }
    }

    /// Send `event` to every connection in `session`, skipping connections
    /// owned by `except`.
    fn broadcast(&self, session: &SessionId, except: Option<&UserId>, event: ChannelEvent) {
        let Some(room) = self.rooms.get(session) else {
            return;
        };
        for (conn, user_id) in &room.conns {
            if Some(user_id) != except {
                self.deliver(*conn, event.clone());
            }
        }
    }

    fn deliver(&self, conn: ConnId, event: ChannelEvent) {
        if let Some(member) = self.members.get(&conn) {
            if member.tx.send(event).is_err() {
                // Its socket task is gone and will unregister shortly
                trace!(conn, "dropping event for closed connection");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

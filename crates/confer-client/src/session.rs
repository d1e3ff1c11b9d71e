//! Collaboration session facade.
//!
//! [`CollabSession`] composes the reconciler, presence tracker, typing
//! controller and mention autocomplete behind one interface. It owns every
//! piece of mutable state; callers drive it from a single task:
//!
//! ```text
//!   loop {
//!       select! {
//!           update = session.next_update() => render(update),
//!           input  = ui.next_input()       => session.composer_input(..),
//!       }
//!   }
//! ```
//!
//! Three sources wake the session: the one-shot history pull, the live
//! channel, and the typing debounce timer. Each wake is processed to
//! completion before the next is considered.

use std::future::pending;
use std::sync::Arc;

use confer_types::{
    ChannelEvent, ChatMessage, ClientEvent, HistoryRecord, MessageId, OnlineUser, SessionId,
    TypingUser, UserId,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::constants::CLOSE_FLUSH_TIMEOUT;
use crate::mention::{ComposerKey, KeyOutcome, MentionAutocomplete, MentionSegment, tokenize};
use crate::presence::PresenceTracker;
use crate::reconcile::{HistoryState, MergeOutcome, Reconciler};
use crate::transport::{
    ChannelError, ConnectionStatus, HistoryError, HistorySource, LiveTransport, TransportEvent,
};
use crate::typing::{TimerFired, TypingController, TypingRoster, TypingSignal, typing_label};

// ============================================================================
// Error / Update Types
// ============================================================================

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("live channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// What changed after one call to [`CollabSession::next_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// History snapshot merged into the message list.
    HistoryLoaded { count: usize },
    /// History pull failed; the session continues on live messages alone.
    HistoryFailed,
    /// A live message was applied.
    Message { id: MessageId, outcome: MergeOutcome },
    /// Online roster changed.
    Presence,
    /// Remote typing roster changed.
    Typing,
    /// The local debounce timer ran out and this signal was published.
    LocalTyping(TypingSignal),
    /// Transport reported a status change.
    Connection(ConnectionStatus),
    /// The live channel is gone; no further updates will arrive.
    Closed,
}

type HistoryResult = Result<Vec<HistoryRecord>, HistoryError>;

/// Which source woke the session.
enum Wake {
    History(HistoryResult),
    Inbound(Option<TransportEvent>),
    Timer(TimerFired),
    Prune,
}

// ============================================================================
// CollabSession
// ============================================================================

/// One user's view of one collaboration session.
pub struct CollabSession {
    session_id: SessionId,
    local: OnlineUser,

    reconciler: Reconciler,
    presence: PresenceTracker,
    typing: TypingController,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    remote_typing: TypingRoster,
    autocomplete: MentionAutocomplete,

    outbound: Option<mpsc::UnboundedSender<ClientEvent>>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    driver: Option<JoinHandle<()>>,
    history_rx: Option<oneshot::Receiver<HistoryResult>>,
    history_task: Option<JoinHandle<()>>,
    status: ConnectionStatus,
    closed: bool,

    draft: String,
    caret: usize,
}

impl CollabSession {
    /// Open a session: start the history pull, connect the live channel,
    /// and announce ourselves with `session:join`.
    pub async fn open(
        config: &SessionConfig,
        local: OnlineUser,
        session_id: SessionId,
        history: Arc<dyn HistorySource>,
        transport: &dyn LiveTransport,
    ) -> Result<Self, SessionError> {
        let (history_tx, history_rx) = oneshot::channel();
        let history_timeout = config.history_timeout();
        let fetch_id = session_id.clone();
        let history_task = tokio::spawn(async move {
            let result = match tokio::time::timeout(history_timeout, history.fetch(&fetch_id)).await {
                Ok(result) => result,
                Err(_) => Err(HistoryError::Timeout),
            };
            let _ = history_tx.send(result);
        });

        let link = match transport.connect().await {
            Ok(link) => link,
            Err(e) => {
                history_task.abort();
                return Err(e.into());
            }
        };

        let (typing, timer_rx) = TypingController::channel(config.typing_timeout());
        let session = Self {
            session_id,
            local,
            reconciler: Reconciler::new(),
            presence: PresenceTracker::new(),
            typing,
            timer_rx,
            remote_typing: TypingRoster::new(config.remote_typing_ttl()),
            autocomplete: MentionAutocomplete::new(),
            outbound: Some(link.outbound),
            inbound: link.inbound,
            driver: link.driver,
            history_rx: Some(history_rx),
            history_task: Some(history_task),
            status: ConnectionStatus::Connected,
            closed: false,
            draft: String::new(),
            caret: 0,
        };
        session.announce()?;
        info!(
            session = %session.session_id,
            user = %session.local.user_id,
            "Collaboration session opened"
        );
        Ok(session)
    }

    // ── Event loop ───────────────────────────────────────────────────────

    /// Wait for the next change and apply it.
    ///
    /// Returns `None` after [`SessionUpdate::Closed`] has been delivered.
    /// Cancel-safe: dropping the future before it resolves loses no events.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            if self.closed {
                return None;
            }

            let prune_at = self.remote_typing.next_expiry();
            let wake = tokio::select! {
                result = wait_history(&mut self.history_rx) => Wake::History(result),
                event = self.inbound.recv() => Wake::Inbound(event),
                Some(fired) = self.timer_rx.recv() => Wake::Timer(fired),
                _ = sleep_until_opt(prune_at) => Wake::Prune,
            };

            let update = match wake {
                Wake::History(result) => self.on_history(result),
                Wake::Inbound(Some(TransportEvent::Event(event))) => self.on_channel_event(event),
                Wake::Inbound(Some(TransportEvent::Status(status))) => self.on_status(status),
                Wake::Inbound(None) => Some(self.on_channel_closed()),
                Wake::Timer(fired) => self.on_timer(fired),
                Wake::Prune => self.on_prune(),
            };
            if let Some(update) = update {
                return Some(update);
            }
        }
    }

    fn on_history(&mut self, result: HistoryResult) -> Option<SessionUpdate> {
        self.history_rx = None;
        self.history_task = None;
        match result {
            Ok(records) => {
                let messages: Vec<ChatMessage> = records.into_iter().map(ChatMessage::from).collect();
                let count = messages.len();
                self.reconciler
                    .apply_history(messages)
                    .then_some(SessionUpdate::HistoryLoaded { count })
            }
            Err(e) => {
                warn!(
                    session = %self.session_id,
                    error = %e,
                    "History unavailable, continuing with live messages only"
                );
                self.reconciler.history_failed();
                Some(SessionUpdate::HistoryFailed)
            }
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) -> Option<SessionUpdate> {
        debug!("Channel event: {}", event.kind());
        match event {
            ChannelEvent::MessageNew(msg) => {
                let id = msg.id.clone();
                let outcome = self.reconciler.apply_live(msg);
                Some(SessionUpdate::Message { id, outcome })
            }
            ChannelEvent::PresenceSnapshot { users } => {
                self.presence.apply_snapshot(users);
                let presence = &self.presence;
                self.remote_typing.retain(|id| presence.is_online(id));
                self.refresh_candidates();
                Some(SessionUpdate::Presence)
            }
            ChannelEvent::PresenceJoin(user) => {
                self.presence.apply_join(user);
                self.refresh_candidates();
                Some(SessionUpdate::Presence)
            }
            ChannelEvent::PresenceLeave(user) => {
                self.presence.apply_leave(&user.user_id);
                self.remote_typing.remove(&user.user_id);
                self.refresh_candidates();
                Some(SessionUpdate::Presence)
            }
            ChannelEvent::TypingStart(user) => {
                if user.user_id == self.local.user_id {
                    trace!("Ignoring own typing:start echo");
                    return None;
                }
                self.remote_typing
                    .apply_start(user, Instant::now())
                    .then_some(SessionUpdate::Typing)
            }
            ChannelEvent::TypingStop(user) => self
                .remote_typing
                .remove(&user.user_id)
                .then_some(SessionUpdate::Typing),
        }
    }

    fn on_status(&mut self, status: ConnectionStatus) -> Option<SessionUpdate> {
        if status == self.status {
            return None;
        }
        info!(session = %self.session_id, "Connection status: {:?}", status);

        if status.is_connected() {
            // The relay forgot us with the old socket
            if let Err(e) = self.announce() {
                warn!(error = %e, "Failed to re-announce after reconnect");
            }
        } else {
            self.drop_live_state();
        }
        self.status = status.clone();
        Some(SessionUpdate::Connection(status))
    }

    fn on_channel_closed(&mut self) -> SessionUpdate {
        info!(session = %self.session_id, "Live channel closed");
        self.closed = true;
        if self.status.is_connected() {
            self.status = ConnectionStatus::Disconnected;
        }
        self.drop_live_state();
        SessionUpdate::Closed
    }

    fn on_timer(&mut self, fired: TimerFired) -> Option<SessionUpdate> {
        let signal = self.typing.on_timer(fired)?;
        if let Err(e) = self.publish(signal.into()) {
            warn!(error = %e, "Failed to publish typing:stop");
        }
        Some(SessionUpdate::LocalTyping(signal))
    }

    fn on_prune(&mut self) -> Option<SessionUpdate> {
        let expired = self.remote_typing.prune(Instant::now());
        if expired == 0 {
            return None;
        }
        debug!("Expired {} remote typing indicators", expired);
        Some(SessionUpdate::Typing)
    }

    /// Presence and remote typing are only trustworthy while connected.
    fn drop_live_state(&mut self) {
        self.presence.clear();
        self.remote_typing.clear();
        self.refresh_candidates();
        // The relay already broadcast our typing:stop when the socket dropped
        let _ = self.typing.force_stop();
    }

    fn refresh_candidates(&mut self) {
        self.autocomplete
            .refresh_candidates(&self.presence, &self.local.user_id);
    }

    // ── Outbound ─────────────────────────────────────────────────────────

    fn announce(&self) -> Result<(), SessionError> {
        self.publish(ClientEvent::SessionJoin {
            session_id: self.session_id.clone(),
            user: self.local.clone(),
        })
    }

    fn publish(&self, event: ClientEvent) -> Result<(), SessionError> {
        trace!("Publishing {}", event.kind());
        self.outbound
            .as_ref()
            .ok_or(ChannelError::Closed)?
            .send(event)
            .map_err(|_| ChannelError::Closed)?;
        Ok(())
    }

    /// Publish a chat message.
    ///
    /// Blank text is rejected with `Ok(false)`. Otherwise typing stops, the
    /// autocomplete and draft reset, and the trimmed text goes out. There is
    /// no local echo: the message appears when the relay broadcasts it back.
    pub fn send_message(&mut self, text: &str) -> Result<bool, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring blank message");
            return Ok(false);
        }

        if let Some(signal) = self.typing.force_stop() {
            self.publish(signal.into())?;
        }
        self.autocomplete.reset();
        self.draft.clear();
        self.caret = 0;
        self.publish(ClientEvent::MessageSend { text: text.to_string() })?;
        Ok(true)
    }

    /// Send whatever is in the composer.
    pub fn send_draft(&mut self) -> Result<bool, SessionError> {
        let draft = std::mem::take(&mut self.draft);
        let sent = self.send_message(&draft)?;
        if !sent {
            self.draft = draft;
        }
        Ok(sent)
    }

    /// Forward composer activity to the typing controller.
    pub fn set_typing(&mut self, is_composing: bool) -> Result<(), SessionError> {
        if let Some(signal) = self.typing.on_input(is_composing) {
            self.publish(signal.into())?;
        }
        Ok(())
    }

    // ── Composer ─────────────────────────────────────────────────────────

    /// Feed the composer's current text and caret (char index).
    ///
    /// Drives typing and mention autocomplete together. Returns whether the
    /// candidate list is open.
    pub fn composer_input(&mut self, text: impl Into<String>, caret: usize) -> Result<bool, SessionError> {
        self.draft = text.into();
        self.caret = caret.min(self.draft.chars().count());
        self.set_typing(!self.draft.is_empty())?;
        Ok(self.autocomplete.on_input(
            &self.draft,
            self.caret,
            &self.presence,
            &self.local.user_id,
        ))
    }

    /// Apply a composer key. A committed mention is written into the draft
    /// before it is returned.
    pub fn composer_key(&mut self, key: ComposerKey) -> Result<KeyOutcome, SessionError> {
        let outcome = self.autocomplete.handle_key(key, &self.draft, self.caret);
        if let KeyOutcome::Committed(edit) = &outcome {
            self.draft = edit.text.clone();
            self.caret = edit.caret;
            self.set_typing(true)?;
        }
        Ok(outcome)
    }

    // ── Views ────────────────────────────────────────────────────────────

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn local_user(&self) -> &OnlineUser {
        &self.local
    }

    /// The reconciled message list.
    pub fn messages(&self) -> &[ChatMessage] {
        self.reconciler.messages()
    }

    /// Bumped every time [`messages`](Self::messages) changes.
    pub fn messages_version(&self) -> u64 {
        self.reconciler.version()
    }

    pub fn history_state(&self) -> HistoryState {
        self.reconciler.history_state()
    }

    pub fn online_users(&self) -> impl Iterator<Item = &OnlineUser> {
        self.presence.users()
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Remote participants currently typing. Never includes the local user.
    pub fn typing_users(&self) -> Vec<TypingUser> {
        self.remote_typing.users_excluding(&self.local.user_id)
    }

    pub fn typing_label(&self) -> Option<String> {
        typing_label(&self.typing_users(), &self.local.user_id)
    }

    pub fn is_typing(&self) -> bool {
        self.typing.is_typing()
    }

    pub fn autocomplete(&self) -> &MentionAutocomplete {
        &self.autocomplete
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn connection_status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Render segments for one message.
    pub fn segments(&self, message: &ChatMessage) -> Vec<MentionSegment> {
        tokenize(&message.message)
    }

    /// Online users mentioned in `text`, matched by display name, in order
    /// of first mention.
    pub fn resolve_mentions(&self, text: &str) -> Vec<UserId> {
        let mut ids: Vec<UserId> = Vec::new();
        for segment in tokenize(text) {
            let Some(token) = segment.user_id else { continue };
            if let Some(user) = self.presence.find_by_name(&token) {
                if !ids.contains(&user.user_id) {
                    ids.push(user.user_id.clone());
                }
            }
        }
        ids
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Flush a pending `typing:stop`, unsubscribe, and wait briefly for the
    /// transport to drain.
    pub async fn close(mut self) {
        if let Some(signal) = self.typing.shutdown() {
            if let Err(e) = self.publish(signal.into()) {
                warn!(error = %e, "Failed to flush typing:stop on close");
            }
        }
        self.outbound = None;

        if let Some(driver) = self.driver.take() {
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, driver).await.is_err() {
                warn!("Transport did not drain within {:?}", CLOSE_FLUSH_TIMEOUT);
            }
        }
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        info!(session = %self.session_id, "Collaboration session closed");
    }
}

impl Drop for CollabSession {
    fn drop(&mut self) {
        // Best effort when close() was skipped; the timer is cancelled either way
        if let (Some(signal), Some(outbound)) = (self.typing.shutdown(), &self.outbound) {
            let _ = outbound.send(signal.into());
        }
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CollabSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollabSession")
            .field("session_id", &self.session_id)
            .field("local", &self.local.user_id)
            .field("messages", &self.reconciler.messages().len())
            .field("online", &self.presence.len())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

async fn wait_history(rx: &mut Option<oneshot::Receiver<HistoryResult>>) -> HistoryResult {
    match rx.as_mut() {
        Some(rx) => rx
            .await
            .unwrap_or_else(|_| Err(HistoryError::Unavailable("history task dropped".into()))),
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use confer_types::HistoryUser;

    use crate::transport::{RemoteEnd, StaticHistory, memory_pair};

    fn me() -> OnlineUser {
        OnlineUser::new("me", "Mia", "Park", "mia@example.com")
    }

    fn bob() -> OnlineUser {
        OnlineUser::new("u2", "Bob", "", "bob@example.com")
    }

    fn jane() -> OnlineUser {
        OnlineUser::new("u3", "Jane", "Doe", "jane@example.com")
    }

    fn record(id: &str, secs: i64, text: &str) -> HistoryRecord {
        HistoryRecord {
            id: MessageId::from(id),
            user_id: UserId::from("u2"),
            message: text.to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            user: HistoryUser {
                first_name: Some("Bob".into()),
                last_name: None,
                email: None,
            },
        }
    }

    async fn open_with(history: StaticHistory) -> (CollabSession, RemoteEnd) {
        let (transport, mut remote) = memory_pair();
        let session = CollabSession::open(
            &SessionConfig::default(),
            me(),
            SessionId::from("room-1"),
            Arc::new(history),
            &transport,
        )
        .await
        .unwrap();
        // session:join
        assert!(matches!(remote.recv().await, Some(ClientEvent::SessionJoin { .. })));
        (session, remote)
    }

    /// Collect updates until nothing arrives for a short while.
    async fn settle(session: &mut CollabSession) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(Some(update)) =
            tokio::time::timeout(Duration::from_millis(50), session.next_update()).await
        {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_open_announces_join() {
        let (transport, mut remote) = memory_pair();
        let _session = CollabSession::open(
            &SessionConfig::default(),
            me(),
            SessionId::from("room-1"),
            Arc::new(StaticHistory::empty()),
            &transport,
        )
        .await
        .unwrap();
        assert_eq!(
            remote.recv().await,
            Some(ClientEvent::SessionJoin { session_id: SessionId::from("room-1"), user: me() })
        );
    }

    #[tokio::test]
    async fn test_history_and_live_merge() {
        let history = StaticHistory::new(vec![record("m1", 100, "first"), record("m2", 200, "old")]);
        let (mut session, remote) = open_with(history).await;

        remote.push(ChannelEvent::MessageNew(ChatMessage::new("m2", "u2", "Bob", "edited", 200_000)));
        remote.push(ChannelEvent::MessageNew(ChatMessage::new("m3", "u2", "Bob", "third", 300_000)));

        let updates = settle(&mut session).await;
        assert!(updates.contains(&SessionUpdate::HistoryLoaded { count: 2 }));
        assert_eq!(session.history_state(), HistoryState::Loaded { count: 2 });

        let view: Vec<(&str, &str)> = session
            .messages()
            .iter()
            .map(|m| (m.id.as_str(), m.message.as_str()))
            .collect();
        assert_eq!(view, vec![("m1", "first"), ("m2", "edited"), ("m3", "third")]);
    }

    #[tokio::test]
    async fn test_history_failure_degrades() {
        let (mut session, remote) = open_with(StaticHistory::failing("503")).await;
        remote.push(ChannelEvent::MessageNew(ChatMessage::new("m1", "u2", "Bob", "hi", 1)));

        let updates = settle(&mut session).await;
        assert!(updates.contains(&SessionUpdate::HistoryFailed));
        assert_eq!(session.history_state(), HistoryState::Failed);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_send_rejected() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        assert!(!session.send_message("   \n\t").unwrap());
        assert!(remote.drain().is_empty());
    }

    #[tokio::test]
    async fn test_send_stops_typing_without_echo() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        session.composer_input("  hi ", 5).unwrap();
        assert!(session.send_draft().unwrap());

        assert_eq!(
            remote.drain(),
            vec![
                ClientEvent::TypingStart,
                ClientEvent::TypingStop,
                ClientEvent::MessageSend { text: "hi".into() },
            ]
        );
        assert!(!session.is_typing());
        assert_eq!(session.draft(), "");
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_drop_emits_typing_stop() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        session.set_typing(true).unwrap();
        drop(session);
        assert_eq!(remote.drain(), vec![ClientEvent::TypingStart, ClientEvent::TypingStop]);
        assert!(remote.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_emits_typing_stop() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        session.set_typing(true).unwrap();
        session.close().await;
        assert_eq!(remote.drain(), vec![ClientEvent::TypingStart, ClientEvent::TypingStop]);
        assert!(remote.is_client_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_timeout_publishes_stop() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        session.composer_input("h", 1).unwrap();
        let started = Instant::now();

        loop {
            match session.next_update().await {
                Some(SessionUpdate::LocalTyping(signal)) => {
                    assert_eq!(signal, TypingSignal::Stop);
                    break;
                }
                Some(_) => continue,
                None => panic!("session closed"),
            }
        }
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(remote.drain(), vec![ClientEvent::TypingStart, ClientEvent::TypingStop]);
    }

    #[tokio::test]
    async fn test_self_typing_excluded() {
        let (mut session, remote) = open_with(StaticHistory::empty()).await;
        remote.push(ChannelEvent::PresenceSnapshot { users: vec![me(), bob()] });
        remote.push(ChannelEvent::TypingStart(me().as_typing()));
        remote.push(ChannelEvent::TypingStart(bob().as_typing()));
        settle(&mut session).await;

        assert_eq!(session.typing_users(), vec![bob().as_typing()]);
        assert_eq!(session.typing_label().as_deref(), Some("Bob is typing…"));
    }

    #[tokio::test]
    async fn test_leave_clears_typing() {
        let (mut session, remote) = open_with(StaticHistory::empty()).await;
        remote.push(ChannelEvent::PresenceSnapshot { users: vec![me(), bob()] });
        remote.push(ChannelEvent::TypingStart(bob().as_typing()));
        remote.push(ChannelEvent::PresenceLeave(bob()));
        settle(&mut session).await;

        assert!(session.typing_users().is_empty());
        assert_eq!(session.online_users().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_typing_expires() {
        let (mut session, remote) = open_with(StaticHistory::empty()).await;
        remote.push(ChannelEvent::TypingStart(bob().as_typing()));
        settle(&mut session).await;
        assert_eq!(session.typing_users().len(), 1);

        assert_eq!(session.next_update().await, Some(SessionUpdate::Typing));
        assert!(session.typing_users().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_clears_and_reconnect_rejoins() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        remote.push(ChannelEvent::PresenceSnapshot { users: vec![me(), bob()] });
        remote.push(ChannelEvent::TypingStart(bob().as_typing()));
        remote.status(ConnectionStatus::Disconnected);
        settle(&mut session).await;

        assert_eq!(session.connection_status(), &ConnectionStatus::Disconnected);
        assert_eq!(session.online_users().count(), 0);
        assert!(session.typing_users().is_empty());

        remote.status(ConnectionStatus::Connected);
        let updates = settle(&mut session).await;
        assert!(updates.contains(&SessionUpdate::Connection(ConnectionStatus::Connected)));
        assert!(matches!(remote.try_recv(), Some(ClientEvent::SessionJoin { .. })));
    }

    #[tokio::test]
    async fn test_composer_commits_mention() {
        let (mut session, mut remote) = open_with(StaticHistory::empty()).await;
        remote.push(ChannelEvent::PresenceSnapshot { users: vec![me(), bob(), jane()] });
        settle(&mut session).await;

        assert!(session.composer_input("hi @Ja", 6).unwrap());
        assert_eq!(session.autocomplete().candidates(), &[jane()]);

        let outcome = session.composer_key(ComposerKey::Enter { shift: false }).unwrap();
        assert!(matches!(outcome, KeyOutcome::Committed(_)));
        assert_eq!(session.draft(), r#"hi @"Jane Doe" "#);
        assert_eq!(session.caret(), session.draft().chars().count());
        assert_eq!(session.resolve_mentions(session.draft()), vec![UserId::from("u3")]);

        // Closed list: Enter means send
        assert_eq!(session.composer_key(ComposerKey::Enter { shift: false }).unwrap(), KeyOutcome::Send);
        assert!(session.send_draft().unwrap());
        assert!(!session.autocomplete().is_open());
        let sent = remote.drain();
        assert_eq!(
            sent.last(),
            Some(&ClientEvent::MessageSend { text: r#"hi @"Jane Doe""#.into() })
        );
    }

    #[tokio::test]
    async fn test_roster_change_reclamps_selection() {
        let (mut session, remote) = open_with(StaticHistory::empty()).await;
        remote.push(ChannelEvent::PresenceSnapshot { users: vec![me(), bob(), jane()] });
        settle(&mut session).await;

        session.composer_input("@", 1).unwrap();
        session.composer_key(ComposerKey::ArrowDown).unwrap();
        assert_eq!(session.autocomplete().state().selected_index, 1);

        remote.push(ChannelEvent::PresenceLeave(jane()));
        settle(&mut session).await;
        assert_eq!(session.autocomplete().candidates(), &[bob()]);
        assert_eq!(session.autocomplete().state().selected_index, 0);
    }

    #[tokio::test]
    async fn test_channel_closed() {
        let (mut session, remote) = open_with(StaticHistory::empty()).await;
        drop(remote);

        let updates = settle(&mut session).await;
        assert_eq!(updates.last(), Some(&SessionUpdate::Closed));
        assert_eq!(session.next_update().await, None);
        assert!(matches!(
            session.send_message("hello"),
            Err(SessionError::Channel(ChannelError::Closed))
        ));
    }

    #[tokio::test]
    async fn test_segments() {
        let (session, _remote) = open_with(StaticHistory::empty()).await;
        let msg = ChatMessage::new("m1", "u2", "Bob", "cc @Mia", 1);
        let segments = session.segments(&msg);
        assert_eq!(segments.len(), 2);
        assert!(segments[1].is_mention);
    }
}

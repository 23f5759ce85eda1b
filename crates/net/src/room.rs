//! Room attachment event loop
//!
//! One task per attached room. Snapshot, channel frames, the one-second
//! countdown tick and user commands are all handled as turns of a single
//! `select!` loop, so the session projection has exactly one writer.

use std::sync::Arc;
use std::time::Duration;

use agora_core::{Clock, LocalIdentity, Participant, SessionState, Side, SidePolicy, SystemClock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, RwLock, RwLockReadGuard};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connector::{Inbound, SessionConnector, DEFAULT_CONNECT_TIMEOUT};
use crate::dispatcher::{prepare, send, Action, Dispatch, SkipReason};
use crate::error::Error;
use crate::router::{route, Applied};
use crate::snapshot::SnapshotSource;
use crate::transport::Dialer;

const EVENT_BUFFER: usize = 256;

/// Called once when room entry fails for good
pub type FailureHook = Box<dyn FnOnce(&Error) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Side picking when the caller supplied none
    pub side_policy: SidePolicy,
    pub connect_timeout: Duration,
    /// Local countdown driver period
    pub tick: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            side_policy: SidePolicy::Random,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tick: Duration::from_secs(1),
        }
    }
}

/// Event from the room loop to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    SnapshotLoaded,
    /// Channel ready, subscriptions in place and join sent
    Joined(Participant),
    Applied(Applied),
    /// An inbound message was discarded
    Malformed(String),
    /// The local countdown reached zero
    TimeExpired,
    Dispatched { action: Action, outcome: Dispatch },
    /// Room entry failed; return to the lobby
    Fatal(String),
    /// The channel dropped after joining. Not retried.
    ChannelLost(String),
    Left,
}

enum RoomCommand {
    Act {
        action: Action,
        reply: oneshot::Sender<Dispatch>,
    },
    Leave,
}

/// Builder for one room attachment
pub struct Room {
    room_id: String,
    identity: LocalIdentity,
    side: Option<Side>,
    config: RoomConfig,
    source: Arc<dyn SnapshotSource>,
    dialer: Arc<dyn Dialer>,
    clock: Arc<dyn Clock>,
    on_failure: Option<FailureHook>,
}

impl Room {
    pub fn new(
        room_id: impl Into<String>,
        identity: LocalIdentity,
        source: Arc<dyn SnapshotSource>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            identity,
            side: None,
            config: RoomConfig::default(),
            source,
            dialer,
            clock: Arc::new(SystemClock),
            on_failure: None,
        }
    }

    /// Join with this side instead of consulting the side policy
    pub fn side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn on_failure(mut self, hook: impl FnOnce(&Error) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Box::new(hook));
        self
    }

    /// Spawn the room loop
    pub fn enter(self) -> RoomHandle {
        let state = Arc::new(RwLock::new(SessionState::new(
            self.room_id.clone(),
            self.identity.clone(),
        )));
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(room_task(self, state.clone(), event_tx, cmd_rx));

        RoomHandle {
            state,
            event_rx,
            cmd_tx,
        }
    }
}

/// Presentation-side handle: read state, receive events, send intents
pub struct RoomHandle {
    state: Arc<RwLock<SessionState>>,
    event_rx: mpsc::Receiver<RoomEvent>,
    cmd_tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.event_rx.recv().await
    }

    /// Read-only view of the session projection
    pub async fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    /// Submit a local intent and wait for its dispatch outcome
    pub async fn act(&self, action: Action) -> Dispatch {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(RoomCommand::Act { action, reply })
            .await
            .is_err()
        {
            return Dispatch::Skipped(SkipReason::NotConnected);
        }
        rx.await
            .unwrap_or(Dispatch::Skipped(SkipReason::NotConnected))
    }

    /// Leave the room. Any fetch still in flight is discarded.
    pub async fn leave(&self) {
        let _ = self.cmd_tx.send(RoomCommand::Leave).await;
    }
}

async fn room_task(
    mut room: Room,
    state: Arc<RwLock<SessionState>>,
    event_tx: mpsc::Sender<RoomEvent>,
    mut cmd_rx: mpsc::Receiver<RoomCommand>,
) {
    let room_id = room.room_id.clone();
    info!(room_id = %room_id, "Entering room");

    // Snapshot, abandoned if the user leaves first
    let snapshot = {
        let load = room.source.load(&room_id);
        tokio::pin!(load);
        loop {
            tokio::select! {
                result = &mut load => break result,
                cmd = cmd_rx.recv() => match cmd {
                    Some(RoomCommand::Act { reply, .. }) => {
                        let _ = reply.send(Dispatch::Skipped(SkipReason::NotConnected));
                    }
                    Some(RoomCommand::Leave) | None => {
                        info!(room_id = %room_id, "Left before snapshot arrived");
                        let _ = event_tx.send(RoomEvent::Left).await;
                        return;
                    }
                }
            }
        }
    };

    let snapshot = match snapshot {
        Ok(snapshot) => snapshot,
        Err(e) => {
            fail(&mut room, &event_tx, Error::Snapshot(e)).await;
            return;
        }
    };

    {
        let now = room.clock.now_ms();
        let mut s = state.write().await;
        s.apply_status(snapshot.status, now);
        s.replace_roster(snapshot.roster);
        s.replace_tally(snapshot.tally);
        s.replace_arguments(snapshot.arguments);
    }
    let _ = event_tx.send(RoomEvent::SnapshotLoaded).await;

    // Channel and join handshake
    let side = room
        .side
        .unwrap_or_else(|| room.config.side_policy.choose());
    let me = Participant::for_identity(&room.identity, side);
    let mut connector = SessionConnector::new(room.dialer.clone())
        .with_connect_timeout(room.config.connect_timeout);

    let connected = {
        let connect = connector.connect(&room_id, me.clone());
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => break Some(result),
                cmd = cmd_rx.recv() => match cmd {
                    Some(RoomCommand::Act { reply, .. }) => {
                        let _ = reply.send(Dispatch::Skipped(SkipReason::NotConnected));
                    }
                    Some(RoomCommand::Leave) | None => break None,
                }
            }
        }
    };

    match connected {
        None => {
            info!(room_id = %room_id, "Left while connecting");
            connector.leave().await;
            let _ = event_tx.send(RoomEvent::Left).await;
            return;
        }
        Some(Err(e)) => {
            fail(&mut room, &event_tx, e).await;
            return;
        }
        Some(Ok(())) => {
            state.write().await.set_me(me.clone());
            let _ = event_tx.send(RoomEvent::Joined(me)).await;
        }
    }

    // Main loop
    let mut ticker = tokio::time::interval_at(Instant::now() + room.config.tick, room.config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lost = None;

    loop {
        tokio::select! {
            inbound = connector.next_inbound() => match inbound {
                Some(Inbound::Message { topic, body }) => {
                    let now = room.clock.now_ms();
                    let result = {
                        let mut s = state.write().await;
                        route(&mut s, topic, &body, now)
                    };
                    match result {
                        Ok(applied) => emit(&event_tx, RoomEvent::Applied(applied)),
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "Discarded inbound message");
                            emit(&event_tx, RoomEvent::Malformed(e.to_string()));
                        }
                    }
                }
                Some(Inbound::ServerError(reason)) => {
                    lost = Some(reason);
                    break;
                }
                Some(Inbound::Closed) | None => {
                    lost = Some("channel closed".to_string());
                    break;
                }
            },

            _ = ticker.tick() => {
                let expired = state.write().await.tick();
                if expired.is_some() {
                    info!(room_id = %room_id, "Countdown expired");
                    emit(&event_tx, RoomEvent::TimeExpired);
                    let outcome = perform(&mut connector, &state, Action::Expire).await;
                    emit(&event_tx, RoomEvent::Dispatched { action: Action::Expire, outcome });
                }
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(RoomCommand::Act { action, reply }) => {
                    let outcome = perform(&mut connector, &state, action.clone()).await;
                    debug!(action = ?action, outcome = ?outcome, "Dispatched");
                    let _ = reply.send(outcome);
                    emit(&event_tx, RoomEvent::Dispatched { action, outcome });
                }
                Some(RoomCommand::Leave) | None => break,
            },
        }
    }

    // Later intents fail fast instead of waiting on a loop that is gone
    drop(cmd_rx);
    connector.leave().await;
    state.write().await.clear_me();
    if let Some(reason) = lost {
        warn!(reason = %reason, "Session channel lost");
        let _ = event_tx.send(RoomEvent::ChannelLost(reason)).await;
    }
    info!(room_id = %room_id, "Left room");
    let _ = event_tx.send(RoomEvent::Left).await;
}

/// Validate under a short read lock, then send with the lock released
async fn perform(
    connector: &mut SessionConnector,
    state: &RwLock<SessionState>,
    action: Action,
) -> Dispatch {
    if !connector.is_connected() {
        return Dispatch::Skipped(SkipReason::NotConnected);
    }
    let prepared = prepare(&*state.read().await, action);
    match prepared {
        Ok(outbound) => send(connector, outbound).await,
        Err(reason) => Dispatch::Skipped(reason),
    }
}

/// Hand an event to the presentation layer without waiting on a slow reader
fn emit(event_tx: &mpsc::Sender<RoomEvent>, event: RoomEvent) {
    match event_tx.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(event)) => {
            warn!(event = ?event, "Event reader is behind, dropping event");
        }
    }
}

async fn fail(room: &mut Room, event_tx: &mpsc::Sender<RoomEvent>, e: Error) {
    error!(room_id = %room.room_id, error = %e, "Room entry failed");
    if let Some(hook) = room.on_failure.take() {
        hook(&e);
    }
    let _ = event_tx.send(RoomEvent::Fatal(e.to_string())).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use agora_core::{FixedClock, Phase, PhaseChange, StatusUpdate, VoteTally};
    use async_trait::async_trait;

    use crate::error::SnapshotError;
    use crate::frame::{Command, Frame};
    use crate::snapshot::Snapshot;
    use crate::transport::{MemoryDialer, MemoryPeer};

    const T: i64 = 1_700_000_000_000;

    struct StaticSource(Option<Snapshot>);

    #[async_trait]
    impl SnapshotSource for StaticSource {
        async fn load(&self, room_id: &str) -> Result<Snapshot, SnapshotError> {
            self.0
                .clone()
                .ok_or_else(|| SnapshotError::RoomNotFound(room_id.to_string()))
        }
    }

    struct PendingSource;

    #[async_trait]
    impl SnapshotSource for PendingSource {
        async fn load(&self, _room_id: &str) -> Result<Snapshot, SnapshotError> {
            std::future::pending().await
        }
    }

    fn snapshot(phase: Phase, duration_seconds: u64) -> Snapshot {
        Snapshot {
            status: StatusUpdate {
                phase,
                room_id: Some("r1".into()),
                message: Some("Welcome".into()),
                topic: Some("Should we colonise Mars?".into()),
                start_time: Some(T),
                duration_seconds: Some(duration_seconds),
            },
            roster: Vec::new(),
            tally: VoteTally::new(1, 2),
            arguments: Vec::new(),
        }
    }

    fn ready_peer(dialer: &MemoryDialer) -> MemoryPeer {
        let peer = dialer.push();
        peer.send_frame(&Frame::new(Command::Connected).header("version", "1.2"));
        peer
    }

    fn room(source: impl SnapshotSource + 'static, dialer: Arc<MemoryDialer>) -> Room {
        Room::new(
            "r1",
            LocalIdentity::new("me", "Guest-7"),
            Arc::new(source),
            dialer,
        )
        .clock(Arc::new(FixedClock(T)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_expire_and_leave() {
        let dialer = Arc::new(MemoryDialer::new());
        let mut peer = ready_peer(&dialer);
        let mut handle = room(StaticSource(Some(snapshot(Phase::Active, 3))), dialer)
            .side(Side::For)
            .enter();

        assert_eq!(handle.next_event().await, Some(RoomEvent::SnapshotLoaded));
        match handle.next_event().await {
            Some(RoomEvent::Joined(me)) => {
                assert_eq!(me.id, "me");
                assert_eq!(me.side, Side::For);
            }
            other => panic!("Expected join, got {:?}", other),
        }
        {
            let s = handle.state().await;
            assert_eq!(s.phase(), Phase::Active);
            assert_eq!(s.tally(), VoteTally::new(1, 2));
            assert_eq!(s.countdown().remaining(), 3);
            assert!(s.me().is_some());
        }

        // Three local ticks run the clock out
        assert_eq!(handle.next_event().await, Some(RoomEvent::TimeExpired));
        assert_eq!(
            handle.next_event().await,
            Some(RoomEvent::Dispatched {
                action: Action::Expire,
                outcome: Dispatch::Sent
            })
        );
        let ended = peer
            .drain_frames()
            .into_iter()
            .find(|f| f.get("destination") == Some("/app/r1/status.update"))
            .expect("status request sent");
        assert!(ended.body.contains(r#""type":"ENDED""#));

        // Authority confirms
        peer.send_frame(
            &Frame::new(Command::Message)
                .header("subscription", "sub-1-2")
                .with_body(r#"{"type":"ENDED","message":"Time is up!"}"#),
        );
        assert_eq!(
            handle.next_event().await,
            Some(RoomEvent::Applied(Applied::Phase(PhaseChange::Changed {
                from: Phase::Active,
                to: Phase::Ended
            })))
        );

        handle.leave().await;
        assert_eq!(handle.next_event().await, Some(RoomEvent::Left));
        let frames = peer.drain_frames();
        assert_eq!(frames.last().map(|f| f.command), Some(Command::Disconnect));
        assert!(handle.state().await.me().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_fatal() {
        let dialer = Arc::new(MemoryDialer::new());
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let mut handle = room(StaticSource(None), dialer)
            .on_failure(move |e| {
                assert!(matches!(e, Error::Snapshot(SnapshotError::RoomNotFound(_))));
                flag.store(true, Ordering::SeqCst);
            })
            .enter();

        match handle.next_event().await {
            Some(RoomEvent::Fatal(reason)) => assert!(reason.contains("r1")),
            other => panic!("Expected fatal, got {:?}", other),
        }
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(handle.next_event().await, None);
        assert_eq!(
            handle.act(Action::Start).await,
            Dispatch::Skipped(SkipReason::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let dialer = Arc::new(MemoryDialer::new());
        let mut handle = room(StaticSource(Some(snapshot(Phase::Waiting, 600))), dialer).enter();

        assert_eq!(handle.next_event().await, Some(RoomEvent::SnapshotLoaded));
        assert!(matches!(handle.next_event().await, Some(RoomEvent::Fatal(_))));
    }

    #[tokio::test]
    async fn test_leave_during_snapshot_discards_fetch() {
        let dialer = Arc::new(MemoryDialer::new());
        let mut handle = room(PendingSource, dialer).enter();

        assert_eq!(
            handle.act(Action::SendChat("early".into())).await,
            Dispatch::Skipped(SkipReason::NotConnected)
        );
        handle.leave().await;
        assert_eq!(handle.next_event().await, Some(RoomEvent::Left));
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn test_side_policy_none_blocks_arguments() {
        let dialer = Arc::new(MemoryDialer::new());
        let mut peer = ready_peer(&dialer);
        let config = RoomConfig {
            side_policy: SidePolicy::None,
            ..RoomConfig::default()
        };
        let mut handle = room(StaticSource(Some(snapshot(Phase::Waiting, 600))), dialer)
            .config(config)
            .enter();

        assert_eq!(handle.next_event().await, Some(RoomEvent::SnapshotLoaded));
        assert!(matches!(handle.next_event().await, Some(RoomEvent::Joined(_))));
        peer.drain_frames();

        let outcome = handle.act(Action::SubmitArgument("Because.".into())).await;
        assert_eq!(outcome, Dispatch::Skipped(SkipReason::NoSide));
        assert!(peer.drain_frames().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_is_reported_and_skipped() {
        let dialer = Arc::new(MemoryDialer::new());
        let peer = ready_peer(&dialer);
        let mut handle = room(StaticSource(Some(snapshot(Phase::Waiting, 600))), dialer)
            .side(Side::Against)
            .enter();

        assert_eq!(handle.next_event().await, Some(RoomEvent::SnapshotLoaded));
        assert!(matches!(handle.next_event().await, Some(RoomEvent::Joined(_))));

        let vote = |body: &str| {
            Frame::new(Command::Message)
                .header("subscription", "sub-1-3")
                .with_body(body)
        };
        peer.send_frame(&vote("{bad"));
        peer.send_frame(&vote(r#"{"for":4,"against":5}"#));

        assert!(matches!(handle.next_event().await, Some(RoomEvent::Malformed(_))));
        assert_eq!(
            handle.next_event().await,
            Some(RoomEvent::Applied(Applied::Tally(VoteTally::new(4, 5))))
        );
    }

    #[tokio::test]
    async fn test_act_answers_while_events_back_up() {
        let dialer = Arc::new(MemoryDialer::new());
        let mut peer = ready_peer(&dialer);
        let mut handle = room(StaticSource(Some(snapshot(Phase::Waiting, 600))), dialer)
            .side(Side::For)
            .enter();

        assert_eq!(handle.next_event().await, Some(RoomEvent::SnapshotLoaded));
        assert!(matches!(handle.next_event().await, Some(RoomEvent::Joined(_))));
        peer.drain_frames();

        // Nobody reads events while the authority floods the chat
        for i in 0..(EVENT_BUFFER + 44) {
            peer.send_frame(
                &Frame::new(Command::Message)
                    .header("subscription", "sub-1-1")
                    .with_body(format!(r#"{{"type":"CHAT","content":"msg {}","sender":"b"}}"#, i)),
            );
        }

        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            handle.act(Action::SendChat("hi".into())),
        )
        .await
        .expect("room loop stalled behind a full event channel");
        assert_eq!(outcome, Dispatch::Sent);

        // The projection keeps up even though events were dropped
        let caught_up = tokio::time::timeout(Duration::from_secs(3), async {
            while handle.state().await.chat().len() < EVENT_BUFFER + 44 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(caught_up.is_ok());

        handle.leave().await;
        assert!(tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(event) = handle.next_event().await {
                if event == RoomEvent::Left {
                    break;
                }
            }
        })
        .await
        .is_ok());
        let sent = peer.drain_frames();
        assert!(sent
            .iter()
            .any(|f| f.get("destination") == Some("/app/r1/chat.sendMessage")));
        assert_eq!(sent.last().map(|f| f.command), Some(Command::Disconnect));
    }

    #[tokio::test]
    async fn test_channel_loss_is_not_retried() {
        let dialer = Arc::new(MemoryDialer::new());
        let peer = ready_peer(&dialer);
        let mut handle = room(StaticSource(Some(snapshot(Phase::Waiting, 600))), dialer)
            .side(Side::For)
            .enter();

        assert_eq!(handle.next_event().await, Some(RoomEvent::SnapshotLoaded));
        assert!(matches!(handle.next_event().await, Some(RoomEvent::Joined(_))));

        drop(peer);
        assert!(matches!(handle.next_event().await, Some(RoomEvent::ChannelLost(_))));
        assert_eq!(handle.next_event().await, Some(RoomEvent::Left));
        assert!(handle.state().await.me().is_none());
        assert_eq!(
            handle.act(Action::Start).await,
            Dispatch::Skipped(SkipReason::NotConnected)
        );
    }
}

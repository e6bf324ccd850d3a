//! Room session: keeps one client's game and membership in step with peers.
//!
//! The session owns its channel subscription. Every change to the game is
//! applied locally first and then broadcast as the full state; every
//! `game_update` received overwrites local state (last writer wins). Messages
//! are handled one at a time to completion, so no locking is involved.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, trace, warn};

use crate::channel::{ChannelMessage, RealtimeChannel, RealtimeClient, SubscribeStatus};
use crate::config::RoomConfig;
use crate::error::SessionError;
use crate::event_log::{EventLog, EventLogger, GameEvent};
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::state::{
    game::{GameUpdate, GAME_UPDATE_EVENT},
    presence::{MembershipError, Occupant, PresenceEvent, PresenceMeta, SyncOutcome},
    GameState, Mark, RoomMembership, RoomState, SessionEvent, SessionPhase,
};
use crate::view::RoomView;

/// User-visible signals raised while handling channel traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotice {
    /// Someone joined the room
    PlayerJoined { name: String },
    /// Someone left the room
    PlayerLeft { name: String },
    /// A join was refused because two players are seated
    RoomFull,
    /// The local client is not seated in a full room and has left it
    Evicted,
    /// The subscription failed; the user has to re-enter the room
    ConnectionLost(SubscribeStatus),
}

/// One client's session in one room.
#[derive(Debug)]
pub struct RoomSession<C: RealtimeChannel> {
    room_id: String,
    config: RoomConfig,
    identity: LocalIdentity,
    channel: C,
    phase: SessionPhase,
    state: RoomState,
    started_at: DateTime<Utc>,
    events: EventLogger,
    /// Own join, logged once a presence sync seats the local client
    pending_own_join: Option<String>,
}

impl<C: RealtimeChannel> RoomSession<C> {
    /// Start a session: resolve identity, open the room channel and subscribe.
    ///
    /// Presence is announced once the channel confirms the subscription.
    #[instrument(skip(client, identity_provider, event_log, config))]
    pub fn start<R>(
        client: &R,
        identity_provider: &dyn IdentityProvider,
        event_log: Option<Box<dyn EventLog>>,
        room_id: &str,
        config: RoomConfig,
    ) -> Result<Self, SessionError>
    where
        R: RealtimeClient<Channel = C>,
    {
        let started_at = Utc::now();
        let identity = LocalIdentity::resolve(identity_provider, started_at);
        let topic = config.topic_for(room_id);

        let mut channel = client.open(&topic, &identity.key)?;
        let mut phase = SessionPhase::default();
        if let Err(e) = phase.apply_mut(SessionEvent::Subscribe {
            topic: topic.clone(),
        }) {
            warn!(error = %e, "Unexpected lifecycle state");
        }
        channel.subscribe()?;

        let events = if config.event_logging {
            EventLogger::new(room_id, event_log)
        } else {
            EventLogger::disabled(room_id)
        };

        info!(topic = %topic, key = %identity.key, "Room session started");

        Ok(Self {
            room_id: room_id.to_string(),
            config,
            identity,
            channel,
            phase,
            state: RoomState::new(),
            started_at,
            events,
            pending_own_join: None,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn game(&self) -> &GameState {
        &self.state.game
    }

    pub fn membership(&self) -> &RoomMembership {
        &self.state.membership
    }

    pub fn version(&self) -> u64 {
        self.state.version()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Own presence key once the room has synced.
    pub fn current_player(&self) -> Option<&str> {
        self.state.current_player()
    }

    /// Mark assigned to the local client, if seated.
    pub fn local_mark(&self) -> Option<Mark> {
        self.state.local_mark()
    }

    pub fn is_local_turn(&self) -> bool {
        self.state.is_local_turn()
    }

    /// Render the room as the local client sees it.
    pub fn view(&self) -> RoomView {
        RoomView::build(
            &self.room_id,
            &self.state.game,
            &self.state.membership,
            self.current_player(),
            self.config.identity_gating,
        )
    }

    /// Wait until every event recorded so far has reached the event store.
    pub fn flush_events(&self) {
        self.events.flush();
    }

    /// Handle every message queued on the channel.
    pub fn pump(&mut self) -> Result<Vec<RoomNotice>, SessionError> {
        let mut notices = Vec::new();
        while let Some(message) = self.channel.try_next() {
            notices.extend(self.handle(message)?);
        }
        Ok(notices)
    }

    /// Handle one channel message.
    #[instrument(level = "debug", skip(self, message), fields(room_id = %self.room_id))]
    pub fn handle(&mut self, message: ChannelMessage) -> Result<Vec<RoomNotice>, SessionError> {
        if self.phase.is_terminal() {
            trace!(phase = %self.phase, "Message after session end dropped");
            return Ok(Vec::new());
        }

        match message {
            ChannelMessage::Status(status) => self.on_status(status),
            ChannelMessage::Presence(PresenceEvent::Sync { state }) => {
                match self.state.sync_presence(&state, &self.identity.key) {
                    SyncOutcome::Evicted => self.evict(),
                    SyncOutcome::Replaced | SyncOutcome::Trimmed { .. } => {
                        self.confirm_own_join();
                        Ok(Vec::new())
                    }
                }
            }
            ChannelMessage::Presence(PresenceEvent::Join { key, new_presences }) => {
                Ok(self.on_join(Occupant::from_metas(key, &new_presences)))
            }
            ChannelMessage::Presence(PresenceEvent::Leave { key, .. }) => Ok(self.on_leave(&key)),
            ChannelMessage::Broadcast { event, payload } => {
                if event == GAME_UPDATE_EVENT {
                    self.on_game_update(&payload);
                } else {
                    trace!(event = %event, "Unhandled broadcast");
                }
                Ok(Vec::new())
            }
        }
    }

    fn on_status(&mut self, status: SubscribeStatus) -> Result<Vec<RoomNotice>, SessionError> {
        if status != SubscribeStatus::Subscribed {
            warn!(status = %status, "Room subscription lost");
            let held = self.phase.holds_channel();
            if let Err(e) = self.phase.apply_mut(SessionEvent::Close) {
                warn!(error = %e, "Close after subscription loss");
            }
            if held {
                if let Err(e) = self.channel.unsubscribe() {
                    debug!(error = %e, "Unsubscribe after failure");
                }
            }
            return Ok(vec![RoomNotice::ConnectionLost(status)]);
        }

        if let Err(e) = self.phase.apply_mut(SessionEvent::Subscribed) {
            debug!(error = %e, "Duplicate subscribe confirmation");
            return Ok(Vec::new());
        }

        self.channel
            .track(PresenceMeta::new(self.identity.name.clone(), Utc::now()))?;
        info!(key = %self.identity.key, "Presence announced");
        Ok(Vec::new())
    }

    fn on_join(&mut self, occupant: Occupant) -> Vec<RoomNotice> {
        let name = occupant.name.clone();
        let is_self = occupant.key == self.identity.key;
        match self.state.membership.add(occupant) {
            Ok(()) if is_self => {
                info!(player = %name, "Own presence joined");
                self.pending_own_join = Some(name.clone());
                vec![RoomNotice::PlayerJoined { name }]
            }
            Ok(()) => {
                info!(player = %name, "Player joined");
                self.events.record(GameEvent::PlayerJoin {
                    player: name.clone(),
                });
                vec![RoomNotice::PlayerJoined { name }]
            }
            Err(MembershipError::Full) => {
                warn!(player = %name, "Room is full, join refused");
                vec![RoomNotice::RoomFull]
            }
            Err(MembershipError::AlreadyMember) => Vec::new(),
        }
    }

    /// Log the own join once the room has seated the local client.
    fn confirm_own_join(&mut self) {
        if let Some(name) = self.pending_own_join.take() {
            self.events.record(GameEvent::PlayerJoin { player: name });
        }
    }

    fn on_leave(&mut self, key: &str) -> Vec<RoomNotice> {
        match self.state.membership.remove(key) {
            Some(occupant) => {
                info!(player = %occupant.name, "Player left");
                self.events.record(GameEvent::PlayerLeave {
                    player: occupant.name.clone(),
                });
                vec![RoomNotice::PlayerLeft {
                    name: occupant.name,
                }]
            }
            None => Vec::new(),
        }
    }

    fn on_game_update(&mut self, payload: &serde_json::Value) {
        let update = match GameUpdate::from_payload(payload) {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "Malformed game update dropped");
                return;
            }
        };

        if self
            .state
            .receive_update(&update, self.config.reject_stale_updates)
        {
            debug!(
                version = update.version,
                winner = ?update.winner,
                "Remote state applied"
            );
        }
    }

    fn evict(&mut self) -> Result<Vec<RoomNotice>, SessionError> {
        if let Err(e) = self.phase.apply_mut(SessionEvent::Evict) {
            warn!(error = %e, "Eviction outside an open session");
        }
        if let Some(name) = self.pending_own_join.take() {
            debug!(player = %name, "Own join not logged, room was full");
        }
        warn!(key = %self.identity.key, "Room is full, leaving");
        self.channel.unsubscribe()?;
        Ok(vec![RoomNotice::RoomFull, RoomNotice::Evicted])
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Evicted => Err(SessionError::Evicted),
            SessionPhase::Closed => Err(SessionError::Closed),
            _ => Ok(()),
        }
    }

    fn publish(&mut self) -> Result<(), SessionError> {
        let payload = self.state.to_update().to_payload();
        self.channel.broadcast(GAME_UPDATE_EVENT, payload)?;
        Ok(())
    }

    /// Play the local mark on `index`.
    ///
    /// Returns `false` without touching state when the click is not allowed:
    /// occupied cell, decided game, or (with identity gating) not the local
    /// turn.
    #[instrument(skip(self), fields(room_id = %self.room_id))]
    pub fn click(&mut self, index: usize) -> Result<bool, SessionError> {
        if self.phase.is_terminal() {
            debug!("Click after session end ignored");
            return Ok(false);
        }

        let mark = match self.state.play_local(index, self.config.identity_gating) {
            Ok(mark) => mark,
            Err(reason) => {
                debug!(reason = %reason, "Click ignored");
                return Ok(false);
            }
        };

        self.events.record(GameEvent::PlayerMove {
            player: mark,
            position: index,
        });
        if let Some(winner) = self.state.game.winner {
            info!(winner = %winner, "Game decided");
            self.events.record(GameEvent::GameEnd { winner });
        }

        self.publish()?;
        Ok(true)
    }

    /// Start a new game and tell peers.
    #[instrument(skip(self), fields(room_id = %self.room_id))]
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;

        self.state.reset();
        info!("Game reset");

        self.events.record(GameEvent::GameReset);
        self.publish()
    }

    /// End the session and release the presence slot.
    #[instrument(skip(self), fields(room_id = %self.room_id))]
    pub fn end(&mut self) -> Result<(), SessionError> {
        if self.phase.is_terminal() {
            return Ok(());
        }

        let topic = self.phase.topic().map(str::to_string);
        if let Err(e) = self.phase.apply_mut(SessionEvent::Close) {
            warn!(error = %e, "Close outside an open session");
        }
        self.channel.unsubscribe()?;
        info!(topic = ?topic, "Room session ended");
        Ok(())
    }
}

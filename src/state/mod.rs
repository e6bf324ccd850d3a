//! Pure room state.
//!
//! Nothing here talks to the network:
//!
//! - `board` - Marks, the 3x3 board and win detection
//! - `game` - Game state, move application and the `game_update` payload
//! - `presence` - Room membership driven by presence notifications
//! - `turn` - Whose turn it is and whether a click is allowed
//! - `phase` - Room session lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          RoomState                           │
//! │                                                              │
//! │  ┌───────────────┐   ┌────────────────┐   ┌──────────────┐   │
//! │  │   GameState   │   │ RoomMembership │   │ current key  │   │
//! │  │ board, turn,  │   │ [X occupant,   │   │ (own presence│   │
//! │  │ winner        │   │  O occupant]   │   │  key)        │   │
//! │  └───────┬───────┘   └───────┬────────┘   └──────┬───────┘   │
//! │          │                   │                   │           │
//! │          └──────────── turn::gate_click ─────────┘           │
//! │                              │                               │
//! │                     GameState::apply_move                    │
//! │                              │                               │
//! │                       board::evaluate                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use tracing::debug;

pub mod board;
pub mod game;
pub mod phase;
pub mod presence;
pub mod turn;

// Re-export commonly used types
pub use board::{evaluate, Board, Mark, Winner, BOARD_CELLS, WINNING_LINES};
pub use game::{GameState, GameUpdate, MoveRejected, GAME_UPDATE_EVENT};
pub use phase::{InvalidTransition, SessionEvent, SessionPhase};
pub use presence::{
    MembershipError, Occupant, PresenceEntry, PresenceEvent, PresenceMeta, RoomMembership,
    SyncOutcome, MAX_ROOM_OCCUPANTS,
};

/// Session-scoped room store.
///
/// Holds everything one client knows about its room and exposes the only
/// ways to change it: local moves, resets, remote updates and presence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomState {
    pub game: GameState,
    pub membership: RoomMembership,
    /// Own presence key, learned from a presence sync
    current_player: Option<String>,
    /// Version of the applied game state
    version: u64,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_player(&self) -> Option<&str> {
        self.current_player.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Mark assigned to the local client, if seated.
    pub fn local_mark(&self) -> Option<Mark> {
        self.membership.mark_of(self.current_player()?)
    }

    pub fn is_local_turn(&self) -> bool {
        turn::is_local_turn(&self.game, &self.membership, self.current_player())
    }

    /// Apply a click on `index` by the local client. Returns the placed mark.
    ///
    /// State is unchanged on rejection.
    pub fn play_local(&mut self, index: usize, identity_gating: bool) -> Result<Mark, MoveRejected> {
        let mark = turn::gate_click(
            &self.game,
            &self.membership,
            self.current_player(),
            index,
            identity_gating,
        )?;
        self.game = self.game.apply_move(index, mark)?;
        self.version += 1;
        Ok(mark)
    }

    /// Start over with an empty board.
    pub fn reset(&mut self) {
        self.game = self.game.reset();
        self.version += 1;
    }

    /// Overwrite the game with a peer's update.
    ///
    /// With `reject_stale` an update older than the applied version is
    /// ignored and `false` returned.
    pub fn receive_update(&mut self, update: &GameUpdate, reject_stale: bool) -> bool {
        if reject_stale && update.version < self.version {
            debug!(
                received = update.version,
                applied = self.version,
                "Stale game update ignored"
            );
            return false;
        }

        self.game = update.state();
        self.version = update.version;
        true
    }

    /// Replace membership with a presence snapshot and learn the own key.
    pub fn sync_presence(&mut self, state: &[PresenceEntry], local_key: &str) -> SyncOutcome {
        let outcome = self.membership.sync(state, local_key);
        if outcome != SyncOutcome::Evicted {
            self.current_player = Some(local_key.to_string());
        }
        outcome
    }

    /// Payload announcing the current game.
    pub fn to_update(&self) -> GameUpdate {
        self.game.to_update(self.version)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "game": self.game.to_json(),
            "membership": self.membership.to_json(),
            "current_player": self.current_player,
            "version": self.version
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn seated(local: &str) -> RoomState {
        let meta = PresenceMeta::new("P", Utc::now());
        let state: Vec<PresenceEntry> = ["a", "b"]
            .into_iter()
            .map(|key| PresenceEntry {
                key: key.to_string(),
                metas: vec![meta.clone()],
            })
            .collect();
        let mut room = RoomState::new();
        room.sync_presence(&state, local);
        room
    }

    #[test]
    fn test_room_state_basic() {
        let mut room = seated("a");
        assert_eq!(room.current_player(), Some("a"));
        assert_eq!(room.local_mark(), Some(Mark::X));

        assert_eq!(room.play_local(0, true), Ok(Mark::X));
        assert_eq!(room.version(), 1);
        assert!(!room.is_local_turn());
    }

    #[test]
    fn test_gated_click_by_wrong_identity_changes_nothing() {
        let mut room = seated("b");
        let before = room.clone();

        assert_eq!(room.play_local(0, true), Err(MoveRejected::NotYourTurn));
        assert_eq!(room, before);
    }

    #[test]
    fn test_update_round_trip_reproduces_state() {
        let mut sender = seated("a");
        sender.play_local(4, true).unwrap();

        let payload = sender.to_update().to_payload();
        let update = GameUpdate::from_payload(&payload).unwrap();

        let mut receiver = seated("b");
        assert!(receiver.receive_update(&update, true));
        assert_eq!(receiver.game, sender.game);
        assert_eq!(receiver.version(), sender.version());
        assert!(receiver.is_local_turn());
    }

    #[test]
    fn test_reset_bumps_version() {
        let mut room = seated("a");
        room.play_local(0, true).unwrap();
        room.reset();

        assert_eq!(room.game, GameState::new());
        assert_eq!(room.version(), 2);
    }
}

//! Game state management.
//!
//! Tracks the board, whose mark moves next and the decided result. State is
//! replaced wholesale on every transition so the same value can be broadcast
//! to peers and applied on arrival.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::board::{evaluate, Board, Mark, Winner, BOARD_CELLS};

/// Broadcast event name carrying a [`GameUpdate`].
pub const GAME_UPDATE_EVENT: &str = "game_update";

/// Why a move was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MoveRejected {
    #[display("Cell index is off the board")]
    OutOfRange,
    #[display("Cell is already occupied")]
    Occupied,
    #[display("Game is already decided")]
    GameOver,
    #[display("Mark does not match the current turn")]
    WrongMark,
    #[display("It's not your turn")]
    NotYourTurn,
}

/// Board, turn flag and result for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub is_x_next: bool,
    pub winner: Option<Winner>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Empty board, X to move, undecided.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            is_x_next: true,
            winner: None,
        }
    }

    /// Mark that moves next.
    pub fn current_mark(&self) -> Mark {
        Mark::for_turn(self.is_x_next)
    }

    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }

    /// Check whether a cell could take a mark right now, ignoring identity.
    pub fn check_cell(&self, index: usize) -> Result<(), MoveRejected> {
        if index >= BOARD_CELLS {
            return Err(MoveRejected::OutOfRange);
        }
        if self.winner.is_some() {
            return Err(MoveRejected::GameOver);
        }
        if !self.board.is_empty_at(index) {
            return Err(MoveRejected::Occupied);
        }
        Ok(())
    }

    /// Apply a move, returning the next state.
    ///
    /// The current state is left untouched on rejection.
    #[instrument(level = "debug", skip(self), fields(is_x_next = self.is_x_next))]
    pub fn apply_move(&self, index: usize, acting: Mark) -> Result<Self, MoveRejected> {
        self.check_cell(index)?;
        if acting != self.current_mark() {
            return Err(MoveRejected::WrongMark);
        }

        let mut board = self.board;
        board.set(index, acting);
        let winner = evaluate(&board);

        debug!(index, mark = %acting, winner = ?winner, "Move applied");

        Ok(Self {
            board,
            is_x_next: !self.is_x_next,
            winner,
        })
    }

    /// Initial state, regardless of the current one.
    pub fn reset(&self) -> Self {
        Self::new()
    }

    /// Payload announcing this state to peers.
    pub fn to_update(&self, version: u64) -> GameUpdate {
        GameUpdate {
            board: self.board,
            is_x_next: self.is_x_next,
            winner: self.winner,
            version,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "board": self.board.to_json(),
            "is_x_next": self.is_x_next,
            "current_mark": self.current_mark().as_str(),
            "winner": self.winner.map(|w| w.as_str())
        })
    }
}

/// `game_update` broadcast payload: the full state, never a delta.
///
/// `version` is absent on peers that do not track it and reads as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub board: Board,
    pub is_x_next: bool,
    pub winner: Option<Winner>,
    #[serde(default)]
    pub version: u64,
}

impl GameUpdate {
    /// Parse a broadcast payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }

    pub fn to_payload(&self) -> serde_json::Value {
        // Serializing plain data with derived impls cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// State carried by this update.
    pub fn state(&self) -> GameState {
        GameState {
            board: self.board,
            is_x_next: self.is_x_next,
            winner: self.winner,
        }
    }
}

impl From<GameUpdate> for GameState {
    fn from(update: GameUpdate) -> Self {
        update.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn play(moves: &[usize]) -> GameState {
        moves.iter().fold(GameState::new(), |state, &index| {
            state.apply_move(index, state.current_mark()).unwrap()
        })
    }

    #[test]
    fn test_game_new() {
        let state = GameState::new();
        assert!(state.is_x_next);
        assert_eq!(state.winner, None);
        assert_eq!(state.board.filled(), 0);
        assert_eq!(state.current_mark(), Mark::X);
    }

    #[test]
    fn test_move_flips_turn() {
        let state = GameState::new().apply_move(4, Mark::X).unwrap();
        assert_eq!(state.board.get(4), Some(Mark::X));
        assert!(!state.is_x_next);
        assert_eq!(state.current_mark(), Mark::O);
    }

    #[test]
    fn test_top_row_scenario() {
        let state = play(&[0, 4, 1, 5, 2]);
        assert_eq!(state.winner, Some(Winner::X));
    }

    #[test]
    fn test_draw_scenario() {
        // X O X / X O O / O X X
        let state = play(&[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(state.winner, Some(Winner::Draw));
        assert!(state.board.is_full());
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let state = play(&[0]);
        assert_eq!(state.apply_move(0, Mark::O), Err(MoveRejected::Occupied));
    }

    #[test]
    fn test_move_after_win_rejected() {
        let state = play(&[0, 4, 1, 5, 2]);
        assert_eq!(state.apply_move(8, Mark::O), Err(MoveRejected::GameOver));
    }

    #[test]
    fn test_wrong_mark_and_range_rejected() {
        let state = GameState::new();
        assert_eq!(state.apply_move(0, Mark::O), Err(MoveRejected::WrongMark));
        assert_eq!(state.apply_move(9, Mark::X), Err(MoveRejected::OutOfRange));
    }

    #[test]
    fn test_reset_from_any_state() {
        for moves in [&[][..], &[0, 4][..], &[0, 4, 1, 5, 2][..]] {
            assert_eq!(play(moves).reset(), GameState::new());
        }
    }

    #[test]
    fn test_update_round_trip() {
        let state = play(&[0, 4, 1]);
        let payload = state.to_update(3).to_payload();
        let update = GameUpdate::from_payload(&payload).unwrap();
        assert_eq!(update.version, 3);
        assert_eq!(GameState::from(update), state);
    }

    #[test]
    fn test_update_wire_shape() {
        let payload = play(&[0, 4, 1, 5, 2]).to_update(5).to_payload();
        assert_eq!(
            payload,
            serde_json::json!({
                "board": ["X", "X", "X", null, "O", "O", null, null, null],
                "isXNext": false,
                "winner": "X",
                "version": 5
            })
        );
    }

    #[test]
    fn test_update_without_version() {
        let payload = serde_json::json!({
            "board": [null, null, null, null, null, null, null, null, null],
            "isXNext": true,
            "winner": null
        });
        let update = GameUpdate::from_payload(&payload).unwrap();
        assert_eq!(update.version, 0);
        assert_eq!(update.state(), GameState::new());
    }

    #[test]
    fn test_update_rejects_unknown_winner() {
        let payload = serde_json::json!({
            "board": [null, null, null, null, null, null, null, null, null],
            "isXNext": true,
            "winner": "Z"
        });
        assert!(GameUpdate::from_payload(&payload).is_err());
    }
}

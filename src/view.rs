//! Room rendering.
//!
//! A [`RoomView`] is a snapshot of what the local client shows: who is in
//! the room, whose turn it is, the board and the result.

use std::fmt;

use crate::state::{
    presence::MAX_ROOM_OCCUPANTS, turn, Board, GameState, Mark, RoomMembership, Winner,
};

/// One occupant line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLine {
    pub name: String,
    pub mark: Mark,
    pub is_you: bool,
}

/// Turn indicator, shown only with two occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnLine {
    YourTurn,
    OpponentsTurn,
}

impl TurnLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YourTurn => "Your turn",
            Self::OpponentsTurn => "Opponent's turn",
        }
    }
}

/// What the local client renders for a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub room_id: String,
    pub players: Vec<PlayerLine>,
    pub turn: Option<TurnLine>,
    /// Whether cells accept clicks from the local client right now
    pub board_enabled: bool,
    pub board: Board,
    pub result: Option<Winner>,
}

impl RoomView {
    /// Snapshot for `local_key`. Without identity gating either client may
    /// move, so the board stays open to the local client until the game ends.
    pub fn build(
        room_id: &str,
        game: &GameState,
        membership: &RoomMembership,
        local_key: Option<&str>,
        identity_gating: bool,
    ) -> Self {
        let players = membership
            .occupants()
            .iter()
            .zip([Mark::X, Mark::O])
            .map(|(o, mark)| PlayerLine {
                name: o.name.clone(),
                mark,
                is_you: local_key == Some(o.key.as_str()),
            })
            .collect();

        let your_turn = !identity_gating || turn::is_local_turn(game, membership, local_key);
        let turn = membership.is_full().then(|| {
            if your_turn {
                TurnLine::YourTurn
            } else {
                TurnLine::OpponentsTurn
            }
        });

        Self {
            room_id: room_id.to_string(),
            players,
            turn,
            board_enabled: your_turn && !game.is_decided(),
            board: game.board,
            result: game.winner,
        }
    }

    /// The restart control is offered once the game is decided.
    pub fn can_restart(&self) -> bool {
        self.result.is_some()
    }

    /// Result banner text.
    pub fn result_line(&self) -> Option<String> {
        self.result.map(|winner| match winner {
            Winner::Draw => "It's a draw!".to_string(),
            other => format!("{} wins!", other),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        let players: Vec<serde_json::Value> = self
            .players
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "mark": p.mark.as_str(),
                    "is_you": p.is_you
                })
            })
            .collect();

        serde_json::json!({
            "room_id": self.room_id,
            "players": players,
            "capacity": MAX_ROOM_OCCUPANTS,
            "turn": self.turn.map(|t| t.as_str()),
            "board_enabled": self.board_enabled,
            "board": self.board.to_json(),
            "result": self.result_line(),
            "can_restart": self.can_restart()
        })
    }
}

impl fmt::Display for RoomView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Room: {}", self.room_id)?;
        writeln!(
            f,
            "Players in room: {} / {}",
            self.players.len(),
            MAX_ROOM_OCCUPANTS
        )?;
        for (i, player) in self.players.iter().enumerate() {
            let you = if player.is_you { " (You)" } else { "" };
            writeln!(f, "Player {}: {}{}", i + 1, player.name, you)?;
        }
        if let Some(turn) = self.turn {
            writeln!(f, "{}", turn.as_str())?;
        }
        write!(f, "{}", self.board)?;
        if let Some(line) = self.result_line() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

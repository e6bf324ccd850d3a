//! Board and win detection.
//!
//! The board is nine cells in row-major order. Win detection scans a fixed
//! list of lines and is pure: same board, same answer.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// The eight winning lines, scanned in this order: rows, columns, diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A player mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }

    /// Mark whose turn it is for the given turn flag.
    pub fn for_turn(is_x_next: bool) -> Self {
        if is_x_next {
            Self::X
        } else {
            Self::O
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decided result of a game.
///
/// Serializes as `"X"`, `"O"` or `"Draw"`, matching the broadcast schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    Draw,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
            Self::Draw => "Draw",
        }
    }

    /// The winning mark, if the game was not drawn.
    pub fn mark(&self) -> Option<Mark> {
        match self {
            Self::X => Some(Mark::X),
            Self::O => Some(Mark::O),
            Self::Draw => None,
        }
    }
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Self::X,
            Mark::O => Self::O,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 3x3 board, cells indexed 0..9 row by row. Empty cells are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([Option<Mark>; BOARD_CELLS]);

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from its cells.
    pub fn from_cells(cells: [Option<Mark>; BOARD_CELLS]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[Option<Mark>; BOARD_CELLS] {
        &self.0
    }

    /// Cell at `index`, `None` when empty or out of range.
    pub fn get(&self, index: usize) -> Option<Mark> {
        self.0.get(index).copied().flatten()
    }

    /// Whether `index` is on the board and empty.
    pub fn is_empty_at(&self, index: usize) -> bool {
        index < BOARD_CELLS && self.0[index].is_none()
    }

    /// Place a mark. Callers check occupancy first.
    pub(crate) fn set(&mut self, index: usize, mark: Mark) {
        self.0[index] = Some(mark);
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Number of occupied cells.
    pub fn filled(&self) -> usize {
        self.0.iter().filter(|c| c.is_some()).count()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.0.chunks(3).enumerate() {
            if row > 0 {
                writeln!(f, "---+---+---")?;
            }
            let rendered: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(col, cell)| match cell {
                    Some(mark) => mark.to_string(),
                    None => (row * 3 + col).to_string(),
                })
                .collect();
            writeln!(f, " {}", rendered.join(" | "))?;
        }
        Ok(())
    }
}

/// Evaluate a board.
///
/// Returns the mark of the first fully matching line in [`WINNING_LINES`]
/// order, `Draw` for a full board with no line, and `None` while the game
/// can continue.
#[instrument(level = "trace", skip(board), fields(filled = board.filled()))]
pub fn evaluate(board: &Board) -> Option<Winner> {
    for [a, b, c] in WINNING_LINES {
        if let Some(mark) = board.get(a) {
            if board.get(b) == Some(mark) && board.get(c) == Some(mark) {
                return Some(mark.into());
            }
        }
    }

    if board.is_full() {
        Some(Winner::Draw)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: Option<Mark> = Some(Mark::X);
    const O: Option<Mark> = Some(Mark::O);
    const E: Option<Mark> = None;

    #[test]
    fn test_empty_board_continues() {
        assert_eq!(evaluate(&Board::new()), None);
    }

    #[test]
    fn test_every_line_wins() {
        for line in WINNING_LINES {
            for mark in [Mark::X, Mark::O] {
                let mut cells = [E; BOARD_CELLS];
                for i in line {
                    cells[i] = Some(mark);
                }
                // One opposing mark elsewhere keeps the board realistic.
                if let Some(free) = (0..BOARD_CELLS).find(|i| !line.contains(i)) {
                    cells[free] = Some(Mark::for_turn(mark == Mark::O));
                }
                let board = Board::from_cells(cells);
                assert_eq!(evaluate(&board), Some(mark.into()), "line {:?}", line);
            }
        }
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let board = Board::from_cells([X, O, X, X, O, O, O, X, X]);
        assert_eq!(evaluate(&board), Some(Winner::Draw));
    }

    #[test]
    fn test_win_on_last_cell_beats_draw() {
        let board = Board::from_cells([X, O, X, O, X, O, O, X, X]);
        assert_eq!(evaluate(&board), Some(Winner::X));
    }

    #[test]
    fn test_open_board_without_line_continues() {
        let board = Board::from_cells([X, O, X, E, O, E, E, X, E]);
        assert_eq!(evaluate(&board), None);
    }

    #[test]
    fn test_first_line_in_scan_order_wins() {
        // Rows 0 and 1 both complete: the first row is reported.
        let board = Board::from_cells([O, O, O, X, X, X, E, E, E]);
        assert_eq!(evaluate(&board), Some(Winner::O));
    }

    #[test]
    fn test_board_serializes_with_nulls() {
        let board = Board::from_cells([X, E, E, E, O, E, E, E, E]);
        assert_eq!(
            board.to_json(),
            serde_json::json!(["X", null, null, null, "O", null, null, null, null])
        );
    }

    #[test]
    fn test_board_rejects_wrong_length() {
        let result: Result<Board, _> = serde_json::from_value(serde_json::json!([null, null]));
        assert!(result.is_err());
    }

    #[test]
    fn test_winner_strings() {
        assert_eq!(serde_json::json!(Winner::Draw), serde_json::json!("Draw"));
        assert_eq!(Winner::from(Mark::O).to_string(), "O");
        assert_eq!(Winner::Draw.mark(), None);
    }
}

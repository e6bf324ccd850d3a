//! Turn arbitration.
//!
//! Whose turn it is is never stored: it follows from the turn flag and the
//! membership order.

use tracing::{debug, instrument};

use super::board::Mark;
use super::game::{GameState, MoveRejected};
use super::presence::{Occupant, RoomMembership};

/// Occupant expected to move next, if seated.
pub fn expected_occupant<'a>(
    state: &GameState,
    membership: &'a RoomMembership,
) -> Option<&'a Occupant> {
    membership.occupant_for(state.current_mark())
}

/// Whether `local_key` is the occupant expected to move.
///
/// A client that has not learned its own key yet never has the turn.
pub fn is_local_turn(state: &GameState, membership: &RoomMembership, local_key: Option<&str>) -> bool {
    match (local_key, expected_occupant(state, membership)) {
        (Some(local), Some(expected)) => expected.key == local,
        _ => false,
    }
}

/// Gate an interactive click on `index`.
///
/// Returns the mark to place. The cell must be empty and the game undecided;
/// with `identity_gating` the local client must also hold the turn.
#[instrument(level = "debug", skip(state, membership))]
pub fn gate_click(
    state: &GameState,
    membership: &RoomMembership,
    local_key: Option<&str>,
    index: usize,
    identity_gating: bool,
) -> Result<Mark, MoveRejected> {
    state.check_cell(index)?;

    if identity_gating && !is_local_turn(state, membership, local_key) {
        debug!(
            expected = ?expected_occupant(state, membership).map(|o| o.key.as_str()),
            "Click outside local turn"
        );
        return Err(MoveRejected::NotYourTurn);
    }

    Ok(state.current_mark())
}

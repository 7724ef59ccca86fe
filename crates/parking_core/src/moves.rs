//! Single-move legality and application.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::board::Board;
use crate::puzzle::{Axis, Orientation, Puzzle};

/// A request to slide one vehicle a number of cells along its axis.
///
/// Positive steps move down/right, negative steps move up/left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Id of the vehicle to slide.
    pub vehicle_id: String,
    /// Signed cell count, never zero.
    pub steps: i32,
}

/// Result of a successful move application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// The new puzzle snapshot.
    pub state: Puzzle,
    /// Whether the goal vehicle reached the exit.
    pub completed: bool,
}

/// Why a move was rejected. The input snapshot is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MoveError {
    /// The step count was zero.
    #[display("Move must include a non-zero step count.")]
    InvalidMove,
    /// No vehicle with the requested id exists.
    #[display("Vehicle '{id}' does not exist.")]
    UnknownVehicle {
        /// The id that failed to resolve.
        id: String,
    },
    /// A step would push the vehicle past the board edge.
    #[display("Move would push vehicle beyond the board on the {axis} axis.")]
    OutOfBounds {
        /// Axis on which the move ran out of room.
        axis: Axis,
    },
    /// Another vehicle occupies a cell along the path.
    #[display("Another vehicle blocks the path.")]
    Blocked,
    /// The incoming snapshot already had two vehicles on one cell.
    #[display("Overlapping vehicles in puzzle state.")]
    Overlapping,
}

/// Applies a move one cell at a time, returning a fresh snapshot.
///
/// The collision board is built once from every *other* vehicle, so the
/// moving vehicle may slide through its own former cells. Each step checks
/// only the new leading cell: bounds first, then occupancy.
#[instrument(skip(puzzle), fields(vehicle = %mv.vehicle_id, steps = mv.steps))]
pub fn apply_move(puzzle: &Puzzle, mv: &Move) -> Result<MoveOutcome, MoveError> {
    if mv.steps == 0 {
        return Err(MoveError::InvalidMove);
    }

    let index = puzzle
        .vehicles
        .iter()
        .position(|vehicle| vehicle.id == mv.vehicle_id)
        .ok_or_else(|| MoveError::UnknownVehicle {
            id: mv.vehicle_id.clone(),
        })?;

    let board = Board::strict(&puzzle.vehicles, puzzle.size, Some(mv.vehicle_id.as_str()))
        .map_err(|_| MoveError::Overlapping)?;

    let target = &puzzle.vehicles[index];
    let size = i32::from(puzzle.size);
    let length = i32::from(target.length);
    let orientation = target.orientation;
    let direction = if mv.steps > 0 { 1 } else { -1 };
    let mut row = target.row;
    let mut col = target.col;

    for _ in 0..mv.steps.unsigned_abs() {
        match orientation {
            Orientation::Horizontal => {
                let next_col = if direction > 0 { col + length } else { col - 1 };
                if next_col < 0 || next_col >= size {
                    return Err(MoveError::OutOfBounds { axis: Axis::Col });
                }
                if board.is_occupied(row, next_col) {
                    return Err(MoveError::Blocked);
                }
                col += direction;
            }
            Orientation::Vertical => {
                let next_row = if direction > 0 { row + length } else { row - 1 };
                if next_row < 0 || next_row >= size {
                    return Err(MoveError::OutOfBounds { axis: Axis::Row });
                }
                if board.is_occupied(next_row, col) {
                    return Err(MoveError::Blocked);
                }
                row += direction;
            }
        }
    }

    let mut state = puzzle.clone();
    state.vehicles[index].row = row;
    state.vehicles[index].col = col;
    let completed = state.is_solved();

    Ok(MoveOutcome { state, completed })
}

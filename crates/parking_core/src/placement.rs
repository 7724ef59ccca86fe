//! Candidate-placement legality and first-fit scanning.

use derive_more::{Display, Error};

use crate::board::Board;
use crate::puzzle::{Axis, Orientation, Puzzle, Vehicle};

/// Why a candidate vehicle cannot occupy its cells.
///
/// Checks run in declaration order; the first violation wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PlacementError {
    /// Row or column is negative.
    #[display("Vehicle coordinates must be non-negative.")]
    NegativeCoordinate,
    /// A goal vehicle must lie along the horizontal axis.
    #[display("Goal vehicle must be horizontal.")]
    GoalOrientationInvalid,
    /// The vehicle's extent runs past the board edge.
    #[display("Vehicle extends beyond the board on the {axis} axis.")]
    OutOfBoundsExtent {
        /// Axis along which the extent overflows.
        axis: Axis,
    },
    /// A covered cell lies outside the board.
    #[display("Vehicle occupies a cell outside the board.")]
    OutOfBoundsCell,
    /// A covered cell is already taken by another vehicle.
    #[display("Vehicle overlaps another piece.")]
    Overlap,
}

/// Checks whether `candidate` can legally occupy its cells on `puzzle`.
///
/// The vehicle named by `exclude` is ignored when building the collision
/// board, so a vehicle may overlap its *own* former position while being
/// repositioned.
pub fn assert_placement(
    puzzle: &Puzzle,
    candidate: &Vehicle,
    exclude: Option<&str>,
) -> Result<(), PlacementError> {
    if candidate.row < 0 || candidate.col < 0 {
        return Err(PlacementError::NegativeCoordinate);
    }

    if candidate.goal && !candidate.orientation.is_horizontal() {
        return Err(PlacementError::GoalOrientationInvalid);
    }

    let size = i32::from(puzzle.size);
    let length = i32::from(candidate.length);
    match candidate.orientation {
        Orientation::Horizontal => {
            if candidate.col + length > size {
                return Err(PlacementError::OutOfBoundsExtent { axis: Axis::Col });
            }
        }
        Orientation::Vertical => {
            if candidate.row + length > size {
                return Err(PlacementError::OutOfBoundsExtent { axis: Axis::Row });
            }
        }
    }

    let board = Board::tolerant(&puzzle.vehicles, puzzle.size, exclude);
    for (row, col) in candidate.occupied_cells() {
        if row >= size || col >= size {
            return Err(PlacementError::OutOfBoundsCell);
        }
        if board.is_occupied(row, col) {
            return Err(PlacementError::Overlap);
        }
    }

    Ok(())
}

/// Scans cells in row-major order and returns the first position where a
/// vehicle of the given shape validates cleanly, or `None` on a full board.
pub fn find_placement(puzzle: &Puzzle, orientation: Orientation, length: u8) -> Option<(i32, i32)> {
    let mut candidate = Vehicle {
        id: "_".to_string(),
        row: 0,
        col: 0,
        length,
        orientation,
        goal: false,
    };

    let size = i32::from(puzzle.size);
    for row in 0..size {
        for col in 0..size {
            candidate.row = row;
            candidate.col = col;
            if assert_placement(puzzle, &candidate, None).is_ok() {
                return Some((row, col));
            }
        }
    }

    None
}

//! Draft validation: the hard gate and the tolerant UI hint.

use std::collections::{BTreeSet, HashSet};

use derive_more::{Display, Error};
use tracing::instrument;

use crate::placement::{PlacementError, assert_placement};
use crate::puzzle::{MAX_BOARD_SIZE, MIN_BOARD_SIZE, Puzzle};

/// Why a draft puzzle failed validation.
///
/// [`validate_draft`] reports the first violation in declaration order:
/// size, exit, vehicle count, duplicate ids, goal constraints, then
/// per-vehicle placement. Callers may rely on that ordering.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ValidationError {
    /// The draft carries no board size.
    #[display("Puzzle must include a board size.")]
    MissingSize,
    /// The board size is outside 2..=12.
    #[display("Board size must be between 2 and 12.")]
    SizeOutOfRange,
    /// The exit cell lies outside the board.
    #[display("Exit must be within the board bounds.")]
    ExitOutOfBounds,
    /// The draft has no vehicles at all.
    #[display("Puzzle must contain at least one vehicle.")]
    NoVehicles,
    /// Two vehicles share an identifier.
    #[display("Duplicate vehicle identifier '{id}' is not allowed.")]
    DuplicateVehicleId {
        /// The repeated identifier.
        id: String,
    },
    /// The draft does not have exactly one goal vehicle.
    #[display("Puzzle must include exactly one goal vehicle.")]
    GoalCountInvalid,
    /// The goal vehicle is not horizontal.
    #[display("Goal vehicle must be horizontal.")]
    GoalNotHorizontal,
    /// A vehicle sits partly or fully outside the board.
    #[display("Vehicle {id} is placed outside the board.")]
    VehicleOutOfBounds {
        /// The offending vehicle.
        id: String,
    },
    /// Two vehicles occupy the same cell.
    #[display("Vehicle {id} overlaps another piece.")]
    VehicleOverlap {
        /// The offending vehicle.
        id: String,
    },
}

/// Asserts the structural validity of a draft puzzle, failing fast.
#[instrument(skip(puzzle), fields(size = puzzle.size, vehicles = puzzle.vehicles.len()))]
pub fn validate_draft(puzzle: &Puzzle) -> Result<(), ValidationError> {
    if puzzle.size == 0 {
        return Err(ValidationError::MissingSize);
    }
    if puzzle.size < MIN_BOARD_SIZE || puzzle.size > MAX_BOARD_SIZE {
        return Err(ValidationError::SizeOutOfRange);
    }

    let size = i32::from(puzzle.size);
    if puzzle.exit.row < 0 || puzzle.exit.row >= size {
        return Err(ValidationError::ExitOutOfBounds);
    }
    if puzzle.exit.col < 0 || puzzle.exit.col >= size {
        return Err(ValidationError::ExitOutOfBounds);
    }

    if puzzle.vehicles.is_empty() {
        return Err(ValidationError::NoVehicles);
    }

    let mut seen = HashSet::new();
    for vehicle in &puzzle.vehicles {
        if !seen.insert(vehicle.id.as_str()) {
            return Err(ValidationError::DuplicateVehicleId {
                id: vehicle.id.clone(),
            });
        }
    }

    let goals: Vec<_> = puzzle
        .vehicles
        .iter()
        .filter(|vehicle| vehicle.goal)
        .collect();
    if goals.len() != 1 {
        return Err(ValidationError::GoalCountInvalid);
    }
    if !goals[0].orientation.is_horizontal() {
        return Err(ValidationError::GoalNotHorizontal);
    }

    for vehicle in &puzzle.vehicles {
        assert_placement(puzzle, vehicle, Some(vehicle.id.as_str())).map_err(|error| match error {
            PlacementError::Overlap => ValidationError::VehicleOverlap {
                id: vehicle.id.clone(),
            },
            PlacementError::GoalOrientationInvalid => ValidationError::GoalNotHorizontal,
            _ => ValidationError::VehicleOutOfBounds {
                id: vehicle.id.clone(),
            },
        })?;
    }

    Ok(())
}

/// Returns the ids of every vehicle involved in an overlap or an
/// out-of-bounds placement.
///
/// Unlike [`validate_draft`] this is a UI hint, not a gate: structurally
/// incomplete input (no size yet) yields an empty set instead of an error.
/// The asymmetry is deliberate.
pub fn find_overlapping_vehicles(puzzle: &Puzzle) -> BTreeSet<String> {
    let mut conflicts = BTreeSet::new();
    if puzzle.size == 0 {
        return conflicts;
    }

    let size = i32::from(puzzle.size);
    let mut board: Vec<Option<&str>> = vec![None; (size * size) as usize];

    for vehicle in &puzzle.vehicles {
        for (row, col) in vehicle.occupied_cells() {
            if row < 0 || col < 0 || row >= size || col >= size {
                conflicts.insert(vehicle.id.clone());
                continue;
            }
            let slot = (row * size + col) as usize;
            match board[slot] {
                Some(occupant) if occupant != vehicle.id => {
                    conflicts.insert(vehicle.id.clone());
                    conflicts.insert(occupant.to_string());
                }
                _ => board[slot] = Some(vehicle.id.as_str()),
            }
        }
    }

    conflicts
}

//! Mutation helpers for the puzzle editor.
//!
//! Every helper is snapshot-in, snapshot-out: the input puzzle is never
//! modified.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::placement::{PlacementError, assert_placement};
use crate::puzzle::{MAX_BOARD_SIZE, MIN_BOARD_SIZE, Orientation, Puzzle, Vehicle};

const ID_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const GOAL_ID: char = 'X';

/// Why an editor operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum EditorError {
    /// The named vehicle is not part of the puzzle.
    #[display("Vehicle {id} not found")]
    VehicleNotFound {
        /// The id that failed to resolve.
        id: String,
    },
    /// A second goal vehicle was about to be created.
    #[display("Only one goal vehicle is allowed.")]
    DuplicateGoal,
    /// The puzzle already has a goal vehicle, so no goal id is free.
    #[display("Puzzle already has a goal vehicle.")]
    GoalAlreadyPresent,
    /// Every identifier letter is in use.
    #[display("No available vehicle identifiers remaining.")]
    IdsExhausted,
    /// A vehicle stopped fitting after the board shrank.
    #[display("Vehicle {id} no longer fits after resizing.")]
    DoesNotFit {
        /// Vehicle that no longer fits.
        id: String,
    },
    /// The vehicle cannot legally occupy its cells.
    #[display("{_0}")]
    Placement(PlacementError),
}

impl From<PlacementError> for EditorError {
    fn from(error: PlacementError) -> Self {
        Self::Placement(error)
    }
}

/// Partial overlay applied to an existing vehicle by [`update_vehicle`].
#[derive(Debug, Clone, Default)]
pub struct VehicleUpdate {
    /// New row, if changed.
    pub row: Option<i32>,
    /// New column, if changed.
    pub col: Option<i32>,
    /// New length, if changed.
    pub length: Option<u8>,
    /// New orientation, if changed.
    pub orientation: Option<Orientation>,
    /// New goal flag, if changed.
    pub goal: Option<bool>,
}

/// Behaviour switches for [`update_vehicle`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    /// Relocate the vehicle with a first-fit scan when its requested
    /// position does not validate.
    pub auto_place: bool,
    /// Check placement at all. Defaults to `true`.
    pub validate: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            auto_place: false,
            validate: true,
        }
    }
}

/// Picks the next free vehicle identifier.
///
/// The goal vehicle is always `X`; other vehicles take the first unused
/// letter of the alphabet, skipping `X`.
pub fn next_vehicle_id(puzzle: &Puzzle, goal: bool) -> Result<String, EditorError> {
    if goal {
        if puzzle.vehicles.iter().any(|vehicle| vehicle.goal) {
            return Err(EditorError::GoalAlreadyPresent);
        }
        return Ok(GOAL_ID.to_string());
    }

    ID_ALPHABET
        .chars()
        .filter(|letter| *letter != GOAL_ID)
        .find(|letter| {
            !puzzle
                .vehicles
                .iter()
                .any(|vehicle| vehicle.id == letter.to_string())
        })
        .map(|letter| letter.to_string())
        .ok_or(EditorError::IdsExhausted)
}

/// Adds a vehicle after checking the single-goal rule and placement.
pub fn insert_vehicle(puzzle: &Puzzle, vehicle: Vehicle) -> Result<Puzzle, EditorError> {
    if vehicle.goal && puzzle.vehicles.iter().any(|existing| existing.goal) {
        return Err(EditorError::DuplicateGoal);
    }
    assert_placement(puzzle, &vehicle, None)?;

    let mut draft = puzzle.clone();
    draft.vehicles.push(vehicle);
    Ok(draft)
}

/// Removes a vehicle by id. Removing an unknown id is a no-op.
pub fn remove_vehicle(puzzle: &Puzzle, id: &str) -> Puzzle {
    let mut draft = puzzle.clone();
    draft.vehicles.retain(|vehicle| vehicle.id != id);
    draft
}

/// Merges `updates` into the vehicle named by `id`, clamps the result into
/// bounds for its (possibly new) shape, and validates placement.
///
/// When validation fails and `auto_place` is set, the vehicle is relocated
/// with a row-major first-fit scan that ignores its own former cells; if no
/// spot exists, the *original* placement error is returned.
#[instrument(skip(puzzle, updates, options), fields(vehicle = id))]
pub fn update_vehicle(
    puzzle: &Puzzle,
    id: &str,
    updates: &VehicleUpdate,
    options: UpdateOptions,
) -> Result<Puzzle, EditorError> {
    let mut draft = puzzle.clone();
    let index = draft
        .vehicles
        .iter()
        .position(|vehicle| vehicle.id == id)
        .ok_or_else(|| EditorError::VehicleNotFound { id: id.to_string() })?;

    let mut next = draft.vehicles[index].clone();
    if let Some(row) = updates.row {
        next.row = row;
    }
    if let Some(col) = updates.col {
        next.col = col;
    }
    if let Some(length) = updates.length {
        next.length = length;
    }
    if let Some(orientation) = updates.orientation {
        next.orientation = orientation;
    }
    if let Some(goal) = updates.goal {
        next.goal = goal;
    }

    if next.goal
        && draft
            .vehicles
            .iter()
            .any(|vehicle| vehicle.id != id && vehicle.goal)
    {
        return Err(EditorError::DuplicateGoal);
    }

    clamp_within_bounds(&mut next, draft.size);

    if options.validate {
        if let Err(placement_error) = assert_placement(&draft, &next, Some(id)) {
            if !options.auto_place {
                return Err(placement_error.into());
            }
            let Some((row, col)) = find_relocation_spot(&draft, &next, id) else {
                return Err(placement_error.into());
            };
            next.row = row;
            next.col = col;
        }
    } else if options.auto_place {
        if let Some((row, col)) = find_relocation_spot(&draft, &next, id) {
            next.row = row;
            next.col = col;
        }
    }

    draft.vehicles[index] = next;
    Ok(draft)
}

/// Resizes the board, pinning the exit back onto the right edge.
///
/// Fails if any vehicle no longer fits inside the new bounds.
pub fn set_board_size(puzzle: &Puzzle, size: i32) -> Result<Puzzle, EditorError> {
    let next_size = size.clamp(i32::from(MIN_BOARD_SIZE), i32::from(MAX_BOARD_SIZE)) as u8;
    let mut draft = puzzle.clone();
    draft.size = next_size;
    if draft.exit.row >= i32::from(next_size) {
        draft.exit.row = i32::from(next_size) - 1;
    }
    draft.exit.col = i32::from(next_size) - 1;

    for vehicle in &draft.vehicles {
        let extent = match vehicle.orientation {
            Orientation::Horizontal => vehicle.col + i32::from(vehicle.length),
            Orientation::Vertical => vehicle.row + i32::from(vehicle.length),
        };
        if extent > i32::from(next_size) {
            return Err(EditorError::DoesNotFit {
                id: vehicle.id.clone(),
            });
        }
    }

    Ok(draft)
}

/// Moves the exit to the given row, clamped into the board.
pub fn set_exit_row(puzzle: &Puzzle, row: i32) -> Puzzle {
    let mut draft = puzzle.clone();
    draft.exit.row = row.clamp(0, i32::from(draft.size) - 1);
    draft
}

/// Moves the exit to the given column, clamped into the board.
pub fn set_exit_col(puzzle: &Puzzle, col: i32) -> Puzzle {
    let mut draft = puzzle.clone();
    draft.exit.col = col.clamp(0, i32::from(draft.size) - 1);
    draft
}

fn clamp_within_bounds(vehicle: &mut Vehicle, size: u8) {
    let size = i32::from(size);
    let length = i32::from(vehicle.length);
    let max_row = match vehicle.orientation {
        Orientation::Vertical => size - length,
        Orientation::Horizontal => size - 1,
    };
    let max_col = match vehicle.orientation {
        Orientation::Horizontal => size - length,
        Orientation::Vertical => size - 1,
    };

    vehicle.row = vehicle.row.clamp(0, max_row.max(0));
    vehicle.col = vehicle.col.clamp(0, max_col.max(0));
}

fn find_relocation_spot(puzzle: &Puzzle, vehicle: &Vehicle, exclude: &str) -> Option<(i32, i32)> {
    let mut candidate = vehicle.clone();
    let size = i32::from(puzzle.size);
    for row in 0..size {
        candidate.row = row;
        for col in 0..size {
            candidate.col = col;
            if assert_placement(puzzle, &candidate, Some(exclude)).is_ok() {
                return Some((row, col));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_id_is_reserved() {
        let puzzle = Puzzle::empty(6);
        assert_eq!(next_vehicle_id(&puzzle, true).unwrap(), "X");
        assert_eq!(next_vehicle_id(&puzzle, false).unwrap(), "A");

        let puzzle = Puzzle::default_layout();
        assert_eq!(
            next_vehicle_id(&puzzle, true),
            Err(EditorError::GoalAlreadyPresent)
        );
        // A through H are taken, X is skipped.
        assert_eq!(next_vehicle_id(&puzzle, false).unwrap(), "I");
    }

    #[test]
    fn insert_rejects_second_goal() {
        let puzzle = Puzzle::default_layout();
        let second_goal = Vehicle {
            id: "Y".into(),
            row: 0,
            col: 1,
            length: 2,
            orientation: Orientation::Horizontal,
            goal: true,
        };
        assert_eq!(
            insert_vehicle(&puzzle, second_goal),
            Err(EditorError::DuplicateGoal)
        );
    }

    #[test]
    fn insert_appends_after_placement_check() {
        let puzzle = Puzzle::default_layout();
        let vehicle = Vehicle {
            id: "I".into(),
            row: 0,
            col: 1,
            length: 2,
            orientation: Orientation::Horizontal,
            goal: false,
        };
        let draft = insert_vehicle(&puzzle, vehicle).unwrap();
        assert_eq!(draft.vehicles.len(), puzzle.vehicles.len() + 1);
        assert!(puzzle.vehicle("I").is_none());
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let puzzle = Puzzle::default_layout();
        let draft = remove_vehicle(&puzzle, "Z");
        assert_eq!(draft, puzzle);
    }

    #[test]
    fn update_clamps_into_bounds() {
        let puzzle = Puzzle::empty(6);
        let puzzle = insert_vehicle(
            &puzzle,
            Vehicle {
                id: "A".into(),
                row: 0,
                col: 0,
                length: 2,
                orientation: Orientation::Horizontal,
                goal: false,
            },
        )
        .unwrap();

        let updates = VehicleUpdate {
            col: Some(99),
            ..VehicleUpdate::default()
        };
        let draft = update_vehicle(&puzzle, "A", &updates, UpdateOptions::default()).unwrap();
        assert_eq!(draft.vehicle("A").unwrap().col, 4);
    }

    #[test]
    fn update_without_auto_place_surfaces_placement_error() {
        let puzzle = Puzzle::default_layout();
        // Moving D onto E's row collides.
        let updates = VehicleUpdate {
            row: Some(4),
            ..VehicleUpdate::default()
        };
        assert_eq!(
            update_vehicle(&puzzle, "D", &updates, UpdateOptions::default()),
            Err(EditorError::Placement(PlacementError::Overlap))
        );
    }

    #[test]
    fn update_with_auto_place_relocates_first_fit() {
        let puzzle = Puzzle::default_layout();
        let updates = VehicleUpdate {
            row: Some(4),
            ..VehicleUpdate::default()
        };
        let options = UpdateOptions {
            auto_place: true,
            validate: true,
        };
        let draft = update_vehicle(&puzzle, "D", &updates, options).unwrap();
        let moved = draft.vehicle("D").unwrap();
        // First free horizontal slot of length 2 in row-major order.
        assert_eq!((moved.row, moved.col), (0, 1));
    }

    #[test]
    fn resize_repins_exit_and_checks_fit() {
        let puzzle = Puzzle::empty(6);
        let draft = set_board_size(&puzzle, 8).unwrap();
        assert_eq!(draft.exit.col, 7);

        let occupied = insert_vehicle(
            &puzzle,
            Vehicle {
                id: "A".into(),
                row: 0,
                col: 4,
                length: 2,
                orientation: Orientation::Horizontal,
                goal: false,
            },
        )
        .unwrap();
        assert_eq!(
            set_board_size(&occupied, 4),
            Err(EditorError::DoesNotFit { id: "A".into() })
        );
    }

    #[test]
    fn exit_setters_clamp() {
        let puzzle = Puzzle::empty(6);
        assert_eq!(set_exit_row(&puzzle, 99).exit.row, 5);
        assert_eq!(set_exit_col(&puzzle, -3).exit.col, 0);
    }
}

//! Pure sliding-block puzzle logic.
//!
//! This crate holds everything about the puzzle that can be computed without
//! talking to a backend: the board/vehicle data model, single-move legality,
//! editor mutation helpers, and draft validation. Every operation is
//! synchronous and copy-on-write — a mutating call returns a fresh
//! [`Puzzle`] snapshot and never touches its input.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod editor;
mod moves;
mod placement;
mod puzzle;
mod validate;

pub use editor::{
    EditorError, UpdateOptions, VehicleUpdate, insert_vehicle, next_vehicle_id, remove_vehicle,
    set_board_size, set_exit_col, set_exit_row, update_vehicle,
};
pub use moves::{Move, MoveError, MoveOutcome, apply_move};
pub use placement::{PlacementError, assert_placement, find_placement};
pub use puzzle::{Axis, Exit, MAX_BOARD_SIZE, MIN_BOARD_SIZE, Orientation, Puzzle, Vehicle};
pub use validate::{ValidationError, find_overlapping_vehicles, validate_draft};

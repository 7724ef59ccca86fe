//! Core domain types for the sliding-block puzzle.

use serde::{Deserialize, Serialize};

/// Smallest legal board side length.
pub const MIN_BOARD_SIZE: u8 = 2;
/// Largest legal board side length.
pub const MAX_BOARD_SIZE: u8 = 12;

/// Axis a vehicle slides along.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    /// Occupies cells left-to-right; slides along columns.
    Horizontal,
    /// Occupies cells top-to-bottom; slides along rows.
    Vertical,
}

impl Orientation {
    /// Returns true for [`Orientation::Horizontal`].
    pub fn is_horizontal(self) -> bool {
        matches!(self, Orientation::Horizontal)
    }
}

/// Board axis, used to report which direction a move ran out of room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Axis {
    /// The vertical axis (row index).
    Row,
    /// The horizontal axis (column index).
    Col,
}

/// A rigid occupant of `length` contiguous cells starting at `(row, col)`.
///
/// Coordinates are signed so the editor can represent out-of-bounds drafts;
/// validation rejects anything negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique identifier, one to three characters.
    pub id: String,
    /// Row of the topmost/leftmost occupied cell.
    pub row: i32,
    /// Column of the topmost/leftmost occupied cell.
    pub col: i32,
    /// Number of occupied cells, at least 2.
    pub length: u8,
    /// Axis the vehicle extends and slides along.
    pub orientation: Orientation,
    /// Whether this is the vehicle that must reach the exit.
    #[serde(default)]
    pub goal: bool,
}

impl Vehicle {
    /// Ordered cells the vehicle covers, head first along its orientation.
    pub fn occupied_cells(&self) -> Vec<(i32, i32)> {
        (0..i32::from(self.length))
            .map(|offset| match self.orientation {
                Orientation::Horizontal => (self.row, self.col + offset),
                Orientation::Vertical => (self.row + offset, self.col),
            })
            .collect()
    }
}

/// The single cell the goal vehicle's trailing edge must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    /// Exit row.
    pub row: i32,
    /// Exit column.
    pub col: i32,
}

/// A full puzzle snapshot: board size, exit cell, and every vehicle.
///
/// `size` serde-defaults to 0 so a payload that omits it deserializes into a
/// draft that [`crate::validate_draft`] rejects with `MissingSize` instead of
/// failing at the parsing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    /// Side length of the square board.
    #[serde(default)]
    pub size: u8,
    /// Where the goal vehicle must arrive.
    pub exit: Exit,
    /// Every vehicle on the board.
    pub vehicles: Vec<Vehicle>,
}

impl Puzzle {
    /// The frozen 6x6 starter layout bundled with the client.
    pub fn default_layout() -> Self {
        fn vehicle(id: &str, row: i32, col: i32, length: u8, orientation: Orientation) -> Vehicle {
            Vehicle {
                id: id.to_string(),
                row,
                col,
                length,
                orientation,
                goal: false,
            }
        }

        Self {
            size: 6,
            exit: Exit { row: 2, col: 5 },
            vehicles: vec![
                vehicle("C", 0, 0, 3, Orientation::Vertical),
                vehicle("A", 0, 3, 2, Orientation::Vertical),
                vehicle("B", 0, 4, 3, Orientation::Vertical),
                vehicle("D", 3, 2, 2, Orientation::Horizontal),
                vehicle("E", 4, 1, 3, Orientation::Horizontal),
                vehicle("F", 3, 5, 2, Orientation::Vertical),
                vehicle("G", 5, 0, 2, Orientation::Horizontal),
                vehicle("H", 5, 2, 2, Orientation::Horizontal),
                Vehicle {
                    goal: true,
                    ..vehicle("X", 2, 1, 2, Orientation::Horizontal)
                },
            ],
        }
    }

    /// An empty board of the given size, clamped into the legal range, with
    /// the exit pinned to the right edge.
    pub fn empty(size: u8) -> Self {
        let size = size.clamp(MIN_BOARD_SIZE, MAX_BOARD_SIZE);
        let exit_row = 2.min(i32::from(size) - 1);
        Self {
            size,
            exit: Exit {
                row: exit_row,
                col: i32::from(size) - 1,
            },
            vehicles: Vec::new(),
        }
    }

    /// Looks up a vehicle by id.
    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|vehicle| vehicle.id == id)
    }

    /// True iff the goal vehicle is horizontal and its trailing cell sits on
    /// the exit. A corrupted puzzle (vertical goal) simply reports `false`.
    pub fn is_solved(&self) -> bool {
        for vehicle in &self.vehicles {
            if !vehicle.goal {
                continue;
            }
            if !vehicle.orientation.is_horizontal() {
                return false;
            }
            let tail_col = vehicle.col + i32::from(vehicle.length) - 1;
            if vehicle.row == self.exit.row && tail_col == self.exit.col {
                return true;
            }
        }
        false
    }
}

//! Occupancy board built from a vehicle list.

use crate::puzzle::Vehicle;

/// Cell-indexed occupancy map, built once per move or placement check.
///
/// Cells hold the index of the occupying vehicle within the list the board
/// was built from.
pub(crate) struct Board {
    size: i32,
    cells: Vec<Option<usize>>,
}

/// Two vehicles claim the same cell while building a strict board.
pub(crate) struct StateOverlap;

impl Board {
    /// Builds the board, failing if any two vehicles overlap. Used by the
    /// move engine, where an overlapping snapshot means corrupt input.
    pub(crate) fn strict(
        vehicles: &[Vehicle],
        size: u8,
        exclude: Option<&str>,
    ) -> Result<Self, StateOverlap> {
        Self::build(vehicles, size, exclude, true)
    }

    /// Builds the board, letting later vehicles overwrite earlier ones.
    /// Used by placement checks, which report overlap per candidate cell.
    pub(crate) fn tolerant(vehicles: &[Vehicle], size: u8, exclude: Option<&str>) -> Self {
        match Self::build(vehicles, size, exclude, false) {
            Ok(board) => board,
            Err(StateOverlap) => unreachable!("tolerant build never fails"),
        }
    }

    fn build(
        vehicles: &[Vehicle],
        size: u8,
        exclude: Option<&str>,
        strict: bool,
    ) -> Result<Self, StateOverlap> {
        let size = i32::from(size);
        let mut board = Self {
            size,
            cells: vec![None; (size * size).max(0) as usize],
        };

        for (index, vehicle) in vehicles.iter().enumerate() {
            if exclude == Some(vehicle.id.as_str()) {
                continue;
            }
            for (row, col) in vehicle.occupied_cells() {
                let Some(slot) = board.slot(row, col) else {
                    continue;
                };
                if strict && board.cells[slot].is_some() {
                    return Err(StateOverlap);
                }
                board.cells[slot] = Some(index);
            }
        }

        Ok(board)
    }

    pub(crate) fn is_occupied(&self, row: i32, col: i32) -> bool {
        self.slot(row, col)
            .is_some_and(|slot| self.cells[slot].is_some())
    }

    fn slot(&self, row: i32, col: i32) -> Option<usize> {
        if row < 0 || col < 0 || row >= self.size || col >= self.size {
            return None;
        }
        Some((row * self.size + col) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::Puzzle;

    #[test]
    fn strict_build_flags_overlap() {
        let mut puzzle = Puzzle::default_layout();
        puzzle.vehicles[0].col = 1; // C now collides with X at (2, 1)
        assert!(Board::strict(&puzzle.vehicles, puzzle.size, None).is_err());
        assert!(Board::strict(&puzzle.vehicles, puzzle.size, Some("C")).is_ok());
    }

    #[test]
    fn excluded_vehicle_leaves_cells_free() {
        let puzzle = Puzzle::default_layout();
        let board = Board::tolerant(&puzzle.vehicles, puzzle.size, Some("X"));
        assert!(!board.is_occupied(2, 1));
        assert!(board.is_occupied(0, 0));
    }
}

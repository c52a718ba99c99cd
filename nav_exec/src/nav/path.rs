//! # Path
//!
//! An ordered, non-empty sequence of cells from a start to a goal.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::Cell;
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A planned route. The first cell is the start and the last is the goal, with each consecutive
/// pair adjacent in the map it was planned on.
///
/// Paths are never modified, replanning produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    cells: Vec<Cell>,

    cost: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Path {
    /// Create a path from its cells and total cost. Returns `None` if `cells` is empty.
    pub fn new(cells: Vec<Cell>, cost: f64) -> Option<Self> {
        match cells.is_empty() {
            true => None,
            false => Some(Self { cells, cost }),
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of cells in the path, always at least one.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Number of moves in the path.
    pub fn num_moves(&self) -> usize {
        self.cells.len() - 1
    }

    pub fn start(&self) -> Cell {
        self.cells[0]
    }

    pub fn goal(&self) -> Cell {
        self.cells[self.cells.len() - 1]
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Cells from `index` to the goal, inclusive.
    pub fn remaining(&self, index: usize) -> &[Cell] {
        self.cells.get(index..).unwrap_or(&[])
    }

    /// Index of the first occurence of `cell` at or after `from`.
    pub fn find_from(&self, cell: Cell, from: usize) -> Option<usize> {
        self.remaining(from)
            .iter()
            .position(|c| *c == cell)
            .map(|i| i + from)
    }

    /// Return if every consecutive pair of cells is 4- or 8-adjacent.
    pub fn is_connected(&self) -> bool {
        self.cells.windows(2).all(|w| w[0].chebyshev(&w[1]) == 1)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

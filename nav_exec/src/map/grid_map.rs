//! # Grid Map
//!
//! [`GridMap`] is a binary occupancy grid viewed as a cost graph. Each cell is either traversable
//! (`0`, the line) or an obstacle (`1`). Edges join traversable neighbours, either 4-connected or
//! 8-connected, and carry a fixed cost per move.
//!
//! A map is never modified once loaded. Blockages discovered at run time are applied with
//! [`GridMap::with_blocked`], which produces a new map.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt, path::Path as FsPath};

use comms_if::Cell;
use serde::{Deserialize, Serialize};

use crate::nav::Path;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Orthogonal neighbour offsets, in the order neighbours are reported: right, left, down, up.
const ORTHOGONAL_OFFSETS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Diagonal neighbour offsets, reported after the orthogonal ones.
const DIAGONAL_OFFSETS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Occupancy value of a traversable cell.
pub const TRAVERSABLE: i64 = 0;

/// Occupancy value of an obstacle cell.
pub const OBSTACLE: i64 = 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Binary occupancy grid with declared start and goal cells.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMap {
    num_rows: usize,

    num_cols: usize,

    /// Row-major traversability of every cell
    traversable: Vec<bool>,

    start: Cell,

    goal: Cell,

    params: GridMapParams,
}

/// Parameters controlling the graph built over the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridMapParams {
    /// Neighbourhood of each cell, `4` or `8`.
    pub connectivity: Connectivity,

    /// Cost of a move between orthogonal neighbours.
    pub edge_cost: f64,

    /// Cost of a move between diagonal neighbours, only used for 8-connected maps.
    pub diagonal_cost: f64,
}

/// Contents of a map file.
#[derive(Debug, Deserialize)]
struct MapFile {
    occupancy: Vec<Vec<i64>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Connectivity {
    Four,
    Eight,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidMapError {
    #[error("The occupancy grid is empty")]
    Empty,

    #[error("Row {row} of the occupancy grid has {found} cells, expected {expected}")]
    NotRectangular {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cell {cell} has occupancy value {value}, expected 0 or 1")]
    InvalidValue { cell: Cell, value: i64 },

    #[error("The {0} cell {1} is outside the map")]
    OutOfBounds(&'static str, Cell),

    #[error("The {0} cell {1} is not traversable")]
    NotTraversable(&'static str, Cell),

    #[error("Edge costs must be finite and positive, got {0}")]
    InvalidCost(f64),

    #[error("Could not load the map file: {0}")]
    LoadError(util::params::LoadError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GridMap {
    /// Build a map from an occupancy grid, indexed `[row][col]`.
    ///
    /// Fails if the grid is empty or ragged, contains a value other than 0 or 1, or if either of
    /// the declared start and goal cells is outside the map or is an obstacle.
    pub fn load(
        occupancy: &[Vec<i64>],
        start: Cell,
        goal: Cell,
        params: GridMapParams,
    ) -> Result<Self, InvalidMapError> {
        let num_rows = occupancy.len();
        let num_cols = occupancy.first().map(|r| r.len()).unwrap_or(0);

        if num_rows == 0 || num_cols == 0 {
            return Err(InvalidMapError::Empty);
        }

        for cost in [params.edge_cost, params.diagonal_cost] {
            if !cost.is_finite() || cost <= 0.0 {
                return Err(InvalidMapError::InvalidCost(cost));
            }
        }

        let mut traversable = Vec::with_capacity(num_rows * num_cols);

        for (r, row) in occupancy.iter().enumerate() {
            if row.len() != num_cols {
                return Err(InvalidMapError::NotRectangular {
                    row: r,
                    expected: num_cols,
                    found: row.len(),
                });
            }

            for (c, value) in row.iter().enumerate() {
                traversable.push(match *value {
                    TRAVERSABLE => true,
                    OBSTACLE => false,
                    v => {
                        return Err(InvalidMapError::InvalidValue {
                            cell: Cell::new(r as i32, c as i32),
                            value: v,
                        })
                    }
                });
            }
        }

        let map = Self {
            num_rows,
            num_cols,
            traversable,
            start,
            goal,
            params,
        };

        for (name, cell) in [("start", start), ("goal", goal)] {
            if !map.contains(cell) {
                return Err(InvalidMapError::OutOfBounds(name, cell));
            }
            if !map.is_traversable(cell) {
                return Err(InvalidMapError::NotTraversable(name, cell));
            }
        }

        Ok(map)
    }

    /// Load the occupancy grid from a TOML file containing an `occupancy` array.
    pub fn load_file<P: AsRef<FsPath>>(
        path: P,
        start: Cell,
        goal: Cell,
        params: GridMapParams,
    ) -> Result<Self, InvalidMapError> {
        let file: MapFile =
            util::params::load_path(path).map_err(InvalidMapError::LoadError)?;

        Self::load(&file.occupancy, start, goal, params)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    pub fn params(&self) -> &GridMapParams {
        &self.params
    }

    /// Total number of cells in the map.
    pub fn num_cells(&self) -> usize {
        self.num_rows * self.num_cols
    }

    /// Return if the cell lies within the map bounds.
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.num_rows
            && (cell.col as usize) < self.num_cols
    }

    /// Row-major index of the cell, or `None` if it is outside the map.
    pub fn index(&self, cell: Cell) -> Option<usize> {
        match self.contains(cell) {
            true => Some(cell.row as usize * self.num_cols + cell.col as usize),
            false => None,
        }
    }

    /// Inverse of [`GridMap::index`].
    pub fn cell_at(&self, index: usize) -> Cell {
        Cell::new(
            (index / self.num_cols) as i32,
            (index % self.num_cols) as i32,
        )
    }

    /// Return if the cell is inside the map and not an obstacle.
    pub fn is_traversable(&self, cell: Cell) -> bool {
        self.index(cell)
            .map(|i| self.traversable[i])
            .unwrap_or(false)
    }

    /// Traversable neighbours of the cell.
    ///
    /// Neighbours are always reported in the same order: right, left, down, up, then for
    /// 8-connected maps the diagonals. A diagonal is only a neighbour if both orthogonal cells it
    /// passes between are traversable.
    pub fn neighbors(&self, cell: Cell) -> Vec<Cell> {
        let mut neighbors = Vec::with_capacity(8);

        if !self.is_traversable(cell) {
            return neighbors;
        }

        for (dr, dc) in ORTHOGONAL_OFFSETS {
            let n = cell.offset(dr, dc);
            if self.is_traversable(n) {
                neighbors.push(n);
            }
        }

        if self.params.connectivity == Connectivity::Eight {
            for (dr, dc) in DIAGONAL_OFFSETS {
                if self.diagonal_passable(cell, dr, dc) {
                    neighbors.push(cell.offset(dr, dc));
                }
            }
        }

        neighbors
    }

    /// Cost of moving directly from `a` to `b`, or `None` if they are not neighbours.
    pub fn edge_cost(&self, a: Cell, b: Cell) -> Option<f64> {
        if !self.is_traversable(a) || !self.is_traversable(b) {
            return None;
        }

        let dr = b.row - a.row;
        let dc = b.col - a.col;

        match (dr.abs(), dc.abs()) {
            (0, 1) | (1, 0) => Some(self.params.edge_cost),
            (1, 1) if self.params.connectivity == Connectivity::Eight => {
                match self.diagonal_passable(a, dr, dc) {
                    true => Some(self.params.diagonal_cost),
                    false => None,
                }
            }
            _ => None,
        }
    }

    /// Produce a copy of this map with the given cells marked as obstacles.
    ///
    /// Cells outside the map are ignored.
    pub fn with_blocked<'a, I>(&self, cells: I) -> GridMap
    where
        I: IntoIterator<Item = &'a Cell>,
    {
        let mut map = self.clone();

        for cell in cells {
            if let Some(i) = map.index(*cell) {
                map.traversable[i] = false;
            }
        }

        map
    }

    /// Render the map as text, one line per row.
    ///
    /// Obstacles are `#`, traversable cells `.`, path cells `*`, and the start and goal `S` and
    /// `G`.
    pub fn render(&self, path: Option<&Path>) -> String {
        let mut chars: Vec<char> = self
            .traversable
            .iter()
            .map(|t| if *t { '.' } else { '#' })
            .collect();

        if let Some(path) = path {
            for cell in path.cells() {
                if let Some(i) = self.index(*cell) {
                    chars[i] = '*';
                }
            }
        }

        for (cell, c) in [(self.start, 'S'), (self.goal, 'G')] {
            if let Some(i) = self.index(cell) {
                chars[i] = c;
            }
        }

        let mut out = String::with_capacity(self.num_rows * (self.num_cols + 1));
        for row in chars.chunks(self.num_cols) {
            out.extend(row.iter());
            out.push('\n');
        }

        out
    }

    fn diagonal_passable(&self, cell: Cell, dr: i32, dc: i32) -> bool {
        self.is_traversable(cell.offset(dr, dc))
            && self.is_traversable(cell.offset(dr, 0))
            && self.is_traversable(cell.offset(0, dc))
    }
}

impl Default for GridMapParams {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Four,
            edge_cost: 1.0,
            diagonal_cost: std::f64::consts::SQRT_2,
        }
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            v => Err(format!("connectivity must be 4 or 8, got {}", v)),
        }
    }
}

impl From<Connectivity> for u8 {
    fn from(c: Connectivity) -> Self {
        match c {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

impl fmt::Display for GridMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn grid(rows: &[&str]) -> Vec<Vec<i64>> {
        rows.iter()
            .map(|r| r.chars().map(|c| if c == '#' { 1 } else { 0 }).collect())
            .collect()
    }

    #[test]
    fn test_load_errors() {
        let ok = grid(&["...", ".#.", "..."]);
        let p = GridMapParams::default;

        assert!(GridMap::load(&ok, Cell::new(0, 0), Cell::new(2, 2), p()).is_ok());

        assert!(matches!(
            GridMap::load(&[], Cell::new(0, 0), Cell::new(0, 0), p()),
            Err(InvalidMapError::Empty)
        ));
        assert!(matches!(
            GridMap::load(&[vec![]], Cell::new(0, 0), Cell::new(0, 0), p()),
            Err(InvalidMapError::Empty)
        ));
        assert!(matches!(
            GridMap::load(
                &[vec![0, 0], vec![0]],
                Cell::new(0, 0),
                Cell::new(0, 1),
                p()
            ),
            Err(InvalidMapError::NotRectangular { row: 1, expected: 2, found: 1 })
        ));
        assert!(matches!(
            GridMap::load(&[vec![0, 2]], Cell::new(0, 0), Cell::new(0, 0), p()),
            Err(InvalidMapError::InvalidValue { value: 2, .. })
        ));
        assert!(matches!(
            GridMap::load(&ok, Cell::new(-1, 0), Cell::new(2, 2), p()),
            Err(InvalidMapError::OutOfBounds("start", _))
        ));
        assert!(matches!(
            GridMap::load(&ok, Cell::new(0, 0), Cell::new(3, 2), p()),
            Err(InvalidMapError::OutOfBounds("goal", _))
        ));
        assert!(matches!(
            GridMap::load(&ok, Cell::new(1, 1), Cell::new(2, 2), p()),
            Err(InvalidMapError::NotTraversable("start", _))
        ));
        assert!(matches!(
            GridMap::load(
                &ok,
                Cell::new(0, 0),
                Cell::new(2, 2),
                GridMapParams {
                    edge_cost: -1.0,
                    ..p()
                }
            ),
            Err(InvalidMapError::InvalidCost(_))
        ));
    }

    #[test]
    fn test_neighbors_order() {
        let map = GridMap::load(
            &grid(&["...", "...", "..."]),
            Cell::new(1, 1),
            Cell::new(0, 0),
            GridMapParams::default(),
        )
        .unwrap();

        assert_eq!(
            map.neighbors(Cell::new(1, 1)),
            vec![
                Cell::new(1, 2),
                Cell::new(1, 0),
                Cell::new(2, 1),
                Cell::new(0, 1)
            ]
        );

        // Corner cell only has in-bounds neighbours
        assert_eq!(
            map.neighbors(Cell::new(0, 0)),
            vec![Cell::new(0, 1), Cell::new(1, 0)]
        );

        // Outside the map there are no neighbours
        assert!(map.neighbors(Cell::new(5, 5)).is_empty());
    }

    #[test]
    fn test_eight_connected_no_corner_cutting() {
        let params = GridMapParams {
            connectivity: Connectivity::Eight,
            ..Default::default()
        };
        let map = GridMap::load(
            &grid(&["..#", "...", "#.."]),
            Cell::new(1, 1),
            Cell::new(0, 0),
            params,
        )
        .unwrap();

        let n = map.neighbors(Cell::new(1, 1));
        assert_eq!(&n[..4], &[Cell::new(1, 2), Cell::new(1, 0), Cell::new(2, 1), Cell::new(0, 1)]);
        assert!(n.contains(&Cell::new(2, 2)));
        assert!(n.contains(&Cell::new(0, 0)));
        assert!(!n.contains(&Cell::new(0, 2)));
        assert!(!n.contains(&Cell::new(2, 0)));

        // (0, 1) -> (1, 2) passes (0, 2) which is blocked
        assert_eq!(map.edge_cost(Cell::new(0, 1), Cell::new(1, 2)), None);
        assert_eq!(
            map.edge_cost(Cell::new(1, 1), Cell::new(2, 2)),
            Some(std::f64::consts::SQRT_2)
        );
    }

    #[test]
    fn test_adjacency_symmetric() {
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let map = GridMap::load(
                &grid(&[".#..", "..#.", "#...", "..#."]),
                Cell::new(0, 0),
                Cell::new(3, 3),
                GridMapParams {
                    connectivity,
                    ..Default::default()
                },
            )
            .unwrap();

            for i in 0..map.num_cells() {
                let a = map.cell_at(i);
                for b in map.neighbors(a) {
                    assert!(map.neighbors(b).contains(&a), "{} -> {} not symmetric", a, b);
                    assert_eq!(map.edge_cost(a, b), map.edge_cost(b, a));
                }
            }
        }
    }

    #[test]
    fn test_with_blocked() {
        let map = GridMap::load(
            &grid(&["...", "...", "..."]),
            Cell::new(0, 0),
            Cell::new(2, 2),
            GridMapParams::default(),
        )
        .unwrap();

        let blocked = map.with_blocked(&[Cell::new(1, 1), Cell::new(7, 7)]);

        assert!(map.is_traversable(Cell::new(1, 1)));
        assert!(!blocked.is_traversable(Cell::new(1, 1)));
        assert!(!blocked.neighbors(Cell::new(0, 1)).contains(&Cell::new(1, 1)));
        assert_eq!(blocked.render(None), "S..\n.#.\n..G\n");
    }

    #[test]
    fn test_connectivity_params() {
        let p: GridMapParams = util::params::from_toml_str("connectivity = 8").unwrap();
        assert_eq!(p.connectivity, Connectivity::Eight);
        assert_eq!(p.edge_cost, 1.0);

        assert!(util::params::from_toml_str::<GridMapParams>("connectivity = 6").is_err());
    }
}

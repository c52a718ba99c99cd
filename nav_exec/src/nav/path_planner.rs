//! Plans minimum cost paths through a [`GridMap`], using Dijkstra's algorithm.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::BinaryHeap;

use comms_if::Cell;
use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::map::GridMap;

use super::Path;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PathPlanner {
    params: PathPlannerParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathPlannerParams {
    /// Save a [`PathPlannerReport`] into the session archive after each plan.
    pub save_reports: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathPlannerReport {
    pub start: Cell,

    pub goal: Cell,

    /// Number of cells settled before the search finished.
    pub num_settled: usize,

    /// Number of entries pushed onto the frontier.
    pub num_pushed: usize,

    pub cost: Option<f64>,

    pub result: Option<Vec<Cell>>,
}

/// A frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    cost: OrderedFloat<f64>,

    /// Insertion sequence number, breaks ties between equal costs
    seq: u64,

    index: usize,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnreachableError {
    #[error("The start cell {0} is not traversable")]
    StartNotTraversable(Cell),

    #[error("The goal cell {0} is not traversable")]
    GoalNotTraversable(Cell),

    #[error("No path exists between {start} and {goal}")]
    NotConnected { start: Cell, goal: Cell },
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl PathPlanner {
    pub fn new(params: PathPlannerParams) -> Self {
        Self { params }
    }

    /// Plans a minimum cost path from `start` to `goal`.
    ///
    /// Never returns a partial path: if the goal cannot be reached an [`UnreachableError`] is
    /// returned. Among paths of equal cost the result is fixed by the map's neighbour order.
    pub fn plan(&self, map: &GridMap, start: Cell, goal: Cell) -> Result<Path, UnreachableError> {
        let mut report = PathPlannerReport {
            start,
            goal,
            num_settled: 0,
            num_pushed: 0,
            cost: None,
            result: None,
        };

        let result = self.search(map, start, goal, &mut report);

        match result {
            Ok(ref path) => {
                info!(
                    "Planned path {} -> {}: {} moves, cost {:.3} ({} cells settled)",
                    start,
                    goal,
                    path.num_moves(),
                    path.cost(),
                    report.num_settled
                );
                report.cost = Some(path.cost());
                report.result = Some(path.cells().to_vec());
            }
            Err(ref e) => warn!("Path planning failed: {}", e),
        }

        // Write the report out
        if self.params.save_reports {
            util::session::save_with_timestamp("path_planner/report.json", report);
        }

        result
    }

    fn search(
        &self,
        map: &GridMap,
        start: Cell,
        goal: Cell,
        report: &mut PathPlannerReport,
    ) -> Result<Path, UnreachableError> {
        let start_idx = match map.index(start) {
            Some(i) if map.is_traversable(start) => i,
            _ => return Err(UnreachableError::StartNotTraversable(start)),
        };
        let goal_idx = match map.index(goal) {
            Some(i) if map.is_traversable(goal) => i,
            _ => return Err(UnreachableError::GoalNotTraversable(goal)),
        };

        // Tentative distances, predecessors and settled flags, indexed by cell index
        let mut dist = vec![f64::INFINITY; map.num_cells()];
        let mut pred: Vec<Option<usize>> = vec![None; map.num_cells()];
        let mut settled = vec![false; map.num_cells()];

        // Create the priority queue (binary heap) for tracking nodes
        let mut heap = BinaryHeap::new();
        let mut seq = 0;

        dist[start_idx] = 0.0;
        heap.push(Node {
            cost: OrderedFloat(0.0),
            seq,
            index: start_idx,
        });
        report.num_pushed += 1;

        while let Some(node) = heap.pop() {
            if settled[node.index] {
                continue;
            }
            settled[node.index] = true;
            report.num_settled += 1;

            if node.index == goal_idx {
                return Ok(reconstruct(map, &pred, start_idx, goal_idx, node.cost.0));
            }

            let cell = map.cell_at(node.index);

            for neighbor in map.neighbors(cell) {
                let n_idx = match map.index(neighbor) {
                    Some(i) => i,
                    None => continue,
                };
                if settled[n_idx] {
                    continue;
                }

                let edge = match map.edge_cost(cell, neighbor) {
                    Some(c) => c,
                    None => continue,
                };

                // Strictly less, so the first route found keeps ties
                let cost = node.cost.0 + edge;
                if cost < dist[n_idx] {
                    dist[n_idx] = cost;
                    pred[n_idx] = Some(node.index);
                    seq += 1;
                    heap.push(Node {
                        cost: OrderedFloat(cost),
                        seq,
                        index: n_idx,
                    });
                    report.num_pushed += 1;
                }
            }
        }

        debug!("Frontier exhausted after settling {} cells", report.num_settled);

        Err(UnreachableError::NotConnected { start, goal })
    }
}

impl Default for PathPlannerParams {
    fn default() -> Self {
        Self { save_reports: true }
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Note that we flip the order here so that the heap will be a min-heap, not a max-heap
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Walk the predecessor chain back from the goal and reverse it.
fn reconstruct(
    map: &GridMap,
    pred: &[Option<usize>],
    start_idx: usize,
    goal_idx: usize,
    cost: f64,
) -> Path {
    let mut cells = vec![map.cell_at(goal_idx)];
    let mut current = goal_idx;

    while current != start_idx {
        match pred[current] {
            Some(p) => {
                cells.push(map.cell_at(p));
                current = p;
            }
            None => break,
        }
    }

    cells.reverse();

    // Non-empty by construction
    Path::new(cells, cost).unwrap_or_else(|| unreachable!("Reconstructed path is empty"))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

//! # Navigation module
//!
//! Route planning over the [`GridMap`](crate::map::GridMap).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod path;
mod path_planner;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use path::Path;
pub use path_planner::{PathPlanner, PathPlannerParams, PathPlannerReport, UnreachableError};

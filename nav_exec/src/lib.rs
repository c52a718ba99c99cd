//! # Navigation library.
//!
//! This library allows other crates in the workspace, and the integration tests, to access items
//! defined inside the navigation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control loop - one receive, control, and send per tick
pub mod control_loop;

/// Line tracker - classifies the line sensor array
pub mod line_tracker;

/// Link client - telemetry and command exchange with the simulation
pub mod link_client;

/// Grid map - the navigable surface
pub mod map;

/// Navigation - paths and the path planner
pub mod nav;

/// Navigation control - the state machine deciding each command
pub mod nav_ctrl;

/// Executable parameters
pub mod params;

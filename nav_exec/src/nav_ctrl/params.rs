//! Parameters structure for NavCtrl

use serde::Deserialize;

/// Parameters for navigation control.
#[derive(Debug, Clone, Deserialize)]
pub struct NavCtrlParams {
    /// Maximum number of ticks spent commanding `recover` before replanning.
    pub recovery_tick_budget: u32,

    /// Gain from lateral error to the proportional steer demand.
    #[serde(default = "default_steer_gain")]
    pub steer_gain: f64,

    /// Heading error to the next path segment above which a turn is commanded.
    ///
    /// Units: radians
    #[serde(default = "default_turn_threshold_rad")]
    pub turn_threshold_rad: f64,

    /// Maximum distance from the remaining path, in cells, before replanning.
    #[serde(default = "default_max_deviation_cells")]
    pub max_deviation_cells: u32,

    /// Maximum number of consecutive replans without progress along the path.
    #[serde(default = "default_replan_budget")]
    pub replan_budget: u32,
}

fn default_steer_gain() -> f64 {
    1.0
}

fn default_turn_threshold_rad() -> f64 {
    40f64.to_radians()
}

fn default_max_deviation_cells() -> u32 {
    1
}

fn default_replan_budget() -> u32 {
    3
}

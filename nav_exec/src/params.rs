//! # Navigation Executable Parameters
//!
//! This module provide parameters for the navigation executable, loaded from `nav_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;

use comms_if::Cell;
use serde::Deserialize;

use crate::{
    line_tracker::LineTrackerParams, link_client::LinkParams, map::GridMapParams,
    nav::PathPlannerParams, nav_ctrl::NavCtrlParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NavExecParams {
    pub map: MapParams,

    pub line_tracker: LineTrackerParams,

    pub nav_ctrl: NavCtrlParams,

    #[serde(default)]
    pub path_planner: PathPlannerParams,

    pub link: LinkParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapParams {
    /// Path to the map file, relative to the params directory
    pub map_path: PathBuf,

    pub start: Cell,

    pub goal: Cell,

    #[serde(default)]
    pub grid: GridMapParams,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        line_tracker::LinePolarity,
        map::{Connectivity, GridMap},
        nav::PathPlanner,
    };

    #[test]
    fn test_shipped_params() {
        let params: NavExecParams =
            util::params::from_toml_str(include_str!("../../params/nav_exec.toml")).unwrap();

        assert_eq!(params.map.start, Cell::new(3, 20));
        assert_eq!(params.map.goal, Cell::new(14, 4));
        assert_eq!(params.map.grid.connectivity, Connectivity::Four);
        assert_eq!(params.line_tracker.line_polarity, LinePolarity::Below);
        assert_eq!(params.line_tracker.sensor_threshold, 600.0);
        assert!(!params.link.socket.bind);
        assert!(params.link.retry_budget > 0);
        assert!((params.nav_ctrl.turn_threshold_rad - 40f64.to_radians()).abs() < 1e-3);
    }

    #[test]
    fn test_shipped_map() {
        #[derive(Deserialize)]
        struct MapFile {
            occupancy: Vec<Vec<i64>>,
        }

        let params: NavExecParams =
            util::params::from_toml_str(include_str!("../../params/nav_exec.toml")).unwrap();
        let file: MapFile =
            util::params::from_toml_str(include_str!("../../params/maps/sequel.toml")).unwrap();

        let map = GridMap::load(
            &file.occupancy,
            params.map.start,
            params.map.goal,
            params.map.grid,
        )
        .unwrap();
        assert_eq!((map.num_rows(), map.num_cols()), (15, 21));

        let path = PathPlanner::new(Default::default())
            .plan(&map, map.start(), map.goal())
            .unwrap();
        assert_eq!(path.start(), Cell::new(3, 20));
        assert_eq!(path.goal(), Cell::new(14, 4));
        assert!(path.is_connected());
    }
}

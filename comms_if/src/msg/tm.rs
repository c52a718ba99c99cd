//! # Telemetry message

use serde::{Deserialize, Serialize};

use crate::Cell;

use super::MsgError;

/// Telemetry produced by the simulation each control tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Grid cell the robot currently occupies.
    pub position: Cell,

    /// Raw line sensor values, ordered left to right across the robot.
    pub sensors: Vec<f64>,

    /// Monotonic tick counter of the simulation.
    pub tick: u64,

    /// Robot heading in the grid frame, in radians.
    ///
    /// Zero points along increasing columns and positive angles turn towards increasing rows, so
    /// `pi/2` points "down" the grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_rad: Option<f64>,

    /// Cells reported blocked by the simulation's proximity sensors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<Cell>,
}

impl Telemetry {
    pub fn new(position: Cell, sensors: Vec<f64>, tick: u64) -> Self {
        Self {
            position,
            sensors,
            tick,
            heading_rad: None,
            obstacles: Vec::new(),
        }
    }

    /// Check the invariants which cannot be expressed in the serde schema.
    pub(crate) fn validate(&self) -> Result<(), MsgError> {
        if self.sensors.is_empty() {
            return Err(MsgError::Invalid("telemetry contains no sensor readings".into()));
        }

        if let Some(h) = self.heading_rad {
            if !h.is_finite() {
                return Err(MsgError::Invalid(format!("heading {} is not finite", h)));
            }
        }

        Ok(())
    }
}

//! # Navigation control module
//!
//! [`NavCtrl`] is the state machine which turns telemetry into one command per tick. It merges
//! the planned path with the [`LineTracker`](crate::line_tracker::LineTracker) classification
//! and owns the [`ControllerState`]. The states are:
//!
//! - `Following` - Steering along the line towards the next cell of the path.
//! - `Recovering` - The line has been lost, `recover` is commanded for a bounded number of ticks.
//! - `Replanning` - A new path is being planned from the current position. Entered when
//!   recovery is exhausted, when an obstacle is reported on the remaining path, or when the robot
//!   strays from the path. Always resolved within the tick that entered it.
//! - `Done` - The goal has been reached. Terminal.
//! - `Faulted` - Navigation cannot continue. Terminal.
//!
//! Both terminal states command `stop` on every tick.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use comms_if::msg::Telemetry;
use serde::Serialize;

pub use params::NavCtrlParams;
pub use state::{ControllerState, NavCtrl, NavStatusReport};

use crate::nav::UnreachableError;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Input to one tick of the controller.
#[derive(Debug, Clone)]
pub enum NavInput {
    /// Fresh telemetry was received.
    Telemetry(Telemetry),

    /// No telemetry arrived within the receive timeout.
    MissedTick,

    /// The link is permanently down.
    LinkDown,

    /// The peer exceeded the budget of consecutive malformed messages.
    LinkMalformed,

    /// An operator asked for the robot to stop.
    StopRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavState {
    Following,
    Recovering {
        /// Number of ticks `recover` has been commanded for in this episode
        ticks: u32,
    },
    Replanning,
    Done,
    Faulted(FaultCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultCause {
    /// No path exists from the robot's position to the goal.
    Unreachable,

    /// Too many consecutive replans were made without progress along the path.
    ReplanBudgetExceeded,

    LinkDown,

    /// The peer kept sending messages which could not be decoded.
    MalformedLink,

    StopRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplanCause {
    /// The line was not reacquired within the recovery budget.
    RecoveryExhausted,

    /// An obstacle was reported on the remaining path.
    Blocked,

    /// The robot is too far from every remaining cell of the path.
    Deviated,
}

#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("Could not plan the initial path: {0}")]
    InitialPlanError(UnreachableError),

    #[error("Telemetry for tick {0} contains no sensor readings")]
    NoSensorReadings(u64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavState {
    /// Return if no further transitions can happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NavState::Done | NavState::Faulted(_))
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavState::Following => write!(f, "FOLLOWING"),
            NavState::Recovering { ticks } => write!(f, "RECOVERING({})", ticks),
            NavState::Replanning => write!(f, "REPLANNING"),
            NavState::Done => write!(f, "DONE"),
            NavState::Faulted(c) => write!(f, "FAULTED({:?})", c),
        }
    }
}

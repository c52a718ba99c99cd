//! # Command message

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Cell;

/// The closed set of directives the navigation core can give the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Drive forwards along the line.
    Forward,

    /// Turn anticlockwise (towards the line, or onto the next path segment).
    TurnLeft,

    /// Turn clockwise.
    TurnRight,

    /// Halt all motion.
    Stop,

    /// Perform the bounded search spin to reacquire the line.
    Recover,
}

/// A command sent to the simulation, tagged with the telemetry tick it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMsg {
    pub command: Command,

    /// Tick of the telemetry this command responds to. The simulation must discard commands whose
    /// tick does not match the tick it last published.
    pub tick: u64,

    /// Proportional steering demand in [-1, 1], positive to the right.
    #[serde(default)]
    pub steer: f64,

    /// Current planned path, attached whenever a new path is produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Cell>>,

    /// Index of the robot's current cell within the planned path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_index: Option<usize>,
}

impl Command {
    /// Every command, in declaration order.
    pub const ALL: [Command; 5] = [
        Command::Forward,
        Command::TurnLeft,
        Command::TurnRight,
        Command::Stop,
        Command::Recover,
    ];

    /// True for every command which moves the robot.
    pub fn is_motion(&self) -> bool {
        !matches!(self, Command::Stop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::TurnLeft => "turn_left",
            Command::TurnRight => "turn_right",
            Command::Stop => "stop",
            Command::Recover => "recover",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CommandMsg {
    pub fn new(command: Command, tick: u64) -> Self {
        Self {
            command,
            tick,
            steer: 0.0,
            path: None,
            path_index: None,
        }
    }
}

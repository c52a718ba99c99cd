//! # Line tracker
//!
//! Classifies the robot's position relative to the line from the raw sensor array.
//!
//! Each reading is compared against the sensor threshold to decide whether that sensor sees the
//! line. The sensors are taken to be evenly spaced across the robot from `-1` (leftmost) to `+1`
//! (rightmost), and the centroid of the active sensors is the lateral error: positive when the
//! line is to the right of the robot's centre.
//!
//! Classification only depends on the last `lost_tick_budget + 1` frames:
//!
//! - No frame in a full window saw the line - [`TrackState::Lost`].
//! - Otherwise the most recent frame which saw the line gives the error, and the state is
//!   [`TrackState::Drifting`] if its magnitude exceeds `drift_margin`, or
//!   [`TrackState::OnLine`] if it doesn't.
//!
//! Until the line has been seen and before the window has filled the tracker reports
//! [`TrackState::OnLine`] with zero error.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};
use util::maths::lin_map;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LineTracker {
    params: LineTrackerParams,

    /// Lateral error of each frame in the lookback window, `None` if the line wasn't seen.
    window: VecDeque<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineTrackerParams {
    /// Reading at which a sensor is considered to see the line.
    pub sensor_threshold: f64,

    /// Whether the line reads at or above the threshold, or at or below it.
    #[serde(default)]
    pub line_polarity: LinePolarity,

    /// Maximum magnitude of lateral error which is still considered on the line.
    pub drift_margin: f64,

    /// Number of consecutive frames without the line which are tolerated before the line is
    /// considered lost.
    pub lost_tick_budget: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackState {
    OnLine,
    Drifting,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePolarity {
    /// The line reads high, a sensor is active at or above the threshold.
    Above,

    /// The line reads low, a sensor is active at or below the threshold.
    Below,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineTracker {
    pub fn new(params: LineTrackerParams) -> Self {
        Self {
            window: VecDeque::with_capacity(params.lost_tick_budget + 1),
            params,
        }
    }

    /// Classify a new frame of sensor readings, returning the track state and lateral error.
    ///
    /// The lateral error is zero when the line is lost.
    pub fn classify(&mut self, readings: &[f64]) -> (TrackState, f64) {
        let window_len = self.params.lost_tick_budget + 1;

        self.window.push_back(self.lateral_error(readings));
        while self.window.len() > window_len {
            self.window.pop_front();
        }

        match self.window.iter().rev().flatten().next() {
            Some(&err) if err.abs() > self.params.drift_margin => (TrackState::Drifting, err),
            Some(&err) => (TrackState::OnLine, err),
            None if self.window.len() == window_len => (TrackState::Lost, 0.0),
            None => (TrackState::OnLine, 0.0),
        }
    }

    /// Forget all previous frames.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Number of consecutive frames, up to the window length, in which the line wasn't seen.
    pub fn frames_without_line(&self) -> usize {
        self.window.iter().rev().take_while(|e| e.is_none()).count()
    }

    /// Centroid of the active sensors, or `None` if no sensor sees the line.
    fn lateral_error(&self, readings: &[f64]) -> Option<f64> {
        let n = readings.len();
        let mut sum = 0.0;
        let mut num_active = 0;

        for (i, r) in readings.iter().enumerate() {
            let active = match self.params.line_polarity {
                LinePolarity::Above => *r >= self.params.sensor_threshold,
                LinePolarity::Below => *r <= self.params.sensor_threshold,
            };

            if active {
                sum += sensor_position(i, n);
                num_active += 1;
            }
        }

        match num_active {
            0 => None,
            k => Some(sum / k as f64),
        }
    }
}

impl Default for LinePolarity {
    fn default() -> Self {
        LinePolarity::Above
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackState::OnLine => write!(f, "ON_LINE"),
            TrackState::Drifting => write!(f, "DRIFTING"),
            TrackState::Lost => write!(f, "LOST"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Position of sensor `i` of `n` across the robot, in [-1, 1].
fn sensor_position(i: usize, n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        n => lin_map((0.0, (n - 1) as f64), (-1.0, 1.0), i as f64),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

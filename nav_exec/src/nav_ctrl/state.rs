//! Implementations for the NavCtrl state structure

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::BTreeSet, fmt, sync::Arc};

use comms_if::{
    msg::{Command, CommandMsg, Telemetry},
    Cell,
};
use log::{info, warn};
use serde::Serialize;
use util::{
    maths::{ang_dist, clamp},
    module::State,
};

use super::{FaultCause, NavCtrlError, NavCtrlParams, NavInput, NavState, ReplanCause};
use crate::{
    line_tracker::{LineTracker, LineTrackerParams, TrackState},
    map::GridMap,
    nav::{Path, PathPlanner},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Navigation control module state
pub struct NavCtrl {
    params: NavCtrlParams,

    /// Map as loaded, without any run time blockages
    base_map: Arc<GridMap>,

    /// Base map with the blockages applied, used for replanning
    map: Arc<GridMap>,

    blockages: BTreeSet<Cell>,

    planner: PathPlanner,

    tracker: LineTracker,

    nav_state: NavState,

    ctrl_state: ControllerState,

    /// Replans since the last progress along a path
    num_consec_replans: u32,

    num_replans: u32,

    /// Tick of the last telemetry processed
    last_tick: Option<u64>,

    /// Set when the current path hasn't been attached to a command yet
    path_pending: bool,
}

/// Per-tick state of the controller, reset on replanning.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub current_path: Arc<Path>,

    /// Index into `current_path` of the robot's current cell
    pub path_index: usize,

    pub track_state: TrackState,

    pub last_command: Command,
}

/// Status report for NavCtrl processing.
#[derive(Debug, Clone, Serialize)]
pub struct NavStatusReport {
    pub tick: Option<u64>,

    pub state: NavState,

    pub track_state: TrackState,

    pub lateral_error: f64,

    pub position: Option<Cell>,

    pub path_index: usize,

    pub path_len: usize,

    /// Command emitted this tick, `None` on a missed tick
    pub command: Option<Command>,

    /// Set if a replan was triggered this tick
    pub replan_cause: Option<ReplanCause>,

    pub num_replans: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavCtrl {
    /// Create the controller and plan the initial path from the map's start to its goal.
    pub fn new(
        params: NavCtrlParams,
        tracker_params: LineTrackerParams,
        map: Arc<GridMap>,
        planner: PathPlanner,
    ) -> Result<Self, NavCtrlError> {
        let path = planner
            .plan(&map, map.start(), map.goal())
            .map_err(NavCtrlError::InitialPlanError)?;

        Ok(Self {
            params,
            base_map: map.clone(),
            map,
            blockages: BTreeSet::new(),
            planner,
            tracker: LineTracker::new(tracker_params),
            nav_state: NavState::Following,
            ctrl_state: ControllerState {
                current_path: Arc::new(path),
                path_index: 0,
                track_state: TrackState::OnLine,
                last_command: Command::Stop,
            },
            num_consec_replans: 0,
            num_replans: 0,
            last_tick: None,
            path_pending: true,
        })
    }

    pub fn state(&self) -> NavState {
        self.nav_state
    }

    pub fn controller_state(&self) -> &ControllerState {
        &self.ctrl_state
    }

    pub fn path(&self) -> Arc<Path> {
        self.ctrl_state.current_path.clone()
    }

    /// Map currently used for planning, including any blockages.
    pub fn map(&self) -> Arc<GridMap> {
        self.map.clone()
    }

    pub fn blockages(&self) -> &BTreeSet<Cell> {
        &self.blockages
    }

    pub fn is_terminal(&self) -> bool {
        self.nav_state.is_terminal()
    }

    fn proc_telemetry(
        &mut self,
        tm: &Telemetry,
        report: &mut NavStatusReport,
    ) -> Result<CommandMsg, NavCtrlError> {
        if tm.sensors.is_empty() {
            return Err(NavCtrlError::NoSensorReadings(tm.tick));
        }

        self.last_tick = Some(tm.tick);
        report.tick = Some(tm.tick);
        report.position = Some(tm.position);

        if self.is_terminal() {
            return Ok(self.emit(Command::Stop, 0.0, report));
        }

        let (track_state, lateral_error) = self.tracker.classify(&tm.sensors);
        self.ctrl_state.track_state = track_state;
        report.track_state = track_state;
        report.lateral_error = lateral_error;

        // Blockages take precedence over everything, including a lost line
        if self.apply_blockages(&tm.obstacles) {
            return Ok(self.replan(tm.position, ReplanCause::Blocked, report));
        }

        self.advance_path_index(tm.position);

        if self.deviation(tm.position) > self.params.max_deviation_cells {
            return Ok(self.replan(tm.position, ReplanCause::Deviated, report));
        }

        let path = &self.ctrl_state.current_path;
        if self.ctrl_state.path_index == path.len() - 1 && tm.position == path.goal() {
            info!("Goal {} reached", tm.position);
            self.set_state(NavState::Done);
            return Ok(self.emit(Command::Stop, 0.0, report));
        }

        let nav_state = self.nav_state;
        let msg = match nav_state {
            NavState::Following => match track_state {
                TrackState::Lost if self.params.recovery_tick_budget == 0 => {
                    self.replan(tm.position, ReplanCause::RecoveryExhausted, report)
                }
                TrackState::Lost => {
                    self.set_state(NavState::Recovering { ticks: 1 });
                    self.emit(Command::Recover, 0.0, report)
                }
                _ => self.steer(tm, track_state, lateral_error, report),
            },
            NavState::Recovering { ticks } => match track_state {
                TrackState::Lost if ticks < self.params.recovery_tick_budget => {
                    self.nav_state = NavState::Recovering { ticks: ticks + 1 };
                    self.emit(Command::Recover, 0.0, report)
                }
                TrackState::Lost => {
                    self.replan(tm.position, ReplanCause::RecoveryExhausted, report)
                }
                _ => {
                    info!("Line reacquired after {} recovery ticks", ticks);
                    self.set_state(NavState::Following);
                    self.steer(tm, track_state, lateral_error, report)
                }
            },
            NavState::Replanning | NavState::Done | NavState::Faulted(_) => {
                self.emit(Command::Stop, 0.0, report)
            }
        };

        Ok(msg)
    }

    /// Record any reported obstacles which lie ahead on the current path. Returns true if a new
    /// blockage was found.
    fn apply_blockages(&mut self, obstacles: &[Cell]) -> bool {
        if obstacles.is_empty() {
            return false;
        }

        let path = self.ctrl_state.current_path.clone();
        let ahead = path.remaining(self.ctrl_state.path_index + 1);
        let mut found = false;

        for obstacle in obstacles {
            if ahead.contains(obstacle) && self.map.is_traversable(*obstacle) {
                warn!("Obstacle reported on the path at {}", obstacle);
                self.blockages.insert(*obstacle);
                found = true;
            }
        }

        if found {
            self.map = Arc::new(self.base_map.with_blocked(&self.blockages));
        }

        found
    }

    /// Move the path index forward if the robot is found further along the path.
    fn advance_path_index(&mut self, position: Cell) {
        let index = self.ctrl_state.path_index;

        if let Some(i) = self.ctrl_state.current_path.find_from(position, index + 1) {
            self.ctrl_state.path_index = i;
            self.num_consec_replans = 0;
        }
    }

    /// Distance in cells from the position to the nearest remaining cell of the path.
    fn deviation(&self, position: Cell) -> u32 {
        self.ctrl_state
            .current_path
            .remaining(self.ctrl_state.path_index)
            .iter()
            .map(|c| c.chebyshev(&position))
            .min()
            .unwrap_or(u32::MAX)
    }

    /// Plan a new path from the position to the goal.
    ///
    /// The replanning tick always commands `stop`.
    fn replan(
        &mut self,
        position: Cell,
        cause: ReplanCause,
        report: &mut NavStatusReport,
    ) -> CommandMsg {
        report.replan_cause = Some(cause);
        self.set_state(NavState::Replanning);

        self.num_replans += 1;
        self.num_consec_replans += 1;

        if self.num_consec_replans > self.params.replan_budget {
            warn!(
                "Replan budget of {} exceeded without progress",
                self.params.replan_budget
            );
            self.set_state(NavState::Faulted(FaultCause::ReplanBudgetExceeded));
            return self.emit(Command::Stop, 0.0, report);
        }

        info!("Replanning from {} ({:?})", position, cause);

        match self.planner.plan(&self.map, position, self.base_map.goal()) {
            Ok(path) => {
                self.ctrl_state.current_path = Arc::new(path);
                self.ctrl_state.path_index = 0;
                self.path_pending = true;
                self.tracker.reset();
                self.set_state(NavState::Following);
            }
            Err(_) => self.set_state(NavState::Faulted(FaultCause::Unreachable)),
        }

        self.emit(Command::Stop, 0.0, report)
    }

    /// Choose the motion command while following the line.
    fn steer(
        &mut self,
        tm: &Telemetry,
        track_state: TrackState,
        lateral_error: f64,
        report: &mut NavStatusReport,
    ) -> CommandMsg {
        // Planned turns onto the next segment take precedence over line corrections
        if let (Some(heading), Some(target)) = (tm.heading_rad, self.segment_heading()) {
            let heading_err = ang_dist(heading, target);

            if heading_err.abs() > self.params.turn_threshold_rad {
                let command = match heading_err > 0.0 {
                    true => Command::TurnLeft,
                    false => Command::TurnRight,
                };
                return self.emit(command, 0.0, report);
            }
        }

        let steer = clamp(self.params.steer_gain * lateral_error, -1.0, 1.0);

        let command = match track_state {
            TrackState::Drifting if lateral_error > 0.0 => Command::TurnRight,
            TrackState::Drifting => Command::TurnLeft,
            _ => Command::Forward,
        };

        self.emit(command, steer, report)
    }

    /// Heading of the path segment leaving the current cell, zero along increasing columns.
    fn segment_heading(&self) -> Option<f64> {
        let path = &self.ctrl_state.current_path;
        let from = path.get(self.ctrl_state.path_index)?;
        let to = path.get(self.ctrl_state.path_index + 1)?;

        Some(((to.row - from.row) as f64).atan2((to.col - from.col) as f64))
    }

    fn emit(&mut self, command: Command, steer: f64, report: &mut NavStatusReport) -> CommandMsg {
        self.ctrl_state.last_command = command;
        report.command = Some(command);
        report.state = self.nav_state;
        report.path_index = self.ctrl_state.path_index;
        report.path_len = self.ctrl_state.current_path.len();

        let mut msg = CommandMsg::new(command, self.last_tick.unwrap_or(0));
        msg.steer = steer;
        msg.path_index = Some(self.ctrl_state.path_index);

        if self.path_pending {
            msg.path = Some(self.ctrl_state.current_path.cells().to_vec());
            self.path_pending = false;
        }

        msg
    }

    fn set_state(&mut self, new: NavState) {
        if new != self.nav_state {
            info!("NavCtrl state change: {} -> {}", self.nav_state, new);
            self.nav_state = new;
        }
    }

    fn new_report(&self) -> NavStatusReport {
        NavStatusReport {
            tick: None,
            state: self.nav_state,
            track_state: self.ctrl_state.track_state,
            lateral_error: 0.0,
            position: None,
            path_index: self.ctrl_state.path_index,
            path_len: self.ctrl_state.current_path.len(),
            command: None,
            replan_cause: None,
            num_replans: self.num_replans,
        }
    }
}

impl State for NavCtrl {
    type InputData = NavInput;
    type OutputData = Option<CommandMsg>;
    type StatusReport = NavStatusReport;
    type ProcError = NavCtrlError;

    /// Perform one tick of navigation control.
    ///
    /// A command is produced for every input except a missed tick outside of the terminal
    /// states.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let mut report = self.new_report();

        let output = match input_data {
            NavInput::Telemetry(tm) => Some(self.proc_telemetry(tm, &mut report)?),
            NavInput::MissedTick => match self.is_terminal() {
                true => Some(self.emit(Command::Stop, 0.0, &mut report)),
                false => None,
            },
            NavInput::LinkDown => {
                if !self.is_terminal() {
                    warn!("Link is down, stopping");
                    self.set_state(NavState::Faulted(FaultCause::LinkDown));
                }
                Some(self.emit(Command::Stop, 0.0, &mut report))
            }
            NavInput::LinkMalformed => {
                if !self.is_terminal() {
                    warn!("Too many malformed messages from the link, stopping");
                    self.set_state(NavState::Faulted(FaultCause::MalformedLink));
                }
                Some(self.emit(Command::Stop, 0.0, &mut report))
            }
            NavInput::StopRequested => {
                if !self.is_terminal() {
                    info!("Stop requested");
                    self.set_state(NavState::Faulted(FaultCause::StopRequested));
                }
                Some(self.emit(Command::Stop, 0.0, &mut report))
            }
        };

        report.state = self.nav_state;
        report.num_replans = self.num_replans;

        Ok((output, report))
    }
}

impl fmt::Display for NavStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tick {
            Some(t) => write!(f, "[tick {:>6}] ", t)?,
            None => write!(f, "[tick  -----] ")?,
        }

        write!(
            f,
            "{:<12} {:<8} err {:+.2} path {:>3}/{:<3}",
            self.state.to_string(),
            self.track_state.to_string(),
            self.lateral_error,
            self.path_index,
            self.path_len.saturating_sub(1),
        )?;

        if let Some(p) = self.position {
            write!(f, " at {}", p)?;
        }

        match self.command {
            Some(c) => write!(f, " -> {}", c)?,
            None => write!(f, " -> (none)")?,
        }

        if let Some(cause) = self.replan_cause {
            write!(f, " [replan: {:?}]", cause)?;
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        line_tracker::LinePolarity,
        map::GridMapParams,
        nav::PathPlannerParams,
    };
    use std::f64::consts::FRAC_PI_2;

    const ON: [f64; 3] = [0.0, 1.0, 0.0];
    const RIGHT: [f64; 3] = [0.0, 0.0, 1.0];
    const OFF: [f64; 3] = [0.0, 0.0, 0.0];

    fn params() -> NavCtrlParams {
        NavCtrlParams {
            recovery_tick_budget: 3,
            steer_gain: 0.5,
            turn_threshold_rad: 40f64.to_radians(),
            max_deviation_cells: 1,
            replan_budget: 2,
        }
    }

    fn tracker_params() -> LineTrackerParams {
        LineTrackerParams {
            sensor_threshold: 0.5,
            line_polarity: LinePolarity::Above,
            drift_margin: 0.25,
            lost_tick_budget: 1,
        }
    }

    /// Open 3x5 grid, start (0, 0), goal (0, 4)
    fn nav_ctrl(params: NavCtrlParams) -> NavCtrl {
        let map = GridMap::load(
            &vec![vec![0; 5]; 3],
            Cell::new(0, 0),
            Cell::new(0, 4),
            GridMapParams::default(),
        )
        .unwrap();

        NavCtrl::new(
            params,
            tracker_params(),
            Arc::new(map),
            PathPlanner::new(PathPlannerParams {
                save_reports: false,
            }),
        )
        .unwrap()
    }

    fn tm(tick: u64, pos: (i32, i32), sensors: &[f64]) -> NavInput {
        NavInput::Telemetry(Telemetry::new(pos.into(), sensors.to_vec(), tick))
    }

    fn step(nc: &mut NavCtrl, input: NavInput) -> (Option<CommandMsg>, NavStatusReport) {
        nc.proc(&input).unwrap()
    }

    fn command(nc: &mut NavCtrl, input: NavInput) -> Option<Command> {
        step(nc, input).0.map(|m| m.command)
    }

    #[test]
    fn test_follow_to_goal() {
        let mut nc = nav_ctrl(params());
        assert_eq!(nc.path().cells().len(), 5);

        let (msg, report) = step(&mut nc, tm(1, (0, 0), &ON));
        let msg = msg.unwrap();
        assert_eq!(msg.command, Command::Forward);
        assert_eq!(msg.tick, 1);
        assert_eq!(msg.path.as_ref().map(|p| p.len()), Some(5));
        assert_eq!(report.state, NavState::Following);

        // Path is only attached once
        let (msg, _) = step(&mut nc, tm(2, (0, 1), &RIGHT));
        let msg = msg.unwrap();
        assert_eq!(msg.command, Command::TurnRight);
        assert_eq!(msg.steer, 0.5);
        assert_eq!(msg.path_index, Some(1));
        assert!(msg.path.is_none());

        // Skipping a cell re-aligns the index
        assert_eq!(command(&mut nc, tm(3, (0, 3), &ON)), Some(Command::Forward));
        assert_eq!(nc.controller_state().path_index, 3);

        assert_eq!(command(&mut nc, tm(4, (0, 4), &ON)), Some(Command::Stop));
        assert_eq!(nc.state(), NavState::Done);

        // Terminal
        for tick in 5..10 {
            assert_eq!(command(&mut nc, tm(tick, (0, 4), &OFF)), Some(Command::Stop));
        }
        assert_eq!(command(&mut nc, NavInput::MissedTick), Some(Command::Stop));
        assert_eq!(command(&mut nc, NavInput::StopRequested), Some(Command::Stop));
        assert_eq!(nc.state(), NavState::Done);
    }

    #[test]
    fn test_missed_tick_changes_nothing() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(1, (0, 1), &ON));
        let index = nc.controller_state().path_index;

        let (msg, report) = step(&mut nc, NavInput::MissedTick);
        assert!(msg.is_none());
        assert!(report.command.is_none());
        assert_eq!(nc.state(), NavState::Following);
        assert_eq!(nc.controller_state().path_index, index);
    }

    #[test]
    fn test_recovery_then_reacquire() {
        let mut nc = nav_ctrl(params());

        assert_eq!(command(&mut nc, tm(1, (0, 0), &ON)), Some(Command::Forward));
        // Within the lost budget the last sighting holds
        assert_eq!(command(&mut nc, tm(2, (0, 0), &OFF)), Some(Command::Forward));
        assert_eq!(command(&mut nc, tm(3, (0, 0), &OFF)), Some(Command::Recover));
        assert_eq!(nc.state(), NavState::Recovering { ticks: 1 });
        assert_eq!(command(&mut nc, tm(4, (0, 0), &OFF)), Some(Command::Recover));
        assert_eq!(command(&mut nc, tm(5, (0, 0), &ON)), Some(Command::Forward));
        assert_eq!(nc.state(), NavState::Following);
    }

    #[test]
    fn test_recovery_exhaustion_replans_once() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(1, (0, 1), &ON));
        step(&mut nc, tm(2, (0, 1), &OFF));

        let mut commands = vec![];
        let mut replans = vec![];
        for tick in 3..8 {
            let (msg, report) = step(&mut nc, tm(tick, (0, 1), &OFF));
            commands.push(msg.unwrap().command);
            if report.replan_cause.is_some() {
                replans.push((tick, report.replan_cause));
            }
        }

        // Budget of three recover ticks, then one replan which stops
        assert_eq!(
            &commands[..4],
            &[Command::Recover, Command::Recover, Command::Recover, Command::Stop]
        );
        assert_eq!(replans, vec![(6, Some(ReplanCause::RecoveryExhausted))]);
        assert_eq!(nc.state(), NavState::Following);
        assert_eq!(nc.path().start(), Cell::new(0, 1));
        assert_eq!(nc.controller_state().path_index, 0);

        // Tracker was reset, so the window needs to fill again before LOST
        assert_eq!(commands[4], Command::Forward);
    }

    #[test]
    fn test_zero_recovery_budget() {
        let mut nc = nav_ctrl(NavCtrlParams {
            recovery_tick_budget: 0,
            ..params()
        });
        step(&mut nc, tm(1, (0, 0), &OFF));
        let (msg, report) = step(&mut nc, tm(2, (0, 0), &OFF));

        assert_eq!(msg.unwrap().command, Command::Stop);
        assert_eq!(report.replan_cause, Some(ReplanCause::RecoveryExhausted));
    }

    #[test]
    fn test_blockage_replans_around() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(1, (0, 0), &ON));

        // Obstacle ahead reported while the line is lost, blockage wins
        let mut t = Telemetry::new(Cell::new(0, 1), OFF.to_vec(), 2);
        t.obstacles = vec![Cell::new(0, 3), Cell::new(2, 2)];
        let (msg, report) = step(&mut nc, NavInput::Telemetry(t));
        let msg = msg.unwrap();

        assert_eq!(msg.command, Command::Stop);
        assert_eq!(report.replan_cause, Some(ReplanCause::Blocked));
        assert_eq!(nc.blockages().iter().copied().collect::<Vec<_>>(), vec![Cell::new(0, 3)]);

        let path = msg.path.unwrap();
        assert_eq!(path.first(), Some(&Cell::new(0, 1)));
        assert_eq!(path.last(), Some(&Cell::new(0, 4)));
        assert!(!path.contains(&Cell::new(0, 3)));
        assert_eq!(path.len(), 6);

        // Reporting the same obstacle again is not a new blockage
        let mut t = Telemetry::new(Cell::new(0, 1), ON.to_vec(), 3);
        t.obstacles = vec![Cell::new(0, 3)];
        let (_, report) = step(&mut nc, NavInput::Telemetry(t));
        assert!(report.replan_cause.is_none());
    }

    #[test]
    fn test_unreachable_faults() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(1, (0, 3), &ON));

        let mut t = Telemetry::new(Cell::new(0, 3), ON.to_vec(), 2);
        t.obstacles = vec![Cell::new(0, 4)];
        assert_eq!(command(&mut nc, NavInput::Telemetry(t)), Some(Command::Stop));
        assert_eq!(nc.state(), NavState::Faulted(FaultCause::Unreachable));

        assert_eq!(command(&mut nc, tm(3, (0, 3), &ON)), Some(Command::Stop));
    }

    #[test]
    fn test_deviation_replans_and_budget() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(1, (0, 0), &ON));

        // One cell off the path is tolerated
        let (_, report) = step(&mut nc, tm(2, (1, 1), &ON));
        assert!(report.replan_cause.is_none());

        // Two is not
        let (_, report) = step(&mut nc, tm(3, (2, 0), &ON));
        assert_eq!(report.replan_cause, Some(ReplanCause::Deviated));
        assert_eq!(nc.path().start(), Cell::new(2, 0));

        // Repeated deviation without progress exhausts the replan budget of two
        let (_, report) = step(&mut nc, tm(4, (0, 0), &ON));
        assert_eq!(report.replan_cause, Some(ReplanCause::Deviated));
        assert_eq!(nc.state(), NavState::Following);
        let (_, report) = step(&mut nc, tm(5, (2, 0), &ON));
        assert_eq!(report.replan_cause, Some(ReplanCause::Deviated));
        assert_eq!(
            nc.state(),
            NavState::Faulted(FaultCause::ReplanBudgetExceeded)
        );
    }

    #[test]
    fn test_position_at_coordinate_limits_faults() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(1, (0, 0), &ON));

        let (msg, report) = step(&mut nc, tm(2, (i32::MIN, 0), &ON));
        assert_eq!(report.replan_cause, Some(ReplanCause::Deviated));
        assert_eq!(msg.unwrap().command, Command::Stop);
        assert_eq!(nc.state(), NavState::Faulted(FaultCause::Unreachable));

        let mut nc = nav_ctrl(params());
        let (_, report) = step(&mut nc, tm(1, (i32::MAX, i32::MIN), &ON));
        assert_eq!(report.replan_cause, Some(ReplanCause::Deviated));
        assert!(nc.is_terminal());
    }

    #[test]
    fn test_heading_turns() {
        let mut nc = nav_ctrl(params());

        // Path runs along increasing columns, heading zero
        let mut t = Telemetry::new(Cell::new(0, 0), RIGHT.to_vec(), 1);
        t.heading_rad = Some(FRAC_PI_2);
        let msg = step(&mut nc, NavInput::Telemetry(t)).0.unwrap();
        assert_eq!(msg.command, Command::TurnRight);
        assert_eq!(msg.steer, 0.0);

        let mut t = Telemetry::new(Cell::new(0, 0), ON.to_vec(), 2);
        t.heading_rad = Some(-FRAC_PI_2);
        assert_eq!(command(&mut nc, NavInput::Telemetry(t)), Some(Command::TurnLeft));

        // Within the threshold the line decides
        let mut t = Telemetry::new(Cell::new(0, 0), ON.to_vec(), 3);
        t.heading_rad = Some(0.5);
        assert_eq!(command(&mut nc, NavInput::Telemetry(t)), Some(Command::Forward));
    }

    #[test]
    fn test_link_down_and_stop_request() {
        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(7, (0, 0), &ON));

        let msg = step(&mut nc, NavInput::LinkDown).0.unwrap();
        assert_eq!(msg.command, Command::Stop);
        assert_eq!(msg.tick, 7);
        assert_eq!(nc.state(), NavState::Faulted(FaultCause::LinkDown));

        // Cause is kept
        step(&mut nc, NavInput::StopRequested);
        assert_eq!(nc.state(), NavState::Faulted(FaultCause::LinkDown));

        let mut nc = nav_ctrl(params());
        assert_eq!(command(&mut nc, NavInput::StopRequested), Some(Command::Stop));
        assert_eq!(nc.state(), NavState::Faulted(FaultCause::StopRequested));

        let mut nc = nav_ctrl(params());
        step(&mut nc, tm(3, (0, 0), &ON));
        let msg = step(&mut nc, NavInput::LinkMalformed).0.unwrap();
        assert_eq!(msg.command, Command::Stop);
        assert_eq!(msg.tick, 3);
        assert_eq!(nc.state(), NavState::Faulted(FaultCause::MalformedLink));
        assert_eq!(command(&mut nc, NavInput::MissedTick), Some(Command::Stop));
    }

    #[test]
    fn test_empty_sensors_rejected() {
        let mut nc = nav_ctrl(params());
        assert!(matches!(
            nc.proc(&tm(1, (0, 0), &[])),
            Err(NavCtrlError::NoSensorReadings(1))
        ));
    }

    #[test]
    fn test_report_line() {
        let mut nc = nav_ctrl(params());
        let (_, report) = step(&mut nc, tm(12, (0, 0), &ON));
        let line = report.to_string();

        assert!(line.starts_with("[tick     12] FOLLOWING"));
        assert!(line.contains("ON_LINE"));
        assert!(line.ends_with("at (0, 0) -> forward"));
    }
}

//! # Control loop
//!
//! One tick of the executable: receive telemetry, step [`NavCtrl`], send the resulting command.
//! The receive is the only point at which the loop waits, so the simulation sets the pace.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use comms_if::net::LineTransport;
use log::{debug, info, warn};
use util::module::State;

use crate::{
    link_client::{Delivery, LinkClient, LinkError},
    nav_ctrl::{NavCtrl, NavCtrlError, NavInput, NavState, NavStatusReport},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ControlLoop<T: LineTransport> {
    link: LinkClient<T>,

    nav_ctrl: NavCtrl,

    /// Raised externally to request a stop
    stop: Arc<AtomicBool>,

    num_ticks: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: LineTransport> ControlLoop<T> {
    pub fn new(link: LinkClient<T>, nav_ctrl: NavCtrl, stop: Arc<AtomicBool>) -> Self {
        Self {
            link,
            nav_ctrl,
            stop,
            num_ticks: 0,
        }
    }

    /// Run ticks until navigation reaches a terminal state, which is returned.
    ///
    /// The final `stop` command is sent before returning, if the link is still up.
    pub fn run(&mut self) -> Result<NavState, NavCtrlError> {
        info!("Beginning control loop\n");

        while !self.nav_ctrl.is_terminal() {
            self.tick()?;
        }

        info!(
            "Control loop finished after {} ticks in state {}",
            self.num_ticks,
            self.nav_ctrl.state()
        );

        Ok(self.nav_ctrl.state())
    }

    /// Perform a single tick.
    pub fn tick(&mut self) -> Result<NavStatusReport, NavCtrlError> {
        self.num_ticks += 1;

        let input = match self.stop.load(Ordering::SeqCst) {
            true => NavInput::StopRequested,
            false => match self.link.receive() {
                Ok(tm) => NavInput::Telemetry(tm),
                Err(LinkError::Timeout) => {
                    debug!("No telemetry this tick");
                    NavInput::MissedTick
                }
                Err(e @ LinkError::Malformed(_)) => {
                    warn!("{}", e);
                    NavInput::LinkMalformed
                }
                Err(LinkError::Disconnected) => NavInput::LinkDown,
            },
        };

        let (output, report) = self.nav_ctrl.proc(&input)?;

        info!("{}", report);

        if let Some(cmd) = output {
            if !self.link.is_down() {
                match self.link.send(&cmd) {
                    Ok(Delivery::Sent) => (),
                    Ok(Delivery::Stale) => debug!("Command for tick {} discarded", cmd.tick),
                    Err(e) => warn!("Could not send command: {}", e),
                }
            }
        }

        Ok(report)
    }

    pub fn nav_ctrl(&self) -> &NavCtrl {
        &self.nav_ctrl
    }

    pub fn link(&self) -> &LinkClient<T> {
        &self.link
    }

    pub fn num_ticks(&self) -> u64 {
        self.num_ticks
    }
}

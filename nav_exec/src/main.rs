//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Load parameters and the map
//!     - Plan the initial path
//!     - Connect to the simulation
//!     - Main loop, one iteration per telemetry tick:
//!         - Receive telemetry
//!         - Navigation control processing
//!         - Send the command
//!     - Save the final path and exit the session
//!
//! The loop ends once navigation reaches the goal or faults. Pressing Ctrl-C requests a stop,
//! after which a final `stop` command is sent before exiting.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use structopt::StructOpt;

use nav_lib::{
    control_loop::ControlLoop,
    link_client::LinkClient,
    map::GridMap,
    nav::PathPlanner,
    nav_ctrl::{NavCtrl, NavState},
    params::NavExecParams,
};
use util::{
    logger::{logger_init, parse_level},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec", about = "Line following navigation executable")]
struct Opts {
    /// Parameter file, relative to `$LINE_NAV_SW_ROOT/params`
    #[structopt(short, long, default_value = "nav_exec.toml")]
    params: String,

    /// Minimum log level, at least `info`
    #[structopt(short, long, default_value = "info")]
    log_level: String,

    /// Override the simulation address given in the parameters
    #[structopt(short, long)]
    address: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = parse_level(&opts.log_level)
        .ok_or_else(|| eyre!("Unknown log level \"{}\"", opts.log_level))?;
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Line Following Navigation Executable\n");
    info!(
        "Running on: {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: NavExecParams =
        util::params::load(&opts.params).wrap_err("Could not load nav_exec params")?;

    if let Some(address) = opts.address {
        info!("Using simulation address {} from the command line", address);
        params.link.link_address = address;
    }

    info!("Exec parameters loaded");

    // ---- LOAD MAP ----

    let map_path = util::params::params_path(&params.map.map_path)
        .wrap_err("Could not locate the map file")?;

    let map = GridMap::load_file(
        &map_path,
        params.map.start,
        params.map.goal,
        params.map.grid.clone(),
    )
    .wrap_err_with(|| format!("Failed to load the map from {:?}", map_path))?;

    info!(
        "Loaded {}x{} map, start {}, goal {}:\n{}",
        map.num_rows(),
        map.num_cols(),
        map.start(),
        map.goal(),
        map
    );

    // ---- INITIALISE MODULES ----

    let map = Arc::new(map);

    let nav_ctrl = NavCtrl::new(
        params.nav_ctrl.clone(),
        params.line_tracker.clone(),
        map.clone(),
        PathPlanner::new(params.path_planner.clone()),
    )
    .wrap_err("Failed to initialise NavCtrl")?;

    info!(
        "Initial path of {} moves, cost {:.02}:\n{}",
        nav_ctrl.path().num_moves(),
        nav_ctrl.path().cost(),
        map.render(Some(nav_ctrl.path().as_ref()))
    );

    // ---- STOP HANDLER ----

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            warn!("Stop requested");
            stop.store(true, Ordering::SeqCst);
        })
        .wrap_err("Failed to set the Ctrl-C handler")?;
    }

    // ---- INITIALISE NETWORK ----

    info!("Connecting to the simulation at {}", params.link.link_address);

    let link = LinkClient::connect(params.link.clone())
        .wrap_err("Failed to connect to the simulation")?;

    // ---- MAIN LOOP ----

    let mut control_loop = ControlLoop::new(link, nav_ctrl, stop);

    let final_state = control_loop
        .run()
        .wrap_err("Navigation control failed")?;

    // ---- SHUTDOWN ----

    let final_path = control_loop.nav_ctrl().path();
    session.save("nav_ctrl/final_path.json", (*final_path).clone());

    info!(
        "Final path:\n{}",
        control_loop.nav_ctrl().map().render(Some(final_path.as_ref()))
    );

    session.exit();

    match final_state {
        NavState::Done => {
            info!("Goal reached after {} ticks", control_loop.num_ticks());
            Ok(())
        }
        s => Err(eyre!("Navigation ended in state {}", s)),
    }
}

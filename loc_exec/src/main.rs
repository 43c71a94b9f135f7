//! Main localisation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session and logging
//!     - Load the parameters, the map and the motion script
//!     - Initialise the localisation controller and the simulated robot
//!     - For each telecommand in the script:
//!         - Actuate the robot and read its sensors
//!         - Run one generation of the particle filter
//!         - Archive the status report and estimate
//!     - Report the final estimate against the ground truth
//!
//! # Usage
//!
//! ```text
//! loc_exec <map.json> <script>
//! ```
//!
//! Parameters are loaded from `$LOC_SW_ROOT/params`, sessions are written to
//! `$LOC_SW_ROOT/sessions`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::{env, fs, sync::Arc, time::Instant};

// Internal
use loc_lib::{
    loc_ctrl::{LocCtrl, LocCtrlError, Localiser, LocaliserError, Params, PopulationObserver},
    map::{Map, MapDesc},
    particle::{Particle, PoseEstimate},
    sim_robot::{SimRobot, SimRobotParams},
};
use util::{
    host,
    logger::{logger_init_with_targets, LevelFilter},
    module::State,
    script_interpreter::ScriptInterpreter,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Save a snapshot of the population every this many generations.
const SNAPSHOT_INTERVAL: u64 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Saves snapshots of the population into the session as JSON.
struct SnapshotSaver {
    session: Session,
}

#[derive(Serialize)]
struct Snapshot {
    generation: u64,
    estimate: PoseEstimate,
    particles: Vec<Particle>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PopulationObserver for SnapshotSaver {
    fn observe(&mut self, generation: u64, particles: &[Particle], estimate: &PoseEstimate) {
        if generation % SNAPSHOT_INTERVAL != 0 {
            return;
        }

        self.session.save(
            format!("snapshots/generation_{:05}.json", generation),
            Snapshot {
                generation,
                estimate: *estimate,
                particles: particles.to_vec(),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("loc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger, per particle internals are only useful when
    // debugging the filter itself
    logger_init_with_targets(
        LevelFilter::Trace,
        &[("loc_lib::particle", LevelFilter::Debug)],
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Monte Carlo Localisation Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let loc_params: Params = util::params::load("loc_ctrl.toml").wrap_err("Could not load LocCtrl params")?;
    let sim_params: SimRobotParams =
        util::params::load("sim_robot.toml").wrap_err("Could not load SimRobot params")?;

    info!("Exec parameters loaded");

    // ---- LOAD MAP AND SCRIPT ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 3 {
        return Err(eyre!(
            "Expected a map and a script path as arguments, found {} arguments",
            args.len() - 1
        ));
    }

    info!("Loading map from \"{}\"", &args[1]);

    let map_str = fs::read_to_string(&args[1]).wrap_err("Failed to read the map file")?;
    let map_desc: MapDesc = serde_json::from_str(&map_str).wrap_err("Failed to parse the map file")?;
    let map = Arc::new(Map::from_desc(&map_desc).wrap_err("Failed to build the map")?);

    info!(
        "Map is {:.1} x {:.1} with {} walls and {} floor tiles{}",
        map.width(),
        map.height(),
        map.walls().len(),
        map.tiles().len(),
        if map.is_indexed() { ", using a grid index" } else { "" }
    );

    info!("Loading script from \"{}\"", &args[2]);

    let mut script = ScriptInterpreter::new(&args[2]).wrap_err("Failed to load script")?;

    info!("Loaded script contains {} TCs\n", script.get_num_tcs());

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut loc_ctrl =
        LocCtrl::init((loc_params, map.clone()), &session).wrap_err("Failed to initialise LocCtrl")?;
    loc_ctrl.add_observer(Box::new(SnapshotSaver {
        session: session.clone(),
    }));
    info!("LocCtrl init complete");

    let robot = SimRobot::new(&sim_params, map).wrap_err("Failed to initialise SimRobot")?;
    info!("SimRobot init complete, starting at {:?}", robot.pose());

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let mut localiser = Localiser::new(robot, loc_ctrl);
    let start = Instant::now();

    loop {
        match localiser.run_script(&mut script) {
            Ok(_) => break,
            // Divergence only loses the current generation, start again from
            // a uniform population and carry on with the script
            Err(LocaliserError::LocCtrl(LocCtrlError::Divergence { generation })) => {
                warn!("Filter diverged in generation {}, reinitialising", generation);
                localiser.ctrl_mut().reinit();
            }
            Err(e) => return Err(e).wrap_err("Localisation session failed"),
        }
    }

    // ---- REPORT ----

    let (robot, loc_ctrl) = localiser.into_parts();
    let truth = robot.pose();

    info!(
        "Script complete after {} generations in {:.3} s",
        loc_ctrl.generation(),
        start.elapsed().as_secs_f64()
    );

    match loc_ctrl.estimate() {
        Some(e) => info!(
            "Final estimate ({:.2}, {:.2}, {:.1} deg), truth ({:.2}, {:.2}, {:.1} deg), error {:.2} / {:.1} deg, {}",
            e.pose.x,
            e.pose.y,
            e.pose.heading_deg,
            truth.x,
            truth.y,
            truth.heading_deg,
            e.pose.distance_to(&truth),
            e.pose.heading_error_deg(&truth),
            if loc_ctrl.is_localised() {
                "localised"
            } else {
                "not localised"
            }
        ),
        None => warn!("No estimate was produced"),
    }

    info!("End of execution");

    session.exit();

    Ok(())
}

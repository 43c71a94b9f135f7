//! Localisation session driver
//!
//! Couples a robot with a `LocCtrl` instance. The robot is handed in by the
//! caller, it may be a real platform, the simulated robot or a replay.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;

// Internal
use super::{InputData, LocCtrl, LocCtrlError, StatusReport};
use crate::particle::PoseEstimate;
use comms_if::{
    eqpt::robot::{Robot, RobotCmd},
    tc::Tc,
};
use util::{archive::Archived, module::State, script_interpreter::ScriptInterpreter};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drives a localisation session against a robot.
pub struct Localiser<R: Robot> {
    robot: R,
    ctrl: LocCtrl,
    abort: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LocaliserError<E: std::error::Error + 'static> {
    #[error("The robot reported an error: {0}")]
    Robot(#[source] E),

    #[error(transparent)]
    LocCtrl(#[from] LocCtrlError),

    #[error("The session was aborted after generation {0}")]
    Aborted(u64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<R: Robot> Localiser<R> {
    pub fn new(robot: R, ctrl: LocCtrl) -> Self {
        Self {
            robot,
            ctrl,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag which aborts the session when set. It is checked between
    /// generations.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Sense without moving and run a generation on the readings.
    pub fn sense(&mut self) -> Result<(PoseEstimate, StatusReport), LocaliserError<R::Error>> {
        self.check_abort()?;

        let reading = self.robot.sense().map_err(LocaliserError::Robot)?;

        self.run_generation(InputData { cmd: None, reading })
    }

    /// Actuate the robot, sense, and run a generation.
    ///
    /// The particles are moved by the amount the robot reports it executed,
    /// which may differ from the commanded amount.
    pub fn step(&mut self, cmd: RobotCmd) -> Result<(PoseEstimate, StatusReport), LocaliserError<R::Error>> {
        self.check_abort()?;

        let executed = self.robot.actuate(cmd).map_err(LocaliserError::Robot)?;
        let reading = self.robot.sense().map_err(LocaliserError::Robot)?;

        self.run_generation(InputData {
            cmd: Some(cmd.with_amount(executed)),
            reading,
        })
    }

    /// Execute a single telecommand.
    ///
    /// Returns `None` for telecommands which don't run a generation.
    pub fn handle_tc(&mut self, tc: Tc) -> Result<Option<(PoseEstimate, StatusReport)>, LocaliserError<R::Error>> {
        match tc {
            Tc::None => Ok(None),
            Tc::Reinit => {
                self.ctrl.reinit();
                Ok(None)
            }
            Tc::Robot(cmd) => self.step(cmd).map(Some),
        }
    }

    /// Run every telecommand in the script, returning the final estimate.
    ///
    /// Errors stop the script, leaving the remaining telecommands in the
    /// interpreter.
    pub fn run_script(&mut self, script: &mut ScriptInterpreter) -> Result<Option<PoseEstimate>, LocaliserError<R::Error>> {
        info!("Running script with {} TCs", script.get_num_tcs());

        while let Some(tc) = script.next_tc() {
            self.handle_tc(tc)?;
        }

        Ok(self.ctrl.estimate())
    }

    pub fn ctrl(&self) -> &LocCtrl {
        &self.ctrl
    }

    pub fn ctrl_mut(&mut self) -> &mut LocCtrl {
        &mut self.ctrl
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    pub fn into_parts(self) -> (R, LocCtrl) {
        (self.robot, self.ctrl)
    }

    fn check_abort(&self) -> Result<(), LocaliserError<R::Error>> {
        if self.abort.load(Ordering::Relaxed) {
            Err(LocaliserError::Aborted(self.ctrl.generation()))
        } else {
            Ok(())
        }
    }

    fn run_generation(&mut self, input: InputData) -> Result<(PoseEstimate, StatusReport), LocaliserError<R::Error>> {
        let output = self.ctrl.proc(&input)?;

        if let Err(e) = self.ctrl.write() {
            warn!("Could not archive LocCtrl: {}", e);
        }

        Ok(output)
    }
}

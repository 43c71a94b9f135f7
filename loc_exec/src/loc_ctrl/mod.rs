//! # Localisation control module
//!
//! Runs the particle filter one generation at a time: motion update, weight
//! update, convergence check and resampling. Each generation is built on a
//! copy of the population and only committed once it is complete, so a failed
//! or aborted generation leaves the filter untouched.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod localiser;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use localiser::*;
pub use params::*;
pub use state::*;

use crate::{
    motion::MotionNoise,
    particle::{ConvergenceTolerance, Roughening},
    resample::ResampleError,
};
use comms_if::eqpt::robot::RobotCmd;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a set of parameters can't be used to build a filter.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("The filter needs at least one particle")]
    NoParticles,

    #[error("The resample interval must be at least one generation")]
    ZeroResampleInterval,

    #[error("{0} must be a positive finite number (got {1})")]
    InvalidSigma(&'static str, f64),

    #[error("Motion noise must be finite and non-negative: {0:?}")]
    InvalidMotionNoise(MotionNoise),

    #[error("Roughening must be finite and non-negative: {0:?}")]
    InvalidRoughening(Roughening),

    #[error("Invalid convergence tolerance: {0:?}")]
    InvalidTolerance(ConvergenceTolerance),
}

/// Possible errors that can occur during LocCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum LocCtrlError {
    #[error("Invalid LocCtrl configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not create the LocCtrl archives: {0}")]
    ArchiveError(#[from] util::archive::ArchiveError),

    #[error("Total particle weight collapsed to zero in generation {generation}, the filter must be reinitialised")]
    Divergence { generation: u64 },

    #[error("Resampling failed: {0}")]
    Resample(#[from] ResampleError),

    #[error("Population must contain {expected} particles, found {found}")]
    PopulationSize { expected: usize, found: usize },

    #[error("Received an invalid command: {0:?}")]
    InvalidCmd(RobotCmd),
}

//! Parameters structure for LocCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::{
    motion::MotionNoise,
    particle::{ConvergenceTolerance, Roughening, WeightKernel},
    sensor::SensorChannels,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Localisation control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    // ---- FILTER ----
    /// Number of particles in the population, fixed for the lifetime of the
    /// filter.
    pub num_particles: usize,

    /// Resample every this many generations.
    pub resample_interval: u64,

    /// Seed for the filter's random number generator. If not given the
    /// generator is seeded from system entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    // ---- SENSOR MODEL ----
    /// Standard deviation of distance readings
    ///
    /// Units: map units
    pub distance_sigma: f64,

    /// Standard deviation applied to floor colour mismatches
    pub color_sigma: f64,

    /// Channels reported by the robot
    #[serde(default)]
    pub sensors: SensorChannels,

    // ---- MOTION MODEL ----
    /// Noise applied to each particle's copy of a command
    #[serde(default)]
    pub motion_noise: MotionNoise,

    /// Jitter applied after resampling
    #[serde(default)]
    pub roughening: Roughening,

    // ---- CONVERGENCE ----
    /// Spread below which the robot is considered localised
    pub convergence: ConvergenceTolerance,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check that the parameters describe a usable filter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_particles == 0 {
            return Err(ConfigError::NoParticles);
        }
        if self.resample_interval == 0 {
            return Err(ConfigError::ZeroResampleInterval);
        }

        for (name, sigma) in [
            ("distance_sigma", self.distance_sigma),
            ("color_sigma", self.color_sigma),
        ]
        .iter()
        {
            if !sigma.is_finite() || *sigma <= 0.0 {
                return Err(ConfigError::InvalidSigma(*name, *sigma));
            }
        }

        if !self.motion_noise.is_valid() {
            return Err(ConfigError::InvalidMotionNoise(self.motion_noise));
        }

        let r = &self.roughening;
        if !(r.position.is_finite() && r.position >= 0.0 && r.heading_deg.is_finite() && r.heading_deg >= 0.0) {
            return Err(ConfigError::InvalidRoughening(*r));
        }

        let c = &self.convergence;
        if !(c.position.is_finite()
            && c.position >= 0.0
            && c.heading_deg.is_finite()
            && c.heading_deg >= 0.0
            && c.top_fraction > 0.0
            && c.top_fraction <= 1.0)
        {
            return Err(ConfigError::InvalidTolerance(*c));
        }

        Ok(())
    }

    /// The similarity kernel described by these parameters.
    pub fn kernel(&self) -> WeightKernel {
        WeightKernel {
            distance_sigma: self.distance_sigma,
            color_sigma: self.color_sigma,
        }
    }
}

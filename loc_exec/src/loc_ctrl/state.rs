//! Implementations for the LocCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;

// Internal
use super::{LocCtrlError, Params};
use crate::{
    map::Map,
    particle::{Particle, Population, PoseEstimate, Spread, WeightKernel},
    resample::resample,
    sensor::SensorModel,
};
use comms_if::eqpt::robot::{RobotCmd, SensorReading};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which watches the population evolve, for instance a renderer.
///
/// Observers are notified once each generation has been committed.
pub trait PopulationObserver {
    fn observe(&mut self, generation: u64, particles: &[Particle], estimate: &PoseEstimate);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Localisation control module state
pub struct LocCtrl {
    params: Params,

    map: Arc<Map>,
    model: SensorModel,
    kernel: WeightKernel,
    rng: SmallRng,

    population: Population,
    generation: u64,
    last_spread: Option<Spread>,
    last_estimate: Option<PoseEstimate>,
    localised: bool,

    report: StatusReport,
    arch_report: Archiver,
    arch_estimate: Archiver,

    observers: Vec<Box<dyn PopulationObserver + Send>>,
}

/// Input data to Localisation Control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// The command the robot executed since the last generation, or `None` if
    /// the robot didn't move.
    pub cmd: Option<RobotCmd>,

    /// The readings taken by the robot after executing the command.
    pub reading: SensorReading,
}

/// Status report for LocCtrl processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub generation: u64,
    pub total_weight: f64,
    pub spread_position: f64,
    pub spread_heading_deg: f64,
    pub resampled: bool,
    pub converged: bool,
}

/// Flat record of an estimate for the CSV archive.
#[derive(Serialize)]
struct EstimateRecord {
    generation: u64,
    x: f64,
    y: f64,
    heading_deg: f64,
    confidence: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocCtrl {
    /// Create a new controller with a uniform population over the map.
    ///
    /// # Errors
    /// - `LocCtrlError::Config` if the parameters are invalid. No controller is
    ///   built in that case.
    pub fn new(params: Params, map: Arc<Map>) -> Result<Self, LocCtrlError> {
        params.validate()?;

        let mut rng = match params.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };

        let population = Population::uniform(params.num_particles, &map, &mut rng);

        info!(
            "LocCtrl initialised with {} particles over a {:.1} x {:.1} map",
            params.num_particles,
            map.width(),
            map.height()
        );

        Ok(Self {
            model: SensorModel::new(params.sensors),
            kernel: params.kernel(),
            params,
            map,
            rng,
            population,
            generation: 0,
            last_spread: None,
            last_estimate: None,
            localised: false,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            arch_estimate: Archiver::default(),
            observers: Vec::new(),
        })
    }

    /// Throw away the population and start again from a uniform one.
    ///
    /// This is the way out of a divergence.
    pub fn reinit(&mut self) {
        info!("Reinitialising LocCtrl after generation {}", self.generation);

        self.population = Population::uniform(self.params.num_particles, &self.map, &mut self.rng);
        self.last_spread = None;
        self.last_estimate = None;
        self.localised = false;
    }

    /// Replace the population.
    ///
    /// The new population must have the same number of particles as the
    /// current one.
    pub fn set_population(&mut self, population: Population) -> Result<(), LocCtrlError> {
        if population.len() != self.params.num_particles {
            return Err(LocCtrlError::PopulationSize {
                expected: self.params.num_particles,
                found: population.len(),
            });
        }

        self.population = population;
        Ok(())
    }

    /// Register an observer to be notified of each committed generation.
    pub fn add_observer(&mut self, observer: Box<dyn PopulationObserver + Send>) {
        self.observers.push(observer);
    }

    /// The estimate from the last committed generation.
    pub fn estimate(&self) -> Option<PoseEstimate> {
        self.last_estimate
    }

    pub fn particles(&self) -> &[Particle] {
        self.population.particles()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Number of generations committed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_spread(&self) -> Option<Spread> {
        self.last_spread
    }

    /// Whether the last committed generation met the convergence tolerance.
    pub fn is_localised(&self) -> bool {
        self.localised
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    /// Run one generation on a copy of the population and return it, along
    /// with the values to commit alongside it.
    fn next_generation(
        &mut self,
        input: &InputData,
        generation: u64,
    ) -> Result<(Population, PoseEstimate, StatusReport), LocCtrlError> {
        let mut next = self.population.clone();

        // ---- MOTION UPDATE ----

        if let Some(cmd) = input.cmd {
            if !cmd.is_valid() {
                return Err(LocCtrlError::InvalidCmd(cmd));
            }
            next.apply_motion(&cmd, &self.params.motion_noise, self.rng.gen());
        }

        // ---- WEIGHT UPDATE ----

        let total_weight = next.update_weights(&input.reading, &self.map, &self.model, &self.kernel);

        if !(total_weight > 0.0) {
            error!("All particles ruled out in generation {}", generation);
            return Err(LocCtrlError::Divergence { generation });
        }

        let estimate = next
            .estimate()
            .ok_or(LocCtrlError::Divergence { generation })?;

        // ---- CONVERGENCE ----

        let spread = next.spread(self.params.convergence.top_fraction);
        let converged = spread.map_or(false, |s| s.within(&self.params.convergence));

        trace!("Generation {} spread: {:?}", generation, spread);

        // ---- RESAMPLING ----

        let resampled = generation % self.params.resample_interval == 0;
        if resampled {
            next = Population::from_particles(resample(next.particles(), &mut self.rng)?);
            next.roughen(&self.params.roughening, self.rng.gen());
        }

        let report = StatusReport {
            generation,
            total_weight,
            spread_position: spread.map_or(f64::NAN, |s| s.position),
            spread_heading_deg: spread.map_or(f64::NAN, |s| s.heading_deg),
            resampled,
            converged,
        };

        self.last_spread = spread;

        Ok((next, estimate, report))
    }
}

impl State for LocCtrl {
    type InitData = (Params, Arc<Map>);
    type InitError = LocCtrlError;

    type InputData = InputData;
    type OutputData = PoseEstimate;
    type StatusReport = StatusReport;
    type ProcError = LocCtrlError;

    /// Initialise the LocCtrl module, archiving into the session.
    fn init(init_data: Self::InitData, session: &Session) -> Result<Self, Self::InitError> {
        let (params, map) = init_data;

        let mut loc_ctrl = Self::new(params, map)?;

        std::fs::create_dir_all(session.arch_root.join("loc_ctrl")).map_err(ArchiveError::CreateError)?;

        loc_ctrl.arch_report = Archiver::from_path(session, "loc_ctrl/status_report.csv")?;
        loc_ctrl.arch_estimate = Archiver::from_path(session, "loc_ctrl/estimate.csv")?;

        Ok(loc_ctrl)
    }

    /// Perform one generation of the filter.
    ///
    /// On error the committed population is left as it was before the call.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let generation = self.generation + 1;

        let (next, estimate, report) = self.next_generation(input_data, generation)?;

        // ---- COMMIT ----

        self.population = next;
        self.generation = generation;
        self.last_estimate = Some(estimate);
        self.localised = report.converged;
        self.report = report;

        debug!(
            "Generation {}: estimate ({:.2}, {:.2}, {:.1} deg), total weight {:.3}, spread {:.2} / {:.1} deg{}",
            generation,
            estimate.pose.x,
            estimate.pose.y,
            estimate.pose.heading_deg,
            report.total_weight,
            report.spread_position,
            report.spread_heading_deg,
            if report.converged { ", converged" } else { "" }
        );

        for o in self.observers.iter_mut() {
            o.observe(generation, self.population.particles(), &estimate);
        }

        Ok((estimate, report))
    }
}

impl Archived for LocCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;

        if let Some(e) = self.last_estimate {
            self.arch_estimate.serialise(EstimateRecord {
                generation: self.generation,
                x: e.pose.x,
                y: e.pose.y,
                heading_deg: e.pose.heading_deg,
                confidence: e.confidence,
            })?;
        }

        Ok(())
    }
}

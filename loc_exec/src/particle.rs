//! # Particle population
//!
//! The weighted set of pose hypotheses making up the filter's belief, with the
//! motion and weight updates applied to it each generation.
//!
//! Particles are plain data, all the per-particle work is done by free
//! functions so the population can be processed in parallel with `rayon`.
//! Each parallel task works on its own particle and draws from its own random
//! number generator seeded from the generation seed and the particle index, so
//! results don't depend on how work is spread over the thread pool.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// Internal
use crate::{
    map::Map,
    motion::{apply_head, apply_motion, perturb, MotionNoise},
    pose::Pose,
    sensor::SensorModel,
};
use comms_if::eqpt::robot::{Distance, RobotCmd, SensorReading};
use util::maths::{ang_dist_deg, circular_mean_deg, normalise_deg};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default share of the population, by weight rank, used to measure spread.
pub const DEFAULT_TOP_FRACTION: f64 = 0.1;

/// Odd constant used to spread particle indices across the seed space.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single hypothesis about the robot's pose.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pose: Pose,

    /// Non-negative weight, only meaningful relative to the other particles in
    /// the same generation.
    pub weight: f64,

    /// Angle of the sensor head relative to the body
    ///
    /// Units: degrees
    pub sensor_head_deg: f64,
}

/// Standard deviations of the Gaussian similarity kernel comparing expected
/// and observed readings.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightKernel {
    /// Units: map units
    pub distance_sigma: f64,

    /// Deviation applied to colour mismatches, which count as a unit error
    pub color_sigma: f64,
}

/// Jitter added to particles after resampling so that copies of the same
/// parent spread out again.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Roughening {
    /// Units: map units
    pub position: f64,

    /// Units: degrees
    pub heading_deg: f64,
}

/// The weighted mean pose of the population.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PoseEstimate {
    pub pose: Pose,

    /// Total weight of the population, with weights scaled so the best
    /// particle has weight one.
    ///
    /// This is the number of particles the population is worth when counted
    /// against its best member. It ranges from 1, when a single particle
    /// stands out, up to the population size, when all agree equally well.
    pub confidence: f64,
}

/// How spread out the best particles are.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Spread {
    /// Largest distance between any two of the best particles
    pub position: f64,

    /// Largest heading difference between any of the best particles and their
    /// mean heading
    pub heading_deg: f64,
}

/// Limits below which the population is considered converged.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceTolerance {
    pub position: f64,

    pub heading_deg: f64,

    /// Share of the population, by weight rank, which must lie within the
    /// limits.
    #[serde(default = "default_top_fraction")]
    pub top_fraction: f64,
}

/// The particle population.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    particles: Vec<Particle>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Particle {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            weight: 1.0,
            sensor_head_deg: 0.0,
        }
    }
}

impl Spread {
    pub fn within(&self, tolerance: &ConvergenceTolerance) -> bool {
        self.position <= tolerance.position && self.heading_deg <= tolerance.heading_deg
    }
}

impl Population {
    /// Create `n` particles spread uniformly over the map bounds with uniform
    /// headings and equal weights.
    pub fn uniform<R: Rng + ?Sized>(n: usize, map: &Map, rng: &mut R) -> Self {
        let b = map.bounds();

        let particles = (0..n)
            .map(|_| {
                Particle::new(Pose::new(
                    rng.gen_range(b.min.x..=b.max.x),
                    rng.gen_range(b.min.y..=b.max.y),
                    rng.gen_range(0.0..360.0),
                ))
            })
            .collect();

        Self { particles }
    }

    pub fn from_particles(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access to the particles. The population size can't change.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    /// Sum of all particle weights.
    pub fn total_weight(&self) -> f64 {
        self.particles.iter().map(|p| p.weight).sum()
    }

    /// Apply the command to every particle, each with independently sampled
    /// noise.
    pub fn apply_motion(&mut self, cmd: &RobotCmd, noise: &MotionNoise, seed: u64) {
        self.particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| move_particle(p, cmd, noise, &mut particle_rng(seed, i)));
    }

    /// Update every particle's weight by comparing its expected readings to
    /// the observed ones. Returns the total weight of the population.
    ///
    /// Particles outside the operable region of the map get zero weight.
    /// Likelihoods are combined in log space and the updated weights are
    /// scaled so the best particle has weight one, which keeps uniformly poor
    /// matches from underflowing to zero. A total of zero means every
    /// particle has been ruled out.
    pub fn update_weights(
        &mut self,
        observed: &SensorReading,
        map: &Map,
        model: &SensorModel,
        kernel: &WeightKernel,
    ) -> f64 {
        let max_range = map.diagonal();

        // Log of the prior weight multiplied by the likelihood
        let log_weights: Vec<f64> = self
            .particles
            .par_iter()
            .map(|p| {
                if p.weight <= 0.0 || !map.is_operable(&p.pose.position()) {
                    return f64::NEG_INFINITY;
                }

                let expected = model.expected(&p.pose, p.sensor_head_deg, map);
                let lw = p.weight.ln() + log_likelihood(&expected, observed, max_range, kernel);

                if lw.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    lw
                }
            })
            .collect();

        let max_lw = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        if max_lw == f64::NEG_INFINITY {
            self.particles.iter_mut().for_each(|p| p.weight = 0.0);
            return 0.0;
        }

        trace!("Best log weight this generation: {}", max_lw);

        self.particles
            .par_iter_mut()
            .zip(log_weights.par_iter())
            .for_each(|(p, lw)| p.weight = (lw - max_lw).exp());

        self.total_weight()
    }

    /// Weighted mean pose of the population, or `None` if the total weight is
    /// zero.
    ///
    /// Headings are averaged as unit vectors. If they cancel out exactly the
    /// heading of the heaviest particle is used instead.
    pub fn estimate(&self) -> Option<PoseEstimate> {
        let total = self.total_weight();
        if !(total > 0.0) {
            return None;
        }

        let x = self.particles.iter().map(|p| p.weight * p.pose.x).sum::<f64>() / total;
        let y = self.particles.iter().map(|p| p.weight * p.pose.y).sum::<f64>() / total;

        let heading_deg = match circular_mean_deg(self.particles.iter().map(|p| (p.pose.heading_deg, p.weight))) {
            Some(h) => h,
            None => self.heaviest()?.pose.heading_deg,
        };

        Some(PoseEstimate {
            pose: Pose::new(x, y, heading_deg),
            confidence: total,
        })
    }

    /// Spread of the top `fraction` of particles by weight, or `None` if no
    /// particle has a positive weight.
    pub fn spread(&self, fraction: f64) -> Option<Spread> {
        let top = self.top_weighted(fraction);
        if top.is_empty() {
            return None;
        }

        let mut position: f64 = 0.0;
        for (i, a) in top.iter().enumerate() {
            for b in top[i + 1..].iter() {
                position = position.max(a.pose.distance_to(&b.pose));
            }
        }

        let heading_deg = match circular_mean_deg(top.iter().map(|p| (p.pose.heading_deg, p.weight))) {
            Some(mean) => top
                .iter()
                .map(|p| ang_dist_deg(mean, p.pose.heading_deg).abs())
                .fold(0.0, f64::max),
            None => 180.0,
        };

        Some(Spread { position, heading_deg })
    }

    /// Determine if the best particles agree to within the tolerance.
    pub fn is_converged(&self, tolerance: &ConvergenceTolerance) -> bool {
        self.spread(tolerance.top_fraction)
            .map_or(false, |s| s.within(tolerance))
    }

    /// Add Gaussian jitter to every particle's position and heading.
    pub fn roughen(&mut self, jitter: &Roughening, seed: u64) {
        let pos = Normal::new(0.0, jitter.position).ok().filter(|_| jitter.position > 0.0);
        let head = Normal::new(0.0, jitter.heading_deg).ok().filter(|_| jitter.heading_deg > 0.0);

        if pos.is_none() && head.is_none() {
            return;
        }

        self.particles.par_iter_mut().enumerate().for_each(|(i, p)| {
            let mut rng = particle_rng(!seed, i);

            if let Some(ref n) = pos {
                p.pose.x += n.sample(&mut rng);
                p.pose.y += n.sample(&mut rng);
            }
            if let Some(ref n) = head {
                p.pose.heading_deg = normalise_deg(p.pose.heading_deg + n.sample(&mut rng));
            }
        });
    }

    fn heaviest(&self) -> Option<&Particle> {
        self.particles
            .iter()
            .filter(|p| p.weight > 0.0)
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
    }

    /// The best `fraction` of particles with positive weight, at least one if
    /// any have positive weight.
    fn top_weighted(&self, fraction: f64) -> Vec<&Particle> {
        let mut ranked: Vec<&Particle> = self.particles.iter().filter(|p| p.weight > 0.0).collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let k = ((self.particles.len() as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize).max(1);
        ranked.truncate(k);

        ranked
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Move a single particle by a noisy version of the command.
pub fn move_particle<R: Rng + ?Sized>(p: &mut Particle, cmd: &RobotCmd, noise: &MotionNoise, rng: &mut R) {
    let noisy = perturb(cmd, noise, rng);

    p.pose = apply_motion(&p.pose, &noisy);
    p.sensor_head_deg = apply_head(p.sensor_head_deg, &noisy);
}

/// Log likelihood of observing `observed` where `expected` is predicted.
///
/// Each channel present in both readings contributes
/// `-(expected - observed)^2 / (2 sigma^2)`. Distances are compared with
/// `Clear` taken as `max_range`. Floor colours are only compared when both
/// are known, a mismatch counts as a unit error.
pub fn log_likelihood(
    expected: &SensorReading,
    observed: &SensorReading,
    max_range: f64,
    kernel: &WeightKernel,
) -> f64 {
    let dist_term = |e: &Distance, o: &Distance| {
        let d = e.or_max(max_range) - o.or_max(max_range);
        -(d * d) / (2.0 * kernel.distance_sigma * kernel.distance_sigma)
    };

    let mut ll = dist_term(&expected.forward, &observed.forward);

    if let (Some(e), Some(o)) = (expected.scan, observed.scan) {
        ll += dist_term(&e.left, &o.left);
        ll += dist_term(&e.right, &o.right);
    }

    if let (Some(e), Some(o)) = (expected.floor_color, observed.floor_color) {
        if e != o {
            ll -= 1.0 / (2.0 * kernel.color_sigma * kernel.color_sigma);
        }
    }

    ll
}

/// Random number generator for a single particle in a parallel task.
pub(crate) fn particle_rng(seed: u64, index: usize) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ (index as u64 + 1).wrapping_mul(SEED_MIX))
}

fn default_top_fraction() -> f64 {
    DEFAULT_TOP_FRACTION
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::{CircleDesc, LineDesc, MapDesc};
    use approx::assert_relative_eq;
    use comms_if::eqpt::robot::{ColorTag, SideDistances};

    const KERNEL: WeightKernel = WeightKernel {
        distance_sigma: 5.0,
        color_sigma: 0.5,
    };

    fn room() -> Map {
        Map::from_desc(&MapDesc::room(150.0, 200.0)).unwrap()
    }

    fn reading(forward: f64) -> SensorReading {
        SensorReading {
            forward: Distance::Obstacle(forward),
            scan: None,
            floor_color: None,
        }
    }

    #[test]
    fn test_log_likelihood() {
        assert_eq!(log_likelihood(&reading(10.0), &reading(10.0), 250.0, &KERNEL), 0.0);
        assert_relative_eq!(log_likelihood(&reading(10.0), &reading(15.0), 250.0, &KERNEL), -0.5);

        // Clear is compared as the maximum range
        let clear = SensorReading {
            forward: Distance::Clear,
            ..reading(0.0)
        };
        assert_eq!(log_likelihood(&clear, &reading(250.0), 250.0, &KERNEL), 0.0);

        // Colour only counts when both sides know it
        let mut e = reading(10.0);
        let mut o = reading(10.0);
        e.floor_color = Some(ColorTag(1));
        assert_eq!(log_likelihood(&e, &o, 250.0, &KERNEL), 0.0);
        o.floor_color = Some(ColorTag(2));
        assert_relative_eq!(log_likelihood(&e, &o, 250.0, &KERNEL), -2.0);

        // Scans count when both sides have them
        e.scan = Some(SideDistances {
            left: Distance::Obstacle(5.0),
            right: Distance::Obstacle(5.0),
        });
        o.scan = Some(SideDistances {
            left: Distance::Obstacle(10.0),
            right: Distance::Obstacle(5.0),
        });
        assert_relative_eq!(log_likelihood(&e, &o, 250.0, &KERNEL), -2.5);
    }

    #[test]
    fn test_out_of_bounds_weight() {
        let map = room();
        let model = SensorModel::default();

        let mut pop = Population::from_particles(vec![
            Particle::new(Pose::new(75.0, 100.0, 0.0)),
            Particle::new(Pose::new(-20.0, 100.0, 0.0)),
            Particle::new(Pose::new(75.0, 260.0, 90.0)),
        ]);

        // Use the readings the out of bounds particles would expect, they must
        // still be ruled out
        let observed = model.expected(&pop.particles()[1].pose, 0.0, &map);
        let total = pop.update_weights(&observed, &map, &model, &KERNEL);

        assert!(total > 0.0);
        assert!(pop.particles()[0].weight > 0.0);
        assert_eq!(pop.particles()[1].weight, 0.0);
        assert_eq!(pop.particles()[2].weight, 0.0);

        // Inside the bounds of an L shaped room but outside the room itself,
        // and inside a pillar
        let corners = [[0.0, 0.0], [150.0, 0.0], [150.0, 100.0], [75.0, 100.0], [75.0, 200.0], [0.0, 200.0]];
        let mut desc = MapDesc {
            lines: (0..corners.len())
                .map(|i| LineDesc {
                    start: corners[i],
                    end: corners[(i + 1) % corners.len()],
                    color: None,
                })
                .collect(),
            ..Default::default()
        };
        desc.circles.push(CircleDesc {
            centre: [40.0, 150.0],
            radius: 10.0,
            color: None,
        });
        let l_map = Map::from_desc(&desc).unwrap();

        let mut pop = Population::from_particles(vec![
            Particle::new(Pose::new(120.0, 150.0, 0.0)),
            Particle::new(Pose::new(40.0, 150.0, 0.0)),
        ]);
        let observed = model.expected(&pop.particles()[0].pose, 0.0, &l_map);

        assert_eq!(pop.update_weights(&observed, &l_map, &model, &KERNEL), 0.0);
        assert!(pop.particles().iter().all(|p| p.weight == 0.0));

        let mut pop = Population::from_particles(vec![Particle::new(Pose::new(120.0, 50.0, 0.0))]);
        assert!(pop.update_weights(&observed, &l_map, &model, &KERNEL) > 0.0);
    }

    #[test]
    fn test_weights_prefer_truth() {
        let map = room();
        let model = SensorModel::default();
        let truth = Pose::new(30.0, 40.0, 0.0);
        let observed = model.expected(&truth, 0.0, &map);

        let mut pop = Population::from_particles(vec![
            Particle::new(truth),
            Particle::new(Pose::new(100.0, 150.0, 45.0)),
        ]);

        let total = pop.update_weights(&observed, &map, &model, &KERNEL);

        // The best particle is scaled to one
        assert_relative_eq!(pop.particles()[0].weight, 1.0);
        assert!(pop.particles()[1].weight < 1e-6);
        assert_relative_eq!(total, pop.total_weight());

        // So the confidence counts particles as good as the best
        let est = pop.estimate().unwrap();
        assert_relative_eq!(est.confidence, total);
        assert!(est.confidence >= 1.0 && est.confidence < 1.0 + 1e-6);

        let mut twins = Population::from_particles(vec![Particle::new(truth); 4]);
        twins.update_weights(&observed, &map, &model, &KERNEL);
        assert_relative_eq!(twins.estimate().unwrap().confidence, 4.0);
    }

    #[test]
    fn test_no_underflow() {
        let map = room();
        let model = SensorModel::default();
        let observed = reading(1.0);

        // Every particle is terrible, far beyond where exp() underflows
        let kernel = WeightKernel {
            distance_sigma: 0.01,
            color_sigma: 0.01,
        };
        let mut pop = Population::from_particles(vec![
            Particle::new(Pose::new(10.0, 100.0, 180.0)),
            Particle::new(Pose::new(20.0, 100.0, 180.0)),
        ]);

        let total = pop.update_weights(&observed, &map, &model, &kernel);
        assert!(total > 0.0);
        assert_relative_eq!(pop.particles()[0].weight, 1.0);
    }

    #[test]
    fn test_estimate() {
        let mut a = Particle::new(Pose::new(0.0, 0.0, 359.0));
        let mut b = Particle::new(Pose::new(10.0, 20.0, 1.0));
        a.weight = 1.0;
        b.weight = 3.0;

        let est = Population::from_particles(vec![a, b]).estimate().unwrap();
        assert_relative_eq!(est.pose.x, 7.5);
        assert_relative_eq!(est.pose.y, 15.0);
        assert!(est.pose.heading_deg < 1.0 && est.pose.heading_deg > 0.0);
        assert_relative_eq!(est.confidence, 4.0);

        a.weight = 0.0;
        b.weight = 0.0;
        assert_eq!(Population::from_particles(vec![a, b]).estimate(), None);
    }

    #[test]
    fn test_spread() {
        let mut particles: Vec<Particle> = (0..20)
            .map(|i| Particle::new(Pose::new(i as f64 * 10.0, 0.0, 90.0)))
            .collect();

        // The two heaviest are close together
        particles[3].weight = 5.0;
        particles[4].weight = 4.0;
        particles[4].pose.heading_deg = 100.0;

        let pop = Population::from_particles(particles);

        let s = pop.spread(DEFAULT_TOP_FRACTION).unwrap();
        assert_relative_eq!(s.position, 10.0);
        assert!(s.heading_deg > 4.0 && s.heading_deg < 6.0);

        let tol = ConvergenceTolerance {
            position: 15.0,
            heading_deg: 10.0,
            top_fraction: DEFAULT_TOP_FRACTION,
        };
        assert!(pop.is_converged(&tol));

        // Looking at the whole population it's spread over 190 units
        let tol = ConvergenceTolerance { top_fraction: 1.0, ..tol };
        assert!(!pop.is_converged(&tol));
    }

    #[test]
    fn test_parallel_motion_is_deterministic() {
        let map = room();
        let mut rng = SmallRng::seed_from_u64(1);
        let noise = MotionNoise {
            move_abs: 1.0,
            move_rel: 0.1,
            rotate_abs_deg: 2.0,
            rotate_rel: 0.1,
        };

        let start = Population::uniform(500, &map, &mut rng);
        let mut a = start.clone();
        let mut b = start.clone();

        a.apply_motion(&RobotCmd::Move { distance: 10.0 }, &noise, 99);
        b.apply_motion(&RobotCmd::Move { distance: 10.0 }, &noise, 99);
        assert_eq!(a, b);

        // Particles draw different noise
        let d0 = a.particles()[0].pose.distance_to(&start.particles()[0].pose);
        let d1 = a.particles()[1].pose.distance_to(&start.particles()[1].pose);
        assert!((d0 - d1).abs() > 1e-12);

        // Zero noise is exact
        let mut c = start.clone();
        c.apply_motion(&RobotCmd::Rotate { degrees: 90.0 }, &MotionNoise::none(), 5);
        for (p, s) in c.particles().iter().zip(start.particles()) {
            assert_relative_eq!(p.pose.heading_deg, normalise_deg(s.pose.heading_deg + 90.0));
        }
    }

    #[test]
    fn test_uniform_population() {
        let map = room();
        let mut rng = SmallRng::seed_from_u64(3);
        let pop = Population::uniform(1000, &map, &mut rng);

        assert_eq!(pop.len(), 1000);
        assert!(pop.particles().iter().all(|p| map.is_operable(&p.pose.position())));
        assert!(pop.particles().iter().all(|p| p.weight == 1.0));
        assert_relative_eq!(pop.total_weight(), 1000.0);
    }

    #[test]
    fn test_roughen() {
        let mut pop = Population::from_particles(vec![Particle::new(Pose::new(50.0, 50.0, 0.0)); 100]);
        let before = pop.clone();

        pop.roughen(&Roughening::default(), 1);
        assert_eq!(pop, before);

        pop.roughen(
            &Roughening {
                position: 1.0,
                heading_deg: 2.0,
            },
            1,
        );
        let moved = pop
            .particles()
            .iter()
            .filter(|p| p.pose.distance_to(&before.particles()[0].pose) > 0.0)
            .count();
        assert_eq!(moved, 100);
        assert!(pop.particles().iter().all(|p| p.pose.distance_to(&before.particles()[0].pose) < 10.0));
    }
}

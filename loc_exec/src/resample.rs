//! # Resampler
//!
//! Low variance systematic resampling. A single random offset is drawn and the
//! cumulative weight line is walked at a fixed stride of `total / N`, picking
//! the particle whose bracket contains each sample point. The expected number
//! of copies of each particle is proportional to its weight.
//!
//! Prefix sums are built in parallel chunks and each sample point is located
//! independently with a binary search, so the whole pass runs on the `rayon`
//! pool.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use rand::Rng;
use rayon::prelude::*;
use thiserror::Error;

use crate::particle::Particle;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of weights summed by each task when building the prefix sums.
const PREFIX_CHUNK: usize = 1024;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ResampleError {
    #[error("Cannot resample an empty population")]
    Empty,

    #[error("Total weight of the population is {0}, the filter has diverged")]
    ZeroWeight(f64),

    #[error("Particle {0} has an invalid weight ({1})")]
    InvalidWeight(usize, f64),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Resample the particles using a random offset.
pub fn resample<R: Rng + ?Sized>(particles: &[Particle], rng: &mut R) -> Result<Vec<Particle>, ResampleError> {
    systematic(particles, rng.gen::<f64>())
}

/// Systematic resampling with the offset given as a fraction of the stride,
/// in the range [0, 1).
///
/// Returns the same number of particles, all with weight one.
pub fn systematic(particles: &[Particle], offset_fraction: f64) -> Result<Vec<Particle>, ResampleError> {
    let n = particles.len();
    if n == 0 {
        return Err(ResampleError::Empty);
    }

    if let Some((i, p)) = particles
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.weight.is_finite() && p.weight >= 0.0))
    {
        return Err(ResampleError::InvalidWeight(i, p.weight));
    }

    let cumulative = prefix_sums(particles);
    let total = cumulative[n - 1];

    if !(total > 0.0) || !total.is_finite() {
        return Err(ResampleError::ZeroWeight(total));
    }

    let stride = total / n as f64;
    let offset = offset_fraction.clamp(0.0, 1.0 - f64::EPSILON) * stride;

    Ok((0..n)
        .into_par_iter()
        .map(|k| {
            let u = offset + k as f64 * stride;

            // First bracket whose upper edge lies past the sample. Rounding can
            // push the last samples onto the total so clamp to the last index.
            let idx = cumulative.partition_point(|c| *c <= u).min(n - 1);

            Particle {
                weight: 1.0,
                ..particles[idx]
            }
        })
        .collect())
}

/// Inclusive prefix sums of the particle weights.
fn prefix_sums(particles: &[Particle]) -> Vec<f64> {
    let mut sums: Vec<f64> = particles.iter().map(|p| p.weight).collect();

    // Scan each chunk independently
    sums.par_chunks_mut(PREFIX_CHUNK).for_each(|chunk| {
        for i in 1..chunk.len() {
            chunk[i] += chunk[i - 1];
        }
    });

    // Offset of each chunk is the running total of the chunks before it
    let offsets: Vec<f64> = sums
        .chunks(PREFIX_CHUNK)
        .scan(0.0, |acc, chunk| {
            let start = *acc;
            *acc += chunk[chunk.len() - 1];
            Some(start)
        })
        .collect();

    sums.par_chunks_mut(PREFIX_CHUNK)
        .zip(offsets.par_iter())
        .for_each(|(chunk, offset)| chunk.iter_mut().for_each(|c| *c += offset));

    sums
}

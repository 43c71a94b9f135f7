//! # Localisation library.
//!
//! Monte Carlo Localisation of a robot in a known 2D map. This library allows other crates in the
//! workspace, the tests and benchmarks to access items defined inside the localisation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives - points, segments, rectangles and rays
pub mod geom;

/// Map module - walls, floor tiles and ray casting against them
pub mod map;

/// Robot pose in the map frame
pub mod pose;

/// Sensor model - predicts the readings a robot would observe at a pose
pub mod sensor;

/// Motion model - applies (noisy) robot commands to poses
pub mod motion;

/// Particles and populations, including weighting and pose estimation
pub mod particle;

/// Systematic resampling of a weighted population
pub mod resample;

/// Localisation control module - runs the particle filter generation by generation
pub mod loc_ctrl;

/// Simulated robot - provides readings from a ground truth pose in a map
pub mod sim_robot;

//! # Communications interface crate.
//!
//! Provides the interfaces shared between the localisation software and the
//! robot it localises.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands which drive a localisation session
pub mod tc;

/// Command and reading definitions for equipment (like the robot)
pub mod eqpt;

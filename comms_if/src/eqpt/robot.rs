//! # Robot Equipment Interface
//!
//! Commands sent to, and readings returned by, the robot being localised. The robot may be a
//! physical platform, a simulation or a replay of a recorded run, the localisation core only ever
//! sees it through the [`Robot`] trait.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Identifies the colour of a wall or floor region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorTag(pub u32);

/// Distances measured perpendicular to the sensor head.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideDistances {
    /// Distance seen 90 degrees counter-clockwise of the sensor head
    pub left: Distance,

    /// Distance seen 90 degrees clockwise of the sensor head
    pub right: Distance,
}

/// A single set of readings from the robot's sensors.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Distance seen along the sensor head direction
    pub forward: Distance,

    /// Left/right distances, or `None` if the robot did not perform a scan
    pub scan: Option<SideDistances>,

    /// Colour of the floor under the robot, or `None` if it couldn't be determined
    pub floor_color: Option<ColorTag>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An actuation the robot can perform.
///
/// Headings follow the right hand rule about the upwards axis, so positive rotations turn the
/// robot to the left (counter-clockwise when viewed from above).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum RobotCmd {
    /// Drive along the current heading. Negative distances drive backwards.
    Move { distance: f64 },

    /// Turn the body on the spot.
    Rotate { degrees: f64 },

    /// Turn the sensor head relative to the body.
    RotateSensor { degrees: f64 },
}

/// The result of a distance measurement.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distance {
    /// An obstacle was seen at the given distance.
    Obstacle(f64),

    /// Nothing was seen within the range of the sensor.
    Clear,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A robot which can be actuated and sensed.
pub trait Robot {
    /// Error raised by the robot when it can't perform a request.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute the command, returning the amount (distance or degrees) that was actually executed.
    fn actuate(&mut self, cmd: RobotCmd) -> Result<f64, Self::Error>;

    /// Acquire a new set of sensor readings.
    fn sense(&mut self) -> Result<SensorReading, Self::Error>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotCmd {
    /// The distance or angle carried by the command.
    pub fn amount(&self) -> f64 {
        match *self {
            RobotCmd::Move { distance } => distance,
            RobotCmd::Rotate { degrees } | RobotCmd::RotateSensor { degrees } => degrees,
        }
    }

    /// Returns the same kind of command with a different amount.
    pub fn with_amount(&self, amount: f64) -> Self {
        match self {
            RobotCmd::Move { .. } => RobotCmd::Move { distance: amount },
            RobotCmd::Rotate { .. } => RobotCmd::Rotate { degrees: amount },
            RobotCmd::RotateSensor { .. } => RobotCmd::RotateSensor { degrees: amount },
        }
    }

    /// The command which undoes this one.
    pub fn inverse(&self) -> Self {
        self.with_amount(-self.amount())
    }

    /// Determine if the command is valid (i.e. carries a finite amount).
    pub fn is_valid(&self) -> bool {
        self.amount().is_finite()
    }
}

impl Distance {
    /// Build a distance from an optional obstacle range.
    pub fn from_range(range: Option<f64>) -> Self {
        match range {
            Some(d) => Distance::Obstacle(d),
            None => Distance::Clear,
        }
    }

    /// The measured distance, with `Clear` mapped onto `max_range`.
    pub fn or_max(&self, max_range: f64) -> f64 {
        match *self {
            Distance::Obstacle(d) => d.min(max_range),
            Distance::Clear => max_range,
        }
    }
}

//! # Sensor model
//!
//! Converts a pose and a map into the readings a robot standing at that pose
//! would observe. The model is a pure function of its inputs so the same code
//! predicts particle readings and produces the simulated robot's readings.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::{Deserialize, Serialize};

// Internal
use crate::{map::Map, pose::Pose};
use comms_if::eqpt::robot::{Distance, SensorReading, SideDistances};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Angle between the sensor head direction and the left/right scan rays.
pub const SCAN_OFFSET_DEG: f64 = 90.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The channels a robot reports, and so the channels which are predicted.
///
/// The forward distance is always present.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorChannels {
    /// Report left and right distances as well as the forward one
    pub scan: bool,

    /// Report the colour of the floor under the robot
    pub floor_color: bool,
}

/// Predicts sensor readings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorModel {
    pub channels: SensorChannels,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SensorChannels {
    fn default() -> Self {
        Self {
            scan: true,
            floor_color: true,
        }
    }
}

impl SensorModel {
    pub fn new(channels: SensorChannels) -> Self {
        Self { channels }
    }

    /// The reading a robot at `pose` with its sensor head turned `head_deg`
    /// from the body would observe.
    ///
    /// The forward ray points along `pose.heading_deg + head_deg`, the left
    /// and right rays are offset by +90 and -90 degrees from it.
    pub fn expected(&self, pose: &Pose, head_deg: f64, map: &Map) -> SensorReading {
        let look_deg = pose.heading_deg + head_deg;

        let scan = if self.channels.scan {
            Some(SideDistances {
                left: cast(pose, look_deg + SCAN_OFFSET_DEG, map),
                right: cast(pose, look_deg - SCAN_OFFSET_DEG, map),
            })
        } else {
            None
        };

        let floor_color = if self.channels.floor_color {
            map.floor_color(&pose.position())
        } else {
            None
        };

        SensorReading {
            forward: cast(pose, look_deg, map),
            scan,
            floor_color,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// The full set of readings expected at `pose` with the sensor head facing
/// forwards.
pub fn expected_reading(pose: &Pose, map: &Map) -> SensorReading {
    SensorModel::default().expected(pose, 0.0, map)
}

fn cast(pose: &Pose, angle_deg: f64, map: &Map) -> Distance {
    match map.nearest_obstacle(&pose.position(), angle_deg) {
        Ok(d) => Distance::from_range(d),
        Err(e) => {
            warn!("Cannot cast ray from {:?} at {} deg: {}", pose, angle_deg, e);
            Distance::Clear
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::MapDesc;
    use approx::assert_relative_eq;

    fn forward(r: &SensorReading) -> f64 {
        match r.forward {
            Distance::Obstacle(d) => d,
            Distance::Clear => panic!("Expected an obstacle"),
        }
    }

    #[test]
    fn test_expected_reading() {
        let map = Map::from_desc(&MapDesc::room(150.0, 200.0)).unwrap();

        let r = expected_reading(&Pose::new(75.0, 100.0, 0.0), &map);
        assert_relative_eq!(forward(&r), 75.0, epsilon = 1e-9);

        let scan = r.scan.unwrap();
        assert_eq!(scan.left, Distance::Obstacle(100.0));
        assert_eq!(scan.right, Distance::Obstacle(100.0));

        // No tiles in the map so the floor colour is unknown
        assert_eq!(r.floor_color, None);

        // Off centre, facing up, left is -X
        let r = expected_reading(&Pose::new(30.0, 50.0, 90.0), &map);
        assert_relative_eq!(forward(&r), 150.0, epsilon = 1e-9);
        match r.scan.unwrap() {
            SideDistances {
                left: Distance::Obstacle(l),
                right: Distance::Obstacle(rr),
            } => {
                assert_relative_eq!(l, 30.0, epsilon = 1e-9);
                assert_relative_eq!(rr, 120.0, epsilon = 1e-9);
            }
            s => panic!("Unexpected scan {:?}", s),
        }
    }

    #[test]
    fn test_sensor_head() {
        let map = Map::from_desc(&MapDesc::room(150.0, 200.0)).unwrap();
        let model = SensorModel::new(SensorChannels {
            scan: false,
            floor_color: false,
        });

        // Body facing +X, head turned to face +Y
        let r = model.expected(&Pose::new(30.0, 50.0, 0.0), 90.0, &map);
        assert_relative_eq!(forward(&r), 150.0, epsilon = 1e-9);
        assert_eq!(r.scan, None);
        assert_eq!(r.floor_color, None);
    }

    #[test]
    fn test_outside_looking_out() {
        let map = Map::from_desc(&MapDesc::room(150.0, 200.0)).unwrap();

        let r = expected_reading(&Pose::new(-10.0, 100.0, 180.0), &map);
        assert_eq!(r.forward, Distance::Clear);
    }
}

//! # Simulated robot
//!
//! A robot living in a map, driven by the same motion model the particles use
//! and sensed through the same sensor model. It stands in for a physical
//! robot when developing and testing the filter.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use rand::{rngs::SmallRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// Internal
use crate::{
    map::Map,
    motion::{apply_head, apply_motion, perturb, MotionNoise},
    pose::Pose,
    sensor::{SensorChannels, SensorModel},
};
use comms_if::eqpt::robot::{Distance, Robot, RobotCmd, SensorReading, SideDistances};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distance the robot keeps from a wall when a move is blocked by it.
pub const STOP_CLEARANCE: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRobotParams {
    /// Ground truth starting pose
    pub start: Pose,

    /// Noise between the commanded and actual motions. The robot reports the
    /// commanded amount so this noise is invisible to the filter.
    #[serde(default)]
    pub actuation_noise: MotionNoise,

    /// Standard deviation of the noise added to distance readings
    #[serde(default)]
    pub distance_noise: f64,

    /// Range beyond which obstacles aren't seen. Defaults to the map diagonal.
    #[serde(default)]
    pub max_range: Option<f64>,

    #[serde(default)]
    pub sensors: SensorChannels,

    #[serde(default)]
    pub seed: Option<u64>,
}

/// A simulated robot.
pub struct SimRobot {
    map: Arc<Map>,
    pose: Pose,
    head_deg: f64,
    model: SensorModel,
    actuation_noise: MotionNoise,
    distance_noise: Option<Normal<f64>>,
    max_range: f64,
    rng: SmallRng,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SimRobotError {
    #[error("Cannot execute an invalid command: {0:?}")]
    InvalidCmd(RobotCmd),

    #[error("The robot is outside of the map at {0:?}")]
    OutsideMap(Pose),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimRobot {
    pub fn new(params: &SimRobotParams, map: Arc<Map>) -> Result<Self, SimRobotError> {
        if !map.is_operable(&params.start.position()) {
            return Err(SimRobotError::OutsideMap(params.start));
        }

        let distance_noise = if params.distance_noise > 0.0 {
            Normal::new(0.0, params.distance_noise).ok()
        } else {
            None
        };

        let rng = match params.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };

        Ok(Self {
            max_range: params.max_range.unwrap_or_else(|| map.diagonal()),
            map,
            pose: Pose::new(params.start.x, params.start.y, params.start.heading_deg),
            head_deg: 0.0,
            model: SensorModel::new(params.sensors),
            actuation_noise: params.actuation_noise,
            distance_noise,
            rng,
        })
    }

    /// A noise free robot at the given pose.
    pub fn exact(start: Pose, sensors: SensorChannels, map: Arc<Map>) -> Result<Self, SimRobotError> {
        Self::new(
            &SimRobotParams {
                start,
                actuation_noise: MotionNoise::none(),
                distance_noise: 0.0,
                max_range: None,
                sensors,
                seed: Some(0),
            },
            map,
        )
    }

    /// Ground truth pose of the robot.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn head_deg(&self) -> f64 {
        self.head_deg
    }

    /// Furthest the robot can travel along `distance` before hitting a wall.
    fn free_travel(&self, distance: f64) -> f64 {
        if distance == 0.0 {
            return 0.0;
        }

        let dir_deg = if distance > 0.0 {
            self.pose.heading_deg
        } else {
            self.pose.heading_deg + 180.0
        };

        match self.map.nearest_obstacle_within(&self.pose.position(), dir_deg, distance.abs()) {
            Ok(Some(d)) => distance.signum() * (d - STOP_CLEARANCE).max(0.0),
            Ok(None) => distance,
            Err(e) => {
                warn!("Cannot check travel for {}: {}", distance, e);
                distance
            }
        }
    }

    fn noisy(&mut self, d: Distance) -> Distance {
        let d = match (d, self.distance_noise) {
            (Distance::Obstacle(v), Some(n)) => Distance::Obstacle((v + n.sample(&mut self.rng)).max(0.0)),
            (d, _) => d,
        };

        match d {
            Distance::Obstacle(v) if v > self.max_range => Distance::Clear,
            d => d,
        }
    }
}

impl Robot for SimRobot {
    type Error = SimRobotError;

    fn actuate(&mut self, cmd: RobotCmd) -> Result<f64, Self::Error> {
        if !cmd.is_valid() {
            return Err(SimRobotError::InvalidCmd(cmd));
        }

        let actual = perturb(&cmd, &self.actuation_noise, &mut self.rng);

        let executed = match actual {
            RobotCmd::Move { distance } => {
                let travel = self.free_travel(distance);
                self.pose = apply_motion(&self.pose, &RobotCmd::Move { distance: travel });

                if travel.abs() < distance.abs() {
                    debug!("SimRobot blocked after {:.2} of {:.2}", travel, distance);
                    travel
                } else {
                    cmd.amount()
                }
            }
            _ => {
                self.pose = apply_motion(&self.pose, &actual);
                self.head_deg = apply_head(self.head_deg, &actual);
                cmd.amount()
            }
        };

        trace!("SimRobot now at {:?}, head at {:.1} deg", self.pose, self.head_deg);

        Ok(executed)
    }

    fn sense(&mut self) -> Result<SensorReading, Self::Error> {
        let exact = self.model.expected(&self.pose, self.head_deg, &self.map);

        let scan = match exact.scan {
            Some(s) => Some(SideDistances {
                left: self.noisy(s.left),
                right: self.noisy(s.right),
            }),
            None => None,
        };

        Ok(SensorReading {
            forward: self.noisy(exact.forward),
            scan,
            floor_color: exact.floor_color,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::MapDesc;
    use approx::assert_relative_eq;

    fn map() -> Arc<Map> {
        Arc::new(Map::from_desc(&MapDesc::room(150.0, 200.0)).unwrap())
    }

    fn forward(r: &SensorReading) -> f64 {
        match r.forward {
            Distance::Obstacle(d) => d,
            Distance::Clear => panic!("Expected an obstacle"),
        }
    }

    #[test]
    fn test_rotation_sign_convention() {
        // After turning +90 the old left reading must be the new forward one
        let mut robot = SimRobot::exact(Pose::new(30.0, 50.0, 0.0), SensorChannels::default(), map()).unwrap();

        let before = robot.sense().unwrap();
        robot.actuate(RobotCmd::Rotate { degrees: 90.0 }).unwrap();
        let after = robot.sense().unwrap();

        match before.scan.unwrap().left {
            Distance::Obstacle(l) => assert_relative_eq!(l, forward(&after), epsilon = 1e-9),
            Distance::Clear => panic!("Expected an obstacle"),
        }

        // And turning the sensor head back by 90 restores the original view
        robot.actuate(RobotCmd::RotateSensor { degrees: -90.0 }).unwrap();
        assert_relative_eq!(forward(&robot.sense().unwrap()), forward(&before), epsilon = 1e-9);
    }

    #[test]
    fn test_blocked_move() {
        let mut robot = SimRobot::exact(Pose::new(140.0, 100.0, 0.0), SensorChannels::default(), map()).unwrap();

        let executed = robot.actuate(RobotCmd::Move { distance: 50.0 }).unwrap();
        assert_relative_eq!(executed, 10.0 - STOP_CLEARANCE, epsilon = 1e-9);
        assert_relative_eq!(robot.pose().x, 150.0 - STOP_CLEARANCE, epsilon = 1e-9);

        // Free moves report the commanded amount
        let executed = robot.actuate(RobotCmd::Move { distance: -20.0 }).unwrap();
        assert_relative_eq!(executed, -20.0);
        assert_relative_eq!(robot.pose().x, 129.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            SimRobot::exact(Pose::new(-5.0, 0.0, 0.0), SensorChannels::default(), map()),
            Err(SimRobotError::OutsideMap(_))
        ));

        let mut robot = SimRobot::exact(Pose::new(5.0, 5.0, 0.0), SensorChannels::default(), map()).unwrap();
        assert!(matches!(
            robot.actuate(RobotCmd::Rotate { degrees: f64::NAN }),
            Err(SimRobotError::InvalidCmd(_))
        ));
    }

    #[test]
    fn test_max_range() {
        let params = SimRobotParams {
            start: Pose::new(10.0, 100.0, 0.0),
            actuation_noise: MotionNoise::none(),
            distance_noise: 0.0,
            max_range: Some(50.0),
            sensors: SensorChannels::default(),
            seed: Some(1),
        };
        let mut robot = SimRobot::new(&params, map()).unwrap();

        let r = robot.sense().unwrap();
        assert_eq!(r.forward, Distance::Clear);
        assert_eq!(r.scan.unwrap().left, Distance::Clear);
        assert!(matches!(r.scan.unwrap().right, Distance::Clear));

        robot.actuate(RobotCmd::Rotate { degrees: 180.0 }).unwrap();
        assert_relative_eq!(forward(&robot.sense().unwrap()), 10.0, epsilon = 1e-9);
    }
}

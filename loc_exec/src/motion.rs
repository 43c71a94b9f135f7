//! # Motion model
//!
//! The pure motion update shared by the particle filter and the simulated
//! robot, along with the noise model used to perturb commands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

// Internal
use crate::{geom, pose::Pose};
use comms_if::eqpt::robot::RobotCmd;
use util::maths::normalise_deg;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Standard deviations of the noise applied to commanded motions.
///
/// The deviation for a command of amount `a` is `abs + rel * |a|`.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionNoise {
    /// Fixed noise on translations
    ///
    /// Units: map units
    pub move_abs: f64,

    /// Noise on translations proportional to the distance travelled
    pub move_rel: f64,

    /// Fixed noise on rotations
    ///
    /// Units: degrees
    pub rotate_abs_deg: f64,

    /// Noise on rotations proportional to the angle turned
    pub rotate_rel: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionNoise {
    /// No noise at all, motions are applied exactly.
    pub fn none() -> Self {
        Self::default()
    }

    /// Standard deviation of the noise for the given command.
    pub fn std_dev(&self, cmd: &RobotCmd) -> f64 {
        match cmd {
            RobotCmd::Move { distance } => self.move_abs + self.move_rel * distance.abs(),
            RobotCmd::Rotate { degrees } | RobotCmd::RotateSensor { degrees } => {
                self.rotate_abs_deg + self.rotate_rel * degrees.abs()
            }
        }
    }

    /// Determine if every deviation is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.move_abs, self.move_rel, self.rotate_abs_deg, self.rotate_rel]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply the command to the pose.
///
/// Moves translate along the heading, rotations turn counter-clockwise for
/// positive angles. Sensor head rotations leave the body pose untouched.
pub fn apply_motion(pose: &Pose, cmd: &RobotCmd) -> Pose {
    match *cmd {
        RobotCmd::Move { distance } => {
            let p = pose.position() + geom::direction(pose.heading_deg) * distance;
            Pose {
                x: p.x,
                y: p.y,
                heading_deg: pose.heading_deg,
            }
        }
        RobotCmd::Rotate { degrees } => Pose {
            heading_deg: normalise_deg(pose.heading_deg + degrees),
            ..*pose
        },
        RobotCmd::RotateSensor { .. } => *pose,
    }
}

/// Apply the command to the sensor head angle.
pub fn apply_head(head_deg: f64, cmd: &RobotCmd) -> f64 {
    match *cmd {
        RobotCmd::RotateSensor { degrees } => normalise_deg(head_deg + degrees),
        _ => head_deg,
    }
}

/// Perturb the amount of the command with zero mean Gaussian noise.
///
/// With zero noise the command is returned unchanged.
pub fn perturb<R: Rng + ?Sized>(cmd: &RobotCmd, noise: &MotionNoise, rng: &mut R) -> RobotCmd {
    let std_dev = noise.std_dev(cmd);

    match Normal::new(0.0, std_dev) {
        Ok(n) if std_dev > 0.0 => cmd.with_amount(cmd.amount() + n.sample(rng)),
        _ => *cmd,
    }
}

/// Apply a noisy version of the command to the pose.
pub fn sample_motion<R: Rng + ?Sized>(
    pose: &Pose,
    cmd: &RobotCmd,
    noise: &MotionNoise,
    rng: &mut R,
) -> Pose {
    apply_motion(pose, &perturb(cmd, noise, rng))
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_heading_normalisation() {
        let p = Pose::new(0.0, 0.0, 0.0);
        let turned = apply_motion(&p, &RobotCmd::Rotate { degrees: 370.0 });
        assert_relative_eq!(turned.heading_deg, 10.0, epsilon = 1e-9);

        let p = Pose::new(0.0, 0.0, 5.0);
        let turned = apply_motion(&p, &RobotCmd::Rotate { degrees: -10.0 });
        assert_relative_eq!(turned.heading_deg, 355.0, epsilon = 1e-9);
    }

    #[test]
    fn test_move_direction() {
        // Heading 90 moves towards +Y
        let p = apply_motion(&Pose::new(10.0, 10.0, 90.0), &RobotCmd::Move { distance: 5.0 });
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 15.0, epsilon = 1e-9);

        // Negative distances reverse
        let p = apply_motion(&Pose::new(10.0, 10.0, 0.0), &RobotCmd::Move { distance: -5.0 });
        assert_relative_eq!(p.x, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip() {
        let cmds = [
            RobotCmd::Move { distance: 17.5 },
            RobotCmd::Rotate { degrees: 123.0 },
            RobotCmd::Rotate { degrees: -400.0 },
        ];
        let poses = [
            Pose::new(1.0, 2.0, 0.0),
            Pose::new(140.0, 10.0, 359.5),
            Pose::new(-3.0, 7.5, 181.0),
        ];

        for pose in poses.iter() {
            for cmd in cmds.iter() {
                let there = apply_motion(pose, cmd);
                let back = apply_motion(&there, &cmd.inverse());

                assert_relative_eq!(back.x, pose.x, epsilon = 1e-9);
                assert_relative_eq!(back.y, pose.y, epsilon = 1e-9);
                assert!(back.heading_error_deg(pose) < 1e-9);
            }
        }
    }

    #[test]
    fn test_sensor_rotation() {
        let pose = Pose::new(1.0, 2.0, 30.0);
        let cmd = RobotCmd::RotateSensor { degrees: -45.0 };

        assert_eq!(apply_motion(&pose, &cmd), pose);
        assert_relative_eq!(apply_head(0.0, &cmd), 315.0);
        assert_relative_eq!(apply_head(0.0, &RobotCmd::Move { distance: 1.0 }), 0.0);
    }

    #[test]
    fn test_sample_motion() {
        let mut rng = SmallRng::seed_from_u64(7);
        let pose = Pose::new(0.0, 0.0, 0.0);
        let cmd = RobotCmd::Move { distance: 100.0 };

        // Zero noise is exact
        assert_eq!(sample_motion(&pose, &cmd, &MotionNoise::none(), &mut rng), apply_motion(&pose, &cmd));

        // With noise the mean stays on the command
        let noise = MotionNoise {
            move_abs: 1.0,
            move_rel: 0.05,
            ..MotionNoise::none()
        };
        let n = 5000;
        let mean_x = (0..n)
            .map(|_| sample_motion(&pose, &cmd, &noise, &mut rng).x)
            .sum::<f64>()
            / n as f64;
        assert!((mean_x - 100.0).abs() < 0.5, "mean {}", mean_x);
        assert_relative_eq!(noise.std_dev(&cmd), 6.0);
        assert!(noise.is_valid());
    }
}

//! Pose of a robot, or of a hypothesis about one, in the map frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::geom::Point;
use util::maths::{ang_dist_deg, normalise_deg};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position and heading in the map frame.
///
/// Heading is in degrees in the range [0, 360), with 0 pointing along +X and
/// positive angles turning towards +Y (counter-clockwise).
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, normalising the heading.
    pub fn new(x: f64, y: f64, heading_deg: f64) -> Self {
        Self {
            x,
            y,
            heading_deg: normalise_deg(heading_deg),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Straight line distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Absolute heading difference in degrees, in the range [0, 180].
    pub fn heading_error_deg(&self, other: &Pose) -> f64 {
        ang_dist_deg(self.heading_deg, other.heading_deg).abs()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading_deg.is_finite()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pose() {
        let a = Pose::new(0.0, 0.0, -10.0);
        assert_eq!(a.heading_deg, 350.0);

        let b = Pose::new(3.0, 4.0, 370.0);
        assert_eq!(b.heading_deg, 10.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(a.heading_error_deg(&b), 20.0);
    }
}

//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Degrees in a full turn.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Normalise an angle in degrees into the range [0, 360).
pub fn normalise_deg<T>(angle_deg: T) -> T
where
    T: Float,
{
    let full_turn = T::from(FULL_TURN_DEG).unwrap();
    let r = rem_euclid(angle_deg, full_turn);

    // Rounding can leave tiny negative angles sitting exactly on 360
    if r >= full_turn {
        T::zero()
    } else {
        r
    }
}

/// Get the signed angular distance from `a` to `b` in degrees.
///
/// The result is the shortest rotation taking `a` onto `b`, in the range
/// [-180, 180], accounting for wrapping at 360.
pub fn ang_dist_deg<T>(a: T, b: T) -> T
where
    T: Float,
{
    let full_turn = T::from(FULL_TURN_DEG).unwrap();
    let half_turn = T::from(FULL_TURN_DEG / 2.0).unwrap();

    let d = rem_euclid(b - a, full_turn);

    if d > half_turn {
        d - full_turn
    } else {
        d
    }
}

/// Weighted circular mean of a set of angles in degrees.
///
/// The angles are converted to unit vectors, averaged using their weights,
/// and the direction of the resultant taken. Returns `None` if the weights sum
/// to zero or the resultant has no direction (e.g. two opposite angles of
/// equal weight).
pub fn circular_mean_deg<I>(angles: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sum_sin = 0.0;
    let mut sum_cos = 0.0;
    let mut sum_weight = 0.0;

    for (angle_deg, weight) in angles {
        let angle_rad = angle_deg.to_radians();
        sum_sin += weight * angle_rad.sin();
        sum_cos += weight * angle_rad.cos();
        sum_weight += weight;
    }

    if sum_weight <= 0.0 || (sum_sin.hypot(sum_cos) / sum_weight) < 1e-12 {
        return None;
    }

    Some(normalise_deg(sum_sin.atan2(sum_cos).to_degrees()))
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// This result is not an element of the function's codomain, but it is the
/// closest floating point number in the real numbers and thus fulfills the
/// property `self == self.div_euclid(rhs) * rhs + self.rem_euclid(rhs)`
/// approximatively.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalise_deg() {
        assert_eq!(normalise_deg(370f64), 10f64);
        assert_eq!(normalise_deg(-10f64), 350f64);
        assert_eq!(normalise_deg(360f64), 0f64);
        assert_eq!(normalise_deg(-720f64), 0f64);
        assert_eq!(normalise_deg(-1e-20f64), 0f64);
        assert_eq!(normalise_deg(5f64 - 10f64), 355f64);
    }

    #[test]
    fn test_ang_dist_deg() {
        assert_eq!(ang_dist_deg(10f64, 20f64), 10f64);
        assert_eq!(ang_dist_deg(20f64, 10f64), -10f64);
        assert_eq!(ang_dist_deg(359f64, 1f64), 2f64);
        assert_eq!(ang_dist_deg(1f64, 359f64), -2f64);
        assert_eq!(ang_dist_deg(0f64, 360f64), 0f64);
        assert_eq!(ang_dist_deg(0f64, 180f64), 180f64);
    }

    #[test]
    fn test_circular_mean_deg() {
        // Naive averaging would give 180 here
        let mean = circular_mean_deg(vec![(359.0, 1.0), (1.0, 1.0)]).unwrap();
        assert!(ang_dist_deg(mean, 0.0).abs() < 1e-9);

        let mean = circular_mean_deg(vec![(80.0, 3.0), (100.0, 1.0)]).unwrap();
        assert!(mean > 80.0 && mean < 90.0);

        assert_eq!(circular_mean_deg(vec![(0.0, 1.0), (180.0, 1.0)]), None);
        assert_eq!(circular_mean_deg(vec![(45.0, 0.0)]), None);
    }
}

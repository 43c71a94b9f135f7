//! # Geometry primitives
//!
//! Line segments, rays and axis aligned rectangles in the map plane, along
//! with the intersection and containment queries the map model is built on.
//!
//! Angles are given in degrees, measured counter-clockwise from the +X axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance used for every floating point comparison in the geometry and
/// weighting code.
pub const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A point in the map plane.
pub type Point = Point2<f64>;

/// A finite line segment between two points.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// An axis aligned rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Corner with the smallest coordinates
    pub min: Point,

    /// Corner with the largest coordinates
    pub max: Point,
}

/// A ray cast from an observer, i.e. a segment defined by its origin,
/// direction and length.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    origin: Point,
    heading_deg: f64,
    length: f64,
    end: Point,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The infinite line through a segment.
///
/// Vertical lines have no finite slope so they are kept as their own variant.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Line {
    /// The line `x = x`
    Vertical { x: f64 },

    /// The line `y = slope * x + intercept`
    Sloped { slope: f64, intercept: f64 },
}

/// Orientation of an ordered triplet of points.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Orientation {
    Colinear,
    Clockwise,
    CounterClockwise,
}

/// Errors raised when building or querying geometry.
#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Rays must have a positive finite length (got {0})")]
    DegenerateRay(f64),

    #[error("Geometry contains a non-finite value")]
    NonFinite,

    #[error("Segment from {0:?} to {1:?} has zero length")]
    DegenerateSegment(Point, Point),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Segment {
    /// Create a new segment, rejecting non-finite or zero length geometry.
    pub fn new(start: Point, end: Point) -> Result<Self, GeometryError> {
        if !is_finite(&start) || !is_finite(&end) {
            return Err(GeometryError::NonFinite);
        }

        let seg = Self { start, end };

        if seg.length() <= EPSILON {
            return Err(GeometryError::DegenerateSegment(start, end));
        }

        Ok(seg)
    }

    /// Length of the segment
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Midpoint of the segment
    pub fn midpoint(&self) -> Point {
        nalgebra::center(&self.start, &self.end)
    }

    /// Bounding rectangle of the segment
    pub fn bounds(&self) -> Rect {
        Rect::new(self.start, self.end)
    }

    /// The infinite line this segment lies on.
    pub fn line(&self) -> Line {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;

        if dx.abs() <= EPSILON {
            Line::Vertical { x: self.start.x }
        } else {
            let slope = dy / dx;
            Line::Sloped {
                slope,
                intercept: self.start.y - slope * self.start.x,
            }
        }
    }

    /// Determine if the given point lies on the segment.
    pub fn contains_point(&self, point: &Point) -> bool {
        orientation(&self.start, &self.end, point) == Orientation::Colinear
            && self.bounds().contains(point)
    }

    /// Determine if the two segments intersect or touch.
    pub fn intersects(&self, other: &Segment) -> bool {
        let o1 = orientation(&self.start, &self.end, &other.start);
        let o2 = orientation(&self.start, &self.end, &other.end);
        let o3 = orientation(&other.start, &other.end, &self.start);
        let o4 = orientation(&other.start, &other.end, &self.end);

        // General case, each segment straddles the other
        if o1 != o2 && o3 != o4 {
            return true;
        }

        // Colinear cases, an end of one segment lies on the other
        (o1 == Orientation::Colinear && self.bounds().contains(&other.start))
            || (o2 == Orientation::Colinear && self.bounds().contains(&other.end))
            || (o3 == Orientation::Colinear && other.bounds().contains(&self.start))
            || (o4 == Orientation::Colinear && other.bounds().contains(&self.end))
    }

    /// Find the point at which two segments cross.
    ///
    /// Returns `None` if the segments don't intersect. Colinear segments which
    /// overlap give the point of the overlap closest to `self.start`, so a ray
    /// running along a wall meets it at the wall's near end.
    pub fn intersection(&self, other: &Segment) -> Option<Point> {
        if !self.intersects(other) {
            return None;
        }

        match (self.line(), other.line()) {
            // Touching parallel segments must lie on the same line
            (Line::Vertical { .. }, Line::Vertical { .. }) => self.nearest_overlap(other),
            (Line::Vertical { x }, Line::Sloped { slope, intercept })
            | (Line::Sloped { slope, intercept }, Line::Vertical { x }) => {
                Some(Point::new(x, slope * x + intercept))
            }
            (
                Line::Sloped {
                    slope: m1,
                    intercept: c1,
                },
                Line::Sloped {
                    slope: m2,
                    intercept: c2,
                },
            ) => {
                if (m1 - m2).abs() <= EPSILON {
                    return self.nearest_overlap(other);
                }

                let x = (c2 - c1) / (m1 - m2);

                // Evaluate y on the flatter of the two lines to limit the
                // error from steep slopes
                let y = if m1.abs() <= m2.abs() {
                    m1 * x + c1
                } else {
                    m2 * x + c2
                };

                Some(Point::new(x, y))
            }
        }
    }

    /// End of the overlap between two colinear segments nearest `self.start`.
    ///
    /// The overlap's ends are always ends of one of the two segments.
    fn nearest_overlap(&self, other: &Segment) -> Option<Point> {
        let (a, b) = (self.bounds(), other.bounds());

        [self.start, other.start, other.end, self.end]
            .iter()
            .filter(|p| a.contains(p) && b.contains(p))
            .min_by(|p, q| (**p - self.start).norm().total_cmp(&(**q - self.start).norm()))
            .copied()
    }
}

impl Rect {
    /// Create the rectangle spanning the two given corners, in any order.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// The smallest rectangle containing all the given rectangles, or `None`
    /// if there are none.
    pub fn union_all<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Self> {
        rects.into_iter().fold(None, |acc, r| match acc {
            None => Some(r),
            Some(a) => Some(Rect {
                min: Point::new(a.min.x.min(r.min.x), a.min.y.min(r.min.y)),
                max: Point::new(a.max.x.max(r.max.x), a.max.y.max(r.max.y)),
            }),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Length of the rectangle's diagonal
    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    pub fn centre(&self) -> Point {
        nalgebra::center(&self.min, &self.max)
    }

    /// Determine if the point lies inside or on the edge of the rectangle.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x - EPSILON
            && point.x <= self.max.x + EPSILON
            && point.y >= self.min.y - EPSILON
            && point.y <= self.max.y + EPSILON
    }

    /// Determine if the two rectangles share any area or edge.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x + EPSILON
            && other.min.x <= self.max.x + EPSILON
            && self.min.y <= other.max.y + EPSILON
            && other.min.y <= self.max.y + EPSILON
    }

    /// Determine if all corners are finite and the rectangle isn't inverted.
    pub fn is_valid(&self) -> bool {
        is_finite(&self.min) && is_finite(&self.max) && self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

impl Ray {
    /// Create a new ray.
    ///
    /// # Errors
    /// - `GeometryError::NonFinite` if the origin or heading is not finite.
    /// - `GeometryError::DegenerateRay` if the length is not strictly positive
    ///   and finite.
    pub fn new(origin: Point, heading_deg: f64, length: f64) -> Result<Self, GeometryError> {
        if !is_finite(&origin) || !heading_deg.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        if !length.is_finite() || length <= EPSILON {
            return Err(GeometryError::DegenerateRay(length));
        }

        let end = origin + direction(heading_deg) * length;

        Ok(Self {
            origin,
            heading_deg,
            length,
            end,
        })
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// The segment covered by the ray.
    pub fn segment(&self) -> Segment {
        Segment {
            start: self.origin,
            end: self.end,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Unit vector pointing along the given heading.
pub fn direction(heading_deg: f64) -> Vector2<f64> {
    let (sin, cos) = heading_deg.to_radians().sin_cos();
    Vector2::new(cos, sin)
}

/// Heading of the vector from `from` to `to` in degrees, in the range
/// (-180, 180].
pub fn bearing_deg(from: &Point, to: &Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Determine if both coordinates of a point are finite.
pub fn is_finite(point: &Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

fn orientation(p: &Point, q: &Point, r: &Point) -> Orientation {
    let cross = (q - p).perp(&(r - p));

    if cross.abs() <= EPSILON {
        Orientation::Colinear
    } else if cross > 0.0 {
        Orientation::CounterClockwise
    } else {
        Orientation::Clockwise
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn seg(x0: f64, y0: f64, x1: f64, y1: f64) -> Segment {
        Segment::new(Point::new(x0, y0), Point::new(x1, y1)).unwrap()
    }

    #[test]
    fn test_intersection_general() {
        let a = seg(0.0, 0.0, 10.0, 10.0);
        let b = seg(0.0, 10.0, 10.0, 0.0);

        let p = a.intersection(&b).unwrap();
        assert_relative_eq!(p.x, 5.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 5.0, epsilon = EPSILON);

        // Segments whose lines cross outside of either segment
        let c = seg(20.0, 0.0, 30.0, 5.0);
        assert!(!a.intersects(&c));
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_intersection_vertical() {
        let wall = seg(150.0, 0.0, 150.0, 200.0);
        let ray = seg(75.0, 100.0, 300.0, 100.0);

        let p = ray.intersection(&wall).unwrap();
        assert_relative_eq!(p.x, 150.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 100.0, epsilon = EPSILON);

        // Both vertical and overlapping, meet where the overlap starts
        let other = seg(150.0, 50.0, 150.0, 250.0);
        assert!(matches!(wall.line(), Line::Vertical { .. }));
        assert_eq!(wall.intersection(&other), Some(Point::new(150.0, 50.0)));
        assert_eq!(other.intersection(&wall), Some(Point::new(150.0, 50.0)));

        // Both vertical on different lines
        assert_eq!(wall.intersection(&seg(151.0, 0.0, 151.0, 200.0)), None);

        // Vertical ray onto a sloped wall
        let sloped = seg(0.0, 0.0, 10.0, 5.0);
        let up = seg(4.0, -10.0, 4.0, 10.0);
        let p = up.intersection(&sloped).unwrap();
        assert_relative_eq!(p.x, 4.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 2.0, epsilon = EPSILON);
    }

    #[test]
    fn test_intersection_parallel() {
        let a = seg(0.0, 0.0, 10.0, 0.0);
        let b = seg(0.0, 1.0, 10.0, 1.0);
        assert_eq!(a.intersection(&b), None);

        // Overlapping colinear segments meet at the near end of the overlap
        let c = seg(5.0, 0.0, 15.0, 0.0);
        assert!(a.intersects(&c));
        assert_eq!(a.intersection(&c), Some(Point::new(5.0, 0.0)));
        assert_eq!(c.intersection(&a), Some(Point::new(5.0, 0.0)));

        // A segment running along a longer one starts on it
        let inner = seg(2.0, 0.0, 4.0, 0.0);
        assert_eq!(inner.intersection(&a), Some(Point::new(2.0, 0.0)));

        // End to end, the only shared point
        let d = seg(10.0, 0.0, 20.0, 0.0);
        assert_eq!(a.intersection(&d), Some(Point::new(10.0, 0.0)));

        // Sloped and colinear, pointing back towards the other segment
        let e = seg(0.0, 0.0, 10.0, 5.0);
        let f = seg(14.0, 7.0, 6.0, 3.0);
        let p = f.intersection(&e).unwrap();
        assert_relative_eq!(p.x, 10.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 5.0, epsilon = EPSILON);

        // Colinear but apart
        assert_eq!(a.intersection(&seg(11.0, 0.0, 20.0, 0.0)), None);
    }

    #[test]
    fn test_contains_point() {
        let a = seg(0.0, 0.0, 10.0, 10.0);
        assert!(a.contains_point(&Point::new(5.0, 5.0)));
        assert!(a.contains_point(&Point::new(10.0, 10.0)));
        assert!(!a.contains_point(&Point::new(11.0, 11.0)));
        assert!(!a.contains_point(&Point::new(5.0, 6.0)));
    }

    #[test]
    fn test_degenerate_geometry() {
        assert!(matches!(
            Ray::new(Point::new(0.0, 0.0), 0.0, 0.0),
            Err(GeometryError::DegenerateRay(_))
        ));
        assert!(matches!(
            Ray::new(Point::new(0.0, 0.0), 0.0, -1.0),
            Err(GeometryError::DegenerateRay(_))
        ));
        assert!(matches!(
            Ray::new(Point::new(f64::NAN, 0.0), 0.0, 1.0),
            Err(GeometryError::NonFinite)
        ));
        assert!(matches!(
            Segment::new(Point::new(1.0, 1.0), Point::new(1.0, 1.0)),
            Err(GeometryError::DegenerateSegment(_, _))
        ));
    }

    #[test]
    fn test_ray_end() {
        let ray = Ray::new(Point::new(1.0, 1.0), 90.0, 10.0).unwrap();
        assert_relative_eq!(ray.end().x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(ray.end().y, 11.0, epsilon = 1e-12);

        // Vertical rays must be recognised as vertical lines
        assert!(matches!(ray.segment().line(), Line::Vertical { .. }));
    }

    #[test]
    fn test_rect() {
        let r = Rect::new(Point::new(10.0, 20.0), Point::new(0.0, 0.0));
        assert_eq!(r.min, Point::new(0.0, 0.0));
        assert_eq!(r.centre(), Point::new(5.0, 10.0));
        assert!(r.contains(&Point::new(10.0, 20.0)));
        assert!(!r.contains(&Point::new(10.1, 20.0)));

        let s = Rect::new(Point::new(10.0, 0.0), Point::new(15.0, 5.0));
        assert!(r.overlaps(&s));
        assert!(!r.overlaps(&Rect::new(Point::new(11.0, 0.0), Point::new(12.0, 1.0))));

        let u = Rect::union_all(vec![r, s]).unwrap();
        assert_eq!(u.max, Point::new(15.0, 20.0));
        assert_eq!(Rect::union_all(Vec::new()), None);
    }
}

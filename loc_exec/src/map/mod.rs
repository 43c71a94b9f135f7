//! # Map model
//!
//! The map is an immutable floor plan made of wall segments and coloured
//! floor tiles. It answers the queries the sensor model needs: how far away
//! is the nearest wall along a ray, and what colour is the floor at a point.
//!
//! Maps are shared read-only between the particles, the controller and any
//! simulated robot using `Arc<Map>`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod desc;
mod grid_index;
mod region;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

// Internal
pub use desc::*;
pub use grid_index::GridIndex;
pub use region::Region;

use crate::geom::{self, GeometryError, Point, Ray, Rect, Segment, EPSILON};
use comms_if::eqpt::robot::ColorTag;
use util::maths::ang_dist_deg;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maps with at least this many walls build a grid index to accelerate ray
/// casting. Smaller maps are faster to scan directly.
pub const INDEX_MIN_WALLS: usize = 32;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A wall in the map.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Wall {
    pub segment: Segment,
    pub color: Option<ColorTag>,
}

/// A coloured region of the floor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct FloorTile {
    pub bounds: Rect,
    pub color: ColorTag,
}

/// A sighting of a tagged region returned by the camera query.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Sighting {
    /// Point which was sighted (tile centre or wall midpoint)
    pub point: Point,

    /// Distance from the observer to the point
    pub distance: f64,

    /// Angle of the point relative to the observer's heading, positive to the
    /// left.
    pub bearing_deg: f64,
}

/// An immutable floor plan.
#[derive(Debug, Clone)]
pub struct Map {
    walls: Vec<Wall>,
    tiles: Vec<FloorTile>,
    bounds: Rect,
    diagonal: f64,
    index: Option<GridIndex>,

    /// Closed loop of walls around all the others, if there is one
    outline: Option<Region>,

    /// Closed loops of walls standing inside the outline
    obstacles: Vec<Region>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MapError {
    #[error("The map contains no valid walls")]
    Empty,

    #[error("The map has zero width or height ({0} x {1})")]
    ZeroExtent(f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Wall {
    pub fn new(start: Point, end: Point, color: Option<ColorTag>) -> Result<Self, GeometryError> {
        Ok(Self {
            segment: Segment::new(start, end)?,
            color,
        })
    }
}

impl FloorTile {
    pub fn new(bounds: Rect, color: ColorTag) -> Self {
        Self { bounds, color }
    }
}

impl Map {
    /// Build a new map from the given walls and floor tiles.
    ///
    /// Walls with non-finite or zero length geometry and tiles with non-finite
    /// or inverted bounds are skipped with a warning.
    ///
    /// # Errors
    /// - `MapError::Empty` if no valid walls remain.
    /// - `MapError::ZeroExtent` if the walls and tiles don't span a non-zero
    ///   area.
    pub fn new(walls: Vec<Wall>, tiles: Vec<FloorTile>) -> Result<Self, MapError> {
        let walls: Vec<Wall> = walls
            .into_iter()
            .filter(|w| match Segment::new(w.segment.start, w.segment.end) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Skipping wall: {}", e);
                    false
                }
            })
            .collect();

        let tiles: Vec<FloorTile> = tiles
            .into_iter()
            .filter(|t| {
                if t.bounds.is_valid() {
                    true
                } else {
                    warn!("Skipping floor tile with invalid bounds {:?}", t.bounds);
                    false
                }
            })
            .collect();

        if walls.is_empty() {
            return Err(MapError::Empty);
        }

        let bounds = Rect::union_all(
            walls
                .iter()
                .map(|w| w.segment.bounds())
                .chain(tiles.iter().map(|t| t.bounds)),
        )
        .ok_or(MapError::Empty)?;

        if bounds.width() <= EPSILON || bounds.height() <= EPSILON {
            return Err(MapError::ZeroExtent(bounds.width(), bounds.height()));
        }

        let index = if walls.len() >= INDEX_MIN_WALLS {
            let idx = GridIndex::build(&walls, &bounds);
            debug!(
                "Built {}x{} grid index over {} walls",
                idx.num_cells_x(),
                idx.num_cells_y(),
                walls.len()
            );
            Some(idx)
        } else {
            None
        };

        // The outline is the region spanning every wall, any others are
        // obstacles
        let wall_bounds = Rect::union_all(walls.iter().map(|w| w.segment.bounds())).ok_or(MapError::Empty)?;
        let mut obstacles = region::find_regions(&walls);
        let outline = obstacles
            .iter()
            .position(|r| r.bounds().contains(&wall_bounds.min) && r.bounds().contains(&wall_bounds.max))
            .map(|i| obstacles.remove(i));

        debug!(
            "Map has {} outline and {} obstacles",
            if outline.is_some() { "an" } else { "no" },
            obstacles.len()
        );

        Ok(Self {
            walls,
            tiles,
            diagonal: bounds.diagonal(),
            bounds,
            index,
            outline,
            obstacles,
        })
    }

    /// Distance to the nearest wall seen from `origin` looking along
    /// `angle_deg`, up to the length of the map's diagonal.
    ///
    /// Returns `Ok(None)` if no wall is hit. An observer standing on a wall
    /// sees it at distance zero.
    pub fn nearest_obstacle(&self, origin: &Point, angle_deg: f64) -> Result<Option<f64>, GeometryError> {
        self.nearest_obstacle_within(origin, angle_deg, self.diagonal)
    }

    /// As `nearest_obstacle` but with a caller supplied maximum range.
    pub fn nearest_obstacle_within(
        &self,
        origin: &Point,
        angle_deg: f64,
        max_range: f64,
    ) -> Result<Option<f64>, GeometryError> {
        let ray = Ray::new(*origin, angle_deg, max_range)?;

        match self.index {
            Some(ref idx) if self.bounds.contains(origin) => Ok(idx.cast(&self.walls, &ray)),
            _ => Ok(self.cast_all(&ray)),
        }
    }

    /// Colour of the floor at the given point, or `None` if no tile covers it.
    pub fn floor_color(&self, point: &Point) -> Option<ColorTag> {
        self.tiles
            .iter()
            .find(|t| t.bounds.contains(point))
            .map(|t| t.color)
    }

    /// Find the nearest region tagged with `tag` whose bearing lies within the
    /// field of view centred on `heading_deg`.
    ///
    /// Tagged floor tiles are sighted at their centre and tagged walls at
    /// their midpoint.
    pub fn nearest_tagged_in_view(
        &self,
        origin: &Point,
        heading_deg: f64,
        fov_deg: f64,
        tag: ColorTag,
    ) -> Option<Sighting> {
        let half_fov = fov_deg.abs() / 2.0;

        self.tiles
            .iter()
            .filter(|t| t.color == tag)
            .map(|t| t.bounds.centre())
            .chain(
                self.walls
                    .iter()
                    .filter(|w| w.color == Some(tag))
                    .map(|w| w.segment.midpoint()),
            )
            .filter_map(|point| {
                let distance = (point - origin).norm();
                let bearing_deg = if distance <= EPSILON {
                    0.0
                } else {
                    ang_dist_deg(heading_deg, geom::bearing_deg(origin, &point))
                };

                if bearing_deg.abs() <= half_fov + EPSILON {
                    Some(Sighting {
                        point,
                        distance,
                        bearing_deg,
                    })
                } else {
                    None
                }
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Determine if a robot can be at the given point.
    ///
    /// The point must lie within the map bounds, inside the outline if the
    /// walls close one, and outside every solid obstacle. Points on a wall
    /// count as operable.
    pub fn is_operable(&self, point: &Point) -> bool {
        if !geom::is_finite(point) || !self.bounds.contains(point) {
            return false;
        }

        if let Some(ref outline) = self.outline {
            if !outline.encloses(point) && !outline.on_boundary(point) {
                return false;
            }
        }

        !self
            .obstacles
            .iter()
            .any(|r| r.encloses(point) && !r.on_boundary(point))
    }

    pub fn outline(&self) -> Option<&Region> {
        self.outline.as_ref()
    }

    pub fn obstacles(&self) -> &[Region] {
        &self.obstacles
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn tiles(&self) -> &[FloorTile] {
        &self.tiles
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn origin(&self) -> Point {
        self.bounds.min
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    /// Length of the bounds diagonal, the longest distance a sensor can see.
    pub fn diagonal(&self) -> f64 {
        self.diagonal
    }

    /// Whether ray casting uses the grid index.
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Cast a ray against every wall in the map.
    pub(crate) fn cast_all(&self, ray: &Ray) -> Option<f64> {
        nearest_hit(self.walls.iter(), ray)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Distance along the ray to the wall, if it is hit.
pub(crate) fn hit_distance(wall: &Wall, ray: &Ray) -> Option<f64> {
    let origin = ray.origin();

    if wall.segment.contains_point(&origin) {
        return Some(0.0);
    }

    ray.segment()
        .intersection(&wall.segment)
        .map(|p| (p - origin).norm())
        .filter(|d| *d <= ray.length() + EPSILON)
}

/// Nearest hit on any of the walls.
pub(crate) fn nearest_hit<'a, I>(walls: I, ray: &Ray) -> Option<f64>
where
    I: IntoIterator<Item = &'a Wall>,
{
    walls
        .into_iter()
        .filter_map(|w| hit_distance(w, ray))
        .fold(None, |best, d| match best {
            Some(b) if b <= d => Some(b),
            _ => Some(d),
        })
}

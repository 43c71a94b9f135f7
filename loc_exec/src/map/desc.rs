//! Parsed map description
//!
//! The map loader hands over lines, rectangles and circles. This module turns
//! them into the walls and floor tiles of a `Map`. Descriptions are usually
//! read from JSON files in the `maps` directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};

use super::{FloorTile, Map, MapError, Wall};
use crate::geom::{Point, Rect};
use comms_if::eqpt::robot::ColorTag;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of walls used to approximate a circular obstacle.
pub const CIRCLE_SEGMENTS: usize = 16;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A parsed map description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDesc {
    pub lines: Vec<LineDesc>,
    pub rects: Vec<RectDesc>,
    pub circles: Vec<CircleDesc>,
}

/// A straight wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineDesc {
    pub start: [f64; 2],
    pub end: [f64; 2],
    #[serde(default)]
    pub color: Option<u32>,
}

/// A rectangle, either a coloured floor tile or a solid obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectDesc {
    pub min: [f64; 2],
    pub max: [f64; 2],
    pub color: u32,

    /// Solid rectangles are obstacles bounded by four walls instead of floor
    /// tiles.
    #[serde(default)]
    pub solid: bool,
}

/// A circular obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleDesc {
    pub centre: [f64; 2],
    pub radius: f64,
    #[serde(default)]
    pub color: Option<u32>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Map {
    /// Build a map from a parsed description.
    pub fn from_desc(desc: &MapDesc) -> Result<Self, MapError> {
        let mut walls = Vec::new();
        let mut tiles = Vec::new();

        for line in desc.lines.iter() {
            push_wall(&mut walls, line.start, line.end, line.color);
        }

        for rect in desc.rects.iter() {
            let bounds = Rect::new(to_point(rect.min), to_point(rect.max));

            if rect.solid {
                let c = [
                    [bounds.min.x, bounds.min.y],
                    [bounds.max.x, bounds.min.y],
                    [bounds.max.x, bounds.max.y],
                    [bounds.min.x, bounds.max.y],
                ];
                for i in 0..4 {
                    push_wall(&mut walls, c[i], c[(i + 1) % 4], Some(rect.color));
                }
            } else {
                tiles.push(FloorTile::new(bounds, ColorTag(rect.color)));
            }
        }

        for circle in desc.circles.iter() {
            let vertex = |i: usize| {
                let a = std::f64::consts::TAU * (i as f64) / (CIRCLE_SEGMENTS as f64);
                [
                    circle.centre[0] + circle.radius * a.cos(),
                    circle.centre[1] + circle.radius * a.sin(),
                ]
            };
            for i in 0..CIRCLE_SEGMENTS {
                push_wall(&mut walls, vertex(i), vertex(i + 1), circle.color);
            }
        }

        Map::new(walls, tiles)
    }
}

impl MapDesc {
    /// Description of an empty rectangular room with its bottom left corner
    /// at the origin.
    pub fn room(width: f64, height: f64) -> Self {
        let c = [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]];

        Self {
            lines: (0..4)
                .map(|i| LineDesc {
                    start: c[i],
                    end: c[(i + 1) % 4],
                    color: None,
                })
                .collect(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn push_wall(walls: &mut Vec<Wall>, start: [f64; 2], end: [f64; 2], color: Option<u32>) {
    match Wall::new(to_point(start), to_point(end), color.map(ColorTag)) {
        Ok(w) => walls.push(w),
        Err(e) => warn!("Skipping wall in map description: {}", e),
    }
}

fn to_point(p: [f64; 2]) -> Point {
    Point::new(p[0], p[1])
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "lines": [
                {"start": [0, 0], "end": [100, 0]},
                {"start": [100, 0], "end": [100, 50], "color": 4},
                {"start": [100, 50], "end": [0, 50]},
                {"start": [0, 50], "end": [0, 0]},
                {"start": [5, 5], "end": [5, 5]}
            ],
            "rects": [
                {"min": [0, 0], "max": [50, 50], "color": 1},
                {"min": [60, 10], "max": [70, 20], "color": 2, "solid": true}
            ],
            "circles": [
                {"centre": [25, 25], "radius": 5}
            ]
        }"#;

        let desc: MapDesc = serde_json::from_str(json).unwrap();
        let map = Map::from_desc(&desc).unwrap();

        // Degenerate line dropped, four room walls, four box walls and the
        // circle
        assert_eq!(map.walls().len(), 4 + 4 + CIRCLE_SEGMENTS);
        assert_eq!(map.tiles().len(), 1);
        assert_eq!(map.walls()[1].color, Some(ColorTag(4)));

        // The solid box blocks the view along y = 15
        let d = map.nearest_obstacle(&Point::new(40.0, 15.0), 0.0).unwrap().unwrap();
        assert_relative_eq!(d, 20.0, epsilon = 1e-9);

        // The circle is hit close to its radius
        let d = map.nearest_obstacle(&Point::new(5.0, 25.0), 0.0).unwrap().unwrap();
        assert!(d > 14.0 && d <= 15.0 + 1e-9);
    }

    #[test]
    fn test_room() {
        let map = Map::from_desc(&MapDesc::room(150.0, 200.0)).unwrap();
        assert_eq!(map.walls().len(), 4);
        assert_relative_eq!(map.diagonal(), 250.0);
    }
}

//! # Grid Index
//!
//! A uniform grid laid over the map bounds which buckets walls by the cells their bounding boxes
//! overlap. Rays walk the grid cell by cell (a DDA traversal, see Amanatides & Woo, "A Fast Voxel
//! Traversal Algorithm for Ray Tracing") so only walls near the ray are tested.

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use super::{hit_distance, Wall};
use crate::geom::{Point, Ray, Rect, EPSILON};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Upper limit on the number of cells along either axis.
const MAX_CELLS_PER_AXIS: usize = 256;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Walls bucketed into a uniform grid.
#[derive(Clone, Debug)]
pub struct GridIndex {
    /// Position of the lower left corner of cell (0, 0)
    origin: Point,

    /// Side length of each (square) cell
    cell_size: f64,

    /// Number of cells along the X axis
    num_cells_x: usize,

    /// Number of cells along the Y axis
    num_cells_y: usize,

    /// Indices into the wall list for each cell, row major with X varying fastest
    cells: Vec<Vec<usize>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GridIndex {
    /// Build the index for the given walls over the given bounds.
    ///
    /// The grid is sized to give roughly two cells per wall along each axis.
    pub fn build(walls: &[Wall], bounds: &Rect) -> Self {
        let cells_per_axis = (((walls.len() as f64).sqrt() * 2.0).ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS);
        let cell_size = bounds.width().max(bounds.height()) / cells_per_axis as f64;

        let num_cells_x = ((bounds.width() / cell_size).ceil() as usize).max(1);
        let num_cells_y = ((bounds.height() / cell_size).ceil() as usize).max(1);

        let mut index = Self {
            origin: bounds.min,
            cell_size,
            num_cells_x,
            num_cells_y,
            cells: vec![Vec::new(); num_cells_x * num_cells_y],
        };

        for (i, wall) in walls.iter().enumerate() {
            let b = wall.segment.bounds();
            let (x0, y0) = index.cell_of(&Point::new(b.min.x - EPSILON, b.min.y - EPSILON));
            let (x1, y1) = index.cell_of(&Point::new(b.max.x + EPSILON, b.max.y + EPSILON));

            for y in y0..=y1 {
                for x in x0..=x1 {
                    let c = index.flat(x, y);
                    index.cells[c].push(i);
                }
            }
        }

        index
    }

    pub fn num_cells_x(&self) -> usize {
        self.num_cells_x
    }

    pub fn num_cells_y(&self) -> usize {
        self.num_cells_y
    }

    /// Cast the ray through the grid, returning the distance to the nearest wall hit.
    ///
    /// The ray origin must lie within the bounds the index was built over.
    pub fn cast(&self, walls: &[Wall], ray: &Ray) -> Option<f64> {
        let origin = ray.origin();
        let dir = (ray.end() - origin) / ray.length();

        let (mut x, mut y) = self.cell_of(&origin);

        let step_x: isize = if dir.x > 0.0 { 1 } else { -1 };
        let step_y: isize = if dir.y > 0.0 { 1 } else { -1 };

        // Ray parameter (distance) at which the next cell boundary is crossed on each axis
        let mut t_max_x = self.first_crossing(origin.x, self.origin.x, x, dir.x);
        let mut t_max_y = self.first_crossing(origin.y, self.origin.y, y, dir.y);

        let t_delta_x = if dir.x.abs() > EPSILON { self.cell_size / dir.x.abs() } else { f64::INFINITY };
        let t_delta_y = if dir.y.abs() > EPSILON { self.cell_size / dir.y.abs() } else { f64::INFINITY };

        let mut best: Option<f64> = None;

        loop {
            for &i in self.cells[self.flat(x, y)].iter() {
                if let Some(d) = hit_distance(&walls[i], ray) {
                    best = Some(best.map_or(d, |b| b.min(d)));
                }
            }

            // A hit before the ray leaves this cell can't be beaten by walls in later cells
            let t_exit = t_max_x.min(t_max_y);
            if let Some(b) = best {
                if b <= t_exit + EPSILON {
                    return best;
                }
            }
            if t_exit > ray.length() {
                return best;
            }

            // Step into the next cell, stopping when leaving the grid
            if t_max_x < t_max_y {
                match self.step(x, step_x, self.num_cells_x) {
                    Some(nx) => x = nx,
                    None => return best,
                }
                t_max_x += t_delta_x;
            } else {
                match self.step(y, step_y, self.num_cells_y) {
                    Some(ny) => y = ny,
                    None => return best,
                }
                t_max_y += t_delta_y;
            }
        }
    }

    /// Cell containing the point, clamped onto the grid.
    fn cell_of(&self, point: &Point) -> (usize, usize) {
        let clamp = |v: f64, n: usize| -> usize {
            if v <= 0.0 {
                0
            } else {
                (v.floor() as usize).min(n - 1)
            }
        };

        (
            clamp((point.x - self.origin.x) / self.cell_size, self.num_cells_x),
            clamp((point.y - self.origin.y) / self.cell_size, self.num_cells_y),
        )
    }

    fn first_crossing(&self, pos: f64, grid_origin: f64, cell: usize, dir: f64) -> f64 {
        if dir.abs() <= EPSILON {
            return f64::INFINITY;
        }

        let boundary = if dir > 0.0 {
            grid_origin + (cell + 1) as f64 * self.cell_size
        } else {
            grid_origin + cell as f64 * self.cell_size
        };

        ((boundary - pos) / dir).max(0.0)
    }

    fn step(&self, cell: usize, step: isize, num_cells: usize) -> Option<usize> {
        let next = cell as isize + step;

        if next < 0 || next as usize >= num_cells {
            None
        } else {
            Some(next as usize)
        }
    }

    fn flat(&self, x: usize, y: usize) -> usize {
        y * self.num_cells_x + x
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::super::{Map, INDEX_MIN_WALLS};
    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    /// A room cluttered with a regular array of small boxes.
    fn cluttered_room() -> Map {
        let mut walls = Vec::new();
        let mut push = |x0: f64, y0: f64, x1: f64, y1: f64| {
            walls.push(Wall::new(Point::new(x0, y0), Point::new(x1, y1), None).unwrap());
        };

        push(0.0, 0.0, 300.0, 0.0);
        push(300.0, 0.0, 300.0, 200.0);
        push(300.0, 200.0, 0.0, 200.0);
        push(0.0, 200.0, 0.0, 0.0);

        for i in 0..6 {
            for j in 0..4 {
                let x = 20.0 + 45.0 * i as f64;
                let y = 20.0 + 45.0 * j as f64;
                push(x, y, x + 10.0, y);
                push(x + 10.0, y, x + 10.0, y + 10.0);
                push(x + 10.0, y + 10.0, x, y + 10.0);
                // Sloped side to exercise non axis aligned walls
                push(x, y + 10.0, x + 2.0, y);
            }
        }

        // Free standing wall clear of the boxes
        push(280.0, 50.0, 280.0, 150.0);

        Map::new(walls, Vec::new()).unwrap()
    }

    #[test]
    fn test_index_matches_brute_force() {
        let map = cluttered_room();
        assert!(map.walls().len() >= INDEX_MIN_WALLS);
        assert!(map.is_indexed());

        let mut rng = SmallRng::seed_from_u64(42);

        for _ in 0..2000 {
            let origin = Point::new(rng.gen_range(0.0..300.0), rng.gen_range(0.0..200.0));
            let heading: f64 = rng.gen_range(0.0..360.0);
            let ray = Ray::new(origin, heading, map.diagonal()).unwrap();

            let indexed = map.nearest_obstacle(&origin, heading).unwrap();
            let brute = map.cast_all(&ray);

            match (indexed, brute) {
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9, "{} != {} from {:?} at {}", a, b, origin, heading),
                (a, b) => assert_eq!(a, b, "from {:?} at {}", origin, heading),
            }
        }
    }

    #[test]
    fn test_axis_aligned_rays() {
        let map = cluttered_room();

        // Along a row of boxes, hits the first box's sloped left side at x = 21
        let d = map.nearest_obstacle(&Point::new(5.0, 25.0), 0.0).unwrap().unwrap();
        assert!((d - 16.0).abs() < 1e-9);

        // Between rows, straight to the far wall
        let d = map.nearest_obstacle(&Point::new(5.0, 40.0), 0.0).unwrap().unwrap();
        assert!((d - 295.0).abs() < 1e-9);

        // Downwards to the floor
        let d = map.nearest_obstacle(&Point::new(5.0, 40.0), 270.0).unwrap().unwrap();
        assert!((d - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_rays_along_walls() {
        let map = cluttered_room();
        assert!(map.is_indexed());

        // Along the bottom of the first row of boxes, meets the first box's corner
        let d = map.nearest_obstacle(&Point::new(5.0, 20.0), 0.0).unwrap().unwrap();
        assert!((d - 15.0).abs() < 1e-9, "{}", d);

        // Up and down the free standing wall from beyond its ends
        let d = map.nearest_obstacle(&Point::new(280.0, 10.0), 90.0).unwrap().unwrap();
        assert!((d - 40.0).abs() < 1e-9, "{}", d);
        let d = map.nearest_obstacle(&Point::new(280.0, 190.0), 270.0).unwrap().unwrap();
        assert!((d - 40.0).abs() < 1e-9, "{}", d);

        for (origin, heading) in [(Point::new(5.0, 20.0), 0.0), (Point::new(280.0, 10.0), 90.0)].iter() {
            let ray = Ray::new(*origin, *heading, map.diagonal()).unwrap();
            assert_eq!(map.nearest_obstacle(origin, *heading).unwrap(), map.cast_all(&ray));
        }
    }
}

//! # Closed regions
//!
//! Walls which join up end to end into closed loops enclose an area, either the floor the robot
//! drives on or a solid obstacle standing on it. Loose walls such as partitions which only touch
//! other walls part way along don't enclose anything and are left out.

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap};

use super::Wall;
use crate::geom::{Point, Rect, Segment};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Wall ends closer than this are the same vertex.
const VERTEX_QUANTUM: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The walls of one connected set of closed loops.
#[derive(Clone, Debug)]
pub struct Region {
    segments: Vec<Segment>,
    bounds: Rect,
}

type VertexKey = (i64, i64);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Region {
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Determine if the point is inside the region, using the even-odd rule.
    ///
    /// Points on the boundary may land on either side, use `on_boundary` to pick them out.
    pub fn encloses(&self, point: &Point) -> bool {
        if !self.bounds.contains(point) {
            return false;
        }

        // Count crossings of a ray running from the point towards +X
        let mut inside = false;
        for s in self.segments.iter() {
            let (a, b) = (s.start, s.end);

            if (a.y > point.y) != (b.y > point.y) {
                let x = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if point.x < x {
                    inside = !inside;
                }
            }
        }

        inside
    }

    /// Determine if the point lies on one of the region's walls.
    pub fn on_boundary(&self, point: &Point) -> bool {
        self.bounds.contains(point) && self.segments.iter().any(|s| s.contains_point(point))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find the closed regions formed by the walls.
///
/// Walls with an end no other wall shares are removed until none are left, what remains are
/// loops. Loops sharing a vertex belong to the same region. Regions are ordered by the first
/// surviving wall in each.
pub fn find_regions(walls: &[Wall]) -> Vec<Region> {
    let ends: Vec<(VertexKey, VertexKey)> = walls
        .iter()
        .map(|w| (vertex_key(&w.segment.start), vertex_key(&w.segment.end)))
        .collect();

    // Walls too short to have two distinct ends can't be part of a loop
    let mut alive: Vec<bool> = ends.iter().map(|(a, b)| a != b).collect();

    loop {
        let mut degree: HashMap<VertexKey, usize> = HashMap::new();
        for (_, (a, b)) in ends.iter().enumerate().filter(|(i, _)| alive[*i]) {
            *degree.entry(*a).or_default() += 1;
            *degree.entry(*b).or_default() += 1;
        }

        let mut pruned = false;
        for (i, (a, b)) in ends.iter().enumerate() {
            if alive[i] && (degree[a] < 2 || degree[b] < 2) {
                alive[i] = false;
                pruned = true;
            }
        }

        if !pruned {
            break;
        }
    }

    // Group the surviving walls by connected vertices
    let mut ids: HashMap<VertexKey, usize> = HashMap::new();
    let mut parent: Vec<usize> = Vec::new();
    let mut id_of = |k: VertexKey, parent: &mut Vec<usize>| -> usize {
        *ids.entry(k).or_insert_with(|| {
            parent.push(parent.len());
            parent.len() - 1
        })
    };

    let mut wall_vertex = vec![0; walls.len()];
    for (i, (a, b)) in ends.iter().enumerate().filter(|(i, _)| alive[*i]) {
        let ia = id_of(*a, &mut parent);
        let ib = id_of(*b, &mut parent);

        let (ra, rb) = (root(&mut parent, ia), root(&mut parent, ib));
        if ra != rb {
            parent[rb] = ra;
        }

        wall_vertex[i] = ia;
    }

    let mut groups: BTreeMap<usize, (usize, Vec<Segment>)> = BTreeMap::new();
    for (i, wall) in walls.iter().enumerate().filter(|(i, _)| alive[*i]) {
        let r = root(&mut parent, wall_vertex[i]);
        groups.entry(r).or_insert_with(|| (i, Vec::new())).1.push(wall.segment);
    }

    let mut regions: Vec<(usize, Region)> = groups
        .into_iter()
        .filter_map(|(_, (first, segments))| {
            let bounds = Rect::union_all(segments.iter().map(|s| s.bounds()))?;
            Some((first, Region { segments, bounds }))
        })
        .collect();
    regions.sort_by_key(|(first, _)| *first);

    regions.into_iter().map(|(_, r)| r).collect()
}

fn vertex_key(p: &Point) -> VertexKey {
    (
        (p.x / VERTEX_QUANTUM).round() as i64,
        (p.y / VERTEX_QUANTUM).round() as i64,
    )
}

fn root(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

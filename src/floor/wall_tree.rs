use geo::BoundingRect;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::WallSegment;
use crate::types::WorldPoint;

/// Wall with its spatial index envelope
#[derive(Clone, Debug)]
pub struct IndexedWall {
    pub wall: WallSegment,
    pub envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedWall {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedWall {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.wall.distance_sq_to(WorldPoint {
            x: point[0],
            y: point[1],
        })
    }
}

/// R-Tree over a floor's walls for nearest-wall queries.
///
/// Answers exactly what a linear scan over every wall would, in roughly
/// logarithmic time per query. The cost field issues one query per cell.
pub struct WallIndex {
    tree: RTree<IndexedWall>,
    wall_count: usize,
}

impl WallIndex {
    pub fn from_walls(walls: &[WallSegment]) -> Self {
        let indexed: Vec<IndexedWall> = walls
            .iter()
            .map(|wall| IndexedWall {
                wall: *wall,
                envelope: compute_envelope(wall),
            })
            .collect();

        let wall_count = indexed.len();

        WallIndex {
            tree: RTree::bulk_load(indexed),
            wall_count,
        }
    }

    /// Distance to the nearest wall, `None` when the floor has no walls.
    pub fn nearest_distance(&self, point: WorldPoint) -> Option<f64> {
        self.tree
            .nearest_neighbor(&[point.x, point.y])
            .map(|nearest| nearest.wall.distance_to(point))
    }

    pub fn len(&self) -> usize {
        self.wall_count
    }

    pub fn is_empty(&self) -> bool {
        self.wall_count == 0
    }
}

fn compute_envelope(wall: &WallSegment) -> AABB<[f64; 2]> {
    let rect = wall.line().bounding_rect();
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

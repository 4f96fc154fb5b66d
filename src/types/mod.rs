pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;

/// Point in floor-plan space (raw or rendered, depending on context).
///
/// x grows to the right, y grows downwards, matching the floor-plan assets.
pub type WorldPoint = geo::Coord<f64>;

/// Identifier of a single floor, e.g. `"B1-2"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorId(pub String);

impl FloorId {
    pub fn new(id: impl Into<String>) -> Self {
        FloorId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FloorId {
    fn from(value: String) -> Self {
        FloorId(value)
    }
}

impl From<&str> for FloorId {
    fn from(value: &str) -> Self {
        FloorId(value.to_string())
    }
}

/// Integer cell address on a cost grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub col: usize,
    pub row: usize,
}

impl GridCoordinate {
    pub fn new(col: usize, row: usize) -> Self {
        GridCoordinate { col, row }
    }

    /// True when `other` is one of the 8 neighbours of `self`.
    pub fn is_adjacent(&self, other: &GridCoordinate) -> bool {
        let dc = self.col.abs_diff(other.col);
        let dr = self.row.abs_diff(other.row);
        dc <= 1 && dr <= 1 && (dc + dr) > 0
    }

    pub fn manhattan(&self, other: &GridCoordinate) -> usize {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Wrap a compass heading into [0, 2π).
///
/// 0 = north, positive = clockwise.
pub fn normalize_heading(radians: f64) -> f64 {
    if !radians.is_finite() {
        return 0.0;
    }
    let wrapped = radians.rem_euclid(TAU);
    // rem_euclid can return TAU itself for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Ordered world-space waypoints of one route. Empty when routing failed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    pub waypoints: Vec<WorldPoint>,
}

impl RoutePath {
    pub fn new(waypoints: Vec<WorldPoint>) -> Self {
        RoutePath { waypoints }
    }

    pub fn empty() -> Self {
        RoutePath::default()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Polyline length in world units.
    pub fn length(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| distance(pair[0], pair[1]))
            .sum()
    }

    pub fn start(&self) -> Option<WorldPoint> {
        self.waypoints.first().copied()
    }

    pub fn end(&self) -> Option<WorldPoint> {
        self.waypoints.last().copied()
    }
}

#[inline]
pub fn distance(a: WorldPoint, b: WorldPoint) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

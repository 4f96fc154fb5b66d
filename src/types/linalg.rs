//! Linear algebra aliases for the coordinate bridge.
//!
//! Keeps nalgebra types out of the public geometry API, which speaks
//! `WorldPoint` everywhere else.

use nalgebra::{Rotation2, Vector2};

use super::WorldPoint;

pub type PlaneVec = Vector2<f64>;
pub type PlaneRotation = Rotation2<f64>;

#[inline]
pub fn to_plane(point: WorldPoint) -> PlaneVec {
    PlaneVec::new(point.x, point.y)
}

#[inline]
pub fn from_plane(v: PlaneVec) -> WorldPoint {
    WorldPoint { x: v.x, y: v.y }
}

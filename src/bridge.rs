//! Raw ↔ rendered coordinate bridge.
//!
//! Raw space is the floor plan's authored coordinates (walls, entrances,
//! path search). Rendered space is the scaled and rotated frame the floor is
//! displayed in, which is also where the tracker's origin is placed.
//!
//! ```text
//! forward(raw)       = R(θ) · (raw · scale)
//! inverse(rendered)  = R(−θ) · rendered / scale
//! ```

use crate::error::{NavError, NavResult};
use crate::floor::FloorMetadata;
use crate::types::{from_plane, to_plane, PlaneRotation, RoutePath, WorldPoint};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateBridge {
    scale: f64,
    rotation_degrees: f64,
    rotation: PlaneRotation,
}

impl CoordinateBridge {
    /// Bridge for the given scale (> 0) and rotation in degrees.
    pub fn new(scale: f64, rotation_degrees: f64) -> NavResult<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "floor scale must be positive and finite, got {}",
                scale
            )));
        }
        if !rotation_degrees.is_finite() {
            return Err(NavError::InvalidConfig(format!(
                "floor rotation must be finite, got {}",
                rotation_degrees
            )));
        }

        Ok(CoordinateBridge {
            scale,
            rotation_degrees,
            rotation: PlaneRotation::new(rotation_degrees.to_radians()),
        })
    }

    pub fn for_floor(metadata: &FloorMetadata) -> NavResult<Self> {
        Self::new(metadata.scale, metadata.rotation_degrees)
    }

    /// No scaling, no rotation.
    pub fn identity() -> Self {
        CoordinateBridge {
            scale: 1.0,
            rotation_degrees: 0.0,
            rotation: PlaneRotation::identity(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    /// Raw floor-plan coordinates → rendered coordinates.
    pub fn forward(&self, raw: WorldPoint) -> WorldPoint {
        from_plane(self.rotation * (to_plane(raw) * self.scale))
    }

    /// Rendered coordinates → raw floor-plan coordinates.
    pub fn inverse(&self, rendered: WorldPoint) -> WorldPoint {
        from_plane(self.rotation.inverse() * to_plane(rendered) / self.scale)
    }

    pub fn forward_route(&self, route: &RoutePath) -> RoutePath {
        RoutePath::new(route.waypoints.iter().map(|&p| self.forward(p)).collect())
    }

    pub fn inverse_route(&self, route: &RoutePath) -> RoutePath {
        RoutePath::new(route.waypoints.iter().map(|&p| self.inverse(p)).collect())
    }
}

impl Default for CoordinateBridge {
    fn default() -> Self {
        Self::identity()
    }
}

use crate::config::DEFAULT_SMOOTHING_THRESHOLD;
use crate::types::WorldPoint;

/// Single-pass staircase removal for grid routes
///
/// Each interior point is judged against the chord between its neighbours in
/// the *original* sequence, so a dropped point never changes the verdict on
/// the next one. Endpoints are always kept. This only removes local
/// zig-zags; it is not a global simplification.
pub struct PathSmoother {
    threshold: f64,
}

impl PathSmoother {
    /// Create a smoother dropping points closer than `threshold` world units
    /// to their neighbours' chord
    pub fn new(threshold: f64) -> Self {
        PathSmoother { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn smooth(&self, points: &[WorldPoint]) -> Vec<WorldPoint> {
        if points.len() < 3 {
            return points.to_vec();
        }

        let mut kept = Vec::with_capacity(points.len());
        kept.push(points[0]);

        for window in points.windows(3) {
            let (prev, point, next) = (window[0], window[1], window[2]);
            if perpendicular_distance(point, prev, next) >= self.threshold {
                kept.push(point);
            }
        }

        kept.push(points[points.len() - 1]);
        kept
    }
}

impl Default for PathSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_THRESHOLD)
    }
}

/// Distance from `point` to the infinite line through `a` and `b`.
///
/// Falls back to point-to-point distance when `a == b`.
fn perpendicular_distance(point: WorldPoint, a: WorldPoint, b: WorldPoint) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length = dx.hypot(dy);

    if length < 1e-12 {
        return (point.x - a.x).hypot(point.y - a.y);
    }

    ((point.x - a.x) * dy - (point.y - a.y) * dx).abs() / length
}

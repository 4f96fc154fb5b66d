use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::stride::{CadenceState, StrideEstimator};
use crate::config::{StrideConfig, TrackerConfig};
use crate::error::NavResult;
use crate::types::{normalize_heading, WorldPoint};

/// Tracker state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    /// No origin set, steps are ignored
    Idle,
    /// Origin set, accumulating steps
    Tracking,
}

/// One point of the tracked trajectory
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedPoint {
    pub position: WorldPoint,
    /// Heading at this step, radians, 0 = north, clockwise
    pub heading: f64,
}

/// Trajectory since the current origin
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedPath {
    pub points: Vec<TrackedPoint>,
    /// Distance travelled, world units
    pub distance: f64,
}

impl TrackedPath {
    pub fn current(&self) -> Option<&TrackedPoint> {
        self.points.last()
    }

    pub fn position(&self) -> Option<WorldPoint> {
        self.points.last().map(|p| p.position)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn clear(&mut self) {
        self.points.clear();
        self.distance = 0.0;
    }
}

/// Emitted for every step processed while tracking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based index since the origin was set
    pub step: u64,
    pub timestamp: DateTime<Utc>,
    pub interval_ms: i64,
    pub cadence: f64,
    pub smoothed_cadence: f64,
    pub stride_cm: f64,
    pub heading: f64,
    pub position: WorldPoint,
    /// False for the anchoring first step
    pub moved: bool,
}

/// Read side of a tracker
///
/// Heading and path are two separate watch cells. Compass samples arrive far
/// more often than steps and must not wake path observers or copy the path;
/// keep them separate.
#[derive(Clone, Debug)]
pub struct TrackerObserver {
    pub heading: watch::Receiver<f64>,
    pub path: watch::Receiver<TrackedPath>,
}

impl TrackerObserver {
    pub fn heading(&self) -> f64 {
        *self.heading.borrow()
    }

    /// Latest tracked position, `None` while idle.
    pub fn position(&self) -> Option<WorldPoint> {
        self.path.borrow().position()
    }

    pub fn path_snapshot(&self) -> TrackedPath {
        self.path.borrow().clone()
    }
}

/// Pedestrian dead-reckoning tracker
///
/// # States
/// - `Idle` → `Tracking` on [`set_origin`](Self::set_origin)
/// - `Tracking` → `Idle` on [`stop`](Self::stop), discarding the path
///
/// Each step estimates a stride from cadence and advances the position along
/// the step's heading. The first step after an origin only anchors the
/// orientation and does not move.
///
/// # Usage
/// ```no_run
/// use indoor_nav_rs::pdr::DeadReckoningTracker;
/// use indoor_nav_rs::config::{StrideConfig, TrackerConfig};
/// use indoor_nav_rs::types::WorldPoint;
///
/// let mut tracker = DeadReckoningTracker::new(StrideConfig::default(), TrackerConfig::default());
/// let observer = tracker.observer();
///
/// tracker.set_origin(WorldPoint { x: 120.0, y: 340.0 });
/// tracker.update_heading(0.3);
/// tracker.process_step(520, 0.3);
///
/// println!("at {:?}", observer.position());
/// ```
pub struct DeadReckoningTracker {
    config: TrackerConfig,
    stride: StrideEstimator,
    state: TrackerState,
    cadence: CadenceState,
    heading_tx: watch::Sender<f64>,
    path_tx: watch::Sender<TrackedPath>,
}

impl DeadReckoningTracker {
    pub fn new(stride: StrideConfig, config: TrackerConfig) -> Self {
        let (heading_tx, _) = watch::channel(0.0);
        let (path_tx, _) = watch::channel(TrackedPath::default());

        DeadReckoningTracker {
            stride: StrideEstimator::new(stride, &config),
            config,
            state: TrackerState::Idle,
            cadence: CadenceState::default(),
            heading_tx,
            path_tx,
        }
    }

    pub fn observer(&self) -> TrackerObserver {
        TrackerObserver {
            heading: self.heading_tx.subscribe(),
            path: self.path_tx.subscribe(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackerState::Tracking
    }

    pub fn heading(&self) -> f64 {
        *self.heading_tx.borrow()
    }

    pub fn position(&self) -> Option<WorldPoint> {
        self.path_tx.borrow().position()
    }

    pub fn cadence(&self) -> &CadenceState {
        &self.cadence
    }

    pub fn stride_config(&self) -> &StrideConfig {
        self.stride.config()
    }

    /// Replace walker parameters; applies from the next step.
    pub fn reconfigure(&mut self, stride: StrideConfig) -> NavResult<()> {
        stride.validate()?;
        log::info!(
            "Stride reconfigured: height {} cm, k {}, c {}, window {}",
            stride.height_cm,
            stride.k,
            stride.c,
            stride.window
        );
        self.stride.reconfigure(stride);
        Ok(())
    }

    /// Start (or restart) tracking from `origin`.
    pub fn set_origin(&mut self, origin: WorldPoint) {
        let heading = self.heading();

        self.stride.reset();
        self.cadence = CadenceState::default();

        self.path_tx.send_modify(|path| {
            path.clear();
            path.points.push(TrackedPoint {
                position: origin,
                heading,
            });
        });

        if self.state == TrackerState::Tracking {
            log::debug!("Origin re-anchored at ({:.1}, {:.1})", origin.x, origin.y);
        } else {
            log::info!("Tracking started at ({:.1}, {:.1})", origin.x, origin.y);
        }
        self.state = TrackerState::Tracking;
    }

    /// Stop tracking and discard the path.
    pub fn stop(&mut self) {
        if self.state == TrackerState::Idle {
            return;
        }

        let steps = self.cadence.step_count;
        self.stride.reset();
        self.cadence = CadenceState::default();
        self.path_tx.send_modify(TrackedPath::clear);
        self.state = TrackerState::Idle;

        log::info!("Tracking stopped after {} steps", steps);
    }

    /// Compass sample. Touches only the heading cell.
    pub fn update_heading(&mut self, heading: f64) {
        let heading = normalize_heading(heading);
        self.heading_tx.send_if_modified(|current| {
            if *current == heading {
                return false;
            }
            *current = heading;
            true
        });
    }

    /// Integrate one detected step. `None` while idle.
    pub fn process_step(&mut self, interval_ms: i64, heading: f64) -> Option<StepRecord> {
        let heading = normalize_heading(heading);
        self.update_heading(heading);

        if self.state == TrackerState::Idle {
            return None;
        }

        let estimate = self.stride.estimate(interval_ms);
        let moved = self.cadence.step_count > 0;

        self.cadence.step_count += 1;
        self.cadence.average_cadence = estimate.average_cadence;
        self.cadence.last_stride_cm = estimate.stride_cm;

        let step_length = if moved {
            estimate.stride_cm * self.config.units_per_cm
        } else {
            0.0
        };

        let mut position = WorldPoint { x: 0.0, y: 0.0 };
        self.path_tx.send_modify(|path| {
            let last = path.position().unwrap_or(position);
            position = if moved {
                WorldPoint {
                    x: last.x + step_length * heading.sin(),
                    y: last.y - step_length * heading.cos(),
                }
            } else {
                last
            };
            path.distance += step_length;
            path.points.push(TrackedPoint { position, heading });
        });

        log::debug!(
            "Step {}: interval {} ms, cadence {:.2}, stride {:.1} cm, heading {:.2}",
            self.cadence.step_count,
            interval_ms,
            estimate.smoothed_cadence,
            estimate.stride_cm,
            heading
        );

        Some(StepRecord {
            step: self.cadence.step_count,
            timestamp: Utc::now(),
            interval_ms,
            cadence: estimate.instant_cadence,
            smoothed_cadence: estimate.smoothed_cadence,
            stride_cm: estimate.stride_cm,
            heading,
            position,
            moved,
        })
    }
}

impl Default for DeadReckoningTracker {
    fn default() -> Self {
        Self::new(StrideConfig::default(), TrackerConfig::default())
    }
}

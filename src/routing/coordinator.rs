use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::astar::PathSearch;
use super::cache::CostFieldCache;
use super::smoothing::PathSmoother;
use crate::bridge::CoordinateBridge;
use crate::config::NavConfig;
use crate::error::{NavError, NavResult};
use crate::floor::{Destination, FloorCatalog};
use crate::pdr::TrackerObserver;
use crate::types::{RoutePath, WorldPoint};

/// Published outcome of one route request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteUpdate {
    pub request_id: u64,
    pub destination: Destination,
    /// Waypoints in rendered space, or why there are none
    #[serde(with = "route_result")]
    pub result: NavResult<RoutePath>,
}

impl RouteUpdate {
    /// Waypoints to draw; empty on failure.
    pub fn waypoints(&self) -> &[WorldPoint] {
        match &self.result {
            Ok(route) => &route.waypoints,
            Err(_) => &[],
        }
    }
}

mod route_result {
    use serde::ser::SerializeMap;
    use serde::Serializer;

    use crate::error::NavResult;
    use crate::types::RoutePath;

    pub fn serialize<S: Serializer>(
        result: &NavResult<RoutePath>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match result {
            Ok(route) => {
                map.serialize_entry("status", "ok")?;
                map.serialize_entry("waypoints", &route.waypoints)?;
            }
            Err(err) => {
                map.serialize_entry("status", err.kind())?;
                map.serialize_entry("message", &err.to_string())?;
            }
        }
        map.end()
    }
}

/// Handle to an in-flight request
pub struct RouteTicket {
    pub id: u64,
    handle: JoinHandle<NavResult<RoutePath>>,
}

impl RouteTicket {
    /// Wait for the request's own result, published or not.
    pub async fn wait(self) -> NavResult<RoutePath> {
        self.handle
            .await
            .map_err(|e| NavError::Internal(format!("Route task failed: {}", e)))?
    }
}

struct ActiveRequest {
    id: u64,
    cancel: Arc<AtomicBool>,
}

struct Shared {
    floors: Arc<FloorCatalog>,
    cache: Arc<CostFieldCache>,
    config: NavConfig,
    active: Mutex<Option<ActiveRequest>>,
    updates: watch::Sender<Option<RouteUpdate>>,
}

/// Route request lifecycle for one tracker/session
///
/// # Flow
/// 1. Floor lookup (`MissingFloorData`)
/// 2. Entrance match by room number, then name (`NoEntranceMatched`)
/// 3. Tracker position rendered → raw through the floor's bridge
/// 4. Cached cost grid, A*, smoothing
/// 5. Waypoints raw → rendered, published on the update channel
///
/// # Superseding
/// At most one request is active. A new request flags the previous one as
/// cancelled; its search stops at the next expansion and its result is
/// never published. Publication happens under the same lock that
/// registers requests, so a stale task cannot overwrite a newer one.
///
/// Requests run on tokio's blocking pool and must be issued from within a
/// tokio runtime.
#[derive(Clone)]
pub struct RouteCoordinator {
    shared: Arc<Shared>,
    next_id: Arc<AtomicU64>,
}

impl RouteCoordinator {
    /// Coordinator with its own cost grid cache. Rejects invalid config.
    pub fn new(floors: Arc<FloorCatalog>, config: NavConfig) -> NavResult<Self> {
        config.validate()?;
        let cache = Arc::new(CostFieldCache::new(config.grid.cell_size)?);
        Self::with_cache(floors, cache, config)
    }

    /// Share a cost grid cache between coordinators (one per session).
    ///
    /// Grids are built at the cache's cell size; a different
    /// `config.grid.cell_size` is ignored with a warning.
    pub fn with_cache(
        floors: Arc<FloorCatalog>,
        cache: Arc<CostFieldCache>,
        config: NavConfig,
    ) -> NavResult<Self> {
        config.validate()?;
        if cache.cell_size() != config.grid.cell_size {
            log::warn!(
                "Configured cell size {} ignored; shared cache builds at {}",
                config.grid.cell_size,
                cache.cell_size()
            );
        }

        let (updates, _) = watch::channel(None);
        Ok(RouteCoordinator {
            shared: Arc::new(Shared {
                floors,
                cache,
                config,
                active: Mutex::new(None),
                updates,
            }),
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn cache(&self) -> &Arc<CostFieldCache> {
        &self.shared.cache
    }

    /// Latest published update.
    pub fn subscribe(&self) -> watch::Receiver<Option<RouteUpdate>> {
        self.shared.updates.subscribe()
    }

    pub fn latest(&self) -> Option<RouteUpdate> {
        self.shared.updates.borrow().clone()
    }

    /// Start routing from `position` (rendered space) to `destination`,
    /// cancelling any request still in flight.
    pub fn request_route(&self, destination: Destination, position: WorldPoint) -> RouteTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = Arc::new(AtomicBool::new(false));

        match self.shared.lock_active() {
            Ok(mut active) => {
                if let Some(previous) = active.replace(ActiveRequest {
                    id,
                    cancel: Arc::clone(&cancel),
                }) {
                    previous.cancel.store(true, Ordering::Relaxed);
                    log::warn!("Route request {} superseded by {}", previous.id, id);
                }
            }
            Err(e) => {
                let handle = tokio::spawn(async move { Err(e) });
                return RouteTicket { id, handle };
            }
        }

        log::info!(
            "Route request {}: to {} on floor {}",
            id,
            destination.label(),
            destination.floor
        );

        let shared = Arc::clone(&self.shared);
        let handle = tokio::task::spawn_blocking(move || {
            let result = shared.compute(&destination, position, &cancel);
            shared.publish(id, destination, result.clone());
            result
        });

        RouteTicket { id, handle }
    }

    /// Route from the tracker's latest position.
    pub fn request_route_from_tracker(
        &self,
        destination: Destination,
        tracker: &TrackerObserver,
    ) -> NavResult<RouteTicket> {
        let position = tracker.position().ok_or_else(|| {
            NavError::InvalidEndpoint("tracker has no position; set an origin first".to_string())
        })?;
        Ok(self.request_route(destination, position))
    }

    /// Request and wait for the result.
    pub async fn route(
        &self,
        destination: Destination,
        position: WorldPoint,
    ) -> NavResult<RoutePath> {
        self.request_route(destination, position).wait().await
    }

    /// Cancel the in-flight request, if any. Its result is not published.
    pub fn cancel(&self) -> NavResult<bool> {
        let mut active = self.shared.lock_active()?;
        match active.take() {
            Some(request) => {
                request.cancel.store(true, Ordering::Relaxed);
                log::debug!("Route request {} cancelled", request.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Shared {
    fn lock_active(&self) -> NavResult<MutexGuard<'_, Option<ActiveRequest>>> {
        self.active
            .lock()
            .map_err(|_| NavError::Internal("Failed to acquire route request lock".to_string()))
    }

    fn compute(
        &self,
        destination: &Destination,
        position: WorldPoint,
        cancel: &AtomicBool,
    ) -> NavResult<RoutePath> {
        let floor = self.floors.get(&destination.floor)?;
        let entrance = floor.find_entrance(destination)?;
        let bridge = CoordinateBridge::for_floor(&floor.metadata)?;

        let start = bridge.inverse(position);
        let goal = entrance.position;

        if cancel.load(Ordering::Relaxed) {
            return Err(NavError::Cancelled);
        }

        let grid = self.cache.get_or_build(&floor)?;
        let grid_path = PathSearch::new(&grid, self.config.search.clone())
            .find_path_cancellable(start, goal, cancel)?;

        let smoother = PathSmoother::new(self.config.smoothing.threshold);
        let raw = RoutePath::new(smoother.smooth(&grid_path.waypoints(&grid)));

        log::debug!(
            "Route to {}: {} grid cells smoothed to {} waypoints, {:.1} units",
            entrance.room_number,
            grid_path.cells.len(),
            raw.len(),
            raw.length()
        );

        Ok(bridge.forward_route(&raw))
    }

    fn publish(&self, id: u64, destination: Destination, result: NavResult<RoutePath>) {
        let mut active = match self.lock_active() {
            Ok(active) => active,
            Err(e) => {
                log::warn!("Dropping route result {}: {}", id, e);
                return;
            }
        };

        let is_current = matches!(active.as_ref(), Some(request) if request.id == id);
        if !is_current {
            log::debug!("Route request {} finished after being superseded", id);
            return;
        }
        *active = None;

        match &result {
            Ok(route) => log::info!("Route {} ready: {} waypoints", id, route.len()),
            Err(e) => log::info!("Route {} failed: {}", id, e),
        }

        self.updates.send_replace(Some(RouteUpdate {
            request_id: id,
            destination,
            result,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floor::{Entrance, FloorMetadata, FloorPlan, WallSegment};
    use crate::pdr::DeadReckoningTracker;
    use crate::types::FloorId;
    use approx::assert_abs_diff_eq;

    /// 400 x 200 floor split by a wall at x = 200 with a doorway at the bottom.
    fn office_floor(id: &str, scale: f64, rotation_degrees: f64) -> FloorPlan {
        FloorPlan {
            metadata: FloorMetadata {
                id: FloorId::new(id),
                scale,
                rotation_degrees,
                width: 400.0,
                height: 200.0,
            },
            walls: vec![
                WallSegment::new((0.0, 0.0), (400.0, 0.0)),
                WallSegment::new((0.0, 200.0), (400.0, 200.0)),
                WallSegment::new((0.0, 0.0), (0.0, 200.0)),
                WallSegment::new((400.0, 0.0), (400.0, 200.0)),
                WallSegment::new((205.0, 0.0), (205.0, 130.0)),
            ],
            entrances: vec![
                Entrance {
                    room_number: "104".to_string(),
                    name: "Meeting Room".to_string(),
                    position: WorldPoint { x: 345.0, y: 55.0 },
                },
                Entrance {
                    room_number: "105".to_string(),
                    name: "Kitchen".to_string(),
                    position: WorldPoint { x: 85.0, y: 155.0 },
                },
            ],
        }
    }

    fn coordinator(floors: Vec<FloorPlan>) -> RouteCoordinator {
        RouteCoordinator::new(
            Arc::new(FloorCatalog::from_floors(floors)),
            NavConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_route_published() {
        let coordinator = coordinator(vec![office_floor("L1", 1.0, 0.0)]);
        let updates = coordinator.subscribe();

        let start = WorldPoint { x: 55.0, y: 55.0 };
        let destination = Destination::new("L1", Some("104"), "Meeting Room");
        let ticket = coordinator.request_route(destination, start);
        let id = ticket.id;
        let route = ticket.wait().await.unwrap();

        assert!(route.len() >= 2);
        // Cell centres of the start and entrance cells
        assert_eq!(route.start(), Some(WorldPoint { x: 55.0, y: 55.0 }));
        assert_eq!(route.end(), Some(WorldPoint { x: 345.0, y: 55.0 }));
        // The underlying search detours through the doorway below the divider
        let grid = coordinator
            .cache()
            .get(&FloorId::new("L1"))
            .unwrap()
            .unwrap();
        let cells = PathSearch::new(&grid, crate::config::SearchConfig::default())
            .find_path(start, WorldPoint { x: 345.0, y: 55.0 })
            .unwrap();
        assert!(cells.cells.iter().any(|c| c.row >= 13));

        let update = updates.borrow().clone().unwrap();
        assert_eq!(update.request_id, id);
        assert_eq!(update.waypoints(), route.waypoints.as_slice());
    }

    #[tokio::test]
    async fn test_scaled_rotated_floor() {
        let coordinator = coordinator(vec![office_floor("L2", 2.0, 30.0)]);
        let bridge = CoordinateBridge::new(2.0, 30.0).unwrap();

        let raw_start = WorldPoint { x: 85.0, y: 45.0 };
        let rendered_start = bridge.forward(raw_start);

        let route = coordinator
            .route(Destination::new("L2", None, "kitchen"), rendered_start)
            .await
            .unwrap();

        let first = bridge.inverse(route.start().unwrap());
        let last = bridge.inverse(route.end().unwrap());
        assert_abs_diff_eq!(first.x, 85.0, epsilon = 1e-6);
        assert_abs_diff_eq!(first.y, 45.0, epsilon = 1e-6);
        assert_abs_diff_eq!(last.x, 85.0, epsilon = 1e-6);
        assert_abs_diff_eq!(last.y, 155.0, epsilon = 1e-6);
    }

    #[tokio::test]
    async fn test_missing_floor_and_entrance() {
        let coordinator = coordinator(vec![office_floor("L1", 1.0, 0.0)]);
        let start = WorldPoint { x: 55.0, y: 55.0 };

        let missing = coordinator
            .route(Destination::new("L7", Some("104"), "Meeting Room"), start)
            .await;
        assert!(matches!(missing, Err(NavError::MissingFloorData { .. })));

        let no_room = coordinator
            .route(Destination::new("L1", Some("999"), "Server Room"), start)
            .await;
        assert!(matches!(no_room, Err(NavError::NoEntranceMatched { .. })));

        // Failures are published too, with no waypoints
        let update = coordinator.latest().unwrap();
        assert!(update.waypoints().is_empty());
        assert!(matches!(update.result, Err(NavError::NoEntranceMatched { .. })));
        // Neither failure reached the cost grid
        assert_eq!(coordinator.cache().build_count(), 0);
    }

    #[tokio::test]
    async fn test_start_outside_floor() {
        let coordinator = coordinator(vec![office_floor("L1", 1.0, 0.0)]);
        let result = coordinator
            .route(
                Destination::new("L1", Some("104"), "Meeting Room"),
                WorldPoint { x: -50.0, y: 10.0 },
            )
            .await;
        assert!(matches!(result, Err(NavError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_newer_request_wins() {
        let coordinator = coordinator(vec![office_floor("L1", 1.0, 0.0)]);
        let start = WorldPoint { x: 55.0, y: 55.0 };

        let first = coordinator.request_route(Destination::new("L1", Some("104"), ""), start);
        let second = coordinator.request_route(Destination::new("L1", Some("105"), ""), start);
        let second_id = second.id;

        let first_result = first.wait().await;
        let second_result = second.wait().await;

        assert!(matches!(first_result, Ok(_) | Err(NavError::Cancelled)));
        assert!(second_result.is_ok());

        let update = coordinator.latest().unwrap();
        assert_eq!(update.request_id, second_id);
        assert_eq!(update.destination.room_number.as_deref(), Some("105"));
    }

    #[tokio::test]
    async fn test_cancel_suppresses_publication() {
        // Large enough that building the grid dwarfs thread start-up
        let mut floor = office_floor("BIG", 1.0, 0.0);
        floor.metadata.width = 4000.0;
        floor.metadata.height = 4000.0;
        let coordinator = RouteCoordinator::new(
            Arc::new(FloorCatalog::from_floors(vec![floor])),
            NavConfig {
                grid: crate::config::GridConfig { cell_size: 2.0 },
                ..NavConfig::default()
            },
        )
        .unwrap();

        let ticket = coordinator.request_route(
            Destination::new("BIG", Some("104"), ""),
            WorldPoint { x: 55.0, y: 55.0 },
        );
        assert!(coordinator.cancel().unwrap());
        assert!(!coordinator.cancel().unwrap());

        assert_eq!(ticket.wait().await, Err(NavError::Cancelled));
        assert!(coordinator.latest().is_none());
    }

    #[tokio::test]
    async fn test_route_from_tracker() {
        let coordinator = coordinator(vec![office_floor("L1", 1.0, 0.0)]);
        let mut tracker = DeadReckoningTracker::default();
        let observer = tracker.observer();
        let destination = Destination::new("L1", Some("105"), "Kitchen");

        // Idle tracker has nowhere to start from
        assert!(matches!(
            coordinator.request_route_from_tracker(destination.clone(), &observer),
            Err(NavError::InvalidEndpoint(_))
        ));

        tracker.set_origin(WorldPoint { x: 300.0, y: 40.0 });
        tracker.process_step(500, std::f64::consts::PI);
        tracker.process_step(500, std::f64::consts::PI);

        let ticket = coordinator
            .request_route_from_tracker(destination, &observer)
            .unwrap();
        let route = ticket.wait().await.unwrap();
        assert_eq!(route.end(), Some(WorldPoint { x: 85.0, y: 155.0 }));
        assert_eq!(coordinator.cache().build_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_grid_config_rejected() {
        let floors = Arc::new(FloorCatalog::from_floors(vec![office_floor("L1", 1.0, 0.0)]));
        for cell_size in [0.0, -10.0, f64::NAN] {
            let config = NavConfig {
                grid: crate::config::GridConfig { cell_size },
                ..NavConfig::default()
            };
            assert!(matches!(
                RouteCoordinator::new(Arc::clone(&floors), config),
                Err(NavError::InvalidConfig(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_oversized_floor_fails_cleanly() {
        let mut floor = office_floor("VAST", 1.0, 0.0);
        floor.metadata.width = 1.0e12;
        floor.metadata.height = 1.0e12;
        let coordinator = coordinator(vec![floor]);

        let result = coordinator
            .route(
                Destination::new("VAST", Some("104"), ""),
                WorldPoint { x: 55.0, y: 55.0 },
            )
            .await;
        assert!(matches!(result, Err(NavError::InvalidConfig(_))));
        assert_eq!(coordinator.cache().build_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_cache_cell_size_wins() {
        let floors = Arc::new(FloorCatalog::from_floors(vec![office_floor("L1", 1.0, 0.0)]));
        let cache = Arc::new(CostFieldCache::new(20.0).unwrap());
        let coordinator =
            RouteCoordinator::with_cache(floors, Arc::clone(&cache), NavConfig::default())
                .unwrap();

        coordinator
            .route(
                Destination::new("L1", Some("105"), ""),
                WorldPoint { x: 50.0, y: 50.0 },
            )
            .await
            .unwrap();

        let grid = cache.get(&FloorId::new("L1")).unwrap().unwrap();
        assert_eq!(grid.cell_size(), 20.0);
        assert_eq!(grid.cols(), 20);
        assert_eq!(grid.rows(), 10);
    }
}

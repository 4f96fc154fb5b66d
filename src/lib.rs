//! Indoor positioning and routing engine.
//!
//! Builds a wall-distance cost grid per floor, plans smoothed routes across
//! it with A*, and tracks a walker by pedestrian dead reckoning. Route
//! requests are coordinated so only the newest one per session publishes.

pub mod bridge;
pub mod config;
pub mod error;
pub mod floor;
pub mod pdr;
pub mod routing;
pub mod types;

pub use bridge::CoordinateBridge;
pub use config::NavConfig;
pub use error::{NavError, NavResult};
pub use floor::{Destination, FloorCatalog, FloorPlan};
pub use pdr::{DeadReckoningTracker, TrackerObserver};
pub use routing::{
    CostFieldCache, CostGrid, PathSearch, PathSmoother, RouteCoordinator, RouteUpdate,
};
pub use types::{FloorId, GridCoordinate, RoutePath, WorldPoint};

pub mod astar;
pub mod cache;
pub mod coordinator;
pub mod cost_field;
pub mod smoothing;

pub use astar::{GridPath, PathSearch};
pub use cache::CostFieldCache;
pub use coordinator::{RouteCoordinator, RouteTicket, RouteUpdate};
pub use cost_field::{distance_to_cost, CostGrid, BLOCKED};
pub use smoothing::PathSmoother;

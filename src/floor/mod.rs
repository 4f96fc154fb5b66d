pub mod plan;
pub mod wall_tree;

pub use plan::{Destination, Entrance, FloorCatalog, FloorMetadata, FloorPlan, WallSegment};
pub use wall_tree::{IndexedWall, WallIndex};

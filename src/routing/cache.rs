use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use super::cost_field::CostGrid;
use crate::error::{NavError, NavResult};
use crate::floor::FloorPlan;
use crate::types::FloorId;

type GridSlot = Arc<OnceLock<Arc<CostGrid>>>;

/// Per-floor cache of cost grids
///
/// # Architecture
/// - One slot per floor, created under a short-lived map lock
/// - The grid itself is built outside the map lock via `OnceLock`, so two
///   callers racing on the same floor build it once and floors never block
///   each other
/// - Grids are immutable once built and handed out as `Arc`
///
/// Walls do not change during a session, so entries never expire. Use
/// [`CostFieldCache::invalidate`] if a floor's walls are reloaded.
pub struct CostFieldCache {
    cell_size: f64,
    slots: Mutex<HashMap<FloorId, GridSlot>>,
    builds: AtomicUsize,
}

impl CostFieldCache {
    /// Cache building grids with `cell_size` raw units per cell.
    pub fn new(cell_size: f64) -> NavResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "cell size must be positive and finite, got {}",
                cell_size
            )));
        }
        Ok(CostFieldCache {
            cell_size,
            slots: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cached grid for `floor`, building it on first access.
    pub fn get_or_build(&self, floor: &FloorPlan) -> NavResult<Arc<CostGrid>> {
        let (cols, rows) = CostGrid::floor_extent(floor, self.cell_size)?;
        let slot = self.slot(floor.id())?;

        let grid = slot.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::Relaxed);
            log::info!(
                "Building cost grid for floor {} ({} walls, cell size {})",
                floor.id(),
                floor.walls.len(),
                self.cell_size
            );
            Arc::new(CostGrid::assemble(&floor.walls, self.cell_size, cols, rows))
        });

        Ok(Arc::clone(grid))
    }

    /// Grid for `floor` if it was already built.
    pub fn get(&self, floor: &FloorId) -> NavResult<Option<Arc<CostGrid>>> {
        let slots = self.lock_slots()?;
        Ok(slots.get(floor).and_then(|slot| slot.get().cloned()))
    }

    /// Drop the cached grid for `floor`; the next access rebuilds it.
    pub fn invalidate(&self, floor: &FloorId) -> NavResult<bool> {
        let mut slots = self.lock_slots()?;
        Ok(slots.remove(floor).is_some())
    }

    /// Number of grids built since creation.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    fn slot(&self, floor: &FloorId) -> NavResult<GridSlot> {
        let mut slots = self.lock_slots()?;
        Ok(Arc::clone(slots.entry(floor.clone()).or_default()))
    }

    fn lock_slots(&self) -> NavResult<std::sync::MutexGuard<'_, HashMap<FloorId, GridSlot>>> {
        self.slots
            .lock()
            .map_err(|_| NavError::Internal("Failed to acquire cost grid cache lock".to_string()))
    }
}

//! Wall-distance cost field.
//!
//! Every cell stores the price of stepping into it, derived from how far the
//! cell centre is from the nearest wall. Paths are pushed towards the middle
//! of corridors without making near-wall cells unreachable, except for a
//! thin clipping margin around each wall.

use ndarray::Array2;
use std::time::Instant;

use crate::error::{NavError, NavResult};
use crate::floor::{FloorPlan, WallIndex, WallSegment};
use crate::types::{GridCoordinate, WorldPoint};

/// Cost stored in impassable cells
pub const BLOCKED: f32 = f32::INFINITY;

/// Largest grid the builder will allocate
pub const MAX_GRID_CELLS: usize = 25_000_000;

/// Cost thresholds, as distance to the nearest wall in cells
pub mod bands {
    pub const CLIP_MARGIN: f64 = 0.3;
    pub const TOUCHING: f64 = 1.0;
    pub const NEAR: f64 = 3.0;
    pub const CLOSE: f64 = 5.0;

    pub const TOUCHING_COST: f32 = 500.0;
    pub const NEAR_COST: f32 = 150.0;
    pub const CLOSE_COST: f32 = 50.0;
    /// Numerator of the open-space falloff `10 / d`
    pub const OPEN_FALLOFF: f64 = 10.0;
    pub const OPEN_FLOOR: f32 = 1.0;
}

/// Map a wall distance (in cells) to a movement cost.
pub fn distance_to_cost(distance_cells: f64) -> f32 {
    if distance_cells < bands::CLIP_MARGIN {
        BLOCKED
    } else if distance_cells < bands::TOUCHING {
        bands::TOUCHING_COST
    } else if distance_cells < bands::NEAR {
        bands::NEAR_COST
    } else if distance_cells < bands::CLOSE {
        bands::CLOSE_COST
    } else {
        ((bands::OPEN_FALLOFF / distance_cells) as f32).max(bands::OPEN_FLOOR)
    }
}

/// Read-only movement cost grid for one floor.
#[derive(Clone, Debug)]
pub struct CostGrid {
    /// Indexed `[row, col]`
    costs: Array2<f32>,
    cell_size: f64,
}

impl CostGrid {
    /// Build the grid for a floor, sized from its raw pixel extent.
    pub fn for_floor(floor: &FloorPlan, cell_size: f64) -> NavResult<Self> {
        let (cols, rows) = Self::floor_extent(floor, cell_size)?;
        Ok(Self::assemble(&floor.walls, cell_size, cols, rows))
    }

    /// `(cols, rows)` covering a floor's extent, rounded up.
    pub fn floor_extent(floor: &FloorPlan, cell_size: f64) -> NavResult<(usize, usize)> {
        check_cell_size(cell_size)?;
        let cols = extent_in_cells("width", floor.metadata.width, cell_size)?;
        let rows = extent_in_cells("height", floor.metadata.height, cell_size)?;
        check_cell_count(cols, rows)?;
        Ok((cols, rows))
    }

    /// Build a `cols` x `rows` grid over `walls`.
    ///
    /// Empty wall lists produce uniform open-space cost.
    pub fn build(
        walls: &[WallSegment],
        cell_size: f64,
        cols: usize,
        rows: usize,
    ) -> NavResult<Self> {
        check_cell_size(cell_size)?;
        check_cell_count(cols, rows)?;
        Ok(Self::assemble(walls, cell_size, cols, rows))
    }

    /// Dimensions must already be checked.
    pub(crate) fn assemble(
        walls: &[WallSegment],
        cell_size: f64,
        cols: usize,
        rows: usize,
    ) -> Self {
        let started = Instant::now();
        let index = WallIndex::from_walls(walls);

        let costs = Array2::from_shape_fn((rows, cols), |(row, col)| {
            let centre = cell_centre(GridCoordinate::new(col, row), cell_size);
            let distance_cells = index
                .nearest_distance(centre)
                .map(|d| d / cell_size)
                .unwrap_or(f64::INFINITY);
            distance_to_cost(distance_cells)
        });

        log::debug!(
            "Built {}x{} cost grid over {} walls in {:.1} ms",
            cols,
            rows,
            index.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        CostGrid { costs, cell_size }
    }

    pub fn cols(&self) -> usize {
        self.costs.ncols()
    }

    pub fn rows(&self) -> usize {
        self.costs.nrows()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn in_bounds(&self, coord: GridCoordinate) -> bool {
        coord.col < self.cols() && coord.row < self.rows()
    }

    /// Movement cost of a cell; out-of-bounds cells read as blocked.
    pub fn cost(&self, coord: GridCoordinate) -> f32 {
        self.costs
            .get((coord.row, coord.col))
            .copied()
            .unwrap_or(BLOCKED)
    }

    pub fn is_blocked(&self, coord: GridCoordinate) -> bool {
        !self.cost(coord).is_finite()
    }

    /// Cell containing a world point, `None` outside the grid.
    pub fn world_to_grid(&self, point: WorldPoint) -> Option<GridCoordinate> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }
        let col = (point.x / self.cell_size).floor();
        let row = (point.y / self.cell_size).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let coord = GridCoordinate::new(col as usize, row as usize);
        self.in_bounds(coord).then_some(coord)
    }

    pub fn grid_to_world(&self, coord: GridCoordinate) -> WorldPoint {
        cell_centre(coord, self.cell_size)
    }

    /// Number of passable cells.
    pub fn open_cells(&self) -> usize {
        self.costs.iter().filter(|c| c.is_finite()).count()
    }
}

fn cell_centre(coord: GridCoordinate, cell_size: f64) -> WorldPoint {
    WorldPoint {
        x: (coord.col as f64 + 0.5) * cell_size,
        y: (coord.row as f64 + 0.5) * cell_size,
    }
}

fn check_cell_size(cell_size: f64) -> NavResult<()> {
    if cell_size.is_finite() && cell_size > 0.0 {
        Ok(())
    } else {
        Err(NavError::InvalidConfig(format!(
            "cell size must be positive and finite, got {}",
            cell_size
        )))
    }
}

fn check_cell_count(cols: usize, rows: usize) -> NavResult<()> {
    match cols.checked_mul(rows) {
        Some(cells) if cells <= MAX_GRID_CELLS => Ok(()),
        _ => Err(NavError::InvalidConfig(format!(
            "{}x{} grid exceeds {} cells",
            cols, rows, MAX_GRID_CELLS
        ))),
    }
}

fn extent_in_cells(label: &str, extent: f64, cell_size: f64) -> NavResult<usize> {
    if !(extent.is_finite() && extent >= 0.0) {
        return Err(NavError::InvalidConfig(format!(
            "floor {} must be finite and non-negative, got {}",
            label, extent
        )));
    }
    let cells = (extent / cell_size).ceil();
    if cells > MAX_GRID_CELLS as f64 {
        return Err(NavError::InvalidConfig(format!(
            "floor {} of {} spans more than {} cells",
            label, extent, MAX_GRID_CELLS
        )));
    }
    Ok(cells as usize)
}

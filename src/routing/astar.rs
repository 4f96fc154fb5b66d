//! A* search over a [`CostGrid`].
//!
//! - **8-connected**: diagonal steps cost `√2` times the destination cell cost
//! - **No corner cutting**: a diagonal step needs both orthogonal neighbours open
//! - **Weighted Manhattan heuristic**: see [`DEFAULT_HEURISTIC_WEIGHT`]
//! - **Cooperative cancellation**: the loop polls a flag every expansion
//!
//! [`DEFAULT_HEURISTIC_WEIGHT`]: crate::config::DEFAULT_HEURISTIC_WEIGHT

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use super::cost_field::CostGrid;
use crate::config::SearchConfig;
use crate::error::{NavError, NavResult};
use crate::types::{GridCoordinate, WorldPoint};

/// Neighbour offsets, cardinals first so ties favour straight moves.
const NEIGHBOURS: [(isize, isize); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Raw grid route produced by a search.
#[derive(Clone, Debug, PartialEq)]
pub struct GridPath {
    /// Start cell first, goal cell last; consecutive cells are 8-adjacent
    pub cells: Vec<GridCoordinate>,
    /// Accumulated movement cost
    pub cost: f64,
    pub expansions: usize,
}

impl GridPath {
    /// Cell centres in world space.
    pub fn waypoints(&self, grid: &CostGrid) -> Vec<WorldPoint> {
        self.cells.iter().map(|&c| grid.grid_to_world(c)).collect()
    }
}

/// Frontier entry.
#[derive(Clone, Debug)]
struct SearchNode {
    cell: GridCoordinate,
    g: f64,
    /// g + heuristic
    priority: f64,
    /// Insertion order, first-found wins ties
    seq: u64,
}

impl Eq for SearchNode {}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for BinaryHeap: lowest priority, then lowest seq, pops first
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* planner borrowing a prebuilt grid.
pub struct PathSearch<'a> {
    grid: &'a CostGrid,
    config: SearchConfig,
}

impl<'a> PathSearch<'a> {
    pub fn new(grid: &'a CostGrid, config: SearchConfig) -> Self {
        PathSearch { grid, config }
    }

    /// Search between two world points without cancellation.
    pub fn find_path(&self, start: WorldPoint, goal: WorldPoint) -> NavResult<GridPath> {
        let never = AtomicBool::new(false);
        self.find_path_cancellable(start, goal, &never)
    }

    /// Search between two world points, giving up with
    /// [`NavError::Cancelled`] as soon as `cancel` is set.
    pub fn find_path_cancellable(
        &self,
        start: WorldPoint,
        goal: WorldPoint,
        cancel: &AtomicBool,
    ) -> NavResult<GridPath> {
        let start_cell = self.validate_endpoint("start", start)?;
        let goal_cell = self.validate_endpoint("goal", goal)?;
        self.search_cells(start_cell, goal_cell, cancel)
    }

    fn validate_endpoint(&self, label: &str, point: WorldPoint) -> NavResult<GridCoordinate> {
        let cell = self.grid.world_to_grid(point).ok_or_else(|| {
            NavError::InvalidEndpoint(format!(
                "{} ({:.1}, {:.1}) is outside the {}x{} grid",
                label,
                point.x,
                point.y,
                self.grid.cols(),
                self.grid.rows()
            ))
        })?;
        if self.grid.is_blocked(cell) {
            return Err(NavError::InvalidEndpoint(format!(
                "{} cell {} is inside a wall",
                label, cell
            )));
        }
        Ok(cell)
    }

    fn index(&self, cell: GridCoordinate) -> usize {
        cell.row * self.grid.cols() + cell.col
    }

    fn heuristic(&self, a: GridCoordinate, b: GridCoordinate) -> f64 {
        a.manhattan(&b) as f64 * self.config.heuristic_weight
    }

    fn search_cells(
        &self,
        start: GridCoordinate,
        goal: GridCoordinate,
        cancel: &AtomicBool,
    ) -> NavResult<GridPath> {
        if start == goal {
            return Ok(GridPath {
                cells: vec![start],
                cost: 0.0,
                expansions: 0,
            });
        }

        let cell_count = self.grid.cols() * self.grid.rows();
        let mut g_score = vec![f64::INFINITY; cell_count];
        let mut came_from: Vec<Option<GridCoordinate>> = vec![None; cell_count];
        let mut closed = vec![false; cell_count];
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;

        g_score[self.index(start)] = 0.0;
        open.push(SearchNode {
            cell: start,
            g: 0.0,
            priority: self.heuristic(start, goal),
            seq,
        });

        let mut expansions = 0usize;

        while let Some(current) = open.pop() {
            if cancel.load(AtomicOrdering::Relaxed) {
                log::debug!("Search cancelled after {} expansions", expansions);
                return Err(NavError::Cancelled);
            }

            let current_idx = self.index(current.cell);
            if closed[current_idx] {
                continue;
            }

            expansions += 1;
            if expansions > self.config.max_expansions {
                log::warn!(
                    "Search hit expansion cap ({}) between {} and {}",
                    self.config.max_expansions,
                    start,
                    goal
                );
                return Err(NavError::NoPathFound);
            }
            closed[current_idx] = true;

            if current.cell == goal {
                let cells = self.reconstruct(&came_from, start, goal);
                log::debug!(
                    "Path found: {} cells, cost {:.1}, {} expansions",
                    cells.len(),
                    current.g,
                    expansions
                );
                return Ok(GridPath {
                    cells,
                    cost: current.g,
                    expansions,
                });
            }

            for (neighbour, step_factor) in self.neighbours(current.cell) {
                let idx = self.index(neighbour);
                if closed[idx] {
                    continue;
                }

                let move_cost = self.grid.cost(neighbour) as f64 * step_factor;
                let tentative = current.g + move_cost;

                if tentative < g_score[idx] {
                    g_score[idx] = tentative;
                    came_from[idx] = Some(current.cell);
                    seq += 1;
                    open.push(SearchNode {
                        cell: neighbour,
                        g: tentative,
                        priority: tentative + self.heuristic(neighbour, goal),
                        seq,
                    });
                }
            }
        }

        log::debug!(
            "Frontier exhausted after {} expansions, {} unreachable from {}",
            expansions,
            goal,
            start
        );
        Err(NavError::NoPathFound)
    }

    /// Open neighbours with their step multiplier (1 or √2).
    fn neighbours(&self, cell: GridCoordinate) -> Vec<(GridCoordinate, f64)> {
        let mut result = Vec::with_capacity(8);

        for (dc, dr) in NEIGHBOURS {
            let Some(next) = self.offset(cell, dc, dr) else {
                continue;
            };
            if self.grid.is_blocked(next) {
                continue;
            }

            if dc != 0 && dr != 0 {
                // Both orthogonal cells must be open to pass a corner
                let side_a = self.offset(cell, dc, 0);
                let side_b = self.offset(cell, 0, dr);
                let corner_open = matches!(
                    (side_a, side_b),
                    (Some(a), Some(b)) if !self.grid.is_blocked(a) && !self.grid.is_blocked(b)
                );
                if !corner_open {
                    continue;
                }
                result.push((next, SQRT_2));
            } else {
                result.push((next, 1.0));
            }
        }

        result
    }

    fn offset(&self, cell: GridCoordinate, dc: isize, dr: isize) -> Option<GridCoordinate> {
        let col = cell.col.checked_add_signed(dc)?;
        let row = cell.row.checked_add_signed(dr)?;
        let next = GridCoordinate::new(col, row);
        self.grid.in_bounds(next).then_some(next)
    }

    fn reconstruct(
        &self,
        came_from: &[Option<GridCoordinate>],
        start: GridCoordinate,
        goal: GridCoordinate,
    ) -> Vec<GridCoordinate> {
        let mut cells = vec![goal];
        let mut current = goal;

        while current != start {
            match came_from[self.index(current)] {
                Some(prev) => {
                    cells.push(prev);
                    current = prev;
                }
                None => break,
            }
        }

        cells.reverse();
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floor::WallSegment;
    use approx::assert_abs_diff_eq;

    fn pt(x: f64, y: f64) -> WorldPoint {
        WorldPoint { x, y }
    }

    fn assert_connected(path: &GridPath) {
        for pair in path.cells.windows(2) {
            assert!(
                pair[0].is_adjacent(&pair[1]),
                "{} -> {} is not an 8-neighbour step",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_open_grid_diagonal() {
        let grid = CostGrid::build(&[], 1.0, 10, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        let path = search.find_path(pt(0.5, 0.5), pt(9.5, 9.5)).unwrap();

        assert!(path.cells.len() >= 2);
        assert_eq!(path.cells[0], GridCoordinate::new(0, 0));
        assert_eq!(*path.cells.last().unwrap(), GridCoordinate::new(9, 9));
        assert_connected(&path);
        // Nine diagonal steps through open space
        assert_eq!(path.cells.len(), 10);
        assert_abs_diff_eq!(path.cost, 9.0 * SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn test_bisecting_wall_no_path() {
        let walls = vec![WallSegment::new((5.5, 0.0), (5.5, 10.0))];
        let grid = CostGrid::build(&walls, 1.0, 10, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        let result = search.find_path(pt(0.5, 0.5), pt(9.5, 9.5));
        assert_eq!(result, Err(NavError::NoPathFound));
    }

    #[test]
    fn test_wall_with_gap_routes_through_gap() {
        // Wall along column 10, open at rows 17..20
        let walls = vec![WallSegment::new((10.5, 0.0), (10.5, 16.5))];
        let grid = CostGrid::build(&walls, 1.0, 20, 20).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        let path = search.find_path(pt(2.5, 2.5), pt(17.5, 2.5)).unwrap();
        assert_connected(&path);
        assert_eq!(path.cells[0], GridCoordinate::new(2, 2));
        assert_eq!(*path.cells.last().unwrap(), GridCoordinate::new(17, 2));
        for cell in &path.cells {
            assert!(!grid.is_blocked(*cell));
        }
        // Crossing column 10 must happen below the wall
        assert!(path
            .cells
            .iter()
            .filter(|c| c.col == 10)
            .all(|c| c.row >= 17));
    }

    #[test]
    fn test_out_of_bounds_endpoint() {
        let grid = CostGrid::build(&[], 1.0, 10, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        assert!(matches!(
            search.find_path(pt(-1.0, 0.5), pt(5.5, 5.5)),
            Err(NavError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            search.find_path(pt(0.5, 0.5), pt(10.0, 5.5)),
            Err(NavError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_blocked_endpoint() {
        let walls = vec![WallSegment::new((5.5, 0.0), (5.5, 10.0))];
        let grid = CostGrid::build(&walls, 1.0, 10, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        assert!(matches!(
            search.find_path(pt(5.5, 3.5), pt(0.5, 0.5)),
            Err(NavError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_same_cell() {
        let grid = CostGrid::build(&[], 1.0, 10, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        let path = search.find_path(pt(3.2, 3.2), pt(3.8, 3.9)).unwrap();
        assert_eq!(path.cells, vec![GridCoordinate::new(3, 3)]);
    }

    #[test]
    fn test_cancelled_before_first_expansion() {
        let grid = CostGrid::build(&[], 1.0, 10, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());
        let cancel = AtomicBool::new(true);

        assert_eq!(
            search.find_path_cancellable(pt(0.5, 0.5), pt(9.5, 9.5), &cancel),
            Err(NavError::Cancelled)
        );
    }

    #[test]
    fn test_expansion_cap() {
        let grid = CostGrid::build(&[], 1.0, 50, 50).unwrap();
        let config = SearchConfig {
            max_expansions: 5,
            ..SearchConfig::default()
        };
        let search = PathSearch::new(&grid, config);

        assert_eq!(
            search.find_path(pt(0.5, 0.5), pt(49.5, 49.5)),
            Err(NavError::NoPathFound)
        );
    }

    #[test]
    fn test_prefers_corridor_centre() {
        // Horizontal corridor 9 cells tall between two walls
        let walls = vec![
            WallSegment::new((0.0, 0.5), (40.0, 0.5)),
            WallSegment::new((0.0, 9.5), (40.0, 9.5)),
        ];
        let grid = CostGrid::build(&walls, 1.0, 40, 10).unwrap();
        let search = PathSearch::new(&grid, SearchConfig::default());

        let path = search.find_path(pt(2.5, 5.5), pt(37.5, 5.5)).unwrap();
        assert_connected(&path);
        // Rows 1-2 and 7-8 cost 150 per step, rows 3-6 only 50
        assert!(path.cells.iter().all(|c| (3..=6).contains(&c.row)));
    }

    #[test]
    fn test_node_ordering_ties_by_insertion() {
        let mut heap = BinaryHeap::new();
        for (seq, priority) in [(0u64, 5.0), (1, 3.0), (2, 3.0), (3, 4.0)] {
            heap.push(SearchNode {
                cell: GridCoordinate::new(seq as usize, 0),
                g: 0.0,
                priority,
                seq,
            });
        }
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|n| n.seq)).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }
}

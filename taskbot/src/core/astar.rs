//! Best-first shortest-path search over a 4-connected occupancy grid.
//!
//! The heuristic is the Manhattan distance, which is admissible and consistent
//! for unit-cost axis-aligned moves, so the first time the goal is popped the
//! path is optimal. Frontier entries with equal `f` are ordered by the cell's
//! `(x, y)` ordering, which keeps results reproducible.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::Serialize;

use crate::core::grid::{Cell, OccupancyGrid};

/// Cost of a single axis-aligned move.
pub const STEP_COST: f64 = 1.0;

/// Result of a successful grid search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPath {
    /// Cells from start to goal, both inclusive.
    pub path: Vec<Cell>,
    /// Sum of move costs along `path`.
    pub cost: f64,
    /// Number of cells popped and expanded.
    pub expanded: usize,
}

/// Find the cheapest 4-connected path from `start` to `goal`.
///
/// Returns `None` when either endpoint is blocked or out of bounds, or when the
/// goal is unreachable.
pub fn shortest_path(grid: &OccupancyGrid, start: Cell, goal: Cell) -> Option<GridPath> {
    if grid.is_blocked(start) || grid.is_blocked(goal) {
        return None;
    }

    let mut frontier = BinaryHeap::new();
    let mut best_g: HashMap<Cell, u32> = HashMap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut expanded = 0usize;

    best_g.insert(start, 0);
    frontier.push(Reverse((start.manhattan(goal), start)));

    while let Some(Reverse((f, current))) = frontier.pop() {
        let g = best_g[&current];
        // Stale entry: a cheaper route to `current` was queued after this one.
        if f > g + current.manhattan(goal) {
            continue;
        }
        expanded += 1;

        if current == goal {
            let path = reconstruct(&came_from, current);
            return Some(GridPath {
                path,
                cost: f64::from(g) * STEP_COST,
                expanded,
            });
        }

        for next in current.neighbors() {
            if grid.is_blocked(next) {
                continue;
            }
            let tentative = g + 1;
            if best_g.get(&next).is_none_or(|known| tentative < *known) {
                best_g.insert(next, tentative);
                came_from.insert(next, current);
                frontier.push(Reverse((tentative + next.manhattan(goal), next)));
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, mut current: Cell) -> Vec<Cell> {
    let mut path = vec![current];
    while let Some(prev) = came_from.get(&current) {
        current = *prev;
        path.push(current);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{grid_from_ascii, wall_with_gaps};

    fn assert_unit_steps(path: &[Cell]) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1, "non-unit move {pair:?}");
        }
    }

    #[test]
    fn straight_line_on_empty_grid() {
        let grid = OccupancyGrid::new(5, 5);
        let result = shortest_path(&grid, Cell::new(0, 2), Cell::new(4, 2)).expect("path");
        assert_eq!(result.cost, 4.0);
        assert_eq!(result.path.len(), 5);
        assert_unit_steps(&result.path);
    }

    #[test]
    fn start_equals_goal_is_trivial_path() {
        let grid = OccupancyGrid::new(3, 3);
        let result = shortest_path(&grid, Cell::new(1, 1), Cell::new(1, 1)).expect("path");
        assert_eq!(result.path, vec![Cell::new(1, 1)]);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.expanded, 1);
    }

    #[test]
    fn blocked_endpoints_have_no_path() {
        let mut grid = OccupancyGrid::new(5, 5);
        grid.set(Cell::new(4, 4), true);
        assert!(shortest_path(&grid, Cell::new(0, 0), Cell::new(4, 4)).is_none());
        assert!(shortest_path(&grid, Cell::new(4, 4), Cell::new(0, 0)).is_none());
    }

    #[test]
    fn out_of_bounds_endpoints_have_no_path() {
        let grid = OccupancyGrid::new(5, 5);
        assert!(shortest_path(&grid, Cell::new(0, 0), Cell::new(5, 0)).is_none());
        assert!(shortest_path(&grid, Cell::new(-1, 0), Cell::new(2, 2)).is_none());
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let grid = grid_from_ascii(&[
            ".......",
            ".......",
            "..###..",
            "..#.#..",
            "..###..",
            ".......",
        ]);
        assert!(shortest_path(&grid, Cell::new(0, 0), Cell::new(3, 3)).is_none());
        assert!(shortest_path(&grid, Cell::new(0, 0), Cell::new(6, 5)).is_some());
    }

    #[test]
    fn crosses_wall_through_open_column() {
        let grid = wall_with_gaps();
        let start = Cell::new(0, 0);
        let goal = Cell::new(9, 9);
        let result = shortest_path(&grid, start, goal).expect("path");

        assert_eq!(result.path.first(), Some(&start));
        assert_eq!(result.path.last(), Some(&goal));
        assert_eq!(result.cost, (result.path.len() - 1) as f64);
        assert!(result.cost >= f64::from(start.manhattan(goal)));
        assert_unit_steps(&result.path);

        let crossing: Vec<&Cell> = result.path.iter().filter(|c| c.x == 5).collect();
        assert!(!crossing.is_empty());
        assert!(crossing.iter().all(|c| c.y == 0 || c.y == 9));
    }

    #[test]
    fn wall_forces_detour_longer_than_manhattan() {
        let grid = wall_with_gaps();
        let start = Cell::new(2, 4);
        let goal = Cell::new(8, 4);
        let result = shortest_path(&grid, start, goal).expect("path");

        // Via y=0: 4 down, 6 across, 4 up.
        assert_eq!(result.cost, 14.0);
        assert!(result.cost > f64::from(start.manhattan(goal)));
        assert_unit_steps(&result.path);
        assert!(result.path.iter().all(|c| grid.is_free(*c)));
    }

    #[test]
    fn search_is_deterministic() {
        let grid = wall_with_gaps();
        let first = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9)).expect("path");
        let second = shortest_path(&grid, Cell::new(0, 0), Cell::new(9, 9)).expect("path");
        assert_eq!(first, second);
    }

    #[test]
    fn equal_cost_ties_prefer_lower_coordinates() {
        let grid = OccupancyGrid::new(3, 3);
        let result = shortest_path(&grid, Cell::new(0, 0), Cell::new(1, 1)).expect("path");
        // (0,1) and (1,0) both have f = 2; (0,1) orders first and is expanded first,
        // reaching the goal through it.
        assert_eq!(
            result.path,
            vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 1)]
        );
    }
}

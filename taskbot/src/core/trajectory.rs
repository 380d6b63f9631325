//! Gradient-descent trajectory smoothing over a distance field.
//!
//! The path is a fixed number of waypoints between pinned endpoints. Each
//! iteration descends on `w_smooth * smoothness + w_obs * obstacle_cost`, where
//! smoothness is `‖L p‖²` for the banded second-difference matrix `L` and the
//! obstacle cost sums `1 / (d + ε)` over the waypoints' cells.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::distance_field::DistanceField;
use crate::core::grid::{OccupancyGrid, Point};

const DISTANCE_EPSILON: f64 = 1e-6;

/// Tuning parameters for [`smooth`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Number of waypoints in the returned trajectory, endpoints included.
    pub n_points: usize,
    /// Gradient-descent step size.
    pub step_size: f64,
    /// Iteration budget.
    pub max_iters: usize,
    pub w_smooth: f64,
    pub w_obs: f64,
    /// Stop once the cost changes by less than this between iterations.
    pub tolerance: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            n_points: 40,
            step_size: 0.05,
            max_iters: 200,
            w_smooth: 1.0,
            w_obs: 15.0,
            tolerance: 1e-4,
        }
    }
}

impl SmootherConfig {
    /// Returns a list of problems (empty when the parameters are usable).
    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.n_points < 2 {
            errors.push(format!("n_points must be >= 2 (got {})", self.n_points));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            errors.push(format!("step_size must be > 0 (got {})", self.step_size));
        }
        if !(self.w_smooth.is_finite() && self.w_smooth >= 0.0) {
            errors.push(format!("w_smooth must be >= 0 (got {})", self.w_smooth));
        }
        if !(self.w_obs.is_finite() && self.w_obs >= 0.0) {
            errors.push(format!("w_obs must be >= 0 (got {})", self.w_obs));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            errors.push(format!("tolerance must be >= 0 (got {})", self.tolerance));
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("grid {width}x{height} is too small for a distance-field gradient")]
    MalformedGrid { width: usize, height: usize },
    #[error("invalid smoother parameters: {}", .0.join("; "))]
    InvalidParameters(Vec<String>),
}

/// Output of [`smooth`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    /// Exactly `n_points` waypoints.
    pub waypoints: Vec<Point>,
    /// Cost of the returned waypoints.
    pub cost: f64,
    /// True when the cost change dropped below tolerance before the budget ran out.
    pub converged: bool,
    /// Iterations performed.
    pub iterations: usize,
}

/// Optimize a trajectory from `start` to `goal` over `grid`.
///
/// The endpoints never move except for clamping into grid bounds. Running out
/// of iterations is not an error; only an unusable grid or parameters are.
pub fn smooth(
    grid: &OccupancyGrid,
    start: Point,
    goal: Point,
    config: &SmootherConfig,
) -> Result<Trajectory, PlanError> {
    if grid.width() < 2 || grid.height() < 2 {
        return Err(PlanError::MalformedGrid {
            width: grid.width(),
            height: grid.height(),
        });
    }
    let problems = config.problems();
    if !problems.is_empty() {
        return Err(PlanError::InvalidParameters(problems));
    }

    let field = DistanceField::compute(grid);
    let n = config.n_points;
    let mut path: Vec<Point> = (0..n)
        .map(|i| {
            let t = i as f64 / (n - 1) as f64;
            Point::new(
                (1.0 - t) * start.x + t * goal.x,
                (1.0 - t) * start.y + t * goal.y,
            )
        })
        .collect();

    let max_x = (field.width() - 1) as f64;
    let max_y = (field.height() - 1) as f64;
    let mut last_cost = total_cost(&path, &field, config);
    let mut converged = false;
    let mut iterations = 0;
    let mut residual = vec![Point::new(0.0, 0.0); n];
    let mut grad = vec![Point::new(0.0, 0.0); n];

    while iterations < config.max_iters {
        iterations += 1;

        // L is symmetric, so Lᵀ(L p) is L applied twice.
        apply_second_difference(&path, &mut residual);
        apply_second_difference(&residual, &mut grad);
        for (g, p) in grad.iter_mut().zip(&path) {
            let (dx, dy) = field.gradient(p.to_cell());
            let d = field.distance(p.to_cell()) + DISTANCE_EPSILON;
            let inv_sq = 1.0 / (d * d);
            g.x = config.w_smooth * 2.0 * g.x - config.w_obs * dx * inv_sq;
            g.y = config.w_smooth * 2.0 * g.y - config.w_obs * dy * inv_sq;
        }
        grad[0] = Point::new(0.0, 0.0);
        grad[n - 1] = Point::new(0.0, 0.0);

        for (p, g) in path.iter_mut().zip(&grad) {
            p.x = (p.x - config.step_size * g.x).clamp(0.0, max_x);
            p.y = (p.y - config.step_size * g.y).clamp(0.0, max_y);
        }

        let cost = total_cost(&path, &field, config);
        if (last_cost - cost).abs() < config.tolerance {
            last_cost = cost;
            converged = true;
            break;
        }
        last_cost = cost;
    }

    Ok(Trajectory {
        waypoints: path,
        cost: last_cost,
        converged,
        iterations,
    })
}

/// Total cost of `path` under `config`'s weights.
pub fn total_cost(path: &[Point], field: &DistanceField, config: &SmootherConfig) -> f64 {
    config.w_smooth * smoothness_cost(path) + config.w_obs * obstacle_cost(path, field)
}

/// `‖L p‖²` summed over both coordinates.
pub fn smoothness_cost(path: &[Point]) -> f64 {
    let mut residual = vec![Point::new(0.0, 0.0); path.len()];
    apply_second_difference(path, &mut residual);
    residual.iter().map(|r| r.x * r.x + r.y * r.y).sum()
}

/// Sum of `1 / (d + ε)` at each waypoint's rounded, clamped cell.
pub fn obstacle_cost(path: &[Point], field: &DistanceField) -> f64 {
    path.iter()
        .map(|p| 1.0 / (field.distance(p.to_cell()) + DISTANCE_EPSILON))
        .sum()
}

/// `out = L p` where `L` has rows `[-1, 2, -1]` and boundary rows `[1, -1]`
/// and `[-1, 1]`.
fn apply_second_difference(path: &[Point], out: &mut [Point]) {
    let n = path.len();
    for i in 0..n {
        let mut acc = path[i];
        let diag = if i == 0 || i == n - 1 { 1.0 } else { 2.0 };
        acc.x *= diag;
        acc.y *= diag;
        if i > 0 {
            acc.x -= path[i - 1].x;
            acc.y -= path[i - 1].y;
        }
        if i + 1 < n {
            acc.x -= path[i + 1].x;
            acc.y -= path[i + 1].y;
        }
        out[i] = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_grid() -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(50, 50);
        grid.fill_rect(20, 30, 20, 30, true);
        grid
    }

    #[test]
    fn returns_requested_number_of_waypoints() {
        let config = SmootherConfig {
            n_points: 30,
            max_iters: 50,
            ..SmootherConfig::default()
        };
        let result = smooth(
            &block_grid(),
            Point::new(5.0, 5.0),
            Point::new(45.0, 45.0),
            &config,
        )
        .expect("smooth");
        assert_eq!(result.waypoints.len(), 30);
        assert!(result.iterations <= 50);
    }

    #[test]
    fn endpoints_stay_pinned() {
        let start = Point::new(3.0, 40.0);
        let goal = Point::new(44.0, 7.5);
        let result = smooth(&block_grid(), start, goal, &SmootherConfig::default()).expect("smooth");
        assert_eq!(result.waypoints.first(), Some(&start));
        assert_eq!(result.waypoints.last(), Some(&goal));
    }

    #[test]
    fn waypoints_stay_inside_grid() {
        let result = smooth(
            &block_grid(),
            Point::new(0.0, 0.0),
            Point::new(49.0, 49.0),
            &SmootherConfig::default(),
        )
        .expect("smooth");
        for p in &result.waypoints {
            assert!((0.0..=49.0).contains(&p.x), "{p:?}");
            assert!((0.0..=49.0).contains(&p.y), "{p:?}");
        }
    }

    #[test]
    fn loose_tolerance_reports_convergence() {
        let config = SmootherConfig {
            tolerance: 1e9,
            ..SmootherConfig::default()
        };
        let result = smooth(
            &block_grid(),
            Point::new(2.0, 2.0),
            Point::new(17.0, 2.0),
            &config,
        )
        .expect("smooth");
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn zero_tolerance_exhausts_budget() {
        let config = SmootherConfig {
            tolerance: 0.0,
            max_iters: 25,
            ..SmootherConfig::default()
        };
        let result = smooth(
            &block_grid(),
            Point::new(2.0, 2.0),
            Point::new(17.0, 12.0),
            &config,
        )
        .expect("smooth");
        assert!(!result.converged);
        assert_eq!(result.iterations, 25);
        assert_eq!(result.waypoints.len(), config.n_points);
    }

    #[test]
    fn smoothness_descent_lowers_cost() {
        let grid = OccupancyGrid::new(30, 30);
        let config = SmootherConfig {
            w_obs: 0.0,
            tolerance: 0.0,
            max_iters: 100,
            ..SmootherConfig::default()
        };
        let field = DistanceField::compute(&grid);
        let initial: Vec<Point> = (0..config.n_points)
            .map(|i| {
                let t = i as f64 / (config.n_points - 1) as f64;
                Point::new(2.0 + t * 25.0, 3.0 + t * 20.0)
            })
            .collect();
        let before = total_cost(&initial, &field, &config);

        let result = smooth(&grid, Point::new(2.0, 3.0), Point::new(27.0, 23.0), &config)
            .expect("smooth");
        assert!(result.cost < before, "{} >= {before}", result.cost);
    }

    #[test]
    fn obstacle_term_pushes_waypoints_away() {
        let config = SmootherConfig {
            w_smooth: 0.0,
            max_iters: 1,
            tolerance: 0.0,
            ..SmootherConfig::default()
        };
        // The line runs two cells below the block's lower edge (y = 20).
        let result = smooth(
            &block_grid(),
            Point::new(5.0, 18.0),
            Point::new(45.0, 18.0),
            &config,
        )
        .expect("smooth");

        assert!(result.waypoints.iter().all(|p| p.y <= 18.0));
        let under_block: Vec<&Point> = result
            .waypoints
            .iter()
            .filter(|p| p.x > 20.5 && p.x < 28.5)
            .collect();
        assert!(!under_block.is_empty());
        assert!(under_block.iter().all(|p| p.y < 18.0));
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let grid = OccupancyGrid::new(1, 10);
        let err = smooth(
            &grid,
            Point::new(0.0, 0.0),
            Point::new(0.0, 9.0),
            &SmootherConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::MalformedGrid {
                width: 1,
                height: 10
            }
        );
    }

    #[test]
    fn too_few_points_is_rejected() {
        let config = SmootherConfig {
            n_points: 1,
            ..SmootherConfig::default()
        };
        let err = smooth(
            &OccupancyGrid::new(5, 5),
            Point::new(0.0, 0.0),
            Point::new(4.0, 4.0),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameters(_)));
    }

    #[test]
    fn second_difference_annihilates_straight_lines_in_interior() {
        let path: Vec<Point> = (0..5).map(|i| Point::new(i as f64, 2.0 * i as f64)).collect();
        let mut out = vec![Point::new(0.0, 0.0); 5];
        apply_second_difference(&path, &mut out);
        assert_eq!(out[0], Point::new(-1.0, -2.0));
        for r in &out[1..4] {
            assert_eq!(*r, Point::new(0.0, 0.0));
        }
        assert_eq!(out[4], Point::new(1.0, 2.0));
    }
}

use tracing::{debug, instrument, warn};

use crate::core::astar::shortest_path;
use crate::core::grid::Cell;
use crate::io::env::Environment;

/// Largest end-effector distance from the goal that still counts as arrived.
pub const ARRIVAL_TOLERANCE: f64 = 1.0;

/// Follow a grid path from the end-effector to `goal`.
#[instrument(skip(env))]
pub fn navigate<E: Environment + ?Sized>(env: &mut E, goal: Cell) -> bool {
    let start = env.gripper();
    let Some(plan) = shortest_path(env.grid(), start, goal) else {
        warn!(?start, "no grid path to goal");
        return false;
    };
    debug!(cost = plan.cost, expanded = plan.expanded, "grid path found");

    for cell in &plan.path {
        env.set_gripper(*cell);
    }
    env.gripper().distance(goal) <= ARRIVAL_TOLERANCE
}

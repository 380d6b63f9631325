//! Step skills: each invokes one planner, drives the end-effector along the
//! result and finishes with a domain action.
//!
//! Planner failures are reported as `false`, never as errors, so the executor
//! can treat every skill outcome uniformly.

use crate::core::trajectory::Trajectory;
use crate::io::env::Environment;

pub mod grasp;
pub mod navigate;
pub mod place;

pub use grasp::grasp;
pub use navigate::navigate;
pub use place::place;

/// Move the end-effector through each waypoint's nearest cell.
fn follow_trajectory<E: Environment + ?Sized>(env: &mut E, trajectory: &Trajectory) {
    for waypoint in &trajectory.waypoints {
        env.set_gripper(waypoint.to_cell());
    }
}

use tracing::{debug, instrument, warn};

use crate::core::grid::Point;
use crate::core::trajectory::{SmootherConfig, smooth};
use crate::io::env::Environment;
use crate::skills::follow_trajectory;

/// Move next to `object` along a smoothed trajectory and grasp it.
#[instrument(skip(env, config))]
pub fn grasp<E: Environment + ?Sized>(env: &mut E, object: &str, config: &SmootherConfig) -> bool {
    let Some(target) = env.perceive(object) else {
        warn!("object not perceived");
        return false;
    };
    let start = Point::from(env.gripper());
    let trajectory = match smooth(env.grid(), start, Point::from(target), config) {
        Ok(trajectory) => trajectory,
        Err(err) => {
            warn!(%err, "trajectory planning failed");
            return false;
        }
    };
    debug!(
        cost = trajectory.cost,
        iterations = trajectory.iterations,
        converged = trajectory.converged,
        "trajectory ready"
    );

    follow_trajectory(env, &trajectory);
    env.grasp(object)
}

use tracing::{debug, instrument, warn};

use crate::core::grid::Point;
use crate::core::locations::target_cell;
use crate::core::trajectory::{SmootherConfig, smooth};
use crate::io::env::Environment;
use crate::skills::follow_trajectory;

/// Carry the held object to `location` and release it there.
#[instrument(skip(env, config))]
pub fn place<E: Environment + ?Sized>(
    env: &mut E,
    location: &str,
    config: &SmootherConfig,
) -> bool {
    let target = target_cell(location);
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
        "trajectory ready"
    );

    follow_trajectory(env, &trajectory);
    env.place(location)
}

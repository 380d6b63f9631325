//! Environment abstraction driven by skills and the executor.
//!
//! The [`Environment`] trait decouples execution from the concrete world
//! model. The shipped implementation is [`crate::io::tabletop::TableTopSim`];
//! tests use scripted environments that record calls.

use crate::core::grid::{Cell, OccupancyGrid};

/// Distance within which a grasp attaches the object.
pub const GRASP_RADIUS: f64 = 2.0;

/// Mutable world an executor acts upon.
pub trait Environment {
    /// Restore the initial scene: layout, object poses and end-effector.
    fn reset(&mut self);

    /// Current occupancy snapshot for planning.
    fn grid(&self) -> &OccupancyGrid;

    /// Cell of `object`, or `None` when the object is unknown.
    fn perceive(&self, object: &str) -> Option<Cell>;

    fn is_holding(&self) -> bool;

    /// Current end-effector cell.
    fn gripper(&self) -> Cell;

    /// Move the end-effector to `cell`.
    fn set_gripper(&mut self, cell: Cell);

    /// Attach `object` when it lies within [`GRASP_RADIUS`] of the end-effector.
    fn grasp(&mut self, object: &str) -> bool;

    /// Release the held object at the cell `location` resolves to.
    fn place(&mut self, location: &str) -> bool;
}

//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! grids, tasks and trajectories and return deterministic outputs suitable
//! for tests.

pub mod astar;
pub mod distance_field;
pub mod grid;
pub mod guardrail;
pub mod locations;
pub mod parse;
pub mod task;
pub mod trajectory;

//! Task execution and motion planning engine for a simulated table-top arm.
//!
//! A symbolic task (an ordered list of typed steps such as perceive, grasp
//! and place) is validated, made safe by a perceive-before-grasp guardrail,
//! and executed against an [`io::env::Environment`] with timeouts, scripted
//! fallback recovery and whole-task retries. The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (grid search, trajectory
//!   smoothing, task model, guardrails, text parsing). No I/O.
//! - **[`io`]**: Side-effecting pieces (environment boundary, table-top
//!   simulator, config file).
//!
//! Orchestration modules ([`skills`], [`executor`]) coordinate core planners
//! with the environment.

pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod skills;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

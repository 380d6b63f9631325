//! Task execution: validation, guardrail injection, attempts, fallback and retries.
//!
//! A run moves through `validate → inject → (attempt → [success | fallback])*`.
//! Only structural validation errors escape as `Err`; every runtime failure
//! is folded into the returned [`ExecutionResult`].

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::guardrail::inject_perceives;
use crate::core::locations::{SHELF, target_cell};
use crate::core::task::{PlaceTarget, Step, Task, TaskError};
use crate::core::trajectory::SmootherConfig;
use crate::io::env::Environment;
use crate::skills;

/// Metadata key holding the guardrail correction count.
pub const CORRECTIONS_KEY: &str = "corrections";

/// Why an execution attempt stopped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptFailure {
    #[error("step {index} failed: {step}")]
    StepFailed { index: usize, step: String },
    #[error("execution timed out after {elapsed_s:.3}s (budget {budget_s:.3}s)")]
    TimedOut { elapsed_s: f64, budget_s: f64 },
}

/// Why scripted recovery could not salvage an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackFailure {
    #[error("no object to recover")]
    NoObject,
    #[error("object '{0}' not perceived")]
    NotPerceived(String),
    #[error("direct grasp of '{0}' failed")]
    GraspFailed(String),
    #[error("could not place on {0}")]
    PlaceFailed(&'static str),
}

/// Timing and correction counters for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionMetrics {
    /// Whole run, validation and fallback included.
    pub total_time_s: f64,
    /// Time spent inside step execution.
    pub planning_time_s: f64,
    /// Perceive steps inserted by the guardrail.
    pub corrections: usize,
    /// Scripted recoveries started after a failed attempt.
    pub fallbacks: u32,
}

/// Outcome of [`Executor::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub metrics: ExecutionMetrics,
    /// Attempts started, the first one included.
    pub attempts: u32,
    /// Last error on failure, empty on success.
    pub notes: String,
}

/// A validated task after guardrail injection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedTask {
    pub task: Task,
    pub corrections: usize,
}

/// Validate `raw` and apply the perceive guardrail.
///
/// Needs no environment, so callers may plan while another thread holds
/// the executor.
pub fn plan(raw: &Value) -> Result<GuardedTask, TaskError> {
    let mut task = Task::from_value(raw)?;
    let injection = inject_perceives(&task.steps);
    task.steps = injection.steps;
    task.metadata
        .insert(CORRECTIONS_KEY.to_string(), Value::from(injection.corrections));
    if injection.corrections > 0 {
        info!(corrections = injection.corrections, "injected perceive steps");
    }
    Ok(GuardedTask {
        task,
        corrections: injection.corrections,
    })
}

/// Runs tasks against an exclusively owned environment.
#[derive(Debug)]
pub struct Executor<E> {
    env: E,
    smoother: SmootherConfig,
}

impl<E: Environment> Executor<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            smoother: SmootherConfig::default(),
        }
    }

    /// Use `smoother` for grasp and place trajectories.
    pub fn with_smoother(mut self, smoother: SmootherConfig) -> Self {
        self.smoother = smoother;
        self
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Execute `raw` with a wall-clock budget and `retries` extra attempts.
    ///
    /// Returns `Err` only when the task is structurally invalid; the
    /// environment is not touched in that case.
    #[instrument(skip(self, raw), fields(timeout_s = timeout.as_secs_f64()))]
    pub fn run(
        &mut self,
        raw: &Value,
        timeout: Duration,
        retries: u32,
    ) -> Result<ExecutionResult, TaskError> {
        let started = Instant::now();
        let GuardedTask { task, corrections } = plan(raw)?;

        let mut planning = Duration::ZERO;
        let mut attempts = 0;
        let mut fallbacks = 0;
        let mut success = false;
        let mut last_error = String::new();

        for attempt in 0..=retries {
            attempts += 1;
            info!(attempt = attempts, steps = task.steps.len(), "starting attempt");
            self.env.reset();

            let Err(failure) = self.attempt(&task, started, timeout, &mut planning) else {
                success = true;
                break;
            };
            warn!(attempt = attempts, %failure, "attempt failed, running fallback");
            fallbacks += 1;

            match self.fallback(&task) {
                Ok(()) => {
                    info!(attempt = attempts, "fallback recovered the task");
                    success = true;
                    break;
                }
                Err(fallback) => {
                    warn!(attempt = attempts, %fallback, "fallback failed");
                    last_error = format!("{failure}; fallback: {fallback}");
                }
            }
            if attempt == retries {
                warn!(attempts, "retries exhausted");
            }
        }

        let metrics = ExecutionMetrics {
            total_time_s: started.elapsed().as_secs_f64(),
            planning_time_s: planning.as_secs_f64(),
            corrections,
            fallbacks,
        };
        let notes = if success {
            String::new()
        } else {
            format!("Failed: {last_error}")
        };
        info!(success, attempts, "run finished");
        Ok(ExecutionResult {
            success,
            metrics,
            attempts,
            notes,
        })
    }

    fn attempt(
        &mut self,
        task: &Task,
        started: Instant,
        timeout: Duration,
        planning: &mut Duration,
    ) -> Result<(), AttemptFailure> {
        for (index, step) in task.steps.iter().enumerate() {
            let elapsed = started.elapsed();
            if elapsed > timeout {
                return Err(AttemptFailure::TimedOut {
                    elapsed_s: elapsed.as_secs_f64(),
                    budget_s: timeout.as_secs_f64(),
                });
            }

            let step_started = Instant::now();
            let ok = self.execute_step(step);
            *planning += step_started.elapsed();
            debug!(index, %step, ok, "step finished");
            if !ok {
                return Err(AttemptFailure::StepFailed {
                    index,
                    step: step.to_string(),
                });
            }
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &Step) -> bool {
        match step {
            Step::Perceive { object } => self.env.perceive(object).is_some(),
            Step::Navigate { goal } => skills::navigate(&mut self.env, *goal),
            Step::Grasp { object, .. } => skills::grasp(&mut self.env, object, &self.smoother),
            Step::Place {
                target: PlaceTarget::Location(location),
            } => skills::place(&mut self.env, location, &self.smoother),
            Step::Place {
                target: PlaceTarget::Cell(cell),
            } => {
                warn!(x = cell.x, y = cell.y, "placement at raw coordinates is unsupported");
                false
            }
        }
    }

    /// Teleport-grasp the first step's object if nothing is held, then
    /// teleport to the shelf and place there.
    #[instrument(skip_all)]
    fn fallback(&mut self, task: &Task) -> Result<(), FallbackFailure> {
        if !self.env.is_holding() {
            let object = task
                .steps
                .first()
                .and_then(Step::object)
                .ok_or(FallbackFailure::NoObject)?;
            let cell = self
                .env
                .perceive(object)
                .ok_or_else(|| FallbackFailure::NotPerceived(object.to_string()))?;
            self.env.set_gripper(cell);
            if !self.env.grasp(object) {
                return Err(FallbackFailure::GraspFailed(object.to_string()));
            }
        }

        self.env.set_gripper(target_cell(SHELF));
        if !self.env.place(SHELF) {
            return Err(FallbackFailure::PlaceFailed(SHELF));
        }
        Ok(())
    }
}

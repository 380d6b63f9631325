//! Typed task model and structural validation of raw task JSON.
//!
//! A raw task is `{"goal": ..., "steps": [{"action": ..., "args": {...}}], "metadata": {...}}`.
//! Validation runs in two stages: JSON Schema conformance for the overall
//! shape, then per-action argument checks that build the typed [`Step`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::grid::Cell;

const TASK_SCHEMA: &str = include_str!("../../schemas/task.v1.schema.json");

/// Metadata flag set during validation when a grasp has no earlier perceive.
pub const NEEDS_PERCEIVE_KEY: &str = "needs_perceive_injection";

static TASK_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(TASK_SCHEMA).map_err(|err| format!("parse task schema: {err}"))?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| format!("compile task schema: {err}"))
});

/// Closed set of step actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Perceive,
    Navigate,
    Grasp,
    Place,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Perceive => "perceive",
            Action::Navigate => "navigate",
            Action::Grasp => "grasp",
            Action::Place => "place",
        }
    }

    /// Argument keys accepted by this action.
    pub fn allowed_keys(self) -> &'static [&'static str] {
        match self {
            Action::Perceive => &["object"],
            Action::Navigate => &["goal", "x", "y"],
            Action::Grasp => &["object", "x", "y"],
            Action::Place => &["location", "x", "y"],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perceive" => Ok(Action::Perceive),
            "navigate" => Ok(Action::Navigate),
            "grasp" => Ok(Action::Grasp),
            "place" => Ok(Action::Place),
            _ => Err(()),
        }
    }
}

/// Where a place step puts the held object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceTarget {
    /// A named location such as `shelf_A`.
    Location(String),
    /// Raw grid coordinates.
    Cell(Cell),
}

/// One validated step of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Perceive {
        object: String,
    },
    Navigate {
        goal: Cell,
    },
    Grasp {
        object: String,
        /// Advisory position carried from the raw `x`/`y` args.
        hint: Option<Cell>,
    },
    Place {
        target: PlaceTarget,
    },
}

impl Step {
    pub fn perceive(object: impl Into<String>) -> Self {
        Step::Perceive {
            object: object.into(),
        }
    }

    pub fn grasp(object: impl Into<String>) -> Self {
        Step::Grasp {
            object: object.into(),
            hint: None,
        }
    }

    pub fn place(location: impl Into<String>) -> Self {
        Step::Place {
            target: PlaceTarget::Location(location.into()),
        }
    }

    pub fn navigate(goal: Cell) -> Self {
        Step::Navigate { goal }
    }

    pub fn action(&self) -> Action {
        match self {
            Step::Perceive { .. } => Action::Perceive,
            Step::Navigate { .. } => Action::Navigate,
            Step::Grasp { .. } => Action::Grasp,
            Step::Place { .. } => Action::Place,
        }
    }

    /// The `object` argument, for actions that take one.
    pub fn object(&self) -> Option<&str> {
        match self {
            Step::Perceive { object } | Step::Grasp { object, .. } => Some(object.as_str()),
            Step::Navigate { .. } | Step::Place { .. } => None,
        }
    }

    /// Convert a raw step, reporting problems against step `index`.
    pub fn from_raw(index: usize, raw: &RawStep) -> Result<Self, TaskError> {
        let action = Action::from_str(&raw.action).map_err(|()| TaskError::UnknownAction {
            index,
            action: raw.action.clone(),
        })?;

        let allowed = action.allowed_keys();
        let mut unknown: Vec<String> = raw
            .args
            .keys()
            .filter(|key| !allowed.contains(&key.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(TaskError::DisallowedArgs {
                index,
                action,
                keys: unknown,
            });
        }

        let args = ArgReader {
            index,
            action,
            args: &raw.args,
        };
        let step = match action {
            Action::Perceive => Step::Perceive {
                object: args.required_str("object")?,
            },
            Action::Navigate => {
                let goal = match args.cell_array("goal")? {
                    Some(cell) => cell,
                    None => args.xy()?.ok_or(TaskError::MissingArg {
                        index,
                        action,
                        key: "goal",
                    })?,
                };
                Step::Navigate { goal }
            }
            Action::Grasp => Step::Grasp {
                object: args.required_str("object")?,
                hint: args.xy()?,
            },
            Action::Place => {
                let target = match args.optional_str("location")? {
                    Some(location) => PlaceTarget::Location(location),
                    None => PlaceTarget::Cell(args.xy()?.ok_or(TaskError::MissingArg {
                        index,
                        action,
                        key: "location",
                    })?),
                };
                Step::Place { target }
            }
        };
        Ok(step)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Perceive { object } => write!(f, "perceive({object})"),
            Step::Navigate { goal } => write!(f, "navigate({}, {})", goal.x, goal.y),
            Step::Grasp { object, .. } => write!(f, "grasp({object})"),
            Step::Place {
                target: PlaceTarget::Location(location),
            } => write!(f, "place({location})"),
            Step::Place {
                target: PlaceTarget::Cell(cell),
            } => write!(f, "place({}, {})", cell.x, cell.y),
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawStep::from(self).serialize(serializer)
    }
}

/// Wire form of a step before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
    pub action: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl From<&Step> for RawStep {
    fn from(step: &Step) -> Self {
        let mut args = Map::new();
        match step {
            Step::Perceive { object } => {
                args.insert("object".to_string(), Value::from(object.as_str()));
            }
            Step::Navigate { goal } => {
                args.insert("goal".to_string(), Value::from(vec![goal.x, goal.y]));
            }
            Step::Grasp { object, hint } => {
                args.insert("object".to_string(), Value::from(object.as_str()));
                if let Some(cell) = hint {
                    insert_xy(&mut args, *cell);
                }
            }
            Step::Place { target } => match target {
                PlaceTarget::Location(location) => {
                    args.insert("location".to_string(), Value::from(location.as_str()));
                }
                PlaceTarget::Cell(cell) => insert_xy(&mut args, *cell),
            },
        }
        RawStep {
            action: step.action().as_str().to_string(),
            args,
        }
    }
}

fn insert_xy(args: &mut Map<String, Value>, cell: Cell) {
    args.insert("x".to_string(), Value::from(cell.x));
    args.insert("y".to_string(), Value::from(cell.y));
}

#[derive(Debug, Clone, Deserialize)]
struct RawTask {
    goal: String,
    steps: Vec<RawStep>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

/// Structural problems found while validating a raw task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid task json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task does not match schema:\n- {}", .0.join("\n- "))]
    Schema(Vec<String>),
    #[error("step {index}: unknown action '{action}'")]
    UnknownAction { index: usize, action: String },
    #[error("step {index}: unknown args for {action}: {}", .keys.join(", "))]
    DisallowedArgs {
        index: usize,
        action: Action,
        keys: Vec<String>,
    },
    #[error("step {index}: {action} requires '{key}'")]
    MissingArg {
        index: usize,
        action: Action,
        key: &'static str,
    },
    #[error("step {index}: {action} arg '{key}' must be {expected}")]
    InvalidArg {
        index: usize,
        action: Action,
        key: &'static str,
        expected: &'static str,
    },
}

/// A validated task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Free-form label for what the task achieves.
    pub goal: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// Diagnostic annotations written by the executor.
    pub metadata: BTreeMap<String, Value>,
}

impl Task {
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            goal: goal.into(),
            steps,
            metadata: BTreeMap::new(),
        }
    }

    /// Validate a raw task value into a typed task.
    pub fn from_value(value: &Value) -> Result<Self, TaskError> {
        validate_schema(value)?;
        let raw: RawTask = serde_json::from_value(value.clone())?;
        let steps = raw
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| Step::from_raw(index, step))
            .collect::<Result<Vec<_>, _>>()?;
        let mut task = Self {
            goal: raw.goal,
            steps,
            metadata: raw.metadata,
        };
        if task.needs_perceive_injection() {
            task.metadata
                .entry(NEEDS_PERCEIVE_KEY.to_string())
                .or_insert(Value::Bool(true));
        }
        Ok(task)
    }

    pub fn to_value(&self) -> Value {
        // Every field serializes to plain JSON, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Grasp steps whose object has no earlier perceive step, as `(index, object)`.
    pub fn unperceived_grasps(&self) -> Vec<(usize, &str)> {
        let mut perceived: HashSet<&str> = HashSet::new();
        let mut violations = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::Perceive { object } => {
                    perceived.insert(object.as_str());
                }
                Step::Grasp { object, .. } if !perceived.contains(object.as_str()) => {
                    violations.push((index, object.as_str()));
                }
                _ => {}
            }
        }
        violations
    }

    /// True when a later stage must inject perceive steps.
    pub fn needs_perceive_injection(&self) -> bool {
        !self.unperceived_grasps().is_empty()
    }
}

fn validate_schema(instance: &Value) -> Result<(), TaskError> {
    let compiled = TASK_VALIDATOR
        .as_ref()
        .map_err(|err| TaskError::Schema(vec![err.clone()]))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(TaskError::Schema(messages));
    }
    Ok(())
}

struct ArgReader<'a> {
    index: usize,
    action: Action,
    args: &'a Map<String, Value>,
}

impl ArgReader<'_> {
    fn invalid(&self, key: &'static str, expected: &'static str) -> TaskError {
        TaskError::InvalidArg {
            index: self.index,
            action: self.action,
            key,
            expected,
        }
    }

    fn optional_str(&self, key: &'static str) -> Result<Option<String>, TaskError> {
        match self.args.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(key, "a non-empty string")),
        }
    }

    fn required_str(&self, key: &'static str) -> Result<String, TaskError> {
        self.optional_str(key)?.ok_or(TaskError::MissingArg {
            index: self.index,
            action: self.action,
            key,
        })
    }

    fn coordinate(&self, key: &'static str, value: &Value) -> Result<i32, TaskError> {
        value
            .as_f64()
            .and_then(truncate_coordinate)
            .ok_or_else(|| self.invalid(key, "a number"))
    }

    /// `[x, y]` array under `key`.
    fn cell_array(&self, key: &'static str) -> Result<Option<Cell>, TaskError> {
        let Some(value) = self.args.get(key) else {
            return Ok(None);
        };
        let pair = value
            .as_array()
            .filter(|items| items.len() == 2)
            .ok_or_else(|| self.invalid(key, "an [x, y] pair of numbers"))?;
        let x = self.coordinate(key, &pair[0])?;
        let y = self.coordinate(key, &pair[1])?;
        Ok(Some(Cell::new(x, y)))
    }

    /// Separate `x` and `y` args; both or neither must be present.
    fn xy(&self) -> Result<Option<Cell>, TaskError> {
        match (self.args.get("x"), self.args.get("y")) {
            (None, None) => Ok(None),
            (Some(x), Some(y)) => Ok(Some(Cell::new(
                self.coordinate("x", x)?,
                self.coordinate("y", y)?,
            ))),
            (Some(_), None) => Err(TaskError::MissingArg {
                index: self.index,
                action: self.action,
                key: "y",
            }),
            (None, Some(_)) => Err(TaskError::MissingArg {
                index: self.index,
                action: self.action,
                key: "x",
            }),
        }
    }
}

/// Truncate toward zero, rejecting values that do not fit a cell coordinate.
fn truncate_coordinate(value: f64) -> Option<i32> {
    let truncated = value.trunc();
    if truncated.is_finite()
        && truncated >= f64::from(i32::MIN)
        && truncated <= f64::from(i32::MAX)
    {
        Some(truncated as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tidy_json() -> Value {
        json!({
            "goal": "tidy_table",
            "steps": [
                {"action": "perceive", "args": {"object": "red_mug"}},
                {"action": "grasp", "args": {"object": "red_mug"}},
                {"action": "place", "args": {"location": "shelf_A"}}
            ]
        })
    }

    #[test]
    fn parses_valid_task() {
        let task = Task::from_value(&tidy_json()).expect("valid");
        assert_eq!(task.goal, "tidy_table");
        assert_eq!(
            task.steps,
            vec![
                Step::perceive("red_mug"),
                Step::grasp("red_mug"),
                Step::place("shelf_A")
            ]
        );
        assert!(task.metadata.is_empty());
        assert!(!task.needs_perceive_injection());
    }

    #[test]
    fn rejects_unknown_action() {
        let value = json!({"goal": "g", "steps": [{"action": "fly", "args": {}}]});
        let err = Task::from_value(&value).unwrap_err();
        assert!(matches!(err, TaskError::UnknownAction { index: 0, .. }));
        assert_eq!(err.to_string(), "step 0: unknown action 'fly'");
    }

    #[test]
    fn rejects_disallowed_arg_keys() {
        let value = json!({
            "goal": "g",
            "steps": [{"action": "perceive", "args": {"object": "red_mug", "speed": 3, "color": "red"}}]
        });
        let err = Task::from_value(&value).unwrap_err();
        assert_eq!(
            err.to_string(),
            "step 0: unknown args for perceive: color, speed"
        );
    }

    #[test]
    fn rejects_wrong_value_types() {
        let value = json!({"goal": "g", "steps": [{"action": "grasp", "args": {"object": 7}}]});
        let err = Task::from_value(&value).unwrap_err();
        assert!(matches!(
            err,
            TaskError::InvalidArg {
                key: "object",
                ..
            }
        ));

        let value = json!({"goal": "g", "steps": [{"action": "navigate", "args": {"goal": [1]}}]});
        assert!(matches!(
            Task::from_value(&value).unwrap_err(),
            TaskError::InvalidArg { key: "goal", .. }
        ));

        let value = json!({"goal": "g", "steps": [{"action": "navigate", "args": {"x": "3", "y": 4}}]});
        assert!(matches!(
            Task::from_value(&value).unwrap_err(),
            TaskError::InvalidArg { key: "x", .. }
        ));
    }

    #[test]
    fn rejects_missing_required_args() {
        let value = json!({"goal": "g", "steps": [{"action": "perceive"}]});
        assert!(matches!(
            Task::from_value(&value).unwrap_err(),
            TaskError::MissingArg { key: "object", .. }
        ));

        let value = json!({"goal": "g", "steps": [{"action": "navigate", "args": {"x": 1}}]});
        assert!(matches!(
            Task::from_value(&value).unwrap_err(),
            TaskError::MissingArg { key: "y", .. }
        ));
    }

    #[test]
    fn rejects_malformed_shape_via_schema() {
        let value = json!({"goal": 3, "steps": "nope"});
        let err = Task::from_value(&value).unwrap_err();
        let TaskError::Schema(messages) = err else {
            panic!("expected schema error");
        };
        assert!(messages.len() >= 2);

        let value = json!({"goal": "g", "steps": [{"action": "grasp", "arguments": {}}]});
        assert!(matches!(
            Task::from_value(&value).unwrap_err(),
            TaskError::Schema(_)
        ));
    }

    #[test]
    fn navigate_accepts_goal_pair_or_xy() {
        let value = json!({
            "goal": "g",
            "steps": [
                {"action": "navigate", "args": {"goal": [3, 4.9]}},
                {"action": "navigate", "args": {"x": 7, "y": 8}}
            ]
        });
        let task = Task::from_value(&value).expect("valid");
        assert_eq!(
            task.steps,
            vec![
                Step::navigate(Cell::new(3, 4)),
                Step::navigate(Cell::new(7, 8))
            ]
        );
    }

    #[test]
    fn place_accepts_coordinates() {
        let value = json!({"goal": "g", "steps": [{"action": "place", "args": {"x": 10, "y": 50}}]});
        let task = Task::from_value(&value).expect("valid");
        assert_eq!(
            task.steps,
            vec![Step::Place {
                target: PlaceTarget::Cell(Cell::new(10, 50))
            }]
        );
    }

    #[test]
    fn serializes_back_to_wire_form() {
        let mut value = tidy_json();
        value["metadata"] = json!({"source": "test"});
        let task = Task::from_value(&value).expect("valid");
        assert_eq!(task.to_value(), value);
    }

    #[test]
    fn detects_unperceived_grasps() {
        let task = Task::new(
            "g",
            vec![
                Step::grasp("red_mug"),
                Step::perceive("blue_block"),
                Step::grasp("blue_block"),
                Step::grasp("green_cup"),
            ],
        );
        assert_eq!(
            task.unperceived_grasps(),
            vec![(0, "red_mug"), (3, "green_cup")]
        );
        assert!(task.needs_perceive_injection());
    }

    #[test]
    fn validation_flags_missing_perceive_in_metadata() {
        let value = json!({
            "goal": "g",
            "steps": [
                {"action": "grasp", "args": {"object": "red_mug"}},
                {"action": "place", "args": {"location": "bin1"}}
            ]
        });
        let task = Task::from_value(&value).expect("valid");
        assert_eq!(task.metadata[NEEDS_PERCEIVE_KEY], json!(true));

        let ordered = Task::from_value(&tidy_json()).expect("valid");
        assert!(!ordered.metadata.contains_key(NEEDS_PERCEIVE_KEY));
    }

    #[test]
    fn embedded_schema_compiles_once() {
        assert!(TASK_VALIDATOR.is_ok());
        let bad = json!({"goal": "g"});
        for _ in 0..2 {
            assert!(matches!(
                Task::from_value(&bad).unwrap_err(),
                TaskError::Schema(_)
            ));
        }
    }
}

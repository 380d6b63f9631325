//! HTTP route handlers.
//!
//! Every endpoint takes a JSON object body. A missing or mistyped field, or a
//! structurally invalid task, is answered with `400 {"error": ...}`.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use taskbot::core::parse::parse_instruction;
use taskbot::core::task::Task;
use taskbot::executor::{self, ExecutionMetrics, ExecutionResult};

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/parse", post(parse))
        .route("/plan", post(plan))
        .route("/execute", post(execute))
        .route("/run_task", post(run_task))
}

/// Error body returned to clients.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

fn text_field(payload: &Value) -> Result<&str, ApiError> {
    payload
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Missing 'text' field"))
}

fn task_field(payload: &Value) -> Result<&Value, ApiError> {
    payload
        .get("task")
        .filter(|task| task.is_object())
        .ok_or_else(|| ApiError::bad_request("Missing 'task' field"))
}

/// POST /parse - free text to task JSON.
async fn parse(Json(payload): Json<Value>) -> Result<Json<Task>, ApiError> {
    let text = text_field(&payload)?;
    Ok(Json(parse_instruction(text)))
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    validated_task: Task,
    corrections: usize,
    notes: &'static str,
}

/// POST /plan - validate a task and apply guardrails without executing it.
///
/// Does not take the executor lock, so it answers while a run is in flight.
async fn plan(Json(payload): Json<Value>) -> Result<Json<PlanResponse>, ApiError> {
    let raw = task_field(&payload)?;
    let guarded = executor::plan(raw).map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(Json(PlanResponse {
        validated_task: guarded.task,
        corrections: guarded.corrections,
        notes: "Motion planning happens per step during execution.",
    }))
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    success: bool,
    metrics: ExecutionMetrics,
    notes: String,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: result.success,
            metrics: result.metrics,
            notes: result.notes,
        }
    }
}

/// POST /execute - run a task in the simulator.
async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let raw = task_field(&payload)?.clone();
    let result = run_blocking(state, raw).await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Serialize)]
struct RunTaskResponse {
    task: Task,
    #[serde(flatten)]
    outcome: ExecuteResponse,
}

/// POST /run_task - parse free text, then execute it.
async fn run_task(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<RunTaskResponse>, ApiError> {
    let task = parse_instruction(text_field(&payload)?);
    let result = run_blocking(state, task.to_value()).await?;
    Ok(Json(RunTaskResponse {
        task,
        outcome: result.into(),
    }))
}

/// Execute on the blocking pool so planning never stalls the async runtime.
async fn run_blocking(state: AppState, raw: Value) -> Result<ExecutionResult, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || {
        let mut executor = state
            .executor
            .lock()
            .map_err(|_| ApiError::internal("executor lock poisoned"))?;
        executor
            .run(&raw, state.timeout, state.retries)
            .map_err(|err| ApiError::bad_request(err.to_string()))
    })
    .await
    .map_err(|err| ApiError::internal(format!("execution task failed: {err}")))?;

    match &outcome {
        Ok(result) => info!(success = result.success, attempts = result.attempts, "task executed"),
        Err(err) => warn!(error = %err.message, "task rejected"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbot::io::config::TaskbotConfig;

    fn state() -> AppState {
        AppState::new(&TaskbotConfig::default())
    }

    fn tidy() -> Value {
        json!({
            "goal": "tidy_table",
            "steps": [
                {"action": "grasp", "args": {"object": "red_mug"}},
                {"action": "place", "args": {"location": "shelf_A"}}
            ]
        })
    }

    #[tokio::test]
    async fn parse_requires_text() {
        let err = parse(Json(json!({"txt": "mug"}))).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing 'text' field");

        let Json(task) = parse(Json(json!({"text": "blue cube to bin one"})))
            .await
            .expect("parse");
        assert_eq!(task.steps.len(), 3);
    }

    #[tokio::test]
    async fn plan_reports_corrections() {
        let Json(response) = plan(Json(json!({ "task": tidy() })))
            .await
            .expect("plan");
        assert_eq!(response.corrections, 1);
        assert_eq!(response.validated_task.steps.len(), 3);
    }

    #[tokio::test]
    #[allow(clippy::await_holding_lock)]
    async fn plan_answers_while_executor_is_busy() {
        let state = state();
        let _running = state.executor.lock().expect("lock");
        let Json(response) = plan(Json(json!({ "task": tidy() })))
            .await
            .expect("plan");
        assert_eq!(response.corrections, 1);
    }

    #[tokio::test]
    async fn invalid_task_is_bad_request() {
        let payload = json!({"task": {"goal": "g", "steps": [{"action": "dance"}]}});
        let err = execute(State(state()), Json(payload)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("unknown action 'dance'"));

        let err = execute(State(state()), Json(json!({"task": "nope"})))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Missing 'task' field");
    }

    #[tokio::test]
    async fn execute_runs_task() {
        let Json(response) = execute(State(state()), Json(json!({ "task": tidy() })))
            .await
            .expect("execute");
        assert!(response.success, "notes: {}", response.notes);
        assert_eq!(response.metrics.corrections, 1);
        assert_eq!(response.metrics.fallbacks, 0);
    }

    #[tokio::test]
    async fn run_task_returns_parsed_task_and_outcome() {
        let Json(response) = run_task(State(state()), Json(json!({"text": "put the mug on the shelf"})))
            .await
            .expect("run");
        let body = serde_json::to_value(&response).expect("serialize");
        assert_eq!(body["task"]["goal"], json!("tidy_table"));
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["metrics"]["fallbacks"], json!(0));
        assert!(body["metrics"]["total_time_s"].is_number());
        assert_eq!(body["notes"], json!(""));
    }
}

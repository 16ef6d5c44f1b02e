//! HTTP API: routes, handlers and wire types.
//!
//! | Method | Path                                               |
//! |--------|----------------------------------------------------|
//! | PUT    | `/processes/{process_id}/tasks/{task_id}`          |
//! | PUT    | `/processes/{process_id}/tasks/{task_id}/completion` |
//! | GET    | `/processes/{process_id}`                          |

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router, middleware};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use termination_core::Detector;
use termination_core::domain::{
    CompletionOutcome, ProcessId, ProcessView, RegistrationOutcome, TaskKey, TerminalState,
};

use crate::error::{ApiError, text_response};
use crate::middleware::request_span;

/// Body of `PUT /processes/{process_id}/tasks/{task_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRegistration {
    pub expiration_time: DateTime<Utc>,
}

/// Terminal state as spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionState {
    Completed,
    Error,
}

impl From<CompletionState> for TerminalState {
    fn from(state: CompletionState) -> Self {
        match state {
            CompletionState::Completed => TerminalState::Finished,
            CompletionState::Error => TerminalState::Aborted,
        }
    }
}

impl From<TerminalState> for CompletionState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Finished => CompletionState::Completed,
            TerminalState::Aborted => CompletionState::Error,
        }
    }
}

/// Body of `PUT /processes/{process_id}/tasks/{task_id}/completion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletionRequest {
    pub state: CompletionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn router(detector: Detector) -> Router {
    Router::new()
        .route("/processes/{process_id}", get(get_process))
        .route("/processes/{process_id}/tasks/{task_id}", put(put_task))
        .route(
            "/processes/{process_id}/tasks/{task_id}/completion",
            put(put_task_completion),
        )
        .fallback(|| async { text_response(StatusCode::NOT_FOUND) })
        .layer(middleware::from_fn(request_span))
        .with_state(detector)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Register a task. Echoes the request body on 201.
async fn put_task(
    State(detector): State<Detector>,
    Path((process_id, task_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let key = TaskKey::parse(process_id, task_id)?;
    let registration: TaskRegistration = parse_body(&body)?;

    match detector.register(key, registration.expiration_time).await? {
        RegistrationOutcome::Created => Ok((
            StatusCode::CREATED,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()),
        RegistrationOutcome::AlreadyRegistered => Err(ApiError::Conflict),
    }
}

async fn put_task_completion(
    State(detector): State<Detector>,
    Path((process_id, task_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let key = TaskKey::parse(process_id, task_id)?;
    let completion: TaskCompletionRequest = parse_body(&body)?;

    match detector
        .complete(&key, completion.state.into(), completion.error_message)
        .await?
    {
        CompletionOutcome::Completed => Ok(text_response(StatusCode::CREATED)),
        CompletionOutcome::Conflict => Err(ApiError::Conflict),
    }
}

async fn get_process(
    State(detector): State<Detector>,
    Path(process_id): Path<String>,
) -> Result<Json<ProcessView>, ApiError> {
    let process_id = ProcessId::parse(process_id)?;
    let process = detector.get(&process_id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(process.into()))
}

//! The manager's HTTP surface (§6): task submission/listing/deletion and a
//! node-snapshot endpoint. Same `AppState` + `ApiError` shape the worker's
//! API module uses.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use common::api::ErrResponse;
use common::{State as TaskState, Store, Task, TaskEvent};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::ManagerState;

pub fn create_router(state: Arc<ManagerState>) -> Router {
    Router::new()
        .route("/tasks", post(add_task).get(list_tasks))
        .route("/tasks/{id}", delete(stop_task))
        .route("/nodes", get(list_nodes))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Accepts a TaskEvent per §6 and enqueues it on the pending queue, unlike
/// the worker's `/tasks` which takes a bare `Task` — the manager's callers
/// (`cube run`, direct API clients) declare the target state themselves.
async fn add_task(
    State(state): State<Arc<ManagerState>>,
    Json(event): Json<TaskEvent>,
) -> Result<impl IntoResponse, ApiError> {
    info!(task_id = %event.task.id, task_name = %event.task.name, "received task event");
    let task = event.task.clone();
    state.pending.push(event);
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(State(state): State<Arc<ManagerState>>) -> Result<impl IntoResponse, ApiError> {
    let tasks = state
        .task_store
        .list()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(tasks))
}

/// Enqueues a `Completed` event for the named task (§6: "enqueues a
/// Completed event internally").
async fn stop_task(
    State(state): State<Arc<ManagerState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .task_store
        .get(&id.to_string())
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or(ApiError::NotFound)?;

    info!(task_id = %id, "enqueueing stop request");
    let event = TaskEvent::new(TaskState::Completed, task);
    state.pending.push(event);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct NodeSnapshot {
    name: String,
    role: String,
    memory: u64,
    memory_allocated: u64,
    disk: u64,
    disk_allocated: u64,
    task_count: u32,
}

async fn list_nodes(State(state): State<Arc<ManagerState>>) -> Json<Vec<NodeSnapshot>> {
    let nodes = state.nodes.lock().await;
    let snapshots: Vec<NodeSnapshot> = nodes
        .iter()
        .map(|n| NodeSnapshot {
            name: n.name.clone(),
            role: n.role.clone(),
            memory: n.memory,
            memory_allocated: n.memory_allocated,
            disk: n.disk,
            disk_allocated: n.disk_allocated,
            task_count: n.task_count,
        })
        .collect();
    Json(snapshots)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let ApiError::Internal(ref msg) = self {
            error!(error = %msg, "manager api error");
        }
        let body = Json(ErrResponse {
            http_status_code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

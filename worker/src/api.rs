//! The worker's HTTP surface (§6): task submission/listing/deletion and a
//! stats endpoint. Same `AppState` + `ApiError` shape as the monitoring
//! server's API module, scoped down to this binary's four handlers.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use common::api::ErrResponse;
use common::{State as TaskState, Store, Task, TaskEvent};
use tracing::{error, info};
use uuid::Uuid;

use crate::queue::RunQueue;
use crate::stats::StatsPublisher;

pub struct AppState {
    pub queue: Arc<RunQueue>,
    pub store: Arc<dyn Store<Task>>,
    pub stats: Arc<StatsPublisher>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tasks", post(add_task).get(list_tasks))
        .route("/tasks/{id}", delete(stop_task))
        .route("/stats", get(get_stats))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Accepts a `TaskEvent` (§6) and enqueues it as-is — the manager has
/// already decided the target state (a fresh placement, a restart, a
/// completion request), so the worker must not override it.
async fn add_task(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TaskEvent>,
) -> Result<impl IntoResponse, ApiError> {
    info!(task_id = %event.task.id, task_name = %event.task.name, "received task event");
    let task = event.task.clone();
    state.queue.push(event);
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let tasks = state
        .store
        .list()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(tasks))
}

/// Enqueues a `Completed` event for the named task, same as the manager's
/// stop-task call does against this same endpoint.
async fn stop_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .store
        .get(&id.to_string())
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or(ApiError::NotFound)?;

    info!(task_id = %id, "enqueueing stop request");
    let event = TaskEvent::new(TaskState::Completed, task);
    state.queue.push(event);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stats.latest())
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
            error!(error = %msg, "worker api error");
        }
        let body = Json(ErrResponse {
            http_status_code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryStore;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            queue: Arc::new(RunQueue::new()),
            store: Arc::new(MemoryStore::new()),
            stats: Arc::new(StatsPublisher::new()),
        })
    }

    #[tokio::test]
    async fn add_task_enqueues_the_submitted_event_unchanged() {
        let state = test_state();
        let task = Task::new(Uuid::new_v4(), "web", "busybox");
        let sent = TaskEvent::new(TaskState::Scheduled, task.clone());
        add_task(State(state.clone()), Json(sent.clone())).await.unwrap();

        let event = state.queue.pop().unwrap();
        assert_eq!(event.task.id, task.id);
        assert_eq!(event.state, TaskState::Scheduled);
    }

    #[tokio::test]
    async fn add_task_does_not_rewrite_the_events_target_state() {
        let state = test_state();
        let task = Task::new(Uuid::new_v4(), "web", "busybox");
        let sent = TaskEvent::new(TaskState::Failed, task.clone());
        add_task(State(state.clone()), Json(sent)).await.unwrap();

        let event = state.queue.pop().unwrap();
        assert_eq!(event.task.id, task.id);
        assert_eq!(event.state, TaskState::Failed);
    }

    #[tokio::test]
    async fn stop_task_returns_not_found_for_unknown_task() {
        let state = test_state();
        let result = stop_task(State(state), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn stop_task_enqueues_completed_event_for_known_task() {
        let state = test_state();
        let task = Task::new(Uuid::new_v4(), "web", "busybox");
        state.store.put(&task.id.to_string(), task.clone()).unwrap();

        stop_task(State(state.clone()), Path(task.id)).await.unwrap();

        let event = state.queue.pop().unwrap();
        assert_eq!(event.task.id, task.id);
        assert_eq!(event.state, TaskState::Completed);
    }
}

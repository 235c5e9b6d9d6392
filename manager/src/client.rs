//! A thin `reqwest`-backed client against a worker's HTTP surface. Every
//! caller — dispatch, reconcile, health checks, EPVM scoring — goes through
//! here so the 10-second timeout (§5) is applied in exactly one place.

use common::api::ErrResponse;
use common::{Stats, Task, TaskEvent};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("worker returned {status}: {message}")]
    Application { status: u16, message: String },
}

#[derive(Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                common::defaults::default_http_timeout_seconds(),
            ))
            .build()
            .expect("building the worker http client");
        Self { http }
    }

    /// Dispatches a placement or restart event. Returns the worker's queued
    /// task on success, the decoded error envelope on a non-201 response.
    pub async fn post_task(&self, base_url: &str, event: &TaskEvent) -> Result<Task, ClientError> {
        let url = format!("{base_url}{}", common::api::worker_endpoints::TASKS);
        let response = self
            .http
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if response.status() != reqwest::StatusCode::CREATED {
            let status = response.status().as_u16();
            let message = match response.json::<ErrResponse>().await {
                Ok(body) => body.message,
                Err(_) => "worker returned a non-201 response with no decodable body".to_string(),
            };
            return Err(ClientError::Application { status, message });
        }

        response
            .json::<Task>()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    pub async fn get_tasks(&self, base_url: &str) -> Result<Vec<Task>, ClientError> {
        let url = format!("{base_url}{}", common::api::worker_endpoints::TASKS);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .json::<Vec<Task>>()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    pub async fn get_stats(&self, base_url: &str) -> Result<Stats, ClientError> {
        let url = format!("{base_url}{}", common::api::worker_endpoints::STATS);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .json::<Stats>()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    pub async fn delete_task(&self, base_url: &str, task_id: uuid::Uuid) -> Result<(), ClientError> {
        let url = format!("{base_url}/tasks/{task_id}");
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::Application {
                status: response.status().as_u16(),
                message: "delete request failed".to_string(),
            });
        }
        Ok(())
    }

    /// A plain GET against an arbitrary URL, used for health checks against
    /// a task's declared check path.
    pub async fn health_check(&self, url: &str) -> Result<reqwest::StatusCode, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(response.status())
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}

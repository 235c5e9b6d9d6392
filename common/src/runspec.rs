//! The `cube run` CLI client: reads a task declaration off disk and posts
//! it to a manager, the direct analogue of `cmd/run.go`'s `runCmd`. Shared
//! by both binaries' `run` subcommand so the manager and worker CLIs stay
//! identical rather than each hand-rolling the same HTTP POST.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::task::{State, Task, TaskEvent};

/// The on-disk shape a `task.toml` file declares. Mirrors [`Task`]'s
/// fields minus the ones only the runtime/reconciler ever assign
/// (`container_id`, `start_time`, `finish_time`, `restart_count`,
/// `scheduled_on`, `host_ports`).
#[derive(Debug, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default = "default_state")]
    pub state: State,
    pub image: String,
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub exposed_ports: Vec<String>,
    #[serde(default)]
    pub health_check: Option<String>,
}

fn default_state() -> State {
    State::Scheduled
}

fn default_restart_policy() -> String {
    "always".to_string()
}

impl TaskSpec {
    pub fn into_event(self) -> TaskEvent {
        let mut task = Task::new(Uuid::new_v4(), self.name, self.image);
        task.memory = self.memory;
        task.cpu = self.cpu;
        task.disk = self.disk;
        task.restart_policy = self.restart_policy;
        task.env = self.env;
        task.exposed_ports = self.exposed_ports;
        task.health_check = self.health_check;
        TaskEvent::new(self.state, task)
    }
}

/// Reads `path` as a `TaskSpec` TOML file and POSTs the resulting
/// `TaskEvent` to `manager_addr`'s `/tasks` endpoint.
pub async fn submit_task_file(manager_addr: &str, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let spec: TaskSpec =
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    let event = spec.into_event();

    let url = format!("http://{manager_addr}{}", crate::api::manager_endpoints::TASKS);
    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .json(&event)
        .send()
        .await
        .with_context(|| format!("sending task to manager at {manager_addr}"))?;

    if response.status() != reqwest::StatusCode::CREATED {
        anyhow::bail!(
            "manager rejected task submission with status {}",
            response.status()
        );
    }

    Ok(())
}

//! The task state machine and the two durable record types it governs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A task's position in its lifecycle. The transition relation in
/// [`is_valid_transition`] is the single source of truth for which moves are
/// legal; nothing else in this workspace re-implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum State {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Pending => "Pending",
            State::Scheduled => "Scheduled",
            State::Running => "Running",
            State::Completed => "Completed",
            State::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Total, side-effect-free predicate: is `from -> to` a legal move?
///
/// Consulted by the worker before it invokes the runtime and by the manager
/// before it forwards a `Completed` event. An unknown pair is simply not in
/// the table, which this match expresses directly rather than through a
/// lookup structure.
#[inline]
pub fn is_valid_transition(from: State, to: State) -> bool {
    use State::*;
    matches!(
        (from, to),
        (Pending, Scheduled)
            | (Scheduled, Scheduled)
            | (Scheduled, Running)
            | (Scheduled, Failed)
            | (Running, Running)
            | (Running, Completed)
            | (Running, Failed)
            | (Completed, Completed)
            | (Failed, Scheduled)
    )
}

/// The durable unit of work. Identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub state: State,
    pub image: String,
    /// Requested memory in bytes.
    pub memory: u64,
    /// Requested CPU in fractional cores.
    pub cpu: f64,
    /// Disk footprint in bytes, checked against a candidate node's free disk.
    pub disk: u64,
    pub restart_policy: String,
    pub env: Vec<String>,
    /// Container ports this task exposes, e.g. `"80/tcp"`.
    pub exposed_ports: Vec<String>,
    /// Host port bindings observed after start, keyed by container port.
    #[serde(default)]
    pub host_ports: HashMap<String, String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub finish_time: Option<chrono::DateTime<chrono::Utc>>,
    /// HTTP path checked against the task's first published host port.
    #[serde(default)]
    pub health_check: Option<String>,
    #[serde(default)]
    pub restart_count: u32,
    /// Name of the worker this task is scheduled on, empty until placed.
    #[serde(default)]
    pub scheduled_on: String,
}

impl Task {
    /// A freshly declared task, not yet placed anywhere.
    pub fn new(id: Uuid, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: State::Pending,
            image: image.into(),
            memory: 0,
            cpu: 0.0,
            disk: 0,
            restart_policy: "always".to_string(),
            env: Vec::new(),
            exposed_ports: Vec::new(),
            host_ports: HashMap::new(),
            container_id: None,
            start_time: None,
            finish_time: None,
            health_check: None,
            restart_count: 0,
            scheduled_on: String::new(),
        }
    }
}

/// A requested state transition. Identity is `id`; persisted for audit
/// regardless of whether the transition it requests is ultimately legal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub state: State,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub task: Task,
}

impl TaskEvent {
    pub fn new(state: State, task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            timestamp: chrono::Utc::now(),
            task,
        }
    }
}

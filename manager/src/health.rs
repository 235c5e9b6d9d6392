//! `doHealthChecks` (§4.5): restart unhealthy or failed tasks, bounded by
//! `RestartCount`.

use common::{State, Store, Task, TaskEvent};
use tracing::{info, warn};

use crate::client::ClientError;
use crate::state::ManagerState;

pub async fn health_check_tick(state: &ManagerState) {
    let tasks = match state.task_store.list() {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "failed to list tasks for health check");
            return;
        }
    };

    for task in tasks {
        if task.restart_count > common::defaults::default_max_restart_count() {
            continue;
        }

        match task.state {
            State::Running => {
                if !check_task_health(state, &task).await {
                    restart_task(state, task).await;
                }
            }
            State::Failed => {
                restart_task(state, task).await;
            }
            _ => {}
        }
    }
}

/// Returns `true` when the task's declared health check succeeds (or it
/// has none / no host port to check yet, in which case it's left alone).
async fn check_task_health(state: &ManagerState, task: &Task) -> bool {
    let Some(path) = task.health_check.as_ref() else {
        return true;
    };
    let Some(host_port) = common::utils::first_host_port(&task.host_ports) else {
        return true;
    };

    let nodes = state.nodes.lock().await;
    let Some(node) = nodes.iter().find(|n| n.name == task.scheduled_on) else {
        return true;
    };

    let host = node
        .base_url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split(':')
        .next()
        .unwrap_or("")
        .to_string();
    drop(nodes);

    let url = format!("http://{host}:{host_port}{path}");
    match state.client.health_check(&url).await {
        Ok(status) if status.is_success() => true,
        Ok(status) => {
            warn!(task_id = %task.id, %status, "health check returned non-success status");
            false
        }
        Err(e) => {
            warn!(task_id = %task.id, error = %e, "health check request failed");
            false
        }
    }
}

async fn restart_task(state: &ManagerState, mut task: Task) {
    let worker_name = task.scheduled_on.clone();
    let base_url = {
        let nodes = state.nodes.lock().await;
        nodes
            .iter()
            .find(|n| n.name == worker_name)
            .map(|n| n.base_url.clone())
    };
    let Some(base_url) = base_url else {
        warn!(task_id = %task.id, worker = %worker_name, "cannot restart task, worker unknown");
        return;
    };

    task.restart_count += 1;
    task.state = State::Scheduled;
    if let Err(e) = state.task_store.put(&task.id.to_string(), task.clone()) {
        warn!(task_id = %task.id, error = %e, "failed to persist task before restart");
        return;
    }

    info!(task_id = %task.id, restart_count = task.restart_count, "restarting task");
    // Target Scheduled, not Running: the worker only starts a container on
    // `run_tasks_tick`'s Scheduled arm (reconciler.rs), the same target the
    // initial dispatch and a Failed -> Scheduled reschedule both use.
    let event = TaskEvent::new(State::Scheduled, task.clone());
    match state.client.post_task(&base_url, &event).await {
        Ok(_) => {}
        Err(ClientError::Transport(msg)) => {
            warn!(task_id = %task.id, error = %msg, "network error restarting task, requeueing");
            state.pending.push(event);
        }
        Err(ClientError::Application { status, message }) => {
            warn!(task_id = %task.id, status, message, "worker rejected restart request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::placement::Placement;
    use crate::queue::PendingQueue;
    use crate::scheduler::RoundRobin;
    use common::store::MemoryStore;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;
    use uuid::Uuid;

    fn test_state(nodes: Vec<Node>) -> ManagerState {
        ManagerState {
            pending: Arc::new(PendingQueue::new()),
            task_store: Arc::new(MemoryStore::new()),
            event_store: Arc::new(MemoryStore::new()),
            placement: Arc::new(Placement::new()),
            nodes: Arc::new(AsyncMutex::new(nodes)),
            scheduler: Arc::new(RoundRobin::new()),
            client: crate::client::WorkerClient::new(),
            requeue_on_placement_error: false,
        }
    }

    #[tokio::test]
    async fn tasks_above_restart_threshold_are_skipped() {
        let state = test_state(vec![]);
        let mut task = Task::new(Uuid::new_v4(), "web", "busybox");
        task.state = State::Failed;
        task.restart_count = common::defaults::default_max_restart_count() + 1;
        state.task_store.put(&task.id.to_string(), task.clone()).unwrap();

        health_check_tick(&state).await;

        let stored = state.task_store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.restart_count, task.restart_count);
        assert_eq!(stored.state, State::Failed);
    }

    #[tokio::test]
    async fn failed_task_with_unknown_worker_is_not_mutated() {
        let state = test_state(vec![]);
        let mut task = Task::new(Uuid::new_v4(), "web", "busybox");
        task.state = State::Failed;
        task.scheduled_on = "ghost-worker".to_string();
        state.task_store.put(&task.id.to_string(), task.clone()).unwrap();

        health_check_tick(&state).await;

        let stored = state.task_store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.restart_count, 0);
        assert_eq!(stored.state, State::Failed);
    }

    #[tokio::test]
    async fn restart_targets_scheduled_not_running() {
        // Matches the worker's reconciler: `run_tasks_tick` only starts a
        // container on a Scheduled target, so a restart must request
        // Scheduled, not Running, or the worker silently no-ops it.
        let state = test_state(vec![Node::new("worker-1", "http://127.0.0.1:1")]);
        let mut task = Task::new(Uuid::new_v4(), "web", "busybox");
        task.state = State::Failed;
        task.scheduled_on = "worker-1".to_string();
        state.task_store.put(&task.id.to_string(), task.clone()).unwrap();

        health_check_tick(&state).await;

        let stored = state.task_store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.restart_count, 1);
        assert_eq!(stored.state, State::Scheduled);

        // The unreachable worker address makes the POST fail, so the event
        // is requeued; confirm its target state is what was actually sent.
        let requeued = state.pending.pop().unwrap();
        assert_eq!(requeued.state, State::Scheduled);
        assert_eq!(requeued.task.id, task.id);
    }
}

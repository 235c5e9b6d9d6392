//! `updateTasks` (§4.5): pulls each worker's task list and folds the
//! worker-observed fields back into the manager's own stored record.

use common::{Store, Task};
use tracing::warn;

use crate::state::ManagerState;

pub async fn update_tasks_tick(state: &ManagerState) {
    let nodes = state.nodes.lock().await.clone();

    for node in &nodes {
        let worker_tasks = match state.client.get_tasks(&node.base_url).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(worker = %node.name, error = %e, "failed to fetch tasks from worker, skipping");
                continue;
            }
        };

        for worker_task in worker_tasks {
            let key = worker_task.id.to_string();
            let Ok(Some(mut stored)) = state.task_store.get(&key) else {
                // Tasks unknown to the manager are skipped.
                continue;
            };

            copy_observed_fields(&mut stored, &worker_task);

            if let Err(e) = state.task_store.put(&key, stored) {
                warn!(task_id = %worker_task.id, error = %e, "failed to persist reconciled task");
            }
        }
    }
}

fn copy_observed_fields(into: &mut Task, from: &Task) {
    into.state = from.state;
    into.start_time = from.start_time;
    into.finish_time = from.finish_time;
    into.container_id = from.container_id.clone();
    into.host_ports = from.host_ports.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::State;
    use uuid::Uuid;

    #[test]
    fn copy_observed_fields_overwrites_the_tracked_fields() {
        let mut stored = Task::new(Uuid::new_v4(), "web", "busybox");
        let mut observed = stored.clone();
        observed.state = State::Running;
        observed.container_id = Some("abc123".to_string());

        copy_observed_fields(&mut stored, &observed);

        assert_eq!(stored.state, State::Running);
        assert_eq!(stored.container_id.as_deref(), Some("abc123"));
    }
}

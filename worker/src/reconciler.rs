//! The worker's two reconciliation loops (§4.3): `RunTasks` drains the run
//! queue against the container runtime, `UpdateTasks` reconciles stored
//! `Running` tasks against what the runtime actually reports.

use std::sync::Arc;

use chrono::Utc;
use common::task::is_valid_transition;
use common::{State, Store, Task};
use tracing::{error, info, warn};

use crate::queue::RunQueue;
use crate::runtime::{ContainerRuntime, ContainerStatus};

/// Dequeues at most one event and reconciles it. A no-op when the queue is
/// empty. Mirrors `manager.go`'s per-tick dequeue shape, just on the
/// worker side and against a container runtime instead of a scheduler.
pub async fn run_tasks_tick(
    queue: &RunQueue,
    store: &dyn Store<Task>,
    runtime: &dyn ContainerRuntime,
) {
    let Some(event) = queue.pop() else {
        return;
    };

    if let Err(e) = store.put(&event.task.id.to_string(), event.task.clone()) {
        error!(task_id = %event.task.id, error = %e, "failed to persist queued task");
        return;
    }

    let key = event.task.id.to_string();
    let stored = match store.get(&key) {
        Ok(Some(task)) => task,
        Ok(None) => {
            error!(task_id = %event.task.id, "task vanished from store immediately after persisting");
            return;
        }
        Err(e) => {
            error!(task_id = %event.task.id, error = %e, "failed to read back persisted task");
            return;
        }
    };

    let from = stored.state;
    let to = event.state;
    if !is_valid_transition(from, to) {
        error!(task_id = %event.task.id, %from, %to, "rejected invalid transition");
        return;
    }

    match to {
        State::Scheduled => {
            info!(task_id = %event.task.id, "starting task");
            let mut task = stored;
            match runtime.run(&task).await {
                Ok(result) => {
                    task.container_id = result.container_id;
                    task.state = State::Running;
                    task.start_time = Some(Utc::now());
                }
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "starting task failed");
                    task.state = State::Failed;
                }
            }
            if let Err(e) = store.put(&key, task) {
                error!(task_id = %event.task.id, error = %e, "failed to persist task after start attempt");
            }
        }
        State::Completed => {
            let mut task = stored;
            if let Some(container_id) = task.container_id.clone() {
                info!(task_id = %task.id, container_id = %container_id, "stopping task");
                if let Err(e) = runtime.stop(&container_id).await {
                    warn!(task_id = %task.id, error = %e, "stopping task failed, recording completion anyway");
                }
            }
            task.finish_time = Some(Utc::now());
            task.state = State::Completed;
            if let Err(e) = store.put(&key, task) {
                error!(task_id = %event.task.id, error = %e, "failed to persist task after stop attempt");
            }
        }
        other => {
            // The transition table permits self-loops on Running and
            // Completed and Failed -> Scheduled; none of those are things
            // RunTasks is asked to act on directly.
            warn!(task_id = %event.task.id, target = %other, "no reconciliation action defined for this target state");
        }
    }
}

/// Reconciles every stored `Running` task against the runtime's view of its
/// container (§4.3). Tasks in other states are left untouched.
pub async fn update_tasks_tick(store: &dyn Store<Task>, runtime: &dyn ContainerRuntime) {
    let tasks = match store.list() {
        Ok(tasks) => tasks,
        Err(e) => {
            error!(error = %e, "failed to list stored tasks for reconciliation");
            return;
        }
    };

    for mut task in tasks {
        if task.state != State::Running {
            continue;
        }

        let Some(container_id) = task.container_id.clone() else {
            continue;
        };

        match runtime.inspect(&container_id).await {
            Ok(inspected) => {
                match inspected.status {
                    None => {
                        warn!(task_id = %task.id, container_id = %container_id, "container no longer known to runtime");
                        task.state = State::Failed;
                    }
                    Some(ContainerStatus::Exited) => {
                        info!(task_id = %task.id, container_id = %container_id, "container exited, marking task failed");
                        task.state = State::Failed;
                    }
                    Some(ContainerStatus::Running) | Some(ContainerStatus::Other) => {
                        task.host_ports = inspected.host_ports;
                    }
                }
                if let Err(e) = store.put(&task.id.to_string(), task) {
                    error!(error = %e, "failed to persist reconciled task");
                }
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "inspect failed, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InspectResult, RuntimeError, RuntimeResult};
    use common::store::MemoryStore;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    struct FakeRuntime {
        run_result: StdMutex<Option<Result<RuntimeResult, RuntimeError>>>,
        inspect_result: StdMutex<Option<Result<InspectResult, RuntimeError>>>,
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn run(&self, _task: &Task) -> Result<RuntimeResult, RuntimeError> {
            self.run_result.lock().unwrap().take().unwrap()
        }
        async fn stop(&self, _container_id: &str) -> Result<RuntimeResult, RuntimeError> {
            Ok(RuntimeResult { container_id: None, action: "stop" })
        }
        async fn inspect(&self, _container_id: &str) -> Result<InspectResult, RuntimeError> {
            self.inspect_result.lock().unwrap().take().unwrap()
        }
    }

    fn new_task() -> Task {
        Task::new(Uuid::new_v4(), "web", "strm/helloworld-http")
    }

    #[tokio::test]
    async fn run_tasks_tick_starts_a_scheduled_task() {
        let queue = RunQueue::new();
        let store: MemoryStore<Task> = MemoryStore::new();
        let runtime = FakeRuntime {
            run_result: StdMutex::new(Some(Ok(RuntimeResult {
                container_id: Some("abc123".into()),
                action: "start",
            }))),
            inspect_result: StdMutex::new(None),
        };

        let mut task = new_task();
        task.state = State::Pending;
        store.put(&task.id.to_string(), task.clone()).unwrap();

        let event = common::TaskEvent::new(State::Scheduled, task.clone());
        queue.push(event);

        run_tasks_tick(&queue, &store, &runtime).await;

        let stored = store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.state, State::Running);
        assert_eq!(stored.container_id.as_deref(), Some("abc123"));
        assert!(stored.start_time.is_some());
    }

    #[tokio::test]
    async fn run_tasks_tick_marks_task_failed_on_runtime_error() {
        let queue = RunQueue::new();
        let store: MemoryStore<Task> = MemoryStore::new();
        let runtime = FakeRuntime {
            run_result: StdMutex::new(Some(Err(RuntimeError("no such image".into())))),
            inspect_result: StdMutex::new(None),
        };

        let mut task = new_task();
        task.state = State::Pending;
        store.put(&task.id.to_string(), task.clone()).unwrap();
        queue.push(common::TaskEvent::new(State::Scheduled, task.clone()));

        run_tasks_tick(&queue, &store, &runtime).await;

        let stored = store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.state, State::Failed);
    }

    #[tokio::test]
    async fn run_tasks_tick_rejects_invalid_transition() {
        let queue = RunQueue::new();
        let store: MemoryStore<Task> = MemoryStore::new();
        let runtime = FakeRuntime {
            run_result: StdMutex::new(None),
            inspect_result: StdMutex::new(None),
        };

        let mut task = new_task();
        task.state = State::Pending;
        store.put(&task.id.to_string(), task.clone()).unwrap();
        // Pending -> Running is not a legal move.
        queue.push(common::TaskEvent::new(State::Running, task.clone()));

        run_tasks_tick(&queue, &store, &runtime).await;

        let stored = store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.state, State::Pending);
    }

    #[tokio::test]
    async fn update_tasks_tick_marks_exited_container_failed() {
        let store: MemoryStore<Task> = MemoryStore::new();
        let runtime = FakeRuntime {
            run_result: StdMutex::new(None),
            inspect_result: StdMutex::new(Some(Ok(InspectResult {
                status: Some(ContainerStatus::Exited),
                host_ports: HashMap::new(),
            }))),
        };

        let mut task = new_task();
        task.state = State::Running;
        task.container_id = Some("abc123".into());
        store.put(&task.id.to_string(), task.clone()).unwrap();

        update_tasks_tick(&store, &runtime).await;

        let stored = store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.state, State::Failed);
    }

    #[tokio::test]
    async fn update_tasks_tick_copies_host_ports_for_running_container() {
        let store: MemoryStore<Task> = MemoryStore::new();
        let mut host_ports = HashMap::new();
        host_ports.insert("80/tcp".to_string(), "32768".to_string());
        let runtime = FakeRuntime {
            run_result: StdMutex::new(None),
            inspect_result: StdMutex::new(Some(Ok(InspectResult {
                status: Some(ContainerStatus::Running),
                host_ports: host_ports.clone(),
            }))),
        };

        let mut task = new_task();
        task.state = State::Running;
        task.container_id = Some("abc123".into());
        store.put(&task.id.to_string(), task.clone()).unwrap();

        update_tasks_tick(&store, &runtime).await;

        let stored = store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.state, State::Running);
        assert_eq!(stored.host_ports, host_ports);
    }

    #[tokio::test]
    async fn update_tasks_tick_leaves_non_running_tasks_alone() {
        let store: MemoryStore<Task> = MemoryStore::new();
        let runtime = FakeRuntime {
            run_result: StdMutex::new(None),
            inspect_result: StdMutex::new(None),
        };

        let mut task = new_task();
        task.state = State::Pending;
        store.put(&task.id.to_string(), task.clone()).unwrap();

        update_tasks_tick(&store, &runtime).await;

        let stored = store.get(&task.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.state, State::Pending);
    }
}

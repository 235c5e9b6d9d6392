//! `SendWork` (§4.5): the manager's dispatch loop. Six steps per tick,
//! grounded almost line-for-line on `manager.go`'s `SendWork`.

use common::task::is_valid_transition;
use common::{State, Store, Task, TaskEvent};
use tracing::{error, info, warn};

use crate::client::ClientError;
use crate::state::ManagerState;

pub async fn send_work_tick(state: &ManagerState) {
    let Some(event) = state.pending.pop() else {
        return;
    };

    // Step 2: persist the event in the event store. A failure here aborts
    // the cycle and the event is lost (§9 open question, resolved against
    // requeueing since the original has no retry path for this failure).
    if let Err(e) = state.event_store.put(&event.id.to_string(), event.clone()) {
        error!(event_id = %event.id, error = %e, "failed to persist dispatch event, dropping it");
        return;
    }

    // Step 3: an event for an already-placed task is a state-change
    // request, not a new placement.
    if let Some(worker) = state.placement.worker_for(event.task.id) {
        handle_existing_placement(state, &event, &worker).await;
        return;
    }

    // Step 4: new placement.
    let Some(picked) = state.scheduler.select_worker(&event.task, state.nodes.as_ref()).await else {
        warn!(task_id = %event.task.id, "no candidate node available, dropping placement");
        if state.requeue_on_placement_error {
            state.pending.push(event);
        }
        return;
    };

    // Step 5: record placement, mark Scheduled.
    state.placement.record(event.task.id, &picked.name);
    let mut task = event.task.clone();
    task.state = State::Scheduled;
    task.scheduled_on = picked.name.clone();
    if let Err(e) = state.task_store.put(&task.id.to_string(), task.clone()) {
        error!(task_id = %task.id, error = %e, "failed to persist newly placed task");
        return;
    }
    account_placement(state, &picked.name, &task).await;

    // Step 6/7: POST to the worker.
    let dispatch_event = TaskEvent::new(State::Scheduled, task.clone());
    match state.client.post_task(&picked.base_url, &dispatch_event).await {
        Ok(observed) => {
            info!(task_id = %task.id, worker = %picked.name, observed_state = %observed.state, "dispatched task");
        }
        Err(ClientError::Transport(msg)) => {
            warn!(task_id = %task.id, worker = %picked.name, error = %msg, "network error dispatching task, requeueing");
            state.pending.push(TaskEvent::new(State::Scheduled, task));
        }
        Err(ClientError::Application { status, message }) => {
            error!(task_id = %task.id, worker = %picked.name, status, message, "worker rejected dispatch, not requeueing");
        }
    }
}

async fn handle_existing_placement(state: &ManagerState, event: &TaskEvent, worker: &str) {
    let Ok(Some(stored)) = state.task_store.get(&event.task.id.to_string()) else {
        warn!(task_id = %event.task.id, "placement index has an entry with no matching stored task");
        return;
    };

    if event.state != State::Completed || !is_valid_transition(stored.state, State::Completed) {
        warn!(task_id = %event.task.id, from = %stored.state, to = %event.state, "invalid state-change request for placed task");
        return;
    }

    let base_url = {
        let nodes = state.nodes.lock().await;
        nodes
            .iter()
            .find(|n| n.name == worker)
            .map(|n| n.base_url.clone())
    };
    let Some(base_url) = base_url else {
        error!(task_id = %event.task.id, worker, "placement points at an unknown worker");
        return;
    };

    if let Err(e) = state.client.delete_task(&base_url, event.task.id).await {
        warn!(task_id = %event.task.id, worker, error = %e, "delete request to worker failed");
    }
}

/// Tracks a freshly placed task's resource request against its node (§3:
/// "allocated memory and disk (sum of placed tasks' requests)"). The
/// original never maintains this bookkeeping; kept here since the node's
/// own fields are otherwise always zero. Memory/disk are converted to KB
/// to match the unit `/stats` reports and `node.memory`/`node.disk` are
/// populated in, never reconciled back down on completion — consistent
/// with the placement index itself being append-only (§9).
async fn account_placement(state: &ManagerState, worker: &str, task: &Task) {
    let mut nodes = state.nodes.lock().await;
    if let Some(node) = nodes.iter_mut().find(|n| n.name == worker) {
        node.memory_allocated += task.memory / 1024;
        node.disk_allocated += task.disk / 1024;
        node.task_count += 1;
    }
}

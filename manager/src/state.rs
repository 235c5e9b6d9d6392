//! The manager's shared state (§4.5, §5): one value owning everything the
//! dispatch, reconcile, health and API layers all need a handle to.

use std::sync::Arc;

use common::{Store, Task, TaskEvent};
use tokio::sync::Mutex as AsyncMutex;

use crate::client::WorkerClient;
use crate::node::Node;
use crate::placement::Placement;
use crate::queue::PendingQueue;
use crate::scheduler::Scheduler;

pub struct ManagerState {
    pub pending: Arc<PendingQueue>,
    pub task_store: Arc<dyn Store<Task>>,
    pub event_store: Arc<dyn Store<TaskEvent>>,
    pub placement: Arc<Placement>,
    /// Protected by an async mutex since EPVM scoring awaits across the
    /// lock-held section (two sequential stats fetches per candidate).
    pub nodes: Arc<AsyncMutex<Vec<Node>>>,
    pub scheduler: Arc<dyn Scheduler>,
    pub client: WorkerClient,
    pub requeue_on_placement_error: bool,
}

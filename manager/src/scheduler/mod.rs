//! The scheduler pipeline (§4.4): `SelectCandidateNodes`, `Score`, `Pick`.
//! The only polymorphic seam in this workspace — two closed-set policies
//! behind one trait, dispatched dynamically off `Box<dyn Scheduler>`.

pub mod epvm;
pub mod roundrobin;

use std::collections::HashMap;

use async_trait::async_trait;
use common::Task;
use tokio::sync::Mutex as AsyncMutex;

use crate::node::Node;

pub use epvm::Epvm;
pub use roundrobin::RoundRobin;

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn select_candidate_nodes(&self, task: &Task, nodes: &[Node]) -> Vec<Node>;

    /// Scores each candidate. Takes the live node list (not just the
    /// candidate snapshot) because EPVM's stats sampling mutates a node's
    /// cached capacity as a side effect (`node.GetStats` in the original),
    /// and that write needs to land on the shared list the next dispatch
    /// round reads, not a throwaway clone.
    async fn score(
        &self,
        task: &Task,
        candidates: &[Node],
        live_nodes: &AsyncMutex<Vec<Node>>,
    ) -> HashMap<String, f64>;
    fn pick(&self, scores: &HashMap<String, f64>, candidates: &[Node]) -> Option<Node>;

    /// Runs the full pipeline. Kept off the trait's required methods so
    /// each policy only has to implement the three phases it actually
    /// differs on.
    async fn select_worker(&self, task: &Task, live_nodes: &AsyncMutex<Vec<Node>>) -> Option<Node> {
        let snapshot = live_nodes.lock().await.clone();
        let candidates = self.select_candidate_nodes(task, &snapshot).await;
        if candidates.is_empty() {
            return None;
        }
        let scores = self.score(task, &candidates, live_nodes).await;
        self.pick(&scores, &candidates)
    }
}

/// Builds the configured policy. Unknown names default to round-robin
/// per §4.4, matching `manager.go`'s constructor switch.
pub fn build(kind: common::config::SchedulerKind, client: crate::client::WorkerClient) -> Box<dyn Scheduler> {
    match kind {
        common::config::SchedulerKind::RoundRobin => Box::new(RoundRobin::new()),
        common::config::SchedulerKind::Epvm => Box::new(Epvm::new(client)),
    }
}

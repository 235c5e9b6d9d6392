//! Round-robin placement, grounded on `scheduler/roundrobin.go`. Accepts
//! every node as a candidate; the cursor lives on the instance and advances
//! once per `score` call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use common::Task;
use tokio::sync::Mutex as AsyncMutex;

use super::Scheduler;
use crate::node::Node;

pub struct RoundRobin {
    last_worker: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            last_worker: Mutex::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for RoundRobin {
    async fn select_candidate_nodes(&self, _task: &Task, nodes: &[Node]) -> Vec<Node> {
        nodes.to_vec()
    }

    async fn score(
        &self,
        _task: &Task,
        candidates: &[Node],
        _live_nodes: &AsyncMutex<Vec<Node>>,
    ) -> HashMap<String, f64> {
        let mut scores = HashMap::new();
        if candidates.is_empty() {
            return scores;
        }

        let mut last_worker = self.last_worker.lock().unwrap();
        let new_worker = (*last_worker + 1) % candidates.len();

        for (i, node) in candidates.iter().enumerate() {
            scores.insert(node.name.clone(), if i == new_worker { 0.1 } else { 1.0 });
        }

        *last_worker = new_worker;
        scores
    }

    fn pick(&self, scores: &HashMap<String, f64>, candidates: &[Node]) -> Option<Node> {
        let mut best: Option<&Node> = None;
        let mut best_score = f64::INFINITY;
        for node in candidates {
            let score = *scores.get(&node.name).unwrap_or(&f64::INFINITY);
            if score < best_score {
                best_score = score;
                best = Some(node);
            }
        }
        best.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<Node> {
        (0..n).map(|i| Node::new(format!("worker-{i}"), format!("http://127.0.0.1:{}", 5556 + i))).collect()
    }

    #[tokio::test]
    async fn six_picks_over_three_nodes_follow_the_expected_cycle() {
        let scheduler = RoundRobin::new();
        let nodes = nodes(3);
        let live = AsyncMutex::new(nodes.clone());
        let task = Task::new(uuid::Uuid::new_v4(), "web", "busybox");

        let mut picks = Vec::new();
        for _ in 0..6 {
            let picked = scheduler.select_worker(&task, &live).await.unwrap();
            let index = nodes.iter().position(|n| n.name == picked.name).unwrap();
            picks.push(index);
        }

        assert_eq!(picks, vec![1, 2, 0, 1, 2, 0]);
    }

    #[tokio::test]
    async fn ties_are_broken_by_input_order() {
        let scheduler = RoundRobin::new();
        // A single candidate is always both min and first.
        let live = AsyncMutex::new(nodes(1));
        let task = Task::new(uuid::Uuid::new_v4(), "web", "busybox");
        let picked = scheduler.select_worker(&task, &live).await.unwrap();
        assert_eq!(picked.name, "worker-0");
    }

    #[tokio::test]
    async fn empty_node_list_yields_no_pick() {
        let scheduler = RoundRobin::new();
        let live = AsyncMutex::new(Vec::new());
        let task = Task::new(uuid::Uuid::new_v4(), "web", "busybox");
        assert!(scheduler.select_worker(&task, &live).await.is_none());
    }
}

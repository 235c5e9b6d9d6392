//! Exponential-penalty scoring, grounded on `scheduler/epvm.go`. Candidates
//! are filtered by disk feasibility; scoring fetches each candidate's stats
//! twice, three seconds apart, to turn raw CPU tick counters into a usage
//! fraction the same way the original's `calculateCpuUsage` does.

use std::collections::HashMap;

use async_trait::async_trait;
use common::stats::CpuStats;
use common::Task;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use super::Scheduler;
use crate::client::WorkerClient;
use crate::node::Node;

/// Named `LIEB` in the original; kept as a local constant here rather than
/// a defaults-module entry since nothing else in this workspace uses it.
const L: f64 = 1.53960071783900203869;
const MAX_JOBS: f64 = 4.0;

pub struct Epvm {
    client: WorkerClient,
}

impl Epvm {
    pub fn new(client: WorkerClient) -> Self {
        Self { client }
    }
}

fn cpu_usage_fraction(s1: &CpuStats, s2: &CpuStats) -> f64 {
    let idle1 = s1.idle + s1.io_wait;
    let idle2 = s2.idle + s2.io_wait;
    let non_idle1 = s1.user + s1.nice + s1.system + s1.irq + s1.soft_irq + s1.steal;
    let non_idle2 = s2.user + s2.nice + s2.system + s2.irq + s2.soft_irq + s2.steal;

    let total1 = idle1 + non_idle1;
    let total2 = idle2 + non_idle2;

    let total = total2 as i64 - total1 as i64;
    let idle = idle2 as i64 - idle1 as i64;

    if total == 0 && idle == 0 {
        0.0
    } else {
        (total - idle) as f64 / total as f64
    }
}

/// Samples a candidate's `/stats` twice, three seconds apart, the same way
/// `calculateCpuUsage` does — and, since the original's `GetStats` call
/// also refreshes the node's memory/disk totals as a side effect, hands
/// back the second sample so `score` can use it for the memory terms too.
async fn calculate_cpu_usage(client: &WorkerClient, node: &Node) -> (f64, Option<common::Stats>) {
    let first = client.get_stats(&node.base_url).await;
    tokio::time::sleep(std::time::Duration::from_secs(
        common::defaults::default_epvm_sample_gap_seconds(),
    ))
    .await;
    let second = client.get_stats(&node.base_url).await;

    match (first, second) {
        (Ok(s1), Ok(s2)) => (cpu_usage_fraction(&s1.cpu, &s2.cpu), Some(s2)),
        _ => {
            warn!(node = %node.name, "failed to sample stats twice for EPVM scoring, assuming zero usage");
            (0.0, None)
        }
    }
}

/// Node disk capacity is tracked in KB (the unit `/stats` reports), while a
/// task's requested disk is declared in bytes (§3); convert before the
/// feasibility comparison the original makes directly in `checkDisk`.
fn checks_disk(task: &Task, disk_available_kb: u64) -> bool {
    task.disk / 1024 <= disk_available_kb
}

#[async_trait]
impl Scheduler for Epvm {
    async fn select_candidate_nodes(&self, task: &Task, nodes: &[Node]) -> Vec<Node> {
        nodes
            .iter()
            .filter(|node| checks_disk(task, node.disk_available()))
            .cloned()
            .collect()
    }

    async fn score(
        &self,
        task: &Task,
        candidates: &[Node],
        live_nodes: &AsyncMutex<Vec<Node>>,
    ) -> HashMap<String, f64> {
        let mut scores = HashMap::new();

        for node in candidates {
            let (cpu_usage, sample) = calculate_cpu_usage(&self.client, node).await;
            let cpu_load = cpu_usage / 2f64.powf(0.8);

            // Mirrors `node.GetStats`'s side effect in the original: the
            // second sample this tick refreshes the live node's cached
            // capacity for the next dispatch round's disk-feasibility
            // check, not just this round's cost formula.
            if let Some(stats) = &sample {
                let mut guard = live_nodes.lock().await;
                if let Some(live) = guard.iter_mut().find(|n| n.name == node.name) {
                    live.memory = stats.mem_total_kb;
                    live.disk = stats.disk_total_kb;
                    live.stats = Some(stats.clone());
                }
            }

            let (mem_used_kb, mem_total_kb) = sample
                .as_ref()
                .or(node.stats.as_ref())
                .map(|s| (s.mem_used_kb() as f64, s.mem_total_kb.max(1) as f64))
                .unwrap_or((0.0, node.memory.max(1) as f64));

            let memory_allocated = mem_used_kb + node.memory_allocated as f64;
            let memory_percent_allocated = memory_allocated / mem_total_kb;
            let projected_mem_percent =
                (memory_allocated + task.memory as f64 / 1000.0) / mem_total_kb;

            let task_count = node.task_count as f64;

            let mut mem_cost = L.powf(projected_mem_percent);
            mem_cost += L.powf((task_count + 1.0) / MAX_JOBS);
            mem_cost -= L.powf(memory_percent_allocated);
            mem_cost -= L.powf(task_count / MAX_JOBS);

            let mut cpu_cost = L.powf(cpu_load);
            cpu_cost += L.powf((task_count + 1.0) / MAX_JOBS);
            cpu_cost -= L.powf(cpu_load);
            cpu_cost -= L.powf(task_count / MAX_JOBS);

            scores.insert(node.name.clone(), mem_cost + cpu_cost);
        }

        scores
    }

    fn pick(&self, scores: &HashMap<String, f64>, candidates: &[Node]) -> Option<Node> {
        if candidates.is_empty() {
            return None;
        }
        let mut best = &candidates[0];
        let mut best_score = *scores.get(&best.name).unwrap_or(&f64::INFINITY);
        for node in &candidates[1..] {
            let score = *scores.get(&node.name).unwrap_or(&f64::INFINITY);
            if score < best_score {
                best_score = score;
                best = node;
            }
        }
        Some(best.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_feasibility_matches_checkdisk() {
        let task = Task {
            disk: 500 * 1024,
            ..Task::new(uuid::Uuid::new_v4(), "web", "busybox")
        };
        assert!(checks_disk(&task, 500));
        assert!(checks_disk(&task, 600));
        assert!(!checks_disk(&task, 499));
    }

    #[test]
    fn cpu_usage_fraction_of_all_busy_delta_is_one() {
        let s1 = CpuStats::default();
        let s2 = CpuStats {
            user: 100,
            ..Default::default()
        };
        assert_eq!(cpu_usage_fraction(&s1, &s2), 1.0);
    }

    #[test]
    fn cpu_usage_fraction_with_no_delta_is_zero() {
        let s1 = CpuStats::default();
        let s2 = CpuStats::default();
        assert_eq!(cpu_usage_fraction(&s1, &s2), 0.0);
    }

    #[test]
    fn higher_task_count_strictly_increases_score_for_identical_nodes() {
        let scores_low = {
            let tc = 1.0f64;
            let mem_cost = L.powf(0.3) + L.powf((tc + 1.0) / MAX_JOBS) - L.powf(0.3) - L.powf(tc / MAX_JOBS);
            let cpu_cost = L.powf(0.2) + L.powf((tc + 1.0) / MAX_JOBS) - L.powf(0.2) - L.powf(tc / MAX_JOBS);
            mem_cost + cpu_cost
        };
        let scores_high = {
            let tc = 3.0f64;
            let mem_cost = L.powf(0.3) + L.powf((tc + 1.0) / MAX_JOBS) - L.powf(0.3) - L.powf(tc / MAX_JOBS);
            let cpu_cost = L.powf(0.2) + L.powf((tc + 1.0) / MAX_JOBS) - L.powf(0.2) - L.powf(tc / MAX_JOBS);
            mem_cost + cpu_cost
        };
        assert!(scores_high > scores_low);
    }

    #[test]
    fn pick_returns_none_for_empty_candidates() {
        let epvm = Epvm::new(WorkerClient::new());
        let scores = HashMap::new();
        assert!(epvm.pick(&scores, &[]).is_none());
    }
}

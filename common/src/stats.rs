//! A worker's host-stats snapshot, kept neutral so neither the manager nor
//! the worker crate has to depend on the other's domain for this one type
//! (see the Design Notes on cyclic references).

use serde::{Deserialize, Serialize};

/// Raw cumulative CPU tick counters, read the same way `/proc/stat` reports
/// them: two snapshots 3 seconds apart turn into a usage fraction via the
/// idle/non-idle delta in `manager::scheduler::epvm::cpu_usage_fraction`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CpuStats {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub io_wait: u64,
    pub irq: u64,
    pub soft_irq: u64,
    pub steal: u64,
}

/// A worker's latest published host-stats snapshot, returned from `GET
/// /stats` and copied into the manager's `Node` on retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub mem_total_kb: u64,
    pub mem_available_kb: u64,
    pub disk_total_kb: u64,
    pub disk_free_kb: u64,
    pub cpu: CpuStats,
    pub load1: f64,
    pub task_count: usize,
}

impl Stats {
    /// Feeds EPVM's memory cost terms (`manager::scheduler::epvm::score`).
    pub fn mem_used_kb(&self) -> u64 {
        self.mem_total_kb.saturating_sub(self.mem_available_kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_round_trip() {
        let stats = Stats {
            mem_total_kb: 1024,
            mem_available_kb: 256,
            disk_total_kb: 2048,
            disk_free_kb: 1024,
            cpu: CpuStats::default(),
            load1: 0.5,
            task_count: 3,
        };
        let json = serde_json::to_string(&stats).unwrap();
        let decoded: Stats = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.mem_used_kb(), 768);
        assert_eq!(decoded.task_count, 3);
    }
}

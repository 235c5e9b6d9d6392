//! `CollectStats` (§4.3): samples the host once per tick and publishes the
//! result behind a shared lock for the `/stats` handler and the manager's
//! EPVM scorer to read.

use std::sync::Mutex;

use common::stats::CpuStats;
use common::{Stats, Store, Task};
use sysinfo::{Disks, System};
use tracing::warn;

/// Holds the worker's latest stats snapshot. Starts zero-valued; the first
/// `CollectStats` tick overwrites it.
#[derive(Default)]
pub struct StatsPublisher {
    latest: Mutex<Stats>,
}

impl StatsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Stats {
        self.latest.lock().unwrap().clone()
    }

    fn publish(&self, stats: Stats) {
        *self.latest.lock().unwrap() = stats;
    }
}

/// One sampling pass. Never fails outwardly — a sampling error yields a
/// zero-valued snapshot per §4.3, logged but not propagated, since the loop
/// that calls this must never exit.
pub fn sample(sys: &mut System, disks: &mut Disks, store: &dyn Store<Task>) -> Stats {
    sys.refresh_memory();
    disks.refresh(true);

    let task_count = match store.count() {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "failed to count stored tasks, reporting zero");
            0
        }
    };

    let (disk_total_kb, disk_free_kb) = disks
        .list()
        .first()
        .map(|disk| (disk.total_space() / 1024, disk.available_space() / 1024))
        .unwrap_or((0, 0));

    Stats {
        mem_total_kb: sys.total_memory() / 1024,
        mem_available_kb: sys.available_memory() / 1024,
        disk_total_kb,
        disk_free_kb,
        cpu: read_cpu_stats(),
        load1: System::load_average().one,
        task_count,
    }
}

/// Raw cumulative tick counters straight from `/proc/stat`'s `cpu ` line,
/// the same source `goprocinfo`'s `linux.ReadStat` reads in the original.
/// EPVM's scoring takes the delta between two samples a few seconds apart;
/// a percentage-based stand-in (total ticks always summing to a constant)
/// would make that delta zero and divide by it, so this reads the real
/// monotonically increasing counters rather than approximating them.
#[cfg(target_os = "linux")]
fn read_cpu_stats() -> CpuStats {
    match std::fs::read_to_string("/proc/stat") {
        Ok(contents) => parse_proc_stat(&contents).unwrap_or_else(|| {
            warn!("failed to parse /proc/stat, reporting zero cpu stats");
            CpuStats::default()
        }),
        Err(e) => {
            warn!(error = %e, "failed to read /proc/stat, reporting zero cpu stats");
            CpuStats::default()
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_stats() -> CpuStats {
    CpuStats::default()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_stat(contents: &str) -> Option<CpuStats> {
    let line = contents.lines().find(|l| l.starts_with("cpu "))?;
    let mut fields = line.split_whitespace().skip(1);
    Some(CpuStats {
        user: fields.next()?.parse().ok()?,
        nice: fields.next()?.parse().ok()?,
        system: fields.next()?.parse().ok()?,
        idle: fields.next()?.parse().ok()?,
        io_wait: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0),
        irq: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0),
        soft_irq: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0),
        steal: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0),
    })
}

/// Runs one sampling pass and publishes it. Split out from [`sample`] so
/// tests can call the pure part directly.
pub fn collect_and_publish(
    sys: &mut System,
    disks: &mut Disks,
    store: &dyn Store<Task>,
    publisher: &StatsPublisher,
) {
    let stats = sample(sys, disks, store);
    publisher.publish(stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryStore;

    #[test]
    fn publisher_starts_zero_valued() {
        let publisher = StatsPublisher::new();
        let stats = publisher.latest();
        assert_eq!(stats.task_count, 0);
        assert_eq!(stats.mem_total_kb, 0);
    }

    #[test]
    fn publish_overwrites_latest() {
        let publisher = StatsPublisher::new();
        publisher.publish(Stats {
            task_count: 5,
            ..Default::default()
        });
        assert_eq!(publisher.latest().task_count, 5);
    }

    #[test]
    fn sample_reports_store_count_as_task_count() {
        let store: MemoryStore<Task> = MemoryStore::new();
        store
            .put("1", Task::new(uuid::Uuid::new_v4(), "a", "busybox"))
            .unwrap();
        store
            .put("2", Task::new(uuid::Uuid::new_v4(), "b", "busybox"))
            .unwrap();

        let mut sys = System::new();
        let mut disks = Disks::new();
        let stats = sample(&mut sys, &mut disks, &store);
        assert_eq!(stats.task_count, 2);
    }

    #[test]
    fn parse_proc_stat_reads_the_aggregate_cpu_line() {
        let contents = "cpu  100 20 30 500 10 0 5 0 0 0\ncpu0 50 10 15 250 5 0 2 0 0 0\n";
        let cpu = parse_proc_stat(contents).unwrap();
        assert_eq!(cpu.user, 100);
        assert_eq!(cpu.nice, 20);
        assert_eq!(cpu.system, 30);
        assert_eq!(cpu.idle, 500);
        assert_eq!(cpu.io_wait, 10);
        assert_eq!(cpu.soft_irq, 5);
    }

    #[test]
    fn parse_proc_stat_rejects_missing_cpu_line() {
        assert!(parse_proc_stat("nothing here\n").is_none());
    }
}

//! Default values for the loop cadences and thresholds §4 and §5 name
//! literally. Centralized so the manager and worker `Config` types pull
//! from one place instead of repeating magic numbers.

/// Worker `RunTasks` loop interval, seconds.
pub fn default_run_tasks_interval() -> u64 {
    10
}

/// Worker `UpdateTasks` loop interval, seconds.
pub fn default_worker_update_tasks_interval() -> u64 {
    15
}

/// Worker `CollectStats` loop interval, seconds.
pub fn default_collect_stats_interval() -> u64 {
    15
}

/// Manager `ProcessTasks`/`SendWork` loop interval, seconds.
pub fn default_process_tasks_interval() -> u64 {
    10
}

/// Manager `updateTasks` reconcile loop interval, seconds.
pub fn default_manager_update_tasks_interval() -> u64 {
    15
}

/// Manager `doHealthChecks` loop interval, seconds.
pub fn default_health_check_interval() -> u64 {
    60
}

/// `RestartCount` threshold beyond which the health loop stops acting on a
/// task (§3 invariant: once it exceeds this, nothing restarts it again).
pub fn default_max_restart_count() -> u32 {
    3
}

/// Suggested HTTP call timeout between manager and worker (§5).
pub fn default_http_timeout_seconds() -> u64 {
    10
}

/// Gap between the two CPU tick samples EPVM's cost function takes (§4.4).
pub fn default_epvm_sample_gap_seconds() -> u64 {
    3
}

/// Whether a placement error requeues its event. Resolves the open
/// question in §9: default matches the original's drop-on-error behavior.
pub fn default_requeue_on_placement_error() -> bool {
    false
}

/// Default scheduler policy name when none is configured.
pub fn default_scheduler_name() -> String {
    "roundrobin".to_string()
}

/// Default store backend when none is configured.
pub fn default_store_kind() -> String {
    "memory".to_string()
}

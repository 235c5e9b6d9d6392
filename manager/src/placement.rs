//! The manager's placement index: task-UUID → worker name, and the reverse
//! worker → task-UUID list (§4.5). Both maps live behind one mutex, since
//! every composite operation ("check placement, then record it") needs to
//! happen atomically with respect to the other dispatch-loop readers.

use std::collections::HashMap;
use std::sync::Mutex;

use common::{Store, Task};
use uuid::Uuid;

#[derive(Default)]
struct Maps {
    task_to_worker: HashMap<Uuid, String>,
    worker_to_tasks: HashMap<String, Vec<Uuid>>,
}

pub struct Placement {
    maps: Mutex<Maps>,
}

impl Placement {
    pub fn new() -> Self {
        Self {
            maps: Mutex::new(Maps::default()),
        }
    }

    /// Rebuilds the index from the task store's `scheduled_on` field (§9
    /// Design Notes): a restarted manager must not carry a phantom-empty
    /// placement index while its store already has placed tasks.
    pub fn rebuild_from_store(store: &dyn Store<Task>) -> Self {
        let placement = Self::new();
        let tasks = store.list().unwrap_or_default();
        let mut maps = placement.maps.lock().unwrap();
        for task in tasks {
            if task.scheduled_on.is_empty() {
                continue;
            }
            maps.task_to_worker.insert(task.id, task.scheduled_on.clone());
            maps.worker_to_tasks.entry(task.scheduled_on).or_default().push(task.id);
        }
        drop(maps);
        placement
    }

    pub fn worker_for(&self, task_id: Uuid) -> Option<String> {
        self.maps.lock().unwrap().task_to_worker.get(&task_id).cloned()
    }

    pub fn is_placed(&self, task_id: Uuid) -> bool {
        self.maps.lock().unwrap().task_to_worker.contains_key(&task_id)
    }

    /// Records a new placement. The per-worker list is append-only (§9: the
    /// source never removes completed tasks from it).
    pub fn record(&self, task_id: Uuid, worker: &str) {
        let mut maps = self.maps.lock().unwrap();
        maps.task_to_worker.insert(task_id, worker.to_string());
        maps.worker_to_tasks.entry(worker.to_string()).or_default().push(task_id);
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::MemoryStore;
    use common::State;

    #[test]
    fn record_then_lookup_round_trips() {
        let placement = Placement::new();
        let id = Uuid::new_v4();
        assert!(!placement.is_placed(id));

        placement.record(id, "worker-1");
        assert_eq!(placement.worker_for(id).as_deref(), Some("worker-1"));
    }

    #[test]
    fn rebuild_from_store_only_indexes_scheduled_tasks() {
        let store: MemoryStore<Task> = MemoryStore::new();

        let mut placed = Task::new(Uuid::new_v4(), "placed", "busybox");
        placed.state = State::Running;
        placed.scheduled_on = "worker-2".to_string();
        store.put(&placed.id.to_string(), placed.clone()).unwrap();

        let unplaced = Task::new(Uuid::new_v4(), "unplaced", "busybox");
        store.put(&unplaced.id.to_string(), unplaced.clone()).unwrap();

        let placement = Placement::rebuild_from_store(&store);
        assert_eq!(placement.worker_for(placed.id).as_deref(), Some("worker-2"));
        assert!(!placement.is_placed(unplaced.id));
    }
}

//! A worker as the manager sees it: address, capacity, and the most recent
//! stats snapshot pulled from it. Mirrors `node/node.go`'s `Node` struct.

use common::Stats;

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// `http://host:port`, used directly as the base for every request this
    /// node's client sends.
    pub base_url: String,
    pub role: String,
    pub memory: u64,
    pub memory_allocated: u64,
    pub disk: u64,
    pub disk_allocated: u64,
    pub task_count: u32,
    /// Filled in by `updateTasks`'/EPVM's calls to this node's `/stats`.
    pub stats: Option<Stats>,
}

impl Node {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            role: "worker".to_string(),
            memory: 0,
            memory_allocated: 0,
            disk: 0,
            disk_allocated: 0,
            task_count: 0,
            stats: None,
        }
    }

    pub fn disk_available(&self) -> u64 {
        self.disk.saturating_sub(self.disk_allocated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_available_subtracts_allocated_from_total() {
        let mut node = Node::new("worker-1", "http://127.0.0.1:5556");
        node.disk = 1000;
        node.disk_allocated = 300;
        assert_eq!(node.disk_available(), 700);
    }

    #[test]
    fn disk_available_saturates_at_zero() {
        let mut node = Node::new("worker-1", "http://127.0.0.1:5556");
        node.disk = 100;
        node.disk_allocated = 500;
        assert_eq!(node.disk_available(), 0);
    }
}

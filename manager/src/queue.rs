//! The manager's pending event queue (§4.5): the same plain FIFO shape as
//! the worker's run queue, just holding events bound for dispatch instead
//! of for the container runtime.

use std::collections::VecDeque;
use std::sync::Mutex;

use common::TaskEvent;

#[derive(Default)]
pub struct PendingQueue {
    inner: Mutex<VecDeque<TaskEvent>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, event: TaskEvent) {
        self.inner.lock().unwrap().push_back(event);
    }

    pub fn pop(&self) -> Option<TaskEvent> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{State, Task};
    use uuid::Uuid;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = PendingQueue::new();
        let a = Task::new(Uuid::new_v4(), "a", "busybox");
        let b = Task::new(Uuid::new_v4(), "b", "busybox");
        queue.push(TaskEvent::new(State::Scheduled, a.clone()));
        queue.push(TaskEvent::new(State::Scheduled, b.clone()));

        assert_eq!(queue.pop().unwrap().task.name, "a");
        assert_eq!(queue.pop().unwrap().task.name, "b");
        assert!(queue.pop().is_none());
    }
}

//! Task queue.
//!
//! A plain FIFO shared by every worker. No async, no I/O, no tracing: the
//! engine wraps it in a lock and does the signalling.

mod types;

use std::collections::VecDeque;

use qmdown_core::download::TaskId;

pub use types::QueuedTask;

/// Pending tasks in enqueue order.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: VecDeque<QueuedTask>,
    next_id: u64,
}

impl TaskQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Hand out the next task identifier. Identifiers are never reused.
    pub const fn allocate_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a task at the back.
    pub fn push(&mut self, task: QueuedTask) {
        self.pending.push_back(task);
    }

    /// Take the oldest task.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        self.pending.pop_front()
    }

    /// Remove every pending task, oldest first.
    pub fn take_all(&mut self) -> Vec<QueuedTask> {
        self.pending.drain(..).collect()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if a task is still waiting.
    #[cfg(test)]
    pub fn contains(&self, id: TaskId) -> bool {
        self.pending.iter().any(|task| task.id == id)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn push(queue: &mut TaskQueue, name: &str) -> TaskId {
        let id = queue.allocate_id();
        let (task, _rx) = QueuedTask::new(id, format!("https://x/{name}"), PathBuf::from(name));
        queue.push(task);
        id
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        let a = push(&mut queue, "a");
        let b = push(&mut queue, "b");

        assert_eq!(queue.pop().unwrap().id, a);
        assert_eq!(queue.pop().unwrap().id, b);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_ids_are_unique_and_start_at_one() {
        let mut queue = TaskQueue::new();
        let first = queue.allocate_id();
        let second = queue.allocate_id();
        assert_eq!(first.get(), 1);
        assert_ne!(first, second);
    }

    #[test]
    fn test_take_all_empties_queue() {
        let mut queue = TaskQueue::new();
        let a = push(&mut queue, "a");
        push(&mut queue, "b");
        assert!(queue.contains(a));

        let taken = queue.take_all();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].id, a);
        assert!(queue.is_empty());
        assert!(!queue.contains(a));
    }

    #[test]
    fn test_queued_task_starts_pending() {
        let mut queue = TaskQueue::new();
        let id = queue.allocate_id();
        let (task, rx) = QueuedTask::new(id, "https://x/a", PathBuf::from("/tmp/a.mp3"));
        assert_eq!(task.snapshot(), *rx.borrow());
        assert_eq!(rx.borrow().attempt, 0);
        assert_eq!(queue.len(), 0);
    }
}

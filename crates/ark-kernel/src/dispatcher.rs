//! [`Dispatcher`] – priority queue of reasoning tasks.
//!
//! Ordering law: task A runs before task B iff `A.priority < B.priority`,
//! or the priorities are equal and A was created first.  Creation ties are
//! broken by scheduling order, so the queue is FIFO within a priority band.
//!
//! All state sits behind one mutex, so [`Dispatcher::schedule`] and
//! [`Dispatcher::next`] may be called concurrently from different call
//! sites without losing or duplicating tasks.
//!
//! # Example
//!
//! ```
//! use ark_kernel::dispatcher::Dispatcher;
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.schedule(json!("later"), 3);
//! let urgent = dispatcher.schedule(json!("now"), 1);
//!
//! let task = dispatcher.next().unwrap();
//! assert_eq!(task.task_id, urgent);
//! assert!(dispatcher.complete(&task.task_id, json!({ "ok": true })));
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Task types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Scheduled,
    /// Handed out by [`Dispatcher::next`].
    Dispatched,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTask {
    pub task_id: String,
    /// Lower = more urgent.
    pub priority: i32,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    seq: u64,
}

impl Eq for ReasoningTask {}

impl Ord for ReasoningTask {
    /// Reversed so the max-heap pops the most urgent, oldest task first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReasoningTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bookkeeping for a task that has not yet been completed, or has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStatus {
    pub queue_size: usize,
    pub active_count: usize,
    pub completed_count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DispatcherState {
    queue: BinaryHeap<ReasoningTask>,
    active: HashMap<String, TaskRecord>,
    completed: Vec<TaskRecord>,
    next_seq: u64,
}

#[derive(Default)]
pub struct Dispatcher {
    state: Mutex<DispatcherState>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DispatcherState> {
        // Plain collections only; recover from a poisoned lock.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue a task and return its id (`task_<uuid>`).
    pub fn schedule(&self, payload: Value, priority: i32) -> String {
        let task_id = format!("task_{}", Uuid::new_v4());
        let created_at = Utc::now();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(ReasoningTask {
            task_id: task_id.clone(),
            priority,
            payload,
            created_at,
            seq,
        });
        state.active.insert(
            task_id.clone(),
            TaskRecord {
                task_id: task_id.clone(),
                priority,
                status: TaskStatus::Scheduled,
                scheduled_at: created_at,
                completed_at: None,
                result: None,
            },
        );
        debug!(task_id = %task_id, priority, "reasoning task scheduled");
        task_id
    }

    /// Pop the most urgent task.  Non-blocking; `None` when empty.
    pub fn next(&self) -> Option<ReasoningTask> {
        let mut state = self.lock();
        let task = state.queue.pop()?;
        if let Some(record) = state.active.get_mut(&task.task_id) {
            record.status = TaskStatus::Dispatched;
        }
        Some(task)
    }

    /// Mark an active task completed.  Unknown or already completed ids are
    /// logged and ignored; returns whether anything changed.
    pub fn complete(&self, task_id: &str, result: Value) -> bool {
        let mut state = self.lock();
        let Some(mut record) = state.active.remove(task_id) else {
            warn!(task_id, "complete() called for unknown task; ignoring");
            return false;
        };
        // A task completed before it was dispatched must never be handed out.
        if record.status == TaskStatus::Scheduled {
            state.queue.retain(|t| t.task_id != task_id);
        }
        record.status = TaskStatus::Completed;
        record.completed_at = Some(Utc::now());
        record.result = Some(result);
        state.completed.push(record);
        true
    }

    /// Current record of a task, active or completed.
    pub fn record(&self, task_id: &str) -> Option<TaskRecord> {
        let state = self.lock();
        state
            .active
            .get(task_id)
            .or_else(|| state.completed.iter().find(|r| r.task_id == task_id))
            .cloned()
    }

    pub fn status(&self) -> DispatcherStatus {
        let state = self.lock();
        DispatcherStatus {
            queue_size: state.queue.len(),
            active_count: state.active.len(),
            completed_count: state.completed.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn tasks_pop_by_priority_then_fifo() {
        let dispatcher = Dispatcher::new();
        let p3 = dispatcher.schedule(json!("p3"), 3);
        let p1_first = dispatcher.schedule(json!("p1a"), 1);
        let p2 = dispatcher.schedule(json!("p2"), 2);
        let p1_second = dispatcher.schedule(json!("p1b"), 1);

        let order: Vec<String> = std::iter::from_fn(|| dispatcher.next())
            .map(|t| t.task_id)
            .collect();
        assert_eq!(order, vec![p1_first, p1_second, p2, p3]);
    }

    #[test]
    fn next_on_empty_queue_is_none() {
        assert!(Dispatcher::new().next().is_none());
    }

    #[test]
    fn task_ids_are_prefixed_and_unique() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.schedule(json!(null), 1);
        let b = dispatcher.schedule(json!(null), 1);
        assert!(a.starts_with("task_"));
        assert_ne!(a, b);
    }

    #[test]
    fn lifecycle_moves_from_scheduled_to_completed() {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.schedule(json!({ "type": "review" }), 1);
        assert_eq!(dispatcher.record(&id).unwrap().status, TaskStatus::Scheduled);

        let task = dispatcher.next().unwrap();
        assert_eq!(task.payload["type"], "review");
        assert_eq!(dispatcher.record(&id).unwrap().status, TaskStatus::Dispatched);

        assert!(dispatcher.complete(&id, json!("done")));
        let record = dispatcher.record(&id).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.result, Some(json!("done")));
        assert_eq!(
            dispatcher.status(),
            DispatcherStatus {
                queue_size: 0,
                active_count: 0,
                completed_count: 1
            }
        );
    }

    #[test]
    fn completing_unknown_or_finished_task_is_a_noop() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.complete("task_missing", json!(null)));
        let id = dispatcher.schedule(json!(null), 2);
        assert!(dispatcher.complete(&id, json!(1)));
        assert!(!dispatcher.complete(&id, json!(2)));
        assert_eq!(dispatcher.status().completed_count, 1);
    }

    #[test]
    fn completing_undispatched_task_removes_it_from_queue() {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.schedule(json!(null), 1);
        dispatcher.complete(&id, json!(null));
        assert!(dispatcher.next().is_none());
        assert_eq!(dispatcher.status().queue_size, 0);
    }

    #[test]
    fn concurrent_schedule_and_next_never_duplicate() {
        let dispatcher = Arc::new(Dispatcher::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let d = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        d.schedule(json!(i), (p + i) % 3);
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let d = Arc::clone(&dispatcher);
                std::thread::spawn(move || std::iter::from_fn(|| d.next()).map(|t| t.task_id).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in consumers {
            for id in handle.join().unwrap() {
                total += 1;
                assert!(seen.insert(id), "task handed out twice");
            }
        }
        assert_eq!(total, 200);
    }
}

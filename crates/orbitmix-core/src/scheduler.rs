//! Deferred one-shot tasks fired against the host clock.
//!
//! The control thread submits tasks with an absolute deadline in host time
//! and a key (an orbit index). Whoever drives the engine calls
//! [`Scheduler::run_due`] with the live clock; due tasks run in deadline
//! order. Tasks are expected to read the clock again themselves, since the
//! deadline may have passed by the time they run.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

type Task = Box<dyn FnOnce() + Send>;

struct Entry {
    id: TaskId,
    key: usize,
    deadline: f64,
    task: Task,
}

/// Single scheduling facility shared by every orbit.
#[derive(Default)]
pub struct Scheduler {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `task` to run once the clock reaches `deadline`.
    pub fn schedule<F>(&self, key: usize, deadline: f64, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push(Entry {
            id,
            key,
            deadline,
            task: Box::new(task),
        });
        id
    }

    /// Cancel a pending task. Returns `false` if it already ran or was cancelled.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    /// Cancel every pending task submitted under `key`.
    pub fn cancel_key(&self, key: usize) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.key != key);
        before - entries.len()
    }

    pub fn cancel_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn pending_for(&self, key: usize) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.key == key)
            .count()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<f64> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.deadline)
            .min_by(f64::total_cmp)
    }

    /// Run every task whose deadline is at or before `now`.
    ///
    /// Tasks run after the internal lock is released, so a task may submit
    /// further tasks. Returns the number of tasks run.
    pub fn run_due(&self, now: f64) -> usize {
        let mut due: Vec<Entry> = {
            let mut entries = self.entries.lock();
            let (due, pending): (Vec<Entry>, Vec<Entry>) =
                entries.drain(..).partition(|entry| entry.deadline <= now);
            *entries = pending;
            due
        };

        due.sort_by(|a, b| a.deadline.total_cmp(&b.deadline).then(a.id.cmp(&b.id)));

        let count = due.len();
        for entry in due {
            (entry.task)();
        }
        count
    }
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

//! Priority-ordered queue for the periodic low-latency scheduler.
//!
//! The queue keeps task handles sorted by priority (numerically lower
//! first, FIFO among equals). Each tick runs in two passes: tasks whose
//! start time has arrived are first marked `Pending`, then the pending set
//! is run in list order. The marking pass means a task scheduled from
//! inside another task's run body never executes in the same tick it was
//! scheduled.

use crate::schedule::{TaskArena, TaskId, TaskState};

/// Ordered ready list of one core's low-latency tasks.
#[derive(Debug, Default)]
pub struct LlQueue {
    slots: Vec<(TaskId, u16)>,
}

impl LlQueue {
    /// Insert `id` keeping priority order; equal priorities run FIFO.
    pub fn insert(&mut self, id: TaskId, priority: u16) {
        let at = self
            .slots
            .iter()
            .position(|(_, p)| *p > priority)
            .unwrap_or(self.slots.len());
        self.slots.insert(at, (id, priority));
    }

    /// Remove `id` from the list; no-op when absent.
    pub fn remove(&mut self, id: TaskId) {
        self.slots.retain(|(t, _)| *t != id);
    }

    /// Whether `id` is on the list.
    pub fn contains(&self, id: TaskId) -> bool {
        self.slots.iter().any(|(t, _)| *t == id)
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Task handles in run order.
    pub fn order(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.slots.iter().map(|(t, _)| *t)
    }

    /// Mark every queued task whose start time has arrived as pending.
    ///
    /// Returns the handles marked, in run order.
    pub fn mark_pending(&self, tasks: &mut TaskArena, now: u64) -> Vec<TaskId> {
        let mut due = Vec::new();
        for &(id, _) in &self.slots {
            if let Some(task) = tasks.get_mut(id.index()).and_then(Option::as_mut) {
                if task.state == TaskState::Queued && task.start <= now {
                    task.state = TaskState::Pending;
                    due.push(id);
                }
            }
        }
        due
    }
}

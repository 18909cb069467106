//! Earliest-deadline-first queue for lower-frequency work.
//!
//! One task is selected per wake-up. A task whose deadline has already
//! passed wins immediately, first found in list order; otherwise the
//! numerically lowest priority wins, tie-broken by the smallest remaining
//! time to deadline. Deadline-tolerant tasks live on a separate idle list
//! and are only considered when the main list yields nothing. A wake-up
//! with nothing runnable at all is a scheduling defect and panics.

use crate::schedule::{TaskArena, TaskId, TaskState};

/// Deadline-ordered ready set of one core's EDF tasks.
#[derive(Debug, Default)]
pub struct EdfQueue {
    list: Vec<TaskId>,
    idle_list: Vec<TaskId>,
}

impl EdfQueue {
    /// Add `id` to the ready set, on the idle list when `idle`.
    pub fn insert(&mut self, id: TaskId, idle: bool) {
        if idle {
            self.idle_list.push(id);
        } else {
            self.list.push(id);
        }
    }

    /// Remove `id` from whichever list holds it; no-op when absent.
    pub fn remove(&mut self, id: TaskId) {
        self.list.retain(|t| *t != id);
        self.idle_list.retain(|t| *t != id);
    }

    /// Whether `id` is in the ready set.
    pub fn contains(&self, id: TaskId) -> bool {
        self.list.contains(&id) || self.idle_list.contains(&id)
    }

    /// Whether both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty() && self.idle_list.is_empty()
    }

    /// Pick the task to run at `now`.
    ///
    /// Panics when neither list holds a runnable task; a wake-up must never
    /// fire against an empty ready set.
    pub fn select(&self, tasks: &TaskArena, now: u64) -> TaskId {
        self.scan(&self.list, tasks, now)
            .or_else(|| self.scan(&self.idle_list, tasks, now))
            .unwrap_or_else(|| panic!("deadline scheduler woke with no runnable task"))
    }

    fn scan(&self, list: &[TaskId], tasks: &TaskArena, now: u64) -> Option<TaskId> {
        let mut best: Option<(TaskId, u16, u64)> = None;
        for &id in list {
            let task = match tasks.get(id.index()).and_then(Option::as_ref) {
                Some(t) => t,
                None => continue,
            };
            if !matches!(
                task.state,
                TaskState::Queued | TaskState::Pending | TaskState::Running
            ) {
                continue;
            }
            // expired and not deadline-tolerant: first found wins outright
            if task.deadline() <= now && !task.idle {
                return Some(id);
            }
            let remaining = task.deadline().saturating_sub(now);
            let better = match best {
                None => true,
                Some((_, p, r)) => task.priority < p || (task.priority == p && remaining < r),
            };
            if better {
                best = Some((id, task.priority, remaining));
            }
        }
        best.map(|(id, _, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{SchedulerKind, Task, TaskJob};

    fn task(priority: u16, start: u64, period: u64) -> Task {
        let mut t = Task::new(SchedulerKind::Edf, 0, priority, period, TaskJob::IdcDispatch);
        t.start = start;
        t.state = TaskState::Queued;
        t
    }

    fn arena(specs: &[(u16, u64, u64)]) -> TaskArena {
        specs.iter().map(|&(p, s, d)| Some(task(p, s, d))).collect()
    }

    fn queue(n: usize) -> EdfQueue {
        let mut q = EdfQueue::default();
        for i in 0..n {
            q.insert(TaskId(i as u32), false);
        }
        q
    }

    #[test]
    fn test_lowest_priority_value_wins() {
        let tasks = arena(&[(5, 0, 100), (2, 0, 100), (9, 0, 100)]);
        assert_eq!(queue(3).select(&tasks, 0), TaskId(1));
    }

    #[test]
    fn test_equal_priority_tie_breaks_on_time_to_deadline() {
        // same priority, deadlines 80 and 50
        let tasks = arena(&[(3, 0, 80), (3, 0, 50)]);
        assert_eq!(queue(2).select(&tasks, 10), TaskId(1));
    }

    #[test]
    fn test_expired_deadline_preempts_priority_first_found() {
        // task 1 has expired (deadline 5 <= now 10) despite a worse priority
        let tasks = arena(&[(0, 0, 100), (8, 0, 5), (8, 0, 3)]);
        assert_eq!(queue(3).select(&tasks, 10), TaskId(1));
    }

    #[test]
    fn test_idle_task_only_runs_when_list_empty() {
        let tasks = arena(&[(1, 0, 100), (0, 0, 100)]);
        let mut q = EdfQueue::default();
        q.insert(TaskId(0), true);
        q.insert(TaskId(1), false);
        assert_eq!(q.select(&tasks, 0), TaskId(1));
        q.remove(TaskId(1));
        assert_eq!(q.select(&tasks, 0), TaskId(0));
    }

    #[test]
    fn test_completed_tasks_are_skipped() {
        let mut tasks = arena(&[(0, 0, 10), (7, 0, 10)]);
        tasks[0].as_mut().unwrap().state = TaskState::Completed;
        assert_eq!(queue(2).select(&tasks, 0), TaskId(1));
    }

    #[test]
    #[should_panic(expected = "no runnable task")]
    fn test_empty_wakeup_panics() {
        let tasks: TaskArena = Vec::new();
        queue(0).select(&tasks, 0);
    }
}

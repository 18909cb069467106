//! Task model and per-core schedulers.
//!
//! Two schedulers share one [`Task`] type. The low-latency scheduler
//! ([`ll::LlQueue`]) runs strictly periodic audio work in priority order on
//! every timer tick; the deadline scheduler ([`edf::EdfQueue`]) picks one
//! task per wake-up for lower-frequency work such as cross-core command
//! completion. Each core owns one [`CoreRegistry`] holding both queues;
//! registries are constructed at startup and passed explicitly, never
//! reached through globals.
//!
//! Tasks live in an arena owned by the engine; the queues store handles
//! and consult the arena for state, priority and timing.

pub mod edf;
pub mod ll;

pub use edf::EdfQueue;
pub use ll::LlQueue;

use crate::component::ComponentId;
use crate::pipeline::PipelineId;

/// Arena handle for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Arena the engine keeps its tasks in.
pub(crate) type TaskArena = Vec<Option<Task>>;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Created, not yet scheduled.
    #[default]
    Init,
    /// Scheduled, waiting for its start time.
    Queued,
    /// Due this tick, not yet run.
    Pending,
    /// Run body executing, or rescheduled for another pass.
    Running,
    /// Finished; will be removed from its queue.
    Completed,
    /// Removed before running.
    Cancelled,
    /// Released, slot reusable.
    Free,
}

/// Which scheduler a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Periodic low-latency scheduler.
    Ll,
    /// Earliest-deadline-first scheduler.
    Edf,
}

/// What a task's run body decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRun {
    /// Done; remove from the queue.
    Completed,
    /// Run again one period later.
    Reschedule,
}

/// Work bound to a task.
pub enum TaskJob {
    /// Periodic pipeline servicing: triggers, copy, recovery.
    Pipeline(PipelineId),
    /// One component's copy entry point, scheduled on its own.
    ComponentCopy(ComponentId),
    /// Dispatch the message sitting in this core's receive slot.
    IdcDispatch,
    /// Arbitrary closure, for exercising the schedulers.
    Callback(Box<dyn FnMut() -> TaskRun + Send>),
}

impl std::fmt::Debug for TaskJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskJob::Pipeline(id) => f.debug_tuple("Pipeline").field(id).finish(),
            TaskJob::ComponentCopy(id) => f.debug_tuple("ComponentCopy").field(id).finish(),
            TaskJob::IdcDispatch => f.write_str("IdcDispatch"),
            TaskJob::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// A unit of periodic or one-shot scheduled work.
pub struct Task {
    /// Lifecycle state.
    pub state: TaskState,
    /// Owning scheduler.
    pub kind: SchedulerKind,
    /// Core the task runs on.
    pub core: usize,
    /// Urgency; numerically lower runs first.
    pub priority: u16,
    /// Absolute tick of the next run.
    pub start: u64,
    /// Ticks between runs.
    pub period: u64,
    /// Deadline-tolerant: may sit past its deadline without preempting.
    pub idle: bool,
    /// Run body; taken out while it executes.
    pub(crate) job: Option<TaskJob>,
    /// Invoked once when the run body returns [`TaskRun::Completed`].
    pub(crate) on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("core", &self.core)
            .field("priority", &self.priority)
            .field("start", &self.start)
            .field("period", &self.period)
            .field("idle", &self.idle)
            .field("job", &self.job)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Create an unscheduled task.
    pub fn new(kind: SchedulerKind, core: usize, priority: u16, period: u64, job: TaskJob) -> Self {
        Self {
            state: TaskState::Init,
            kind,
            core,
            priority,
            start: 0,
            period,
            idle: false,
            job: Some(job),
            on_complete: None,
        }
    }

    /// Attach a hook that fires when the task completes.
    pub fn with_completion(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Absolute deadline of the current run.
    pub fn deadline(&self) -> u64 {
        self.start + self.period
    }

    pub(crate) fn take_job(&mut self) -> Option<TaskJob> {
        self.job.take()
    }

    pub(crate) fn put_job(&mut self, job: TaskJob) {
        self.job = Some(job);
    }
}

/// Scheduler state owned by one core.
#[derive(Debug, Default)]
pub struct CoreRegistry {
    /// Periodic low-latency queue.
    pub ll: LlQueue,
    /// Deadline queue.
    pub edf: EdfQueue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_is_start_plus_period() {
        let mut t = Task::new(SchedulerKind::Edf, 0, 1, 10, TaskJob::IdcDispatch);
        t.start = 42;
        assert_eq!(t.deadline(), 52);
    }

    #[test]
    fn test_job_take_put_roundtrip() {
        let mut t = Task::new(SchedulerKind::Ll, 0, 0, 1, TaskJob::IdcDispatch);
        let job = t.take_job().unwrap();
        assert!(t.take_job().is_none());
        t.put_job(job);
        assert!(matches!(t.job, Some(TaskJob::IdcDispatch)));
    }
}

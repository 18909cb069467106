//! Pipelines: scheduled groups of connected components.
//!
//! A [`Pipeline`] owns the scheduling view of a connected subgraph: its
//! period, core, time domain and the periodic task servicing it. The graph
//! itself (components, buffers, walks) lives in [`graph`]; command
//! propagation in [`trigger`]; the periodic service body in [`task`].

pub mod graph;
pub mod task;
pub mod trigger;

pub use graph::{Graph, WalkDir, WalkStatus};
pub use trigger::TriggerStatus;

use crate::component::{ComponentId, ComponentState, TriggerCommand};
use crate::schedule::TaskId;

/// Arena handle for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub(crate) u32);

impl PipelineId {
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// What clocks a pipeline's periodic work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDomain {
    /// Platform timer tick; triggers are staged through the task.
    Timer,
    /// DMA completion; triggers apply immediately.
    Dma,
}

/// A trigger accepted but not yet carried out by the pipeline task.
///
/// While `cmd` is set the pipeline's task is guaranteed to be scheduled to
/// run at least once more; the task is the only place the command is
/// consumed.
#[derive(Debug, Default)]
pub struct PendingTrigger {
    /// Staged command, `None` when idle.
    pub cmd: Option<TriggerCommand>,
    /// Ticks still to wait before the final stage runs.
    pub delay: u32,
    /// Whether the initiator is owed a reply for this command.
    pub host: bool,
    /// Set when a later command superseded this one mid-stage.
    pub aborted: bool,
}

/// Parameters for creating a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    /// Host-visible identifier, unique among live pipelines.
    pub id: u32,
    /// Scheduling priority; numerically lower runs first.
    pub priority: u16,
    /// Core the pipeline's task runs on.
    pub core: usize,
    /// Scheduling period in microseconds.
    pub period_us: u64,
    /// Clock source of the periodic work.
    pub time_domain: TimeDomain,
}

/// The scheduling view of one connected subgraph.
#[derive(Debug)]
pub struct Pipeline {
    /// Host-visible identifier.
    pub id: u32,
    /// Scheduling priority.
    pub priority: u16,
    /// Home core.
    pub core: usize,
    /// Scheduling period in microseconds.
    pub period_us: u64,
    /// Clock source.
    pub time_domain: TimeDomain,
    /// Component whose state the pipeline status mirrors.
    pub scheduling: Option<ComponentId>,
    /// Most upstream component of the subgraph.
    pub source: Option<ComponentId>,
    /// Most downstream component of the subgraph.
    pub sink: Option<ComponentId>,
    /// Periodic service task, created when the graph is completed.
    pub task: Option<TaskId>,
    /// Mirror of the scheduling component's state.
    pub status: ComponentState,
    /// Staged trigger, consumed by the service task.
    pub trigger: PendingTrigger,
    /// Non-zero while an underrun/overrun awaits recovery.
    pub xrun_bytes: u32,
    /// Set once the graph has been walked and tasks created.
    pub complete: bool,
}

impl Pipeline {
    /// Create an empty pipeline from `desc`.
    pub fn new(desc: &PipelineDesc) -> Self {
        Self {
            id: desc.id,
            priority: desc.priority,
            core: desc.core,
            period_us: desc.period_us,
            time_domain: desc.time_domain,
            scheduling: None,
            source: None,
            sink: None,
            task: None,
            status: ComponentState::Init,
            trigger: PendingTrigger::default(),
            xrun_bytes: 0,
            complete: false,
        }
    }

    /// Whether the pipeline's work is clocked by the platform timer.
    pub fn is_timer_driven(&self) -> bool {
        self.time_domain == TimeDomain::Timer
    }

    /// Whether the pipeline currently streams or is about to.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ComponentState::Active | ComponentState::PreActive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> PipelineDesc {
        PipelineDesc {
            id: 1,
            priority: 0,
            core: 0,
            period_us: 1000,
            time_domain: TimeDomain::Timer,
        }
    }

    #[test]
    fn test_new_pipeline_is_incomplete_and_idle() {
        let p = Pipeline::new(&desc());
        assert!(!p.complete);
        assert!(p.trigger.cmd.is_none());
        assert_eq!(p.status, ComponentState::Init);
        assert!(!p.is_active());
    }

    #[test]
    fn test_time_domain_predicate() {
        let mut d = desc();
        assert!(Pipeline::new(&d).is_timer_driven());
        d.time_domain = TimeDomain::Dma;
        assert!(!Pipeline::new(&d).is_timer_driven());
    }
}

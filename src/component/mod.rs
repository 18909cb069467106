//! Processing nodes: state machine, operations table and graph endpoints.
//!
//! A [`Component`] is one node of the processing graph. It owns its trigger
//! state, its lists of input and output buffers, and a boxed
//! [`ComponentOps`] implementation supplying the node's prepare/copy/reset
//! behavior. State transitions themselves live in [`trigger`], as a pure
//! function over the commanded transition and the joint state of sibling
//! sources and sinks.

mod ops;
mod trigger;

pub use ops::{
    ComponentOps, DaiOps, HostOps, MixerOps, PassthroughOps, ProcessContext,
};
pub use trigger::{evaluate, TriggerOutcome};

use smallvec::SmallVec;

use crate::buffer::BufferId;
use crate::error::Result;
use crate::pipeline::PipelineId;

/// Arena handle for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentState {
    /// Created, not yet initialized into a pipeline.
    #[default]
    Init,
    /// Initialized and idle.
    Ready,
    /// Parameters negotiated, buffers sized.
    Prepare,
    /// First trigger stage done, awaiting the final stage.
    PreActive,
    /// Streaming.
    Active,
    /// Streaming suspended, state retained.
    Paused,
    /// Powered down, state retained.
    Suspend,
}

/// Command delivered through the trigger walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    /// Return to `Ready`, dropping negotiated parameters.
    Reset,
    /// Negotiate parameters and size buffers.
    Prepare,
    /// First stage of starting a stream.
    PreStart,
    /// Final stage of starting a stream.
    Start,
    /// Final stage of resuming a paused stream.
    Release,
    /// First stage of resuming a paused stream.
    PreRelease,
    /// Suspend streaming, retain position.
    Pause,
    /// Halt streaming, drop position.
    Stop,
    /// Underrun/overrun recovery: force back to `Ready`.
    Xrun,
}

/// Data flow direction of the stream a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Host to peripheral.
    #[default]
    Playback,
    /// Peripheral to host.
    Capture,
}

/// Parameters for creating a component.
pub struct ComponentDesc {
    /// Host-visible identifier, unique among live components.
    pub id: u32,
    /// Host id of the pipeline this component is declared into.
    pub pipeline: u32,
    /// Stream direction.
    pub direction: Direction,
    /// Home core.
    pub core: usize,
    /// Processing implementation.
    pub ops: Box<dyn ComponentOps>,
}

/// One node of the processing graph.
pub struct Component {
    /// Host-visible identifier.
    pub id: u32,
    /// Current lifecycle state.
    pub state: ComponentState,
    /// Stream direction.
    pub direction: Direction,
    /// Home core.
    pub core: usize,
    /// Host id of the pipeline this component was declared into.
    pub pipeline_id: u32,
    /// Owning pipeline, set when that pipeline is completed.
    pub pipeline: Option<PipelineId>,
    /// Scheduling period in microseconds, inherited from the pipeline.
    pub period: u64,
    /// Buffers this component consumes from.
    pub inputs: SmallVec<[BufferId; 4]>,
    /// Buffers this component produces into.
    pub outputs: SmallVec<[BufferId; 4]>,
    /// Processing implementation; taken out while its entry points run.
    pub(crate) ops: Option<Box<dyn ComponentOps>>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("direction", &self.direction)
            .field("core", &self.core)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Component {
    /// Create a component from `desc` in the `Init` state.
    pub fn new(desc: ComponentDesc) -> Self {
        Self {
            id: desc.id,
            state: ComponentState::Init,
            direction: desc.direction,
            core: desc.core,
            pipeline_id: desc.pipeline,
            pipeline: None,
            period: 0,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            ops: Some(desc.ops),
        }
    }

    /// Whether this node has more than one source feeding it.
    pub fn is_fan_in(&self) -> bool {
        self.inputs.len() > 1
    }

    /// Whether this node feeds more than one sink.
    pub fn is_fan_out(&self) -> bool {
        self.outputs.len() > 1
    }

    /// Apply `cmd` to this component's state.
    ///
    /// `sources` and `sinks` are the current states of the components on the
    /// far side of this node's input and output buffers; fan-in/fan-out
    /// joint rules consult them. Returns the outcome the walk should act on.
    pub fn apply_trigger(
        &mut self,
        cmd: TriggerCommand,
        sources: &[ComponentState],
        sinks: &[ComponentState],
    ) -> Result<TriggerOutcome> {
        let (next, outcome) = evaluate(self.state, cmd, sources, sinks)?;
        if next != self.state {
            tracing::debug!(
                component = self.id,
                from = ?self.state,
                to = ?next,
                ?cmd,
                "state transition"
            );
        }
        self.state = next;
        Ok(outcome)
    }

    /// Take the operations table out for a call; pair with [`Self::put_ops`].
    pub(crate) fn take_ops(&mut self) -> Option<Box<dyn ComponentOps>> {
        self.ops.take()
    }

    /// Return the operations table after a call.
    pub(crate) fn put_ops(&mut self, ops: Box<dyn ComponentOps>) {
        self.ops = Some(ops);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(id: u32) -> Component {
        Component::new(ComponentDesc {
            id,
            pipeline: 1,
            direction: Direction::Playback,
            core: 0,
            ops: Box::new(PassthroughOps::default()),
        })
    }

    #[test]
    fn test_new_component_starts_in_init() {
        let c = comp(1);
        assert_eq!(c.state, ComponentState::Init);
        assert!(!c.is_fan_in());
        assert!(!c.is_fan_out());
    }

    #[test]
    fn test_apply_trigger_walks_the_lifecycle() {
        let mut c = comp(2);
        c.state = ComponentState::Ready;
        for cmd in [
            TriggerCommand::Prepare,
            TriggerCommand::PreStart,
            TriggerCommand::Start,
            TriggerCommand::Pause,
            TriggerCommand::PreRelease,
            TriggerCommand::Release,
            TriggerCommand::Stop,
        ] {
            c.apply_trigger(cmd, &[], &[]).unwrap();
        }
        assert_eq!(c.state, ComponentState::Prepare);
    }

    #[test]
    fn test_invalid_transition_is_rejected_and_state_kept() {
        let mut c = comp(3);
        c.state = ComponentState::Ready;
        assert!(c.apply_trigger(TriggerCommand::Start, &[], &[]).is_err());
        assert_eq!(c.state, ComponentState::Ready);
    }
}

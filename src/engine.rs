//! The engine: arenas, per-core schedulers and the host-facing API.
//!
//! One [`Engine`] owns everything the firmware core of a DSP would hold in
//! globals: the component/buffer graph, the pipeline arena, the task arena,
//! one scheduler registry per core and the cross-core mailbox bus. All of
//! it is constructed at startup and reached through the engine, never
//! through statics, so several engines can coexist in one process.
//!
//! The external topology collaborator drives the engine by host-visible
//! numeric ids: create components and buffers, connect them, build and
//! complete pipelines, then trigger. Time is advanced explicitly with
//! [`Engine::tick`]; each tick services one core's periodic queue.

use std::collections::{HashMap, VecDeque};

use crate::buffer::{BufferDesc, BufferId};
use crate::component::{ComponentDesc, ComponentId, ComponentState, TriggerCommand};
use crate::error::{Error, Result};
use crate::idc::{ComponentAction, IdcBus, IdcMessage};
use crate::pipeline::graph::{Graph, RemoteHooks};
use crate::pipeline::{trigger, Pipeline, PipelineDesc, PipelineId, TriggerStatus};
use crate::schedule::{
    CoreRegistry, SchedulerKind, Task, TaskArena, TaskId, TaskJob, TaskRun, TaskState,
};

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of cores; core 0 is the primary.
    pub cores: usize,
    /// Microseconds one [`Engine::tick`] advances the clock by.
    pub tick_us: u64,
    /// Ticks a blocking cross-core send waits before giving up.
    pub idc_timeout_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cores: 1,
            tick_us: 1000,
            idc_timeout_ticks: 100,
        }
    }
}

impl EngineConfig {
    /// Default configuration: one core, 1 ms ticks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the core count.
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    /// Set the tick length in microseconds.
    pub fn with_tick_us(mut self, tick_us: u64) -> Self {
        self.tick_us = tick_us;
        self
    }

    /// Set the blocking-send timeout budget in ticks.
    pub fn with_idc_timeout_ticks(mut self, ticks: u32) -> Self {
        self.idc_timeout_ticks = ticks;
        self
    }
}

/// Completion report for a trigger whose reply was deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerReply {
    /// Host id of the pipeline the trigger addressed.
    pub pipeline: u32,
    /// 0 on success, a negative status code otherwise.
    pub error: i32,
}

/// Owner of all pipeline execution state.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) graph: Graph,
    pub(crate) pipelines: Vec<Option<Pipeline>>,
    pub(crate) ppl_index: HashMap<u32, PipelineId>,
    pub(crate) tasks: TaskArena,
    pub(crate) cores: Vec<CoreRegistry>,
    pub(crate) online: Vec<bool>,
    pub(crate) idc: IdcBus,
    pub(crate) clock: u64,
    pub(crate) current_core: usize,
    pub(crate) replies: VecDeque<TriggerReply>,
}

impl Engine {
    /// Build an engine from `config`.
    pub fn new(config: EngineConfig) -> Self {
        let cores = config.cores.max(1);
        Self {
            config,
            graph: Graph::new(),
            pipelines: Vec::new(),
            ppl_index: HashMap::new(),
            tasks: Vec::new(),
            cores: (0..cores).map(|_| CoreRegistry::default()).collect(),
            online: vec![true; cores],
            idc: IdcBus::new(cores),
            clock: 0,
            current_core: 0,
            replies: VecDeque::new(),
        }
    }

    /// Current engine clock in microseconds.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Core the engine is currently executing as.
    pub fn current_core(&self) -> usize {
        self.current_core
    }

    /// Switch the executing core; models migrating the calling context.
    pub fn set_current_core(&mut self, core: usize) -> Result<()> {
        self.check_core(core)?;
        self.current_core = core;
        Ok(())
    }

    /// Mark a core on- or offline. An offline core never answers mailbox
    /// transactions.
    pub fn set_core_online(&mut self, core: usize, online: bool) -> Result<()> {
        self.check_core(core)?;
        self.online[core] = online;
        Ok(())
    }

    /// Whether `core` answers cross-core traffic.
    pub fn is_core_online(&self, core: usize) -> bool {
        self.online.get(core).copied().unwrap_or(false)
    }

    fn check_core(&self, core: usize) -> Result<()> {
        if core < self.cores.len() {
            Ok(())
        } else {
            Err(Error::CoreOffline(core))
        }
    }

    /// Next deferred trigger completion, oldest first.
    pub fn pop_reply(&mut self) -> Option<TriggerReply> {
        self.replies.pop_front()
    }

    pub(crate) fn push_reply(&mut self, pipeline: u32, error: i32) {
        self.replies.push_back(TriggerReply { pipeline, error });
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Create a component.
    pub fn create_component(&mut self, desc: ComponentDesc) -> Result<ComponentId> {
        self.check_core(desc.core)?;
        self.graph.add_component(desc)
    }

    /// Create a buffer.
    pub fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId> {
        self.check_core(desc.core)?;
        self.graph.add_buffer(desc)
    }

    /// Connect `source -> buffer -> sink` by host ids.
    pub fn connect(&mut self, source: u32, buffer: u32, sink: u32) -> Result<()> {
        let src = self.graph.lookup_comp(source)?;
        let buf = self.graph.lookup_buf(buffer)?;
        let snk = self.graph.lookup_comp(sink)?;
        self.graph.connect(src, buf, snk)
    }

    /// Create an empty pipeline scheduled around `scheduling_component`.
    pub fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        scheduling_component: u32,
    ) -> Result<PipelineId> {
        if self.ppl_index.contains_key(&desc.id) {
            return Err(Error::DuplicateId(desc.id));
        }
        self.check_core(desc.core)?;
        let sched = self.graph.lookup_comp(scheduling_component)?;
        let mut pipeline = Pipeline::new(desc);
        pipeline.scheduling = Some(sched);
        let pid = PipelineId(self.alloc_ppl_slot());
        self.pipelines[pid.index()] = Some(pipeline);
        self.ppl_index.insert(desc.id, pid);
        Ok(pid)
    }

    fn alloc_ppl_slot(&mut self) -> u32 {
        match self.pipelines.iter().position(Option::is_none) {
            Some(i) => i as u32,
            None => {
                self.pipelines.push(None);
                (self.pipelines.len() - 1) as u32
            }
        }
    }

    /// Resolve a host pipeline id.
    pub fn lookup_pipeline(&self, id: u32) -> Result<PipelineId> {
        self.ppl_index
            .get(&id)
            .copied()
            .ok_or(Error::NoSuchPipeline(id))
    }

    /// Borrow a pipeline.
    pub fn pipeline(&self, id: PipelineId) -> Result<&Pipeline> {
        self.pipelines
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::NoSuchPipeline(id.0))
    }

    pub(crate) fn pipeline_mut(&mut self, id: PipelineId) -> Result<&mut Pipeline> {
        self.pipelines
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::NoSuchPipeline(id.0))
    }

    /// State of a component, by host id.
    pub fn component_state(&self, id: u32) -> Result<ComponentState> {
        let cid = self.graph.lookup_comp(id)?;
        Ok(self.graph.comp(cid)?.state)
    }

    /// The component/buffer graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Claim the pipeline's declared components and arm its periodic task.
    ///
    /// Every component declared into this pipeline moves `Init -> Ready`
    /// and becomes visible to graph walks; components of other pipelines
    /// bound the subgraph. The most upstream and downstream claimed
    /// components become the pipeline's source and sink.
    pub fn complete_pipeline(&mut self, pipeline: u32) -> Result<()> {
        let pid = self.lookup_pipeline(pipeline)?;
        let period_us = {
            let p = self.pipeline(pid)?;
            if p.complete {
                return Err(Error::PipelineAlreadyComplete(pipeline));
            }
            p.period_us
        };

        let declared: Vec<ComponentId> = self
            .graph
            .component_handles()
            .filter(|&cid| {
                self.graph
                    .comp(cid)
                    .map(|c| c.pipeline_id == pipeline)
                    .unwrap_or(false)
            })
            .collect();
        if declared.is_empty() {
            return Err(Error::InvalidConnection(format!(
                "pipeline {pipeline} has no components"
            )));
        }
        let mut claimed: Vec<ComponentId> = Vec::new();
        for cid in declared {
            let comp = self.graph.comp_mut(cid)?;
            comp.pipeline = Some(pid);
            comp.period = period_us;
            if comp.state == ComponentState::Init {
                comp.state = ComponentState::Ready;
            }
            claimed.push(cid);
        }

        let (source, sink) = self.subgraph_endpoints(&claimed)?;
        let task = self.alloc_task(Task::new(
            SchedulerKind::Ll,
            self.pipeline(pid)?.core,
            self.pipeline(pid)?.priority,
            period_us,
            TaskJob::Pipeline(pid),
        ));

        let p = self.pipeline_mut(pid)?;
        p.source = source;
        p.sink = sink;
        p.task = Some(task);
        p.status = ComponentState::Ready;
        p.complete = true;
        tracing::info!(pipeline, components = claimed.len(), "pipeline completed");
        Ok(())
    }

    fn subgraph_endpoints(
        &self,
        claimed: &[ComponentId],
    ) -> Result<(Option<ComponentId>, Option<ComponentId>)> {
        let mut source = None;
        let mut sink = None;
        for &cid in claimed {
            let comp = self.graph.comp(cid)?;
            let mut internal_in = false;
            for &bid in &comp.inputs {
                if let Some(src) = self.graph.buffer(bid)?.source {
                    internal_in |= claimed.contains(&src);
                }
            }
            let mut internal_out = false;
            for &bid in &comp.outputs {
                if let Some(snk) = self.graph.buffer(bid)?.sink {
                    internal_out |= claimed.contains(&snk);
                }
            }
            if !internal_in && source.is_none() {
                source = Some(cid);
            }
            if !internal_out && sink.is_none() {
                sink = Some(cid);
            }
        }
        Ok((source, sink))
    }

    // ========================================================================
    // Stream control
    // ========================================================================

    /// Deliver `cmd` to `pipeline`.
    ///
    /// A pipeline living on another core is reached through the mailbox
    /// channel; locally the command either runs inline or is staged onto
    /// the pipeline's task ([`TriggerStatus::Scheduled`]), in which case
    /// the completion arrives later through [`Engine::pop_reply`].
    pub fn trigger(&mut self, pipeline: u32, cmd: TriggerCommand) -> Result<TriggerStatus> {
        let pid = self.lookup_pipeline(pipeline)?;
        let core = self.pipeline(pid)?.core;
        if core != self.current_core {
            self.idc_send(core, IdcMessage::PipelineTrigger { pipeline, cmd })?;
            return Ok(TriggerStatus::Scheduled);
        }
        trigger::pipeline_trigger(self, pid, cmd)
    }

    /// Walk the pipeline back to `Ready`, flushing its buffers.
    pub fn reset_pipeline(&mut self, pipeline: u32) -> Result<()> {
        let pid = self.lookup_pipeline(pipeline)?;
        let (start, dir) = trigger::trigger_origin(self, pid)?;
        let period_us = self.pipeline(pid)?.period_us;
        let core = self.current_core;
        let (_, remote) =
            self.graph
                .trigger_walk(start, TriggerCommand::Reset, dir, period_us, core)?;
        self.relay_remote_hooks(remote)?;

        let stale: Vec<BufferId> = self
            .graph
            .component_handles()
            .filter(|&cid| {
                self.graph
                    .comp(cid)
                    .map(|c| c.pipeline == Some(pid))
                    .unwrap_or(false)
            })
            .flat_map(|cid| {
                self.graph
                    .comp(cid)
                    .map(|c| c.outputs.to_vec())
                    .unwrap_or_default()
            })
            .collect();
        for bid in stale {
            self.graph.buffer(bid)?.reset();
        }

        let p = self.pipeline_mut(pid)?;
        p.status = ComponentState::Ready;
        p.trigger = Default::default();
        p.xrun_bytes = 0;
        Ok(())
    }

    /// Tear down a pipeline, its components and their buffers.
    ///
    /// Refused while the pipeline streams or still owes a staged trigger.
    pub fn free_pipeline(&mut self, pipeline: u32) -> Result<()> {
        let pid = self.lookup_pipeline(pipeline)?;
        {
            let p = self.pipeline(pid)?;
            if p.is_active() || p.trigger.cmd.is_some() {
                return Err(Error::PipelineActive(pipeline));
            }
        }
        if let Some(tid) = self.pipeline(pid)?.task {
            self.free_task(tid)?;
        }
        let members: Vec<ComponentId> = self
            .graph
            .component_handles()
            .filter(|&cid| {
                self.graph
                    .comp(cid)
                    .map(|c| c.pipeline == Some(pid))
                    .unwrap_or(false)
            })
            .collect();
        for cid in members {
            self.graph.remove_component(cid)?;
        }
        self.pipelines[pid.index()] = None;
        self.ppl_index.remove(&pipeline);
        tracing::info!(pipeline, "pipeline freed");
        Ok(())
    }

    // ========================================================================
    // Tasks and time
    // ========================================================================

    pub(crate) fn alloc_task(&mut self, task: Task) -> TaskId {
        let idx = match self.tasks.iter().position(Option::is_none) {
            Some(i) => i,
            None => {
                self.tasks.push(None);
                self.tasks.len() - 1
            }
        };
        self.tasks[idx] = Some(task);
        TaskId(idx as u32)
    }

    pub(crate) fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::NoSuchTask(id.0))
    }

    /// Lifecycle state of a task.
    pub fn task_state(&self, id: TaskId) -> Result<TaskState> {
        Ok(self.task(id)?.state)
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::NoSuchTask(id.0))
    }

    /// Put a task on its scheduler's ready list.
    ///
    /// A task already queued or mid-run keeps its current slot and timing.
    pub fn schedule_task(&mut self, id: TaskId) -> Result<()> {
        let clock = self.clock;
        let (kind, core, priority, period, idle, state) = {
            let t = self.task(id)?;
            (t.kind, t.core, t.priority, t.period, t.idle, t.state)
        };
        if matches!(
            state,
            TaskState::Queued | TaskState::Pending | TaskState::Running
        ) {
            return Ok(());
        }
        {
            let t = self.task_mut(id)?;
            t.state = TaskState::Queued;
            t.start = match kind {
                SchedulerKind::Ll => clock + period,
                SchedulerKind::Edf => clock,
            };
        }
        match kind {
            SchedulerKind::Ll => {
                if !self.cores[core].ll.contains(id) {
                    self.cores[core].ll.insert(id, priority);
                }
            }
            SchedulerKind::Edf => {
                if !self.cores[core].edf.contains(id) {
                    self.cores[core].edf.insert(id, idle);
                }
            }
        }
        Ok(())
    }

    /// Take a task off its ready list.
    ///
    /// A deadline task can only be cancelled while still `Queued`; a
    /// periodic task is removed whatever its state, with the removal
    /// ordered against the tick so a half-removed task is never run.
    pub fn cancel_task(&mut self, id: TaskId) -> Result<()> {
        let (kind, core, state) = {
            let t = self.task(id)?;
            (t.kind, t.core, t.state)
        };
        match kind {
            SchedulerKind::Edf => {
                if state != TaskState::Queued {
                    tracing::debug!(task = id.0, ?state, "edf cancel ignored, not queued");
                    return Ok(());
                }
                self.cores[core].edf.remove(id);
            }
            SchedulerKind::Ll => self.cores[core].ll.remove(id),
        }
        self.task_mut(id)?.state = TaskState::Cancelled;
        Ok(())
    }

    /// Cancel a task and release its arena slot.
    pub fn free_task(&mut self, id: TaskId) -> Result<()> {
        self.cancel_task(id)?;
        if let Some(t) = self.tasks.get_mut(id.index()).and_then(Option::as_mut) {
            t.state = TaskState::Free;
        }
        self.tasks[id.index()] = None;
        Ok(())
    }

    /// Advance the clock one tick and service `core`'s periodic queue.
    ///
    /// Due tasks are first marked pending, then run in priority order; a
    /// task scheduled from inside a run body waits for the next tick.
    pub fn tick(&mut self, core: usize) -> Result<()> {
        self.check_core(core)?;
        self.current_core = core;
        self.clock += self.config.tick_us;
        let due = self.cores[core].ll.mark_pending(&mut self.tasks, self.clock);
        for tid in due {
            let runnable = self
                .tasks
                .get(tid.index())
                .and_then(Option::as_ref)
                .map(|t| t.state == TaskState::Pending)
                .unwrap_or(false);
            // cancelled between marking and here
            if runnable {
                self.run_task(tid);
            }
        }
        Ok(())
    }

    /// Run the deadline scheduler on `core` once.
    ///
    /// Panics when the core's deadline queue holds nothing runnable; a
    /// wake-up must only be raised after work was enqueued.
    pub fn edf_wakeup(&mut self, core: usize) {
        let tid = self.cores[core].edf.select(&self.tasks, self.clock);
        self.run_task(tid);
    }

    fn run_task(&mut self, tid: TaskId) {
        let mut job = match self.tasks.get_mut(tid.index()).and_then(Option::as_mut) {
            Some(t) => {
                t.state = TaskState::Running;
                t.take_job()
            }
            None => return,
        };
        let run = match job.as_mut() {
            Some(&mut TaskJob::Pipeline(pid)) => crate::pipeline::task::pipeline_task(self, pid),
            Some(&mut TaskJob::ComponentCopy(cid)) => {
                let period = self.graph.comp(cid).map(|c| c.period).unwrap_or(0);
                match self.graph.comp_copy(cid, period) {
                    Ok(()) => TaskRun::Reschedule,
                    Err(e) => {
                        tracing::warn!(component = cid.0, error = %e, "copy task failed");
                        TaskRun::Completed
                    }
                }
            }
            Some(&mut TaskJob::IdcDispatch) => self.idc_dispatch(),
            Some(TaskJob::Callback(f)) => f(),
            None => TaskRun::Completed,
        };

        let mut finished: Option<(usize, SchedulerKind)> = None;
        let mut on_complete = None;
        if let Some(t) = self.tasks.get_mut(tid.index()).and_then(Option::as_mut) {
            if let Some(job) = job {
                t.put_job(job);
            }
            match run {
                TaskRun::Reschedule => {
                    t.state = TaskState::Queued;
                    t.start += t.period;
                }
                TaskRun::Completed => {
                    t.state = TaskState::Completed;
                    finished = Some((t.core, t.kind));
                    on_complete = t.on_complete.take();
                }
            }
        }
        if let Some((core, kind)) = finished {
            match kind {
                SchedulerKind::Ll => self.cores[core].ll.remove(tid),
                SchedulerKind::Edf => self.cores[core].edf.remove(tid),
            }
        }
        if let Some(hook) = on_complete {
            hook();
        }
    }

    // ========================================================================
    // Cross-core channel
    // ========================================================================

    /// Send `msg` to `target` and block until the transaction completes.
    ///
    /// Delivery raises the target's mailbox interrupt; the handler runs
    /// there inside a deadline task, then the done flag releases this
    /// sender. An offline target never answers and the call returns
    /// [`Error::IdcTimeout`] after the configured budget of polling ticks.
    pub fn idc_send(&mut self, target: usize, msg: IdcMessage) -> Result<()> {
        let from = self.current_core;
        self.check_core(target)?;
        if target == from {
            return Err(Error::InvalidConnection(
                "idc target is the sending core".into(),
            ));
        }
        self.idc.post(from, target, &msg);

        if !self.online[target] {
            // burn the polling budget; the peer will never set done
            self.clock += self.config.tick_us * u64::from(self.config.idc_timeout_ticks);
            tracing::warn!(target, "idc send timed out, core offline");
            return Err(Error::IdcTimeout { core: target });
        }

        if self.idc.capture(from, target) {
            let tid = self.alloc_task(Task::new(
                SchedulerKind::Edf,
                target,
                0,
                self.config.tick_us,
                TaskJob::IdcDispatch,
            ));
            self.schedule_task(tid)?;
            let home = self.current_core;
            self.current_core = target;
            self.edf_wakeup(target);
            self.current_core = home;
            self.free_task(tid)?;
        }

        if self.idc.done(from, target) {
            Ok(())
        } else {
            Err(Error::IdcTimeout { core: target })
        }
    }

    /// Handle the message parked on the current core's receive slot.
    fn idc_dispatch(&mut self) -> TaskRun {
        let core = self.current_core;
        let slot = match self.idc.take_slot(core) {
            Some(s) => s,
            None => return TaskRun::Completed,
        };
        if let Err(e) = self.idc_handle(slot.msg) {
            tracing::warn!(core, error = %e, "idc handler failed");
        }
        self.idc.complete(slot.from, core);
        TaskRun::Completed
    }

    fn idc_handle(&mut self, msg: IdcMessage) -> Result<()> {
        match msg {
            IdcMessage::PowerDown => {
                let core = self.current_core;
                tracing::info!(core, "idc power down");
                self.online[core] = false;
                Ok(())
            }
            IdcMessage::Notify(payload) => {
                tracing::debug!(payload, "idc notify");
                Ok(())
            }
            IdcMessage::PipelineTrigger { pipeline, cmd } => {
                let pid = self.lookup_pipeline(pipeline)?;
                trigger::pipeline_trigger(self, pid, cmd).map(|_| ())
            }
            IdcMessage::ComponentCommand { component, action } => {
                self.idc_component_command(component, action)
            }
            IdcMessage::IpcRelay { payload } => {
                tracing::debug!(payload, "idc ipc relay");
                Ok(())
            }
        }
    }

    /// Send each deferred hook to its component's core and wait for it.
    ///
    /// A trigger walk runs the state machine where the trigger arrived but
    /// never calls into the operations of a component pinned to another
    /// core; those calls come back from the walk and cross the mailbox
    /// here, one blocking transaction each.
    pub(crate) fn relay_remote_hooks(&mut self, hooks: RemoteHooks) -> Result<()> {
        for (cid, cmd) in hooks {
            let (component, core) = {
                let c = self.graph.comp(cid)?;
                (c.id, c.core)
            };
            let action = match cmd {
                TriggerCommand::Prepare => ComponentAction::Prepare,
                TriggerCommand::Reset => ComponentAction::Reset,
                other => ComponentAction::Trigger(other),
            };
            tracing::debug!(component, core, ?cmd, "relaying component hook");
            self.idc_send(core, IdcMessage::ComponentCommand { component, action })?;
        }
        Ok(())
    }

    /// Locally executed leg of a remote component command.
    ///
    /// Addresses the one named component, never its subgraph: it takes the
    /// transition (a relayed command finds the state already applied by the
    /// initiator's walk and converges), runs the matching operations hook,
    /// then arms or cancels the owning pipeline's task.
    fn idc_component_command(&mut self, component: u32, action: ComponentAction) -> Result<()> {
        let cid = self.graph.lookup_comp(component)?;
        let (period, pipeline) = {
            let c = self.graph.comp(cid)?;
            (c.period, c.pipeline)
        };
        let cmd = match action {
            ComponentAction::Prepare => TriggerCommand::Prepare,
            ComponentAction::Reset => TriggerCommand::Reset,
            ComponentAction::Trigger(cmd) => cmd,
        };
        let (sources, sinks) = self.graph.sibling_states(cid)?;
        self.graph
            .comp_mut(cid)?
            .apply_trigger(cmd, &sources, &sinks)?;
        self.graph.run_ops_hook(cid, cmd, period)?;

        // keep the owning pipeline's task in step with the commanded state
        if let Some(tid) = pipeline.and_then(|pid| self.pipeline(pid).ok().and_then(|p| p.task)) {
            match cmd {
                TriggerCommand::Prepare
                | TriggerCommand::PreStart
                | TriggerCommand::Start
                | TriggerCommand::PreRelease
                | TriggerCommand::Release => self.schedule_task(tid)?,
                TriggerCommand::Stop | TriggerCommand::Pause | TriggerCommand::Xrun => {
                    self.cancel_task(tid)?
                }
                TriggerCommand::Reset => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TaskJob;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(EngineConfig::new().with_cores(2))
    }

    fn counting_task(engine: &mut Engine, priority: u16, hits: Arc<AtomicU32>) -> TaskId {
        engine.alloc_task(Task::new(
            SchedulerKind::Ll,
            0,
            priority,
            1000,
            TaskJob::Callback(Box::new(move || {
                hits.fetch_add(1, Ordering::Relaxed);
                TaskRun::Reschedule
            })),
        ))
    }

    #[test]
    fn test_tick_runs_due_ll_tasks_once() {
        let mut e = engine();
        let hits = Arc::new(AtomicU32::new(0));
        let tid = counting_task(&mut e, 0, hits.clone());
        e.schedule_task(tid).unwrap();
        e.tick(0).unwrap();
        e.tick(0).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_ll_tasks_run_in_priority_order() {
        let mut e = engine();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for prio in [5u16, 1, 3] {
            let order = order.clone();
            let tid = e.alloc_task(Task::new(
                SchedulerKind::Ll,
                0,
                prio,
                1000,
                TaskJob::Callback(Box::new(move || {
                    order.lock().unwrap().push(prio);
                    TaskRun::Completed
                })),
            ));
            e.schedule_task(tid).unwrap();
        }
        e.tick(0).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn test_cancelled_task_does_not_run() {
        let mut e = engine();
        let hits = Arc::new(AtomicU32::new(0));
        let tid = counting_task(&mut e, 0, hits.clone());
        e.schedule_task(tid).unwrap();
        e.cancel_task(tid).unwrap();
        e.tick(0).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 0);
        assert_eq!(e.task(tid).unwrap().state, TaskState::Cancelled);
    }

    #[test]
    fn test_completed_task_leaves_the_queue() {
        let mut e = engine();
        let tid = e.alloc_task(Task::new(
            SchedulerKind::Ll,
            0,
            0,
            1000,
            TaskJob::Callback(Box::new(|| TaskRun::Completed)),
        ));
        e.schedule_task(tid).unwrap();
        e.tick(0).unwrap();
        assert_eq!(e.task(tid).unwrap().state, TaskState::Completed);
        assert!(e.cores[0].ll.is_empty());
    }

    #[test]
    fn test_completion_hook_fires_once_on_completed() {
        let mut e = engine();
        let done = Arc::new(AtomicU32::new(0));
        let hook_done = done.clone();
        let tid = e.alloc_task(
            Task::new(
                SchedulerKind::Ll,
                0,
                0,
                1000,
                TaskJob::Callback(Box::new(|| TaskRun::Completed)),
            )
            .with_completion(move || {
                hook_done.fetch_add(1, Ordering::Relaxed);
            }),
        );
        e.schedule_task(tid).unwrap();
        e.tick(0).unwrap();
        assert_eq!(done.load(Ordering::Relaxed), 1);
        assert_eq!(e.task(tid).unwrap().state, TaskState::Completed);
    }

    #[test]
    fn test_completion_hook_skipped_on_reschedule_and_cancel() {
        let mut e = engine();
        let done = Arc::new(AtomicU32::new(0));
        let hook_done = done.clone();
        let tid = e.alloc_task(
            Task::new(
                SchedulerKind::Ll,
                0,
                0,
                1000,
                TaskJob::Callback(Box::new(|| TaskRun::Reschedule)),
            )
            .with_completion(move || {
                hook_done.fetch_add(1, Ordering::Relaxed);
            }),
        );
        e.schedule_task(tid).unwrap();
        e.tick(0).unwrap();
        e.cancel_task(tid).unwrap();
        assert_eq!(done.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_schedule_is_idempotent_while_queued() {
        let mut e = engine();
        let hits = Arc::new(AtomicU32::new(0));
        let tid = counting_task(&mut e, 0, hits.clone());
        e.schedule_task(tid).unwrap();
        e.schedule_task(tid).unwrap();
        e.tick(0).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_idc_send_to_self_rejected() {
        let mut e = engine();
        assert!(matches!(
            e.idc_send(0, IdcMessage::Notify(1)),
            Err(Error::InvalidConnection(_))
        ));
    }

    #[test]
    fn test_idc_roundtrip_completes_mailbox() {
        let mut e = engine();
        e.idc_send(1, IdcMessage::Notify(99)).unwrap();
        assert!(e.idc.done(0, 1));
        assert!(!e.idc.busy(0, 1));
    }

    #[test]
    fn test_idc_timeout_against_offline_core() {
        let mut e = engine();
        e.set_core_online(1, false).unwrap();
        let before = e.clock();
        let err = e.idc_send(1, IdcMessage::Notify(0)).unwrap_err();
        assert!(matches!(err, Error::IdcTimeout { core: 1 }));
        let budget = e.config.tick_us * u64::from(e.config.idc_timeout_ticks);
        assert_eq!(e.clock() - before, budget);
    }

    #[test]
    fn test_send_from_secondary_core() {
        let mut e = engine();
        e.set_current_core(1).unwrap();
        e.idc_send(0, IdcMessage::Notify(7)).unwrap();
        // the sender's context is restored after the blocking send
        assert_eq!(e.current_core(), 1);
        assert!(e.idc.done(1, 0));
    }

    #[test]
    fn test_power_down_takes_core_offline() {
        let mut e = engine();
        e.idc_send(1, IdcMessage::PowerDown).unwrap();
        assert!(!e.is_core_online(1));
        // the next transaction towards it times out
        assert!(e.idc_send(1, IdcMessage::Notify(0)).is_err());
    }
}

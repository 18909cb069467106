//! Pipeline-level trigger entry: inline execution or staging onto the task.
//!
//! A host trigger does not usually run the graph walk on the caller's
//! stack. Timer-driven pipelines stage the command into their pending
//! trigger and let the periodic task pick it up on the next tick, which
//! keeps command execution serialized with the copy path; the caller gets
//! [`TriggerStatus::Scheduled`] and a reply later. The walk runs inline
//! only where no tick would come: DMA-clocked pipelines, prepare/reset,
//! and halting a pipeline that is already paused or sitting in an xrun.

use crate::component::{ComponentId, ComponentState, Direction, TriggerCommand};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::pipeline::graph::{WalkDir, WalkStatus};
use crate::pipeline::PipelineId;

/// How a trigger request was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    /// Ran inline; every reachable component transitioned.
    Done,
    /// Ran inline; a fan node converged the walk early.
    PathStop,
    /// Staged onto the pipeline task; completion arrives as a reply.
    Scheduled,
}

/// Where a trigger walk enters the graph: the host-side endpoint.
pub(crate) fn trigger_origin(engine: &Engine, pid: PipelineId) -> Result<(ComponentId, WalkDir)> {
    let p = engine.pipeline(pid)?;
    let source = incomplete_check(p.source, p.id)?;
    let sink = incomplete_check(p.sink, p.id)?;
    Ok(match engine.graph().comp(source)?.direction {
        Direction::Playback => (source, WalkDir::Downstream),
        Direction::Capture => (sink, WalkDir::Upstream),
    })
}

/// Where the copy walk enters: the hardware-side endpoint, so data moves
/// in topological order.
pub(crate) fn copy_origin(engine: &Engine, pid: PipelineId) -> Result<(ComponentId, WalkDir)> {
    let p = engine.pipeline(pid)?;
    let source = incomplete_check(p.source, p.id)?;
    let sink = incomplete_check(p.sink, p.id)?;
    Ok(match engine.graph().comp(source)?.direction {
        Direction::Playback => (sink, WalkDir::Upstream),
        Direction::Capture => (source, WalkDir::Downstream),
    })
}

fn incomplete_check(end: Option<ComponentId>, pipeline: u32) -> Result<ComponentId> {
    end.ok_or_else(|| Error::InvalidConnection(format!("pipeline {pipeline} not complete")))
}

/// The final stage a staged command leads to.
fn final_stage(cmd: TriggerCommand) -> Option<TriggerCommand> {
    match cmd {
        TriggerCommand::PreStart => Some(TriggerCommand::Start),
        TriggerCommand::PreRelease => Some(TriggerCommand::Release),
        _ => None,
    }
}

fn done_or_pathstop(ws: WalkStatus) -> TriggerStatus {
    match ws {
        WalkStatus::Continue => TriggerStatus::Done,
        WalkStatus::PathStop => TriggerStatus::PathStop,
    }
}

/// Deliver `cmd` to the pipeline, inline or staged.
pub(crate) fn pipeline_trigger(
    engine: &mut Engine,
    pid: PipelineId,
    cmd: TriggerCommand,
) -> Result<TriggerStatus> {
    let (complete, timer, status, xrun, id) = {
        let p = engine.pipeline(pid)?;
        (p.complete, p.is_timer_driven(), p.status, p.xrun_bytes, p.id)
    };
    if !complete {
        return Err(Error::InvalidConnection(format!("pipeline {id} not complete")));
    }

    let staged = match cmd {
        TriggerCommand::Start => TriggerCommand::PreStart,
        TriggerCommand::Release => TriggerCommand::PreRelease,
        other => other,
    };

    let halt = matches!(staged, TriggerCommand::Stop | TriggerCommand::Pause);
    let inline = matches!(staged, TriggerCommand::Reset | TriggerCommand::Prepare)
        || !timer
        || (halt && (status == ComponentState::Paused || xrun != 0));

    if inline {
        trigger_inline(engine, pid, staged)
    } else {
        schedule_triggered(engine, pid, staged)?;
        Ok(TriggerStatus::Scheduled)
    }
}

/// Run the walk (both stages where applicable) on the caller's stack.
fn trigger_inline(engine: &mut Engine, pid: PipelineId, cmd: TriggerCommand) -> Result<TriggerStatus> {
    let mut ws = trigger_run(engine, pid, cmd)?;
    if ws == WalkStatus::Continue {
        if let Some(fin) = final_stage(cmd) {
            ws = trigger_run(engine, pid, fin)?;
        }
    }
    if let Some(tid) = engine.pipeline(pid)?.task {
        match cmd {
            TriggerCommand::PreStart | TriggerCommand::PreRelease => engine.schedule_task(tid)?,
            TriggerCommand::Stop
            | TriggerCommand::Pause
            | TriggerCommand::Reset
            | TriggerCommand::Xrun => engine.cancel_task(tid)?,
            _ => {}
        }
    }
    Ok(done_or_pathstop(ws))
}

/// Execute one trigger stage across the graph and refresh statuses.
///
/// Hooks of components pinned to another core come back from the walk
/// and cross the mailbox to run where the component lives.
pub(crate) fn trigger_run(
    engine: &mut Engine,
    pid: PipelineId,
    cmd: TriggerCommand,
) -> Result<WalkStatus> {
    let (start, dir) = trigger_origin(engine, pid)?;
    let period_us = engine.pipeline(pid)?.period_us;
    tracing::debug!(pipeline = engine.pipeline(pid)?.id, ?cmd, "trigger walk");
    let core = engine.current_core();
    let (ws, remote) = engine.graph.trigger_walk(start, cmd, dir, period_us, core)?;
    engine.relay_remote_hooks(remote)?;
    sync_statuses(engine)?;
    Ok(ws)
}

/// Re-mirror every completed pipeline's status from its scheduling
/// component; a walk may have crossed pipeline boundaries.
fn sync_statuses(engine: &mut Engine) -> Result<()> {
    let mut updates = Vec::new();
    for (idx, slot) in engine.pipelines.iter().enumerate() {
        if let Some(p) = slot {
            if let Some(sched) = p.scheduling {
                if p.complete {
                    updates.push((PipelineId(idx as u32), engine.graph.comp(sched)?.state));
                }
            }
        }
    }
    for (pid, state) in updates {
        engine.pipeline_mut(pid)?.status = state;
    }
    Ok(())
}

/// Stage `cmd` onto every pipeline the trigger will reach and make sure
/// each one's task is armed to consume it.
///
/// The reply obligation attaches to the origin pipeline only. Pipelines
/// already paused have no tick coming, so a halt lands on them directly.
pub(crate) fn schedule_triggered(
    engine: &mut Engine,
    origin: PipelineId,
    cmd: TriggerCommand,
) -> Result<()> {
    let (start, dir) = trigger_origin(engine, origin)?;
    let mut pipelines = engine.graph.collect_pipelines(start, dir)?;
    // origin first, so the reply obligation lands on it
    if let Some(pos) = pipelines.iter().position(|p| *p == origin) {
        pipelines.swap(0, pos);
    }

    for (i, &pid) in pipelines.iter().enumerate() {
        let (status, task) = {
            let p = engine.pipeline(pid)?;
            (p.status, p.task)
        };
        match cmd {
            TriggerCommand::PreStart | TriggerCommand::PreRelease => {
                {
                    let p = engine.pipeline_mut(pid)?;
                    p.xrun_bytes = 0;
                    // a halt still staged on this pipeline is being overtaken
                    p.trigger.aborted = p.trigger.cmd.is_some_and(|prev| prev != cmd);
                    p.trigger.cmd = Some(cmd);
                    p.trigger.host = i == 0;
                }
                if let Some(tid) = task {
                    engine.schedule_task(tid)?;
                }
            }
            TriggerCommand::Stop | TriggerCommand::Pause => {
                if status == ComponentState::Paused {
                    if let Some(tid) = task {
                        engine.cancel_task(tid)?;
                    }
                } else {
                    {
                        let p = engine.pipeline_mut(pid)?;
                        p.trigger.aborted = p.trigger.cmd.is_some_and(|prev| prev != cmd);
                        p.trigger.cmd = Some(cmd);
                        p.trigger.host = i == 0;
                    }
                    if let Some(tid) = task {
                        engine.schedule_task(tid)?;
                    }
                }
            }
            TriggerCommand::Xrun => {
                let p = engine.pipeline_mut(pid)?;
                if p.xrun_bytes == 0 {
                    p.xrun_bytes = 1;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

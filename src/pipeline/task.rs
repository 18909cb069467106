//! The periodic pipeline service body.
//!
//! One invocation per tick: finish any staged trigger first, then move one
//! period of data. An xrun pre-empts everything, including a staged
//! command, whose initiator gets a synthesized error reply instead of
//! hanging. Recovery is a single bounded resynchronization attempt; when
//! it fails the task stops for good and the pipeline stays down until the
//! host resets it.

use crate::component::{ComponentState, TriggerCommand};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::pipeline::graph::WalkStatus;
use crate::pipeline::trigger::{copy_origin, trigger_run};
use crate::pipeline::PipelineId;
use crate::schedule::TaskRun;

/// What the staged-command step decided for the rest of the invocation.
enum CmdFlow {
    /// Fall through to the copy step.
    Copy,
    /// Skip the copy, run again next tick.
    Reschedule,
    /// Stop the task.
    Completed,
}

/// One tick of pipeline servicing.
pub(crate) fn pipeline_task(engine: &mut Engine, pid: PipelineId) -> TaskRun {
    match service(engine, pid) {
        Ok(run) => run,
        Err(e) => {
            tracing::warn!(error = %e, "pipeline task aborted");
            TaskRun::Completed
        }
    }
}

fn service(engine: &mut Engine, pid: PipelineId) -> Result<TaskRun> {
    let (xrun, id) = {
        let p = engine.pipeline(pid)?;
        (p.xrun_bytes, p.id)
    };

    // an unrecovered xrun outranks everything else
    if xrun != 0 {
        let (pending, host) = {
            let p = engine.pipeline(pid)?;
            (p.trigger.cmd.is_some(), p.trigger.host)
        };
        if pending {
            // never leave the initiator waiting on a command that cannot run
            if host {
                engine.push_reply(id, Error::Xrun { bytes: xrun }.code());
            }
            let p = engine.pipeline_mut(pid)?;
            p.trigger.cmd = None;
            p.trigger.host = false;
        }
        return match xrun_recover(engine, pid) {
            // recovered: skip this cycle's copy, resume next tick
            Ok(()) => Ok(TaskRun::Reschedule),
            Err(e) => {
                tracing::error!(pipeline = id, error = %e, "xrun recovery failed, pipeline stopped");
                Ok(TaskRun::Completed)
            }
        };
    }

    // gap between the PRE stage and the final stage
    {
        let p = engine.pipeline_mut(pid)?;
        if p.trigger.delay > 0 {
            p.trigger.delay -= 1;
            return Ok(TaskRun::Reschedule);
        }
    }

    if let Some(cmd) = engine.pipeline(pid)?.trigger.cmd {
        match task_cmd(engine, pid, cmd)? {
            CmdFlow::Copy => {}
            CmdFlow::Reschedule => return Ok(TaskRun::Reschedule),
            CmdFlow::Completed => return Ok(TaskRun::Completed),
        }
    }

    if engine.pipeline(pid)?.status != ComponentState::Active {
        return Ok(TaskRun::Completed);
    }

    match pipeline_copy(engine, pid) {
        Ok(()) => Ok(TaskRun::Reschedule),
        Err(Error::Xrun { bytes }) => {
            tracing::warn!(pipeline = id, bytes, "xrun during copy");
            engine.pipeline_mut(pid)?.xrun_bytes = bytes.max(1);
            match xrun_recover(engine, pid) {
                Ok(()) => Ok(TaskRun::Reschedule),
                Err(e) => {
                    tracing::error!(pipeline = id, error = %e, "xrun recovery failed, pipeline stopped");
                    Ok(TaskRun::Completed)
                }
            }
        }
        Err(e) => {
            tracing::error!(pipeline = id, error = %e, "copy failed");
            Ok(TaskRun::Completed)
        }
    }
}

/// Consume the staged command.
fn task_cmd(engine: &mut Engine, pid: PipelineId, cmd: TriggerCommand) -> Result<CmdFlow> {
    let (host, aborted, id) = {
        let p = engine.pipeline(pid)?;
        (p.trigger.host, p.trigger.aborted, p.id)
    };

    // swept along by another pipeline's trigger: the walk crosses into
    // this subgraph on the origin's stack, only the scheduling view
    // needs to follow here
    if !host {
        let p = engine.pipeline_mut(pid)?;
        p.trigger.cmd = None;
        return Ok(match cmd {
            TriggerCommand::Stop | TriggerCommand::Pause => {
                if aborted {
                    p.trigger.aborted = false;
                    CmdFlow::Copy
                } else if p.status == ComponentState::Active {
                    // a sibling kept this subgraph running, or the
                    // origin's walk has not reached it yet this tick
                    CmdFlow::Copy
                } else {
                    CmdFlow::Completed
                }
            }
            TriggerCommand::PreStart | TriggerCommand::PreRelease => {
                p.status = ComponentState::Active;
                CmdFlow::Copy
            }
            _ => CmdFlow::Reschedule,
        });
    }

    // PathStop is convergence, not failure: the origin's own transition
    // stands, only a fan node somewhere held its joint state.
    match trigger_run(engine, pid, cmd) {
        Err(e) => {
            engine.push_reply(id, e.code());
            clear_trigger(engine, pid)?;
            Ok(CmdFlow::Completed)
        }
        Ok(ws) => match cmd {
            TriggerCommand::PreStart | TriggerCommand::PreRelease => {
                let delay = init_delay_ticks(engine, pid)?;
                let fin = if cmd == TriggerCommand::PreStart {
                    TriggerCommand::Start
                } else {
                    TriggerCommand::Release
                };
                let p = engine.pipeline_mut(pid)?;
                p.trigger.cmd = Some(fin);
                p.trigger.delay = delay;
                Ok(CmdFlow::Reschedule)
            }
            TriggerCommand::Start | TriggerCommand::Release => {
                engine.push_reply(id, 0);
                clear_trigger(engine, pid)?;
                engine.pipeline_mut(pid)?.status = ComponentState::Active;
                Ok(CmdFlow::Copy)
            }
            TriggerCommand::Stop | TriggerCommand::Pause => {
                engine.push_reply(id, 0);
                clear_trigger(engine, pid)?;
                let p = engine.pipeline_mut(pid)?;
                if ws == WalkStatus::PathStop && aborted {
                    // the halt was overtaken by a restart and a fan node
                    // held the subgraph streaming; keep servicing it
                    p.status = ComponentState::Active;
                    Ok(CmdFlow::Copy)
                } else {
                    // the halted pipeline takes no further ticks
                    p.status = ComponentState::Paused;
                    Ok(CmdFlow::Completed)
                }
            }
            _ => {
                clear_trigger(engine, pid)?;
                Ok(CmdFlow::Reschedule)
            }
        },
    }
}

fn clear_trigger(engine: &mut Engine, pid: PipelineId) -> Result<()> {
    let p = engine.pipeline_mut(pid)?;
    p.trigger.cmd = None;
    p.trigger.host = false;
    p.trigger.aborted = false;
    Ok(())
}

/// Longest hardware startup delay in the pipeline, in ticks.
fn init_delay_ticks(engine: &Engine, pid: PipelineId) -> Result<u32> {
    let period_us = engine.pipeline(pid)?.period_us.max(1);
    let mut max_ms = 0u32;
    for cid in engine.graph().component_handles() {
        let c = engine.graph().comp(cid)?;
        if c.pipeline == Some(pid) {
            if let Some(ops) = c.ops.as_ref() {
                max_ms = max_ms.max(ops.init_delay_ms());
            }
        }
    }
    Ok(((u64::from(max_ms) * 1000).div_ceil(period_us)) as u32)
}

/// Move one period of data through the pipeline's own subgraph.
fn pipeline_copy(engine: &mut Engine, pid: PipelineId) -> Result<()> {
    let (start, dir) = copy_origin(engine, pid)?;
    let period_us = engine.pipeline(pid)?.period_us;
    engine.graph.copy_walk(start, dir, period_us, pid)
}

/// One bounded resynchronization attempt after an xrun.
///
/// Every component is forced back to `Ready`, the rings are flushed, then
/// the pipeline is re-prepared and restarted. Any error along the way
/// fails the recovery; there is no retry loop here.
fn xrun_recover(engine: &mut Engine, pid: PipelineId) -> Result<()> {
    let id = engine.pipeline(pid)?.id;
    tracing::info!(pipeline = id, "xrun recovery");

    trigger_run(engine, pid, TriggerCommand::Xrun)?;
    engine.pipeline_mut(pid)?.xrun_bytes = 0;

    // stale data in the rings would immediately re-trigger the xrun
    let stale: Vec<crate::buffer::BufferId> = engine
        .graph()
        .component_handles()
        .filter(|&cid| {
            engine
                .graph()
                .comp(cid)
                .map(|c| c.pipeline == Some(pid))
                .unwrap_or(false)
        })
        .flat_map(|cid| {
            engine
                .graph()
                .comp(cid)
                .map(|c| c.outputs.to_vec())
                .unwrap_or_default()
        })
        .collect();
    for bid in stale {
        engine.graph().buffer(bid)?.reset();
    }

    trigger_run(engine, pid, TriggerCommand::Prepare)?;
    if trigger_run(engine, pid, TriggerCommand::PreStart)? == WalkStatus::Continue {
        trigger_run(engine, pid, TriggerCommand::Start)?;
    }
    Ok(())
}

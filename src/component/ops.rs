//! Pluggable per-component processing behavior.
//!
//! The trigger walk drives component *state*; everything a node does with
//! actual audio lives behind [`ComponentOps`]. The engine hands each call a
//! [`ProcessContext`] holding the locked streams of the node's input and
//! output buffers, so an implementation never reaches into the graph
//! itself.
//!
//! Four stock implementations cover the common endpoint and junction
//! roles; anything else plugs in the same trait.

use smallvec::SmallVec;

use crate::component::{ComponentState, Direction, TriggerCommand};
use crate::coherent::CoherentGuard;
use crate::error::{Error, Result};
use crate::stream::RingStream;

/// Locked streams and sizing for one processing call.
pub struct ProcessContext<'a> {
    /// Streams this component consumes from, locked for the call.
    pub inputs: SmallVec<[CoherentGuard<'a, RingStream>; 4]>,
    /// State of the component feeding each entry of `inputs`, same order.
    pub input_states: SmallVec<[ComponentState; 4]>,
    /// Streams this component produces into, locked for the call.
    pub outputs: SmallVec<[CoherentGuard<'a, RingStream>; 4]>,
    /// Bytes one scheduling period is worth at the negotiated format.
    pub period_bytes: usize,
}

/// Processing entry points of one component.
///
/// All methods except [`ComponentOps::copy`] have no-op defaults; most
/// components only process data.
pub trait ComponentOps: Send {
    /// Allocate and size per-instance resources after parameter negotiation.
    fn prepare(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<()> {
        Ok(())
    }

    /// React to a state transition this component just made.
    fn trigger(&mut self, _cmd: TriggerCommand) -> Result<()> {
        Ok(())
    }

    /// Move/transform one period of data between the context's streams.
    fn copy(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()>;

    /// Drop negotiated parameters and per-instance resources.
    fn reset(&mut self) {}

    /// Startup latency of the underlying hardware, in milliseconds.
    ///
    /// A non-zero value delays the final trigger stage by the matching
    /// number of scheduling ticks.
    fn init_delay_ms(&self) -> u32 {
        0
    }
}

/// Host endpoint: models the DMA transfer to/from host memory.
///
/// Playback side sources data into the graph; capture side drains it. The
/// host side is elastic, so a short period moves what fits instead of
/// failing.
pub struct HostOps {
    direction: Direction,
}

impl HostOps {
    /// Create a host endpoint for `direction`.
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl ComponentOps for HostOps {
    fn copy(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        match self.direction {
            Direction::Playback => {
                let out = ctx
                    .outputs
                    .first_mut()
                    .ok_or(Error::NoData)?;
                let bytes = ctx.period_bytes.min(out.free());
                out.produce(bytes);
            }
            Direction::Capture => {
                let inp = ctx.inputs.first_mut().ok_or(Error::NoData)?;
                let bytes = ctx.period_bytes.min(inp.available());
                inp.consume(bytes);
            }
        }
        Ok(())
    }
}

/// Hardware interface endpoint: consumes or produces exactly one period.
///
/// The link clock does not stretch, so a shortfall is an underrun or
/// overrun and surfaces as [`Error::Xrun`].
pub struct DaiOps {
    direction: Direction,
    init_delay_ms: u32,
}

impl DaiOps {
    /// Create a hardware endpoint for `direction` with a startup delay.
    pub fn new(direction: Direction, init_delay_ms: u32) -> Self {
        Self {
            direction,
            init_delay_ms,
        }
    }
}

impl ComponentOps for DaiOps {
    fn copy(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let bytes = ctx.period_bytes;
        match self.direction {
            Direction::Playback => {
                let inp = ctx.inputs.first_mut().ok_or(Error::NoData)?;
                if inp.available() < bytes {
                    return Err(Error::Xrun {
                        bytes: (bytes - inp.available()) as u32,
                    });
                }
                inp.consume(bytes);
            }
            Direction::Capture => {
                let out = ctx.outputs.first_mut().ok_or(Error::NoData)?;
                if out.free() < bytes {
                    return Err(Error::Xrun {
                        bytes: (bytes - out.free()) as u32,
                    });
                }
                out.produce(bytes);
            }
        }
        Ok(())
    }

    fn init_delay_ms(&self) -> u32 {
        self.init_delay_ms
    }
}

/// Mixer junction: sums signed 16-bit samples from every streaming input.
///
/// Only inputs whose source component is `Active` take part; a stopped or
/// paused source is left untouched so its ring keeps whatever it held.
/// Moves `min(every live input's available, output free, period)` bytes
/// per call. With no live input at all the mixer writes one period of
/// silence instead, so the hardware sink downstream stays fed.
#[derive(Default)]
pub struct MixerOps;

impl ComponentOps for MixerOps {
    fn copy(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let live: SmallVec<[usize; 4]> = ctx
            .input_states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ComponentState::Active)
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            if let Some(out) = ctx.outputs.first_mut() {
                let bytes = ctx.period_bytes.min(out.free()) & !1;
                if bytes > 0 {
                    out.push(&vec![0u8; bytes])?;
                }
            }
            return Ok(());
        }

        let mut bytes = ctx.period_bytes;
        for &i in &live {
            bytes = bytes.min(ctx.inputs[i].available());
        }
        if let Some(out) = ctx.outputs.first() {
            bytes = bytes.min(out.free());
        }
        bytes &= !1; // whole s16 samples only
        if bytes == 0 {
            return Ok(());
        }

        let mut mix = vec![0i16; bytes / 2];
        let mut chunk = vec![0u8; bytes];
        for &i in &live {
            ctx.inputs[i].pop(&mut chunk)?;
            for (acc, pair) in mix.iter_mut().zip(chunk.chunks_exact(2)) {
                let sample = i16::from_le_bytes([pair[0], pair[1]]);
                *acc = acc.saturating_add(sample);
            }
        }
        for (dst, acc) in chunk.chunks_exact_mut(2).zip(mix.iter()) {
            dst.copy_from_slice(&acc.to_le_bytes());
        }
        if let Some(out) = ctx.outputs.first_mut() {
            out.push(&chunk)?;
        }
        Ok(())
    }
}

/// Transparent junction: forwards input bytes to the output unchanged.
#[derive(Default)]
pub struct PassthroughOps;

impl ComponentOps for PassthroughOps {
    fn copy(&mut self, ctx: &mut ProcessContext<'_>) -> Result<()> {
        let bytes = ctx.period_bytes;
        if let (Some(inp), Some(out)) = (ctx.inputs.first_mut(), ctx.outputs.first_mut()) {
            inp.transfer(out, bytes);
        }
        Ok(())
    }
}

//! # Pipecore
//!
//! An audio-DSP pipeline execution engine modeled on firmware practice:
//! component graphs with a multi-stage trigger state machine, periodic
//! low-latency scheduling with xrun recovery, deadline scheduling for
//! lower-frequency work, and a mailbox channel for cross-core commands.
//!
//! ## Features
//!
//! - **Ring streams**: SPSC byte rings with format metadata and explicit
//!   overrun semantics
//! - **Coherency cells**: lock + cache-maintenance wrappers with RAII
//!   release for objects shared across cores
//! - **Trigger propagation**: fan-in/fan-out aware state walks with
//!   explicit command substitution
//! - **Two schedulers**: priority-ordered periodic queue plus an
//!   earliest-deadline-first queue per core
//! - **Cross-core mailboxes**: busy/done protocol with bounded blocking
//!   sends and out-of-interrupt handler dispatch
//!
//! ## Quick Start
//!
//! ```rust
//! use pipecore::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::new());
//! engine.create_component(ComponentDesc {
//!     id: 1,
//!     pipeline: 5,
//!     direction: Direction::Playback,
//!     core: 0,
//!     ops: Box::new(HostOps::new(Direction::Playback)),
//! })?;
//! engine.create_component(ComponentDesc {
//!     id: 2,
//!     pipeline: 5,
//!     direction: Direction::Playback,
//!     core: 0,
//!     ops: Box::new(DaiOps::new(Direction::Playback, 0)),
//! })?;
//! engine.create_buffer(&BufferDesc {
//!     id: 10,
//!     size: 8192,
//!     core: 0,
//!     params: StreamParams::default(),
//! })?;
//! engine.connect(1, 10, 2)?;
//!
//! let desc = PipelineDesc {
//!     id: 5,
//!     priority: 0,
//!     core: 0,
//!     period_us: 1000,
//!     time_domain: TimeDomain::Timer,
//! };
//! engine.create_pipeline(&desc, 2)?;
//! engine.complete_pipeline(5)?;
//! engine.trigger(5, TriggerCommand::Prepare)?;
//! engine.trigger(5, TriggerCommand::Start)?;
//! # Ok::<(), pipecore::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod coherent;
pub mod component;
pub mod engine;
pub mod error;
pub mod idc;
pub mod pipeline;
pub mod schedule;
pub mod stream;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{Buffer, BufferDesc};
    pub use crate::coherent::Coherent;
    pub use crate::component::{
        Component, ComponentDesc, ComponentOps, ComponentState, DaiOps, Direction, HostOps,
        MixerOps, PassthroughOps, ProcessContext, TriggerCommand,
    };
    pub use crate::engine::{Engine, EngineConfig, TriggerReply};
    pub use crate::error::{Error, Result};
    pub use crate::idc::{ComponentAction, IdcMessage};
    pub use crate::pipeline::{Pipeline, PipelineDesc, TimeDomain, TriggerStatus};
    pub use crate::schedule::{TaskId, TaskState};
    pub use crate::stream::{FrameFormat, RingStream, StreamParams};
}

pub use error::{Error, Result};

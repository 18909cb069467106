//! Error types for pipecore.

use thiserror::Error;

/// Result type alias using pipecore's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An object with this id already exists in the topology.
    #[error("duplicate id: {0}")]
    DuplicateId(u32),

    /// No component with this id.
    #[error("no such component: {0}")]
    NoSuchComponent(u32),

    /// No buffer with this id.
    #[error("no such buffer: {0}")]
    NoSuchBuffer(u32),

    /// No pipeline with this id.
    #[error("no such pipeline: {0}")]
    NoSuchPipeline(u32),

    /// No task with this handle.
    #[error("no such task: {0}")]
    NoSuchTask(u32),

    /// A connection endpoint does not fit (already connected, wrong direction).
    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    /// Pipeline was already completed and cannot be completed again.
    #[error("pipeline {0} already completed")]
    PipelineAlreadyComplete(u32),

    /// Pipeline is still scheduled/active and cannot be freed.
    #[error("pipeline {0} still active")]
    PipelineActive(u32),

    /// A trigger command is not legal in the component's current state.
    #[error("invalid state transition: {state:?} on {cmd:?}")]
    InvalidTransition {
        /// State the component was in.
        state: crate::component::ComponentState,
        /// Command that was rejected.
        cmd: crate::component::TriggerCommand,
    },

    /// Producer or consumer missed its data deadline.
    #[error("xrun: {bytes} bytes")]
    Xrun {
        /// Bytes the stream was short by (0 when unknown).
        bytes: u32,
    },

    /// A capture path has no upstream able to provide data.
    #[error("no data available on trigger path")]
    NoData,

    /// A blocking cross-core send exceeded its deadline.
    #[error("idc timeout waiting for core {core}")]
    IdcTimeout {
        /// The core that did not answer.
        core: usize,
    },

    /// Target core is not powered/online.
    #[error("core {0} offline")]
    CoreOffline(usize),

    /// Component processing error reported by an ops callback.
    #[error("component {id} failed: {msg}")]
    Component {
        /// External id of the failing component.
        id: u32,
        /// Short description from the ops implementation.
        msg: String,
    },
}

impl Error {
    /// Signed status code reported back to the topology collaborator.
    ///
    /// Mirrors the errno-style replies of the wire protocol: 0 is success,
    /// every error maps to a stable negative code.
    pub fn code(&self) -> i32 {
        match self {
            Error::DuplicateId(_) => -17,
            Error::NoSuchComponent(_)
            | Error::NoSuchBuffer(_)
            | Error::NoSuchPipeline(_)
            | Error::NoSuchTask(_) => -19,
            Error::InvalidConnection(_)
            | Error::PipelineAlreadyComplete(_)
            | Error::InvalidTransition { .. } => -22,
            Error::PipelineActive(_) => -16,
            Error::Xrun { .. } => -32,
            Error::NoData => -61,
            Error::IdcTimeout { .. } => -62,
            Error::CoreOffline(_) => -113,
            Error::Component { .. } => -5,
        }
    }
}

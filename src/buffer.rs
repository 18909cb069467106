//! Inter-component buffers: the edges of the processing graph.
//!
//! A [`Buffer`] owns one [`RingStream`] behind a [`Coherent`] wrapper and
//! records which component produces into it and which consumes from it.
//! Pipelines walk the graph by following these endpoint links; the
//! `walking` flag breaks cycles during a walk and is always cleared before
//! the walk returns.

use crate::coherent::{Coherent, CoherentGuard};
use crate::component::ComponentId;
use crate::stream::{RingStream, StreamParams};

/// Arena handle for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Parameters for creating a buffer.
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Host-visible identifier, unique among live buffers.
    pub id: u32,
    /// Byte capacity of the ring.
    pub size: usize,
    /// Home core.
    pub core: usize,
    /// Initial stream parameters.
    pub params: StreamParams,
}

/// A graph edge: one ring stream plus its producer/consumer endpoints.
#[derive(Debug)]
pub struct Buffer {
    /// Host-visible identifier.
    pub id: u32,
    /// Home core.
    pub core: usize,
    stream: Coherent<RingStream>,
    /// Component producing into this buffer.
    pub source: Option<ComponentId>,
    /// Component consuming from this buffer.
    pub sink: Option<ComponentId>,
    /// Set while a graph walk is traversing this edge.
    pub(crate) walking: bool,
}

impl Buffer {
    /// Create a buffer from `desc`.
    pub fn new(desc: &BufferDesc) -> Self {
        Self {
            id: desc.id,
            core: desc.core,
            stream: Coherent::new(RingStream::new(desc.size, desc.params), desc.core),
            source: None,
            sink: None,
            walking: false,
        }
    }

    /// Lock the underlying stream for reading or writing.
    pub fn stream(&self) -> CoherentGuard<'_, RingStream> {
        self.stream.acquire()
    }

    /// Coherency state and cache counters of the underlying stream.
    pub fn coherency(&self) -> &Coherent<RingStream> {
        &self.stream
    }

    /// Mark the stream shared; called when the endpoints span cores.
    pub fn set_shared(&self) {
        self.stream.set_shared();
    }

    /// Drop buffered data and rewind the ring.
    pub fn reset(&self) {
        self.stream.acquire().reset();
    }

    /// Whether both endpoints are attached.
    pub fn is_connected(&self) -> bool {
        self.source.is_some() && self.sink.is_some()
    }
}

//! Circular byte streams carrying audio frames between components.
//!
//! A [`RingStream`] is a single-producer/single-consumer ring of bytes with
//! stream format metadata attached. The two cursors always lie inside the
//! ring and wrap modulo its capacity; `avail + free == capacity` holds after
//! every mutation. The only mutators are [`RingStream::produce`] and
//! [`RingStream::consume`], which recompute availability from the cursors.
//!
//! A producing write larger than the current free space is legal: the oldest
//! data is implicitly discarded by forcing the read cursor onto the write
//! cursor, leaving the ring full. Data is never torn or corrupted, only
//! dropped whole.

use crate::error::{Error, Result};

/// Sample encoding of the frames in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// Signed 16-bit little-endian.
    #[default]
    S16Le,
    /// Signed 24-bit in 32-bit containers.
    S24Le,
    /// Signed 32-bit little-endian.
    S32Le,
    /// 32-bit IEEE float.
    FloatLe,
}

impl FrameFormat {
    /// Container size of one sample in bytes.
    pub fn sample_bytes(&self) -> u32 {
        match self {
            FrameFormat::S16Le => 2,
            FrameFormat::S24Le | FrameFormat::S32Le | FrameFormat::FloatLe => 4,
        }
    }
}

/// Negotiated stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Sample encoding.
    pub frame_format: FrameFormat,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Channels per frame.
    pub channels: u32,
    /// Required byte alignment for copy chunks.
    pub byte_align: u32,
    /// Required frame alignment for copy chunks.
    pub frame_align: u32,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            frame_format: FrameFormat::S16Le,
            rate: 48_000,
            channels: 2,
            byte_align: 1,
            frame_align: 1,
        }
    }
}

impl StreamParams {
    /// Size of one frame in bytes.
    pub fn frame_bytes(&self) -> u32 {
        self.frame_format.sample_bytes() * self.channels
    }
}

/// Single-producer/single-consumer circular byte buffer with format metadata.
#[derive(Debug)]
pub struct RingStream {
    data: Vec<u8>,
    /// Write cursor, in `[0, capacity)`.
    write: usize,
    /// Read cursor, in `[0, capacity)`.
    read: usize,
    /// Bytes available for reading.
    avail: usize,
    /// Bytes available for writing.
    free: usize,
    params: StreamParams,
}

impl RingStream {
    /// Create a stream with `capacity` bytes of backing storage.
    pub fn new(capacity: usize, params: StreamParams) -> Self {
        Self {
            data: vec![0; capacity],
            write: 0,
            read: 0,
            avail: 0,
            free: capacity,
            params,
        }
    }

    /// Total byte capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently readable.
    pub fn available(&self) -> usize {
        self.avail
    }

    /// Bytes currently writable.
    pub fn free(&self) -> usize {
        self.free
    }

    /// Current stream parameters.
    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Readable frames, rounded down.
    pub fn available_frames(&self) -> usize {
        self.avail / self.params.frame_bytes() as usize
    }

    /// Renegotiate stream parameters, resetting the cursors.
    ///
    /// Any buffered data is dropped; a format change invalidates it anyway.
    pub fn set_params(&mut self, params: StreamParams) {
        self.params = params;
        self.reset();
    }

    /// Drop all buffered data and rewind both cursors.
    pub fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
        self.avail = 0;
        self.free = self.data.len();
    }

    /// Resize the backing storage. Drops buffered data.
    pub fn resize(&mut self, capacity: usize) {
        self.data = vec![0; capacity];
        self.reset();
    }

    fn wrap(&self, cursor: usize) -> usize {
        let cap = self.data.len();
        if cap == 0 { 0 } else { cursor % cap }
    }

    /// Advance the write cursor by `bytes` and recompute availability.
    ///
    /// Producing more than `free()` bytes forces the read cursor onto the
    /// write cursor: the oldest data is discarded and the stream reads full.
    pub fn produce(&mut self, bytes: usize) {
        let overrun = bytes > self.free;
        self.write = self.wrap(self.write + bytes);
        if overrun {
            tracing::warn!(bytes, free = self.free, "ring overrun, oldest data dropped");
            self.read = self.write;
        }

        // r == w after a produce means full
        self.avail = if self.read < self.write {
            self.write - self.read
        } else if self.read == self.write {
            self.data.len()
        } else {
            self.data.len() - (self.read - self.write)
        };
        self.free = self.data.len() - self.avail;
    }

    /// Advance the read cursor by `bytes` and recompute availability.
    pub fn consume(&mut self, bytes: usize) {
        self.read = self.wrap(self.read + bytes);

        // r == w after a consume means empty
        self.avail = if self.read < self.write {
            self.write - self.read
        } else if self.read == self.write {
            0
        } else {
            self.data.len() - (self.read - self.write)
        };
        self.free = self.data.len() - self.avail;
    }

    /// Contiguous bytes readable before the ring wraps.
    pub fn bytes_without_wrap_read(&self) -> usize {
        self.avail.min(self.data.len() - self.read)
    }

    /// Contiguous bytes writable before the ring wraps.
    pub fn bytes_without_wrap_write(&self) -> usize {
        self.free.min(self.data.len() - self.write)
    }

    /// Copy `src` into the ring at the write cursor and produce it.
    ///
    /// Returns [`Error::Xrun`] when `src` exceeds the free space; streaming
    /// copy paths must never overrun silently.
    pub fn push(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.free {
            return Err(Error::Xrun {
                bytes: (src.len() - self.free) as u32,
            });
        }
        let head = self.bytes_without_wrap_write().min(src.len());
        let w = self.write;
        self.data[w..w + head].copy_from_slice(&src[..head]);
        if head < src.len() {
            self.data[..src.len() - head].copy_from_slice(&src[head..]);
        }
        self.produce(src.len());
        Ok(())
    }

    /// Copy from the read cursor into `dst` and consume it.
    ///
    /// Returns [`Error::Xrun`] when fewer than `dst.len()` bytes are
    /// available.
    pub fn pop(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.avail {
            return Err(Error::Xrun {
                bytes: (dst.len() - self.avail) as u32,
            });
        }
        let head = self.bytes_without_wrap_read().min(dst.len());
        let r = self.read;
        dst[..head].copy_from_slice(&self.data[r..r + head]);
        if head < dst.len() {
            let tail = dst.len() - head;
            dst[head..].copy_from_slice(&self.data[..tail]);
        }
        self.consume(dst.len());
        Ok(())
    }

    /// Move up to `max` bytes from `self` into `sink`.
    ///
    /// Transfers `min(self.available, sink.free, max)` bytes and returns the
    /// amount moved. Used by passthrough-style copy paths.
    pub fn transfer(&mut self, sink: &mut RingStream, max: usize) -> usize {
        let n = self.avail.min(sink.free).min(max);
        let mut moved = 0;
        while moved < n {
            let chunk = (n - moved)
                .min(self.bytes_without_wrap_read())
                .min(sink.bytes_without_wrap_write());
            let r = self.read;
            let w = sink.write;
            sink.data[w..w + chunk].copy_from_slice(&self.data[r..r + chunk]);
            self.consume(chunk);
            sink.produce(chunk);
            moved += chunk;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(cap: usize) -> RingStream {
        RingStream::new(cap, StreamParams::default())
    }

    #[test]
    fn test_ring_invariant_across_produce_consume() {
        let mut s = stream(256);
        let steps = [(64, 0), (64, 32), (100, 96), (0, 100), (256, 0)];
        for (p, c) in steps {
            if p <= s.free() {
                s.produce(p);
            }
            let c = c.min(s.available());
            s.consume(c);
            assert_eq!(s.available() + s.free(), s.capacity());
        }
    }

    #[test]
    fn test_produce_full_then_empty() {
        let mut s = stream(128);
        s.produce(128);
        assert_eq!(s.available(), 128);
        assert_eq!(s.free(), 0);
        s.consume(128);
        assert_eq!(s.available(), 0);
        assert_eq!(s.free(), 128);
    }

    #[test]
    fn test_overrun_forces_read_cursor() {
        let mut s = stream(128);
        s.produce(100);
        s.consume(20);
        // 80 available, 48 free; produce 60 overruns by 12
        s.produce(60);
        assert_eq!(s.available(), s.capacity());
        assert_eq!(s.free(), 0);
    }

    #[test]
    fn test_push_pop_roundtrip_with_wrap() {
        let mut s = stream(16);
        s.push(&[0; 10]).unwrap();
        let mut sink = [0u8; 10];
        s.pop(&mut sink).unwrap();
        // cursors now at 10; this write wraps
        let data: Vec<u8> = (0u8..12).collect();
        s.push(&data).unwrap();
        let mut out = [0u8; 12];
        s.pop(&mut out).unwrap();
        assert_eq!(&out[..], &data[..]);
    }

    #[test]
    fn test_push_reports_xrun() {
        let mut s = stream(8);
        s.produce(6);
        let err = s.push(&[0; 4]).unwrap_err();
        match err {
            Error::Xrun { bytes } => assert_eq!(bytes, 2),
            other => panic!("expected xrun, got {other}"),
        }
    }

    #[test]
    fn test_pop_reports_xrun() {
        let mut s = stream(8);
        s.produce(2);
        let mut dst = [0u8; 4];
        assert!(matches!(s.pop(&mut dst), Err(Error::Xrun { bytes: 2 })));
    }

    #[test]
    fn test_transfer_bounded_by_free_and_avail() {
        let mut a = stream(64);
        let mut b = stream(64);
        a.push(&[7; 40]).unwrap();
        b.produce(50); // only 14 free
        let moved = a.transfer(&mut b, usize::MAX);
        assert_eq!(moved, 14);
        assert_eq!(a.available(), 26);
        assert_eq!(b.free(), 0);
    }

    #[test]
    fn test_set_params_resets_cursors() {
        let mut s = stream(64);
        s.produce(30);
        s.set_params(StreamParams {
            rate: 44_100,
            ..StreamParams::default()
        });
        assert_eq!(s.available(), 0);
        assert_eq!(s.params().rate, 44_100);
    }

    #[test]
    fn test_frame_accounting() {
        let mut s = stream(64);
        // default: s16le stereo, 4 bytes per frame
        s.produce(10);
        assert_eq!(s.available_frames(), 2);
    }
}

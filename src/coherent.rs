//! Cross-core coherency wrapper for shared engine objects.
//!
//! [`Coherent`] pairs a value with a lock and a model of the cache
//! maintenance a non-coherent multi-core part would need: acquiring a shared
//! object invalidates the local cached copy before use, releasing it writes
//! the modified copy back before the lock drops. Objects that never leave
//! their home core skip both steps and the counters stay at zero.
//!
//! Acquisition hands out an RAII [`CoherentGuard`]; release is the guard
//! going out of scope, so an acquire can never be left unmatched. Acquiring
//! the same object twice on one thread deadlocks, which is a programming
//! defect rather than a runtime condition, so no re-entrancy escape hatch is
//! provided.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters for the cache maintenance a coherent object has performed.
#[derive(Debug, Default)]
pub struct CacheStats {
    invalidates: AtomicU32,
    writebacks: AtomicU32,
}

impl CacheStats {
    /// Invalidate operations performed on acquire.
    pub fn invalidates(&self) -> u32 {
        self.invalidates.load(Ordering::Relaxed)
    }

    /// Writeback operations performed on release.
    pub fn writebacks(&self) -> u32 {
        self.writebacks.load(Ordering::Relaxed)
    }
}

/// A value owned by one core and optionally shared with the others.
#[derive(Debug)]
pub struct Coherent<T> {
    inner: Mutex<T>,
    /// Home core of the wrapped value.
    core: usize,
    /// Set once when the object becomes visible to other cores.
    shared: AtomicBool,
    stats: CacheStats,
}

impl<T> Coherent<T> {
    /// Wrap `value` as core-local to `core`.
    pub fn new(value: T, core: usize) -> Self {
        Self {
            inner: Mutex::new(value),
            core,
            shared: AtomicBool::new(false),
            stats: CacheStats::default(),
        }
    }

    /// Home core of the wrapped value.
    pub fn core(&self) -> usize {
        self.core
    }

    /// Whether the object has been made visible to other cores.
    pub fn is_shared(&self) -> bool {
        self.shared.load(Ordering::Acquire)
    }

    /// Make the object visible to other cores.
    ///
    /// One-way: once shared, every acquire/release pays the cache
    /// maintenance cost for the rest of the object's life.
    pub fn set_shared(&self) {
        self.shared.store(true, Ordering::Release);
    }

    /// Cache maintenance counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Lock the object and, when shared, invalidate the local cached copy.
    pub fn acquire(&self) -> CoherentGuard<'_, T> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let shared = self.is_shared();
        if shared {
            self.stats.invalidates.fetch_add(1, Ordering::Relaxed);
        }
        CoherentGuard {
            guard,
            stats: &self.stats,
            shared,
        }
    }
}

/// Exclusive access to a [`Coherent`] value; releases on drop.
pub struct CoherentGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    stats: &'a CacheStats,
    shared: bool,
}

impl<T> Deref for CoherentGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for CoherentGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for CoherentGuard<'_, T> {
    fn drop(&mut self) {
        if self.shared {
            self.stats.writebacks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

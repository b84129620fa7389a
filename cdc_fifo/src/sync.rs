//! Bounded-latency handoff of a multi-bit value between clock domains.
//!
//! A [`GrayRegister`] is written by exactly one domain. The other domain never
//! reads it directly: it owns a [`Synchronizer`] that samples the register once
//! per local tick into the first of two latch stages, and only the value that
//! has moved through both stages is used. An update is therefore observed
//! exactly [`SETTLE_TICKS`] reader ticks after it is published.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of reader ticks a sampled value is held before it is used.
pub const SETTLE_TICKS: usize = 2;

/// A Gray-coded value published by a single writer domain.
///
/// Successive published values must be Gray-adjacent (equal, or differing in
/// one bit). This is checked in debug builds. Each register gets its own
/// cache line so the two directions of a queue never contend.
#[repr(C, align(64))]
pub struct GrayRegister {
    value: AtomicUsize,
}

impl GrayRegister {
    pub fn new(initial: usize) -> Self {
        Self {
            value: AtomicUsize::new(initial),
        }
    }

    /// Publishes a new value. Must only be called from the owning domain.
    ///
    /// Release ordering makes every write the owner performed before the
    /// publish visible to a reader whose sample observes the new value.
    #[inline]
    pub fn publish(&self, gray: usize) {
        debug_assert!(
            (self.value.load(Ordering::Relaxed) ^ gray).count_ones() <= 1,
            "published value is not Gray-adjacent to the previous one"
        );
        self.value.store(gray, Ordering::Release);
    }

    /// Reads the raw register. Cross-domain readers go through a [`Synchronizer`].
    #[inline]
    pub fn sample(&self) -> usize {
        self.value.load(Ordering::Acquire)
    }
}

/// Two latch stages owned by the reading domain.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    stages: [usize; SETTLE_TICKS],
}

impl Synchronizer {
    /// Creates a synchronizer whose stages already hold `initial`.
    pub fn new(initial: usize) -> Self {
        Self {
            stages: [initial; SETTLE_TICKS],
        }
    }

    /// Advances the stages by one reader tick, sampling `source` into the first.
    #[inline]
    pub fn clock(&mut self, source: &GrayRegister) {
        for i in (1..SETTLE_TICKS).rev() {
            self.stages[i] = self.stages[i - 1];
        }
        self.stages[0] = source.sample();
    }

    /// The settled value, safe for the reading domain to act on.
    #[inline]
    pub fn output(&self) -> usize {
        self.stages[SETTLE_TICKS - 1]
    }
}

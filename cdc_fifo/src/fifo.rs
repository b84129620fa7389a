//! Gray-pointer SPSC queue between two independently clocked domains.
//!
//! Each half keeps a `k+1` bit binary pointer of its own. The low `k` bits
//! index the ring, the top bit records wrap parity so that "full" and "empty"
//! stay distinguishable when the low bits coincide.
//!
//! The only state a half publishes is the Gray code of its pointer, through a
//! [`GrayRegister`] nobody else writes. The opposite half observes it through
//! its own [`Synchronizer`], advanced by calling `tick()` once per local clock
//! tick. The full/empty flags therefore lag the true state by at most
//! [`SETTLE_TICKS`](crate::SETTLE_TICKS) ticks of the observing domain, and
//! never lead it.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::gray::{from_gray, to_gray};
use crate::serial::Serial;
use crate::sync::{GrayRegister, Synchronizer};

/// Largest supported `k` (capacity `2^k`).
pub const MAX_DEPTH_LOG2: u32 = 16;

/// Error returned by [`Producer::enqueue`] when the queue is full.
///
/// The rejected item is handed back; the queue is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError<T> {
    Rejected(T),
}

impl<T> EnqueueError<T> {
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Rejected(item) => item,
        }
    }
}

impl<T> std::fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Rejected(_) => write!(f, "queue is full"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for EnqueueError<T> {}

/// Error returned by [`Consumer::try_dequeue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryDequeueError {
    /// Nothing is visible to the consumer yet.
    Empty,
    /// The producer is gone and every item it enqueued has been dequeued.
    Disconnected,
}

impl std::fmt::Display for TryDequeueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TryDequeueError::Empty => write!(f, "dequeue on an empty queue"),
            TryDequeueError::Disconnected => write!(f, "dequeue on a disconnected queue"),
        }
    }
}

impl std::error::Error for TryDequeueError {}

/// Pointer arithmetic for a ring of `2^k` slots.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    capacity: usize,
    /// Low `k` bits: slot index.
    index_mask: usize,
    /// All `k+1` pointer bits.
    ptr_mask: usize,
    /// Gray bits that differ between a pointer and the one a full lap ahead.
    lap_mask: usize,
}

impl Geometry {
    fn new(depth_log2: u32) -> Self {
        let capacity = 1usize << depth_log2;
        // Binary pointers a lap apart differ only in the parity bit; in Gray
        // code that shows up as the top two bits (or the single bit when k = 0).
        let lap_mask = if depth_log2 == 0 {
            0b1
        } else {
            0b11 << (depth_log2 - 1)
        };
        Self {
            capacity,
            index_mask: capacity - 1,
            ptr_mask: (capacity << 1) - 1,
            lap_mask,
        }
    }

    #[inline]
    fn advance(&self, ptr: usize) -> usize {
        (ptr + 1) & self.ptr_mask
    }

    #[inline]
    fn distance(&self, ahead: usize, behind: usize) -> usize {
        ahead.wrapping_sub(behind) & self.ptr_mask
    }
}

/// State shared by both halves. Every field has exactly one writer domain.
struct Inner<T> {
    /// Written by the producer at its write pointer, read by the consumer at its read pointer.
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Producer pointer, Gray-coded. Producer writes, consumer samples.
    write_gray: GrayRegister,
    /// Consumer pointer, Gray-coded. Consumer writes, producer samples.
    read_gray: GrayRegister,
    liveness: Liveness,
}

/// Cleared once each, by the owning half's `Drop`.
struct Liveness {
    producer_alive: AtomicBool,
    consumer_alive: AtomicBool,
}

unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

/// The producing half of a cross-domain queue.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
    /// Binary write pointer (`k+1` bits), local to the producer.
    write_ptr: usize,
    /// Consumer pointer as seen by the producer, after settling.
    read_sync: Synchronizer,
    geometry: Geometry,
}

unsafe impl<T: Send> Send for Producer<T> {}

/// The consuming half of a cross-domain queue.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
    /// Binary read pointer (`k+1` bits), local to the consumer.
    read_ptr: usize,
    /// Producer pointer as seen by the consumer, after settling.
    write_sync: Synchronizer,
    geometry: Geometry,
}

unsafe impl<T: Send> Send for Consumer<T> {}

/// Creates a cross-domain queue with capacity `2^depth_log2`.
///
/// # Panics
/// Panics if `depth_log2` exceeds [`MAX_DEPTH_LOG2`].
pub fn channel<T: Serial>(depth_log2: u32) -> (Producer<T>, Consumer<T>) {
    assert!(
        depth_log2 <= MAX_DEPTH_LOG2,
        "queue depth 2^{depth_log2} exceeds 2^{MAX_DEPTH_LOG2}"
    );

    let geometry = Geometry::new(depth_log2);
    let slots: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..geometry.capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();

    let inner = Arc::new(Inner {
        slots,
        write_gray: GrayRegister::new(0),
        read_gray: GrayRegister::new(0),
        liveness: Liveness {
            producer_alive: AtomicBool::new(true),
            consumer_alive: AtomicBool::new(true),
        },
    });

    let producer = Producer {
        inner: Arc::clone(&inner),
        write_ptr: 0,
        read_sync: Synchronizer::new(0),
        geometry,
    };

    let consumer = Consumer {
        inner,
        read_ptr: 0,
        write_sync: Synchronizer::new(0),
        geometry,
    };

    (producer, consumer)
}

impl<T: Serial> Producer<T> {
    /// Advances the producer clock: shifts the consumer pointer one stage
    /// further through the synchronizer.
    #[inline]
    pub fn tick(&mut self) {
        self.read_sync.clock(&self.inner.read_gray);
        debug_assert!(
            self.len_hint() <= self.geometry.capacity,
            "synchronized read pointer ran ahead of the write pointer"
        );
    }

    /// Returns true if no slot is free as far as the producer can tell.
    ///
    /// Full when our Gray pointer equals the synchronized consumer pointer
    /// one lap ahead.
    #[inline]
    pub fn is_full(&self) -> bool {
        to_gray(self.write_ptr) == self.read_sync.output() ^ self.geometry.lap_mask
    }

    /// Writes `item` into the next slot and publishes the advanced pointer.
    ///
    /// Returns `Err(EnqueueError::Rejected(item))` without touching the queue
    /// if it is full.
    #[inline]
    pub fn enqueue(&mut self, item: T) -> Result<(), EnqueueError<T>> {
        if self.is_full() {
            return Err(EnqueueError::Rejected(item));
        }
        debug_assert!(self.len_hint() < self.geometry.capacity);

        let slot = self.write_ptr & self.geometry.index_mask;
        unsafe {
            ptr::write((*self.inner.slots[slot].get()).as_mut_ptr(), item);
        }

        self.write_ptr = self.geometry.advance(self.write_ptr);
        self.inner.write_gray.publish(to_gray(self.write_ptr));

        Ok(())
    }

    /// Items the producer must assume are still in flight. Never below the true count.
    pub fn len_hint(&self) -> usize {
        self.geometry
            .distance(self.write_ptr, from_gray(self.read_sync.output()))
    }

    pub fn capacity(&self) -> usize {
        self.geometry.capacity
    }

    /// Returns true if the consumer has been dropped.
    pub fn is_disconnected(&self) -> bool {
        !self.inner.liveness.consumer_alive.load(Ordering::Acquire)
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.inner
            .liveness
            .producer_alive
            .store(false, Ordering::Release);
    }
}

impl<T: Serial> Consumer<T> {
    /// Advances the consumer clock: shifts the producer pointer one stage
    /// further through the synchronizer.
    #[inline]
    pub fn tick(&mut self) {
        self.write_sync.clock(&self.inner.write_gray);
        debug_assert!(
            self.len_hint() <= self.geometry.capacity,
            "synchronized write pointer ran more than a lap ahead"
        );
    }

    /// Returns true if nothing is visible to the consumer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        to_gray(self.read_ptr) == self.write_sync.output()
    }

    /// Copies the oldest item out and publishes the advanced read pointer.
    #[inline]
    pub fn dequeue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let slot = self.read_ptr & self.geometry.index_mask;
        let item = unsafe { ptr::read((*self.inner.slots[slot].get()).as_ptr()) };

        self.read_ptr = self.geometry.advance(self.read_ptr);
        self.inner.read_gray.publish(to_gray(self.read_ptr));

        Some(item)
    }

    /// Like [`dequeue`](Self::dequeue), but distinguishes a drained queue whose
    /// producer is gone from one that is merely empty.
    ///
    /// Items the producer enqueued before dropping are still delivered once
    /// they have settled.
    pub fn try_dequeue(&mut self) -> Result<T, TryDequeueError> {
        if let Some(item) = self.dequeue() {
            return Ok(item);
        }

        // Liveness first: the register is final once the producer is gone.
        if self.is_disconnected() && self.is_drained() {
            return Err(TryDequeueError::Disconnected);
        }

        Err(TryDequeueError::Empty)
    }

    /// True if every item the producer has published so far has been dequeued.
    ///
    /// Reads the producer's pointer directly instead of the settled copy, so
    /// items still in the synchronizer count as pending. Meant for shutdown
    /// decisions, not for the per-tick empty check.
    pub fn is_drained(&self) -> bool {
        to_gray(self.read_ptr) == self.inner.write_gray.sample()
    }

    /// Items visible to the consumer. Never above the true count.
    pub fn len_hint(&self) -> usize {
        self.geometry
            .distance(from_gray(self.write_sync.output()), self.read_ptr)
    }

    pub fn capacity(&self) -> usize {
        self.geometry.capacity
    }

    /// Returns true if the producer has been dropped.
    pub fn is_disconnected(&self) -> bool {
        !self.inner.liveness.producer_alive.load(Ordering::Acquire)
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.inner
            .liveness
            .consumer_alive
            .store(false, Ordering::Release);
    }
}

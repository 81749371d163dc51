//! Bounded rings crossing the control thread / audio callback boundary.
//!
//! Both rings are pre-allocated with a power-of-two capacity and guarded by a
//! short mutex; every operation is O(capacity) at worst and never allocates.
//! The two rings deliberately use different overflow policies:
//!
//! - [`TriggerChannel`] drops the *new* mask when full. It is drained
//!   completely on every callback block, so this only happens if the callback
//!   stalls.
//! - [`FeedbackChannel`] overwrites the *oldest* record when full. It is
//!   written once per block but only drained at game-loop rate; if the control
//!   thread falls behind by more than the capacity, the oldest judgment data
//!   is lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::drum::DrumMask;

/// What actually sounded: the drums started in one callback block and the
/// absolute frame position at which that block began.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Feedback {
    pub position: u64,
    pub mask: DrumMask,
}

/// Rounds a requested capacity up to the next power of two (minimum 1).
#[inline(always)]
pub fn ring_capacity(requested: usize) -> usize {
    requested.max(1).next_power_of_two()
}

// Poisoning only means the other side panicked mid-operation; the ring
// indices are still consistent, so keep going instead of propagating.
#[inline(always)]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Ring<T> {
    buf: Box<[T]>,
    mask: usize,
    head: usize,
    tail: usize,
}

impl<T: Copy + Default> Ring<T> {
    fn with_capacity(cap_pow2: usize) -> Self {
        assert!(cap_pow2.is_power_of_two());
        Self {
            buf: vec![T::default(); cap_pow2].into_boxed_slice(),
            mask: cap_pow2 - 1,
            head: 0,
            tail: 0,
        }
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.head.wrapping_sub(self.tail)
    }

    #[inline(always)]
    fn is_full(&self) -> bool {
        self.len() == self.buf.len()
    }

    #[inline(always)]
    fn push(&mut self, value: T) {
        self.buf[self.head & self.mask] = value;
        self.head = self.head.wrapping_add(1);
    }

    #[inline(always)]
    fn pop(&mut self) -> Option<T> {
        if self.len() == 0 {
            return None;
        }
        let value = self.buf[self.tail & self.mask];
        self.tail = self.tail.wrapping_add(1);
        Some(value)
    }

    fn clear(&mut self) {
        self.tail = self.head;
    }
}

/* ============================ Trigger channel ============================ */

/// Control thread -> callback. Masks queued between two callback blocks are
/// merged by OR on drain, so two presses of the same drum inside one block
/// collapse into a single hit.
pub struct TriggerChannel {
    ring: Mutex<Ring<DrumMask>>,
    dropped: AtomicU64,
}

impl TriggerChannel {
    pub fn with_capacity(requested: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(ring_capacity(requested))),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queues a trigger mask. Empty masks are not queued. Returns `false` if
    /// the ring was full and the mask was dropped.
    pub fn push(&self, mask: DrumMask) -> bool {
        if mask.is_empty() {
            return true;
        }
        let mut ring = lock(&self.ring);
        if ring.is_full() {
            drop(ring);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        ring.push(mask);
        true
    }

    /// Empties the ring and returns the OR of everything it held.
    pub fn drain(&self) -> DrumMask {
        let mut ring = lock(&self.ring);
        let mut merged = DrumMask::empty();
        while let Some(mask) = ring.pop() {
            merged |= mask;
        }
        merged
    }

    pub fn clear(&self) {
        lock(&self.ring).clear();
    }

    pub fn capacity(&self) -> usize {
        lock(&self.ring).buf.len()
    }

    /// Masks dropped because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/* ============================ Feedback channel ============================ */

/// Callback -> control thread. One record per callback block.
pub struct FeedbackChannel {
    ring: Mutex<Ring<Feedback>>,
    overwritten: AtomicU64,
}

impl FeedbackChannel {
    pub fn with_capacity(requested: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(ring_capacity(requested))),
            overwritten: AtomicU64::new(0),
        }
    }

    /// Writes a record unconditionally, evicting the oldest one if full.
    pub fn publish(&self, record: Feedback) {
        let mut ring = lock(&self.ring);
        let evicted = ring.is_full();
        if evicted {
            let _ = ring.pop();
        }
        ring.push(record);
        drop(ring);
        if evicted {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Appends every pending record to `out`, oldest first. Returns how many
    /// were appended.
    pub fn drain_into(&self, out: &mut Vec<Feedback>) -> usize {
        let mut ring = lock(&self.ring);
        let pending = ring.len();
        out.reserve(pending);
        while let Some(record) = ring.pop() {
            out.push(record);
        }
        pending
    }

    pub fn clear(&self) {
        lock(&self.ring).clear();
    }

    pub fn capacity(&self) -> usize {
        lock(&self.ring).buf.len()
    }

    /// Records lost to overwrite because the control thread fell behind.
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

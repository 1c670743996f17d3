//! Stamped-ticket ring stack.
//!
//! A single `top` counter, kept within `[0, capacity]`, assigns depths:
//! a push claims depth `top` by a bound-checked CAS-increment, a pop
//! claims depth `top - 1` by a CAS-decrement (reporting Empty when the
//! counter is zero). Depth `d` always maps to slot `d`; a stack's ring
//! never advances through cycles the way a queue's does.
//!
//! Unlike the queue, the counter is not monotonic, so a depth claim alone
//! cannot own a slot: a pusher stalled since an earlier claim of depth
//! `d` and a fresh pusher claiming `d` again may both be in flight. Each
//! slot therefore carries a *stamped* monotonic sequence
//! `seq = 4 * cycle + phase` with phases EMPTY, WRITING, FULL, READING;
//! same-kind claimants serialise by CAS-claiming their phase on the slot.
//! Claims on one depth alternate push/pop by construction (the counter
//! must cross the `d`/`d + 1` boundary between two claims of the same
//! kind), so every claimant's turn arrives and values are conserved.
//! The sequence never runs backwards, which is what makes stale
//! claimants harmless: they simply wait for the next matching phase.
//!
//! LIFO holds under isolation: if a push completes before a pop starts
//! and nothing interleaves, the pop returns the youngest element.
//! Overlapping operations are ordered by their claim order on `top`.
//!
//! Every cardinality uses this one type: producers and consumers all
//! contend on `top`, so there is no counter to relax in the
//! single-threaded configurations.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backoff::Backoff;
use crate::config::Config;
use crate::invariants::debug_assert_top_bound;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::model::{ConcurrencyModel, RingDesign, StructureType};
use crate::slot::{make_stamped_slots, CachePadded, Slot};
use crate::traits::{Bounded, ConcurrentStack, Container};

// Phase of a slot's stamped sequence (seq % 4).
const EMPTY: u64 = 0;
const FULL: u64 = 2;

/// Bounded lock-free LIFO over a ring of stamped slots.
pub struct RingStack<T> {
    top: CachePadded<AtomicU64>,
    slots: Box<[Slot<T>]>,
    config: Config,
    metrics: Metrics,
}

impl<T: Send> RingStack<T> {
    /// Slot synchronization scheme of this container.
    pub const DESIGN: RingDesign = RingDesign::Ticket;

    /// Creates a ring stack.
    pub fn new(config: Config) -> Self {
        Self {
            top: CachePadded::new(AtomicU64::new(0)),
            slots: make_stamped_slots(config.capacity()),
            config,
            metrics: Metrics::new(),
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Current depth of the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.top.load(Ordering::Relaxed) as usize
    }

    /// True when the stack holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top.load(Ordering::Relaxed) == 0
    }

    /// Snapshot of the operation counters (zeros unless enabled).
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    #[inline]
    fn slot_for(&self, depth: u64) -> &Slot<T> {
        &self.slots[(depth & self.config.mask()) as usize]
    }

    /// Claim the next EMPTY phase of `slot`, write, publish FULL.
    fn complete_push(&self, slot: &Slot<T>, value: T) {
        let mut backoff = Backoff::new();
        loop {
            let seq = slot.ticket();
            if seq % 4 == EMPTY && slot.try_advance(seq, seq + 1) {
                // SAFETY: the WRITING phase is exclusively ours.
                unsafe { slot.write(value) };
                slot.publish(seq + 2);
                if self.config.enable_metrics {
                    self.metrics.add_pushes(1);
                }
                return;
            }
            backoff.snooze();
        }
    }

    /// Claim the next FULL phase of `slot`, move out, publish EMPTY.
    fn complete_pop(&self, slot: &Slot<T>) -> T {
        let mut backoff = Backoff::new();
        loop {
            let seq = slot.ticket();
            if seq % 4 == FULL && slot.try_advance(seq, seq + 1) {
                // SAFETY: the READING phase is exclusively ours.
                let value = unsafe { slot.take() };
                slot.publish(seq + 2);
                if self.config.enable_metrics {
                    self.metrics.add_pops(1);
                }
                return value;
            }
            backoff.snooze();
        }
    }

    /// Blocking push; back-pressures while the stack is full.
    pub fn push(&self, value: T) {
        let mut backoff = Backoff::new();
        let depth = loop {
            let top = self.top.load(Ordering::Acquire);
            debug_assert_top_bound!(top, self.capacity());
            if top == self.capacity() as u64 {
                if self.config.enable_metrics {
                    self.metrics.add_spin_waits(1);
                }
                backoff.snooze();
                continue;
            }
            match self
                .top
                .compare_exchange_weak(top, top + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break top,
                Err(_) => {
                    if self.config.enable_metrics {
                        self.metrics.add_cas_retries(1);
                    }
                }
            }
        };
        self.complete_push(self.slot_for(depth), value);
    }

    /// Pop the most recently pushed element; `None` when the stack is
    /// empty at reservation time.
    pub fn pop(&self) -> Option<T> {
        let depth = loop {
            let top = self.top.load(Ordering::Acquire);
            if top == 0 {
                return None;
            }
            match self
                .top
                .compare_exchange_weak(top, top - 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break top - 1,
                Err(_) => {
                    if self.config.enable_metrics {
                        self.metrics.add_cas_retries(1);
                    }
                }
            }
        };
        Some(self.complete_pop(self.slot_for(depth)))
    }

    /// Non-blocking push. `false` means the stack was full, or the top
    /// slot was still mid-handover (contention abort).
    pub fn try_push(&self, value: T) -> bool {
        loop {
            let top = self.top.load(Ordering::Acquire);
            if top == self.capacity() as u64 {
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return false;
            }
            // The depth is only claimed once the slot is visibly ready, so
            // a failed try leaves the container untouched.
            if self.slot_for(top).ticket() % 4 != EMPTY {
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return false;
            }
            match self
                .top
                .compare_exchange_weak(top, top + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    self.complete_push(self.slot_for(top), value);
                    return true;
                }
                Err(_) => {
                    if self.config.enable_metrics {
                        self.metrics.add_cas_retries(1);
                    }
                }
            }
        }
    }

    /// Non-blocking pop. `None` means the stack was empty, or the top
    /// element was still being published (contention abort).
    pub fn try_pop(&self) -> Option<T> {
        loop {
            let top = self.top.load(Ordering::Acquire);
            if top == 0 {
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return None;
            }
            let depth = top - 1;
            if self.slot_for(depth).ticket() % 4 != FULL {
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return None;
            }
            match self
                .top
                .compare_exchange_weak(top, depth, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(self.complete_pop(self.slot_for(depth))),
                Err(_) => {
                    if self.config.enable_metrics {
                        self.metrics.add_cas_retries(1);
                    }
                }
            }
        }
    }
}

impl<T> Drop for RingStack<T> {
    fn drop(&mut self) {
        // Single-threaded at destruction: every FULL slot holds an element
        // that was pushed but never popped.
        if std::mem::needs_drop::<T>() {
            for slot in self.slots.iter_mut() {
                if slot.ticket_relaxed() % 4 == FULL {
                    // SAFETY: FULL slot, exclusive access in drop.
                    unsafe { slot.drop_in_place() };
                }
            }
        }
    }
}

impl<T: Send> Container for RingStack<T> {
    const STRUCTURE: StructureType = StructureType::StaticRingBuffer;
    const MODEL: ConcurrencyModel = ConcurrencyModel::Mpmc;

    #[inline]
    fn is_empty(&self) -> bool {
        RingStack::is_empty(self)
    }
}

impl<T: Send> Bounded for RingStack<T> {
    #[inline]
    fn capacity(&self) -> usize {
        RingStack::capacity(self)
    }

    #[inline]
    fn len(&self) -> usize {
        RingStack::len(self)
    }
}

impl<T: Send> ConcurrentStack<T> for RingStack<T> {
    fn push(&self, value: T) {
        RingStack::push(self, value);
    }

    fn try_push(&self, value: T) -> bool {
        RingStack::try_push(self, value)
    }

    fn pop(&self) -> Option<T> {
        RingStack::pop(self)
    }

    fn try_pop(&self) -> Option<T> {
        RingStack::try_pop(self)
    }
}

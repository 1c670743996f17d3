//! Ticket-protocol ring queue in all four cardinalities.
//!
//! # Protocol
//!
//! Two monotonic 64-bit counters run over an array of [`Slot`]s whose size
//! is a power of two. A push reserves a unique producer ticket `t` from the
//! tail counter; its slot is `t & mask`. The producer waits until the
//! slot's `expected_ticket` equals `t` (EMPTY for this cycle), writes the
//! element, and publishes `t + 1` (FULL). A pop reserves consumer ticket
//! `c` from the head, waits for `c + 1`, moves the element out, and
//! publishes `c + capacity`, the producer ticket of the slot's next
//! wraparound. Tickets are reserved by at most one thread each, so a slot
//! is handed between exactly two threads per cycle and ABA cannot arise:
//! ticket values are never reused within a wraparound window.
//!
//! Ordering is FIFO **by ticket order**, not by wall clock: a producer that
//! stalls between reserving and publishing delays the consumer holding the
//! matching ticket, never reorders it.
//!
//! # Cardinalities
//!
//! The queue is generic over its two counters (see [`Sequence`]); single-
//! threaded sides use the cheap [`Exclusive`] counter. Those sides are only
//! reachable through the non-`Clone` handle returned by [`spsc_queue`],
//! [`mpsc_queue`] or [`spmc_queue`], which makes the single-producer /
//! single-consumer contracts compile-time facts instead of documentation.
//! The all-shared instantiation [`RingQueue<T>`] is used directly.
//!
//! # Non-blocking paths
//!
//! `try_push`/`try_pop` must not alter container state when they fail, so
//! they inspect the slot first and advance the counter with a conditional
//! reservation; a lost race reloads the ticket and retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backoff::Backoff;
use crate::config::Config;
use crate::invariants::{debug_assert_in_flight_bound, debug_assert_slot_cycle};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::model::{ConcurrencyModel, RingDesign, StructureType};
use crate::slot::{make_slots, CachePadded, Slot};
use crate::ticket::{Exclusive, Sequence, Shared};
use crate::traits::{Bounded, ConcurrentQueue, Container};

/// Bounded lock-free FIFO over a ring of ticket slots.
///
/// `RingQueue<T>` (both counters [`Shared`]) is the MPMC variant with every
/// operation on `&self`. The other cardinalities are built by the
/// [`spsc_queue`]/[`mpsc_queue`]/[`spmc_queue`] constructors.
pub struct RingQueue<T, P: Sequence = Shared, C: Sequence = Shared> {
    tail: CachePadded<P>,
    head: CachePadded<C>,
    slots: Box<[Slot<T>]>,
    /// Published-but-unconsumed element count: the `len`/`is_empty`
    /// observable. `tail - head` would overcount while blocking producers
    /// over-reserve on a full ring.
    size: AtomicU64,
    config: Config,
    metrics: Metrics,
}

impl<T: Send, P: Sequence, C: Sequence> RingQueue<T, P, C> {
    /// Slot synchronization scheme of this container.
    pub const DESIGN: RingDesign = RingDesign::Ticket;

    fn with_config(config: Config) -> Self {
        Self {
            tail: CachePadded::new(P::new()),
            head: CachePadded::new(C::new()),
            slots: make_slots(config.capacity()),
            size: AtomicU64::new(0),
            config,
            metrics: Metrics::new(),
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Elements currently in flight (pushed minus popped).
    #[inline]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed) as usize
    }

    /// True when no element is in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.load(Ordering::Relaxed) == 0
    }

    /// Snapshot of the operation counters (zeros unless enabled).
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    #[inline]
    fn slot_for(&self, ticket: u64) -> &Slot<T> {
        &self.slots[(ticket & self.config.mask()) as usize]
    }

    /// Blocking push: reserve, wait for the slot, publish.
    fn push_core(&self, value: T) {
        let ticket = self.tail.reserve();
        let slot = self.slot_for(ticket);

        if slot.ticket() != ticket {
            if self.config.enable_metrics {
                self.metrics.add_spin_waits(1);
            }
            let mut backoff = Backoff::new();
            while slot.ticket() != ticket {
                backoff.snooze();
            }
        }
        debug_assert_slot_cycle!(slot.ticket(), ticket & self.config.mask(), self.config.mask());

        // SAFETY: expected_ticket == ticket hands the slot to this producer;
        // the release publish below orders the write before any consumer read.
        unsafe { slot.write(value) };
        slot.publish(ticket + 1);

        let in_flight = self.size.fetch_add(1, Ordering::Relaxed) + 1;
        debug_assert_in_flight_bound!(in_flight, self.capacity());
        if self.config.enable_metrics {
            self.metrics.add_pushes(1);
        }
    }

    /// Blocking pop: reserve, wait for the publish, move out, recycle.
    fn pop_core(&self) -> T {
        let ticket = self.head.reserve();
        let slot = self.slot_for(ticket);

        if slot.ticket() != ticket + 1 {
            if self.config.enable_metrics {
                self.metrics.add_spin_waits(1);
            }
            let mut backoff = Backoff::new();
            while slot.ticket() != ticket + 1 {
                backoff.snooze();
            }
        }

        // SAFETY: expected_ticket == ticket + 1 marks the slot FULL for this
        // consumer ticket; the element was published with release.
        let value = unsafe { slot.take() };
        // The next producer to land on this slot carries ticket + capacity.
        slot.publish(ticket + self.capacity() as u64);

        self.size.fetch_sub(1, Ordering::Relaxed);
        if self.config.enable_metrics {
            self.metrics.add_pops(1);
        }
        value
    }

    /// Non-blocking push: inspect the slot before touching the counter.
    fn try_push_core(&self, value: T) -> bool {
        let mut ticket = self.tail.load();
        loop {
            let slot = self.slot_for(ticket);
            if slot.ticket() != ticket {
                // Full for this ticket; the reservation was never taken.
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return false;
            }
            match self.tail.try_reserve(ticket) {
                Ok(()) => {
                    // SAFETY: as in push_core; the slot was EMPTY for
                    // `ticket` and the reservation makes it ours.
                    unsafe { slot.write(value) };
                    slot.publish(ticket + 1);
                    self.size.fetch_add(1, Ordering::Relaxed);
                    if self.config.enable_metrics {
                        self.metrics.add_pushes(1);
                    }
                    return true;
                }
                Err(current) => {
                    if self.config.enable_metrics {
                        self.metrics.add_cas_retries(1);
                    }
                    ticket = current;
                }
            }
        }
    }

    /// Non-blocking pop, symmetric to [`try_push_core`](Self::try_push_core).
    fn try_pop_core(&self) -> Option<T> {
        let mut ticket = self.head.load();
        loop {
            // Cheap cross-counter empty check before the slot inspection.
            // Only meaningful when producers share the tail; the single-
            // producer variants drop it and rely on the slot state alone.
            if P::SHARED && ticket == self.tail.load() {
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return None;
            }
            let slot = self.slot_for(ticket);
            if slot.ticket() != ticket + 1 {
                if self.config.enable_metrics {
                    self.metrics.add_failed_tries(1);
                }
                return None;
            }
            match self.head.try_reserve(ticket) {
                Ok(()) => {
                    // SAFETY: FULL slot owned via the reservation.
                    let value = unsafe { slot.take() };
                    slot.publish(ticket + self.capacity() as u64);
                    self.size.fetch_sub(1, Ordering::Relaxed);
                    if self.config.enable_metrics {
                        self.metrics.add_pops(1);
                    }
                    return Some(value);
                }
                Err(current) => {
                    if self.config.enable_metrics {
                        self.metrics.add_cas_retries(1);
                    }
                    ticket = current;
                }
            }
        }
    }
}

impl<T: Send> RingQueue<T> {
    /// Creates an MPMC ring queue.
    pub fn new(config: Config) -> Self {
        Self::with_config(config)
    }

    /// Blocking push; back-pressures by spinning on its reserved slot
    /// while the queue is full.
    #[inline]
    pub fn push(&self, value: T) {
        self.push_core(value);
    }

    /// Blocking pop; waits for the matching producer to publish.
    #[inline]
    pub fn pop(&self) -> T {
        self.pop_core()
    }

    /// Non-blocking push. `false` means the ring was full.
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        self.try_push_core(value)
    }

    /// Non-blocking pop. `None` means the ring was empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        self.try_pop_core()
    }
}

impl<T, P: Sequence, C: Sequence> Drop for RingQueue<T, P, C> {
    fn drop(&mut self) {
        // Single-threaded at destruction. Destroy the elements that were
        // published but never consumed: exactly the tickets in [head, tail)
        // whose slot still reads FULL (over-reserved tickets read EMPTY).
        if std::mem::needs_drop::<T>() {
            let head = self.head.load_relaxed();
            let tail = self.tail.load_relaxed();
            let mask = self.config.mask();
            let mut ticket = head;
            while ticket != tail {
                let slot = &mut self.slots[(ticket & mask) as usize];
                if slot.ticket_relaxed() == ticket + 1 {
                    // SAFETY: FULL slot, exclusive access in drop.
                    unsafe { slot.drop_in_place() };
                }
                ticket = ticket.wrapping_add(1);
            }
        }
    }
}

impl<T: Send, P: Sequence, C: Sequence> Container for RingQueue<T, P, C> {
    const STRUCTURE: StructureType = StructureType::StaticRingBuffer;
    const MODEL: ConcurrencyModel = if P::SHARED {
        if C::SHARED {
            ConcurrencyModel::Mpmc
        } else {
            ConcurrencyModel::Mpsc
        }
    } else if C::SHARED {
        ConcurrencyModel::Spmc
    } else {
        ConcurrencyModel::Spsc
    };

    #[inline]
    fn is_empty(&self) -> bool {
        RingQueue::is_empty(self)
    }
}

impl<T: Send, P: Sequence, C: Sequence> Bounded for RingQueue<T, P, C> {
    #[inline]
    fn capacity(&self) -> usize {
        RingQueue::capacity(self)
    }

    #[inline]
    fn len(&self) -> usize {
        RingQueue::len(self)
    }
}

impl<T: Send> ConcurrentQueue<T> for RingQueue<T> {
    fn push(&self, value: T) {
        self.push_core(value);
    }

    fn try_push(&self, value: T) -> bool {
        self.try_push_core(value)
    }

    fn pop(&self) -> Option<T> {
        Some(self.pop_core())
    }

    fn try_pop(&self) -> Option<T> {
        self.try_pop_core()
    }
}

// ---------------------------------------------------------------------
// Handles for the single-producer / single-consumer sides
// ---------------------------------------------------------------------

/// Producer handle of a ring queue.
///
/// `Clone` only when the producer counter is [`Shared`]; a non-`Clone`
/// producer together with `&mut self` methods proves the single-producer
/// contract to the compiler.
pub struct QueueProducer<T, P: Sequence = Shared, C: Sequence = Shared> {
    queue: Arc<RingQueue<T, P, C>>,
}

/// Consumer handle of a ring queue; the mirror image of [`QueueProducer`].
pub struct QueueConsumer<T, P: Sequence = Shared, C: Sequence = Shared> {
    queue: Arc<RingQueue<T, P, C>>,
}

impl<T: Send, P: Sequence, C: Sequence> QueueProducer<T, P, C> {
    /// Blocking push; back-pressures while the queue is full.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.queue.push_core(value);
    }

    /// Non-blocking push. `false` means the ring was full.
    #[inline]
    pub fn try_push(&mut self, value: T) -> bool {
        self.queue.try_push_core(value)
    }

    /// Elements currently in flight.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when no element is in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T: Send, P: Sequence, C: Sequence> QueueConsumer<T, P, C> {
    /// Blocking pop; waits for the matching producer to publish.
    #[inline]
    pub fn pop(&mut self) -> T {
        self.queue.pop_core()
    }

    /// Non-blocking pop. `None` means the ring was empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        self.queue.try_pop_core()
    }

    /// Elements currently in flight.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when no element is in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T: Send, C: Sequence> Clone for QueueProducer<T, Shared, C> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T: Send, P: Sequence> Clone for QueueConsumer<T, P, Shared> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

fn handles<T: Send, P: Sequence, C: Sequence>(
    config: Config,
) -> (QueueProducer<T, P, C>, QueueConsumer<T, P, C>) {
    let queue = Arc::new(RingQueue::with_config(config));
    (
        QueueProducer {
            queue: Arc::clone(&queue),
        },
        QueueConsumer { queue },
    )
}

/// Creates an SPSC ring queue. Neither handle is `Clone`; both counters
/// are plain (no read-modify-write anywhere).
pub fn spsc_queue<T: Send>(
    config: Config,
) -> (
    QueueProducer<T, Exclusive, Exclusive>,
    QueueConsumer<T, Exclusive, Exclusive>,
) {
    handles(config)
}

/// Creates an MPSC ring queue. The producer handle is `Clone`, one clone
/// per producing thread; the consumer handle is not.
pub fn mpsc_queue<T: Send>(
    config: Config,
) -> (
    QueueProducer<T, Shared, Exclusive>,
    QueueConsumer<T, Shared, Exclusive>,
) {
    handles(config)
}

/// Creates an SPMC ring queue. The consumer handle is `Clone`, one clone
/// per consuming thread; the producer handle is not.
pub fn spmc_queue<T: Send>(
    config: Config,
) -> (
    QueueProducer<T, Exclusive, Shared>,
    QueueConsumer<T, Exclusive, Shared>,
) {
    handles(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn fifo_order_single_thread() {
        let q = RingQueue::new(Config::new(3));
        for i in 0..8 {
            assert!(q.try_push(i));
        }
        for i in 0..8 {
            assert_eq!(q.try_pop(), Some(i));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn try_push_reports_full_and_try_pop_reports_empty() {
        // End-to-end: capacity 4, two slots over.
        let q = RingQueue::new(Config::new(1));
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert!(!q.try_push(3));
        assert_eq!(q.len(), 2);

        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn wraparound_keeps_fifo() {
        let q = RingQueue::new(Config::new(2));
        for round in 0u64..10 {
            for i in 0..4 {
                assert!(q.try_push(round * 4 + i));
            }
            for i in 0..4 {
                assert_eq!(q.try_pop(), Some(round * 4 + i));
            }
        }
    }

    #[test]
    fn drop_destroys_unconsumed_elements() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked(#[allow(dead_code)] u32);
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROPS.store(0, Ordering::SeqCst);
        {
            let q = RingQueue::new(Config::new(3));
            for i in 0..5 {
                q.push(Tracked(i));
            }
            drop(q.pop()); // one consumed, four remain
            assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn spsc_capacity_one_round_trip() {
        // Producer back-pressures on the single slot until it is drained.
        let (mut tx, mut rx) = spsc_queue::<u32>(Config::new(0));
        assert_eq!(tx.capacity(), 1);

        let producer = thread::spawn(move || {
            for i in 0..10 {
                tx.push(i);
            }
        });

        let got: Vec<u32> = (0..10).map(|_| rx.pop()).collect();
        producer.join().unwrap();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
        assert!(rx.is_empty());
    }

    #[test]
    fn spsc_try_pop_drops_cross_counter_check() {
        let (mut tx, mut rx) = spsc_queue::<u8>(Config::new(2));
        assert_eq!(rx.try_pop(), None);
        assert!(tx.try_push(7));
        assert_eq!(rx.try_pop(), Some(7));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn mpsc_producers_clone() {
        // 512 slots: all 400 pushes fit without waiting on the consumer.
        let (tx, mut rx) = mpsc_queue::<u64>(Config::new(9));
        let mut handles = Vec::new();
        for p in 0..4u64 {
            let mut tx = tx.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    tx.push(p * 1000 + i);
                }
            }));
        }
        drop(tx);
        for h in handles {
            h.join().unwrap();
        }

        let mut got = Vec::new();
        while let Some(v) = rx.try_pop() {
            got.push(v);
        }
        assert_eq!(got.len(), 400);

        // Per-producer FIFO survives the interleaving.
        for p in 0..4u64 {
            let ours: Vec<u64> = got.iter().copied().filter(|v| v / 1000 == p).collect();
            assert_eq!(ours, (0..100).map(|i| p * 1000 + i).collect::<Vec<_>>());
        }
    }

    #[test]
    fn spmc_consumers_clone() {
        let (mut tx, rx) = spmc_queue::<u64>(Config::new(8));
        for i in 0..200 {
            tx.push(i);
        }

        let popped = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let mut rx = rx.clone();
            let popped = Arc::clone(&popped);
            handles.push(thread::spawn(move || {
                while rx.try_pop().is_some() {
                    popped.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(popped.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn metrics_when_enabled() {
        let q = RingQueue::new(Config::new(1).with_metrics(true));
        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert!(!q.try_push(3));
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);

        let m = q.metrics();
        assert_eq!(m.pushes, 2);
        assert_eq!(m.pops, 2);
        assert_eq!(m.failed_tries, 2);
    }

    #[test]
    fn metrics_disabled_stay_zero() {
        let q = RingQueue::new(Config::new(1));
        q.push(1u8);
        assert_eq!(q.metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn model_coordinates() {
        fn model_of<Q: Container>(_q: &Q) -> ConcurrencyModel {
            Q::MODEL
        }
        let q = RingQueue::<u8>::new(Config::new(1));
        assert_eq!(model_of(&q), ConcurrencyModel::Mpmc);
        assert_eq!(
            <RingQueue<u8, Exclusive, Exclusive> as Container>::MODEL,
            ConcurrencyModel::Spsc
        );
        assert_eq!(
            <RingQueue<u8, Shared, Exclusive> as Container>::MODEL,
            ConcurrencyModel::Mpsc
        );
        assert_eq!(
            <RingQueue<u8, Exclusive, Shared> as Container>::MODEL,
            ConcurrencyModel::Spmc
        );
        assert_eq!(
            <RingQueue<u8> as Container>::STRUCTURE,
            StructureType::StaticRingBuffer
        );
    }
}

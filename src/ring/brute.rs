//! Brute-force ring containers (educational; not lock-free).
//!
//! These variants replace the per-slot ticket with a four-state flag and
//! serialise every thread on the reservation counters. They are retained
//! as a named point of comparison with the ticket protocol: all threads
//! contend on the same CAS, so the design is not lock-free (not even
//! obstruction-free), and a thread stalled inside a slot handshake stalls
//! the whole container. They also inherit the brute-force scheme's ABA
//! exposure: two producers a full cycle apart wait on the same slot flag
//! and the flag cannot tell them apart, so cross-cycle ordering between
//! them is unspecified. Use [`RingQueue`](crate::RingQueue) and
//! [`RingStack`](crate::RingStack) for real work.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::backoff::Backoff;
use crate::config::Config;
use crate::model::RingDesign;
use crate::slot::CachePadded;

const POP_DONE: u8 = 0; // initial state: empty, ready for a producer
const PUSH_IN_PROGRESS: u8 = 1;
const PUSH_DONE: u8 = 2; // full, ready for a consumer
const POP_IN_PROGRESS: u8 = 3;

/// One element of storage guarded by a four-state flag.
#[repr(align(64))]
struct FlagSlot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety: the state flag hands the value cell to one thread at a time,
// with release stores publishing and acquire CASes claiming.
unsafe impl<T: Send> Send for FlagSlot<T> {}
unsafe impl<T: Send> Sync for FlagSlot<T> {}

impl<T> FlagSlot<T> {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(POP_DONE),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Spin until the flag can be moved `from -> to`, claiming the slot.
    fn claim(&self, from: u8, to: u8) {
        let mut backoff = Backoff::new();
        while self
            .state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            backoff.snooze();
        }
    }

    fn release(&self, state: u8) {
        self.state.store(state, Ordering::Release);
    }
}

fn make_flag_slots<T>(capacity: usize) -> Box<[FlagSlot<T>]> {
    (0..capacity).map(|_| FlagSlot::new()).collect()
}

/// Brute-force MPMC ring queue. Educational only; see the module docs.
pub struct BruteForceRingQueue<T> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    slots: Box<[FlagSlot<T>]>,
    config: Config,
}

impl<T: Send> BruteForceRingQueue<T> {
    /// Slot synchronization scheme of this container.
    pub const DESIGN: RingDesign = RingDesign::BruteForce;

    /// Creates a brute-force ring queue.
    pub fn new(config: Config) -> Self {
        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            slots: make_flag_slots(config.capacity()),
            config,
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// True when no element is in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Blocking push: claim a tail index, then the slot flag.
    pub fn push(&self, value: T) {
        let ticket = self.tail.fetch_add(1, Ordering::AcqRel);
        let slot = &self.slots[(ticket & self.config.mask()) as usize];

        slot.claim(POP_DONE, PUSH_IN_PROGRESS);
        // SAFETY: the flag claim gives this producer the value cell.
        unsafe { (*slot.value.get()).write(value) };
        slot.release(PUSH_DONE);
    }

    /// Blocking pop: wait while empty, claim a head index, then the flag.
    pub fn pop(&self) -> T {
        let mut backoff = Backoff::new();
        let ticket = loop {
            let head = self.head.load(Ordering::Acquire);
            if head == self.tail.load(Ordering::Acquire) {
                backoff.snooze();
                continue;
            }
            match self
                .head
                .compare_exchange(head, head + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break head,
                Err(_) => {}
            }
        };
        let slot = &self.slots[(ticket & self.config.mask()) as usize];

        slot.claim(PUSH_DONE, POP_IN_PROGRESS);
        // SAFETY: the flag claim hands the published value to this consumer.
        let value = unsafe { (*slot.value.get()).as_ptr().read() };
        slot.release(POP_DONE);
        value
    }
}

impl<T> Drop for BruteForceRingQueue<T> {
    fn drop(&mut self) {
        if std::mem::needs_drop::<T>() {
            for slot in self.slots.iter_mut() {
                if *slot.state.get_mut() == PUSH_DONE {
                    // SAFETY: full slot, exclusive access in drop.
                    unsafe { slot.value.get_mut().assume_init_drop() };
                }
            }
        }
    }
}

/// Brute-force MPMC ring stack. Educational only; see the module docs.
pub struct BruteForceRingStack<T> {
    top: CachePadded<AtomicU64>,
    slots: Box<[FlagSlot<T>]>,
    config: Config,
}

impl<T: Send> BruteForceRingStack<T> {
    /// Slot synchronization scheme of this container.
    pub const DESIGN: RingDesign = RingDesign::BruteForce;

    /// Creates a brute-force ring stack.
    pub fn new(config: Config) -> Self {
        Self {
            top: CachePadded::new(AtomicU64::new(0)),
            slots: make_flag_slots(config.capacity()),
            config,
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

    /// Blocking push: claim a depth (waiting while full), then the flag.
    pub fn push(&self, value: T) {
        let mut backoff = Backoff::new();
        let depth = loop {
            let top = self.top.load(Ordering::Acquire);
            if top == self.capacity() as u64 {
                backoff.snooze();
                continue;
            }
            match self
                .top
                .compare_exchange(top, top + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break top,
                Err(_) => {}
            }
        };
        let slot = &self.slots[(depth & self.config.mask()) as usize];

        slot.claim(POP_DONE, PUSH_IN_PROGRESS);
        // SAFETY: the flag claim gives this producer the value cell.
        unsafe { (*slot.value.get()).write(value) };
        slot.release(PUSH_DONE);
    }

    /// Pop the most recently pushed element; `None` when empty at
    /// reservation time.
    pub fn pop(&self) -> Option<T> {
        let depth = loop {
            let top = self.top.load(Ordering::Acquire);
            if top == 0 {
                return None;
            }
            match self
                .top
                .compare_exchange(top, top - 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break top - 1,
                Err(_) => {}
            }
        };
        let slot = &self.slots[(depth & self.config.mask()) as usize];

        slot.claim(PUSH_DONE, POP_IN_PROGRESS);
        // SAFETY: the flag claim hands the published value to this consumer.
        let value = unsafe { (*slot.value.get()).as_ptr().read() };
        slot.release(POP_DONE);
        Some(value)
    }
}

impl<T> Drop for BruteForceRingStack<T> {
    fn drop(&mut self) {
        if std::mem::needs_drop::<T>() {
            for slot in self.slots.iter_mut() {
                if *slot.state.get_mut() == PUSH_DONE {
                    // SAFETY: full slot, exclusive access in drop.
                    unsafe { slot.value.get_mut().assume_init_drop() };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn queue_fifo_single_thread() {
        let q = BruteForceRingQueue::new(Config::new(2));
        for i in 0..4 {
            q.push(i);
        }
        for i in 0..4 {
            assert_eq!(q.pop(), i);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn queue_two_threads() {
        let q = Arc::new(BruteForceRingQueue::new(Config::new(2)));
        let q2 = Arc::clone(&q);
        let producer = thread::spawn(move || {
            for i in 0..100u32 {
                q2.push(i);
            }
        });
        let got: Vec<u32> = (0..100).map(|_| q.pop()).collect();
        producer.join().unwrap();
        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn stack_lifo_and_empty() {
        let s = BruteForceRingStack::new(Config::new(2));
        assert_eq!(s.pop(), None);
        s.push('a');
        s.push('b');
        assert_eq!(s.pop(), Some('b'));
        assert_eq!(s.pop(), Some('a'));
        assert_eq!(s.pop(), None);
    }

    #[test]
    fn stack_drop_sweeps_remaining() {
        use std::sync::atomic::AtomicUsize;
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROPS.store(0, Ordering::SeqCst);
        {
            let s = BruteForceRingStack::new(Config::new(2));
            s.push(Tracked);
            s.push(Tracked);
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }
}

//! ringmpmc: bounded lock-free queues and stacks over ticket rings,
//! linked Treiber stacks with hazard-pointer reclamation, and a blocking
//! baseline queue.
//!
//! # The ticket protocol
//!
//! The ring containers synchronise through one monotonic 64-bit ticket
//! per slot instead of shared flags: a producer reserves a unique ticket
//! from a counter, waits until its slot *expects* that ticket, publishes
//! the element, and hands the slot to the consumer carrying the matching
//! ticket. A stalled thread can delay its own slot but never the rest of
//! the ring, and because a ticket value is never reused within a
//! wraparound window, ABA cannot arise without any allocation or
//! reclamation machinery.
//!
//! Ordering is *logical* FIFO/LIFO: elements are ordered by their
//! reservation tickets, not by wall-clock arrival.
//!
//! # Container family
//!
//! | type | structure | bounded | cardinality |
//! |------|-----------|---------|-------------|
//! | [`RingQueue`] | ticket ring | yes | MPMC directly; SPSC/MPSC/SPMC via [`spsc_queue`]/[`mpsc_queue`]/[`spmc_queue`] handles |
//! | [`RingStack`] | ticket ring | yes | MPMC (covers all) |
//! | [`HazardLinkedStack`] | linked, hazard pointers | no | MPMC (covers SPMC) |
//! | [`mpsc_stack`] | linked, immediate free | no | MPSC (covers SPSC) |
//! | [`BlockingQueue`] | mutex + condvar | no | MPMC, with `stop` |
//! | [`BruteForceRingQueue`], [`BruteForceRingStack`] | flag ring | yes | educational only; not lock-free |
//!
//! Single-producer/single-consumer sides are enforced at compile time:
//! the exclusive handle of a pair is not `Clone` and operates through
//! `&mut self`.
//!
//! # Example
//!
//! ```
//! use ringmpmc::{Config, RingQueue};
//!
//! let queue = RingQueue::new(Config::new(4)); // 16 slots
//! assert!(queue.try_push(1));
//! queue.push(2);
//! assert_eq!(queue.pop(), 1);
//! assert_eq!(queue.try_pop(), Some(2));
//! assert_eq!(queue.try_pop(), None);
//! ```
//!
//! Handle-based SPSC, with the producer back-pressuring on a full ring:
//!
//! ```
//! use ringmpmc::{spsc_queue, Config};
//! use std::thread;
//!
//! let (mut tx, mut rx) = spsc_queue::<u64>(Config::new(3));
//! let producer = thread::spawn(move || (0..100).for_each(|i| tx.push(i)));
//! let sum: u64 = (0..100).map(|_| rx.pop()).sum();
//! producer.join().unwrap();
//! assert_eq!(sum, 4950);
//! ```

mod backoff;
mod blocking;
mod config;
mod error;
mod hazard;
mod invariants;
mod linked;
mod metrics;
mod model;
mod ring;
mod slot;
mod ticket;
mod traits;

pub use backoff::Backoff;
pub use blocking::BlockingQueue;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use error::ContainerError;
pub use linked::{mpsc_stack, HazardLinkedStack, LinkedConsumer, LinkedProducer};
pub use metrics::{Metrics, MetricsSnapshot};
pub use model::{ConcurrencyModel, Reclaimer, RingDesign, StructureType};
pub use ring::brute::{BruteForceRingQueue, BruteForceRingStack};
pub use ring::queue::{
    mpsc_queue, spmc_queue, spsc_queue, QueueConsumer, QueueProducer, RingQueue,
};
pub use ring::stack::RingStack;
pub use ticket::{Exclusive, Sequence, Shared};
pub use traits::{Bounded, ConcurrentQueue, ConcurrentStack, Container};

//! Classification of the container family.
//!
//! Every container type in the crate sits at one point of the
//! {structure} x {concurrency model} x {ring design} grid; the coordinates
//! are reported through the [`Container`](crate::Container) trait so that
//! generic code (and tests) can introspect what it was handed.

/// Backing structure of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureType {
    /// Heap-allocated nodes linked through a head pointer.
    Linked,
    /// Fixed-capacity ring buffer allocated at construction.
    StaticRingBuffer,
}

/// Producer/consumer cardinality a container is specialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcurrencyModel {
    /// Single producer, single consumer.
    Spsc,
    /// Single producer, multiple consumers.
    Spmc,
    /// Multiple producers, single consumer.
    Mpsc,
    /// Multiple producers, multiple consumers.
    Mpmc,
}

/// Slot synchronization scheme of a ring container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingDesign {
    /// Four-state slot flag, all threads serialised on one counter.
    /// Educational only; not lock-free.
    BruteForce,
    /// Per-slot monotonic expected-ticket handshake.
    Ticket,
}

/// Safe-memory-reclamation scheme of a linked multi-consumer container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reclaimer {
    /// Hazard-pointer registry with deferred reclamation.
    HazardPtr,
}

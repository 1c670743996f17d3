//! The common operation surface of the containers.
//!
//! The traits are implemented by the container types whose every operation
//! is safe on a shared reference: the MPMC variants and the blocking
//! queue. The handle-based variants (SPSC/MPSC/SPMC) expose the same
//! vocabulary as inherent methods on their producer/consumer handles,
//! where the missing `Clone` on an exclusive handle is the compile-time
//! proof of its single-threaded side.

use crate::model::{ConcurrencyModel, StructureType};

/// Base observables shared by every container.
pub trait Container {
    /// Backing structure of this container.
    const STRUCTURE: StructureType;
    /// Cardinality the implementation is specialised for.
    const MODEL: ConcurrencyModel;

    /// True when no element is in flight.
    fn is_empty(&self) -> bool;
}

/// Observables of the fixed-capacity containers.
pub trait Bounded: Container {
    /// Number of slots.
    fn capacity(&self) -> usize;
    /// Elements currently in flight (pushed minus popped).
    fn len(&self) -> usize;
}

/// FIFO operations.
pub trait ConcurrentQueue<T>: Container {
    /// Blocking push; back-pressures while the container is full.
    fn push(&self, value: T);

    /// Non-blocking push; `false` means Full (or contention abort).
    fn try_push(&self, value: T) -> bool;

    /// Blocking pop. `None` only for a terminated blocking queue.
    fn pop(&self) -> Option<T>;

    /// Non-blocking pop; `None` means Empty (or contention abort).
    fn try_pop(&self) -> Option<T>;
}

/// LIFO operations.
pub trait ConcurrentStack<T>: Container {
    /// Blocking push; back-pressures while the container is full.
    fn push(&self, value: T);

    /// Non-blocking push; `false` means Full (or contention abort).
    fn try_push(&self, value: T) -> bool;

    /// Pop the most recently pushed element; `None` when empty.
    fn pop(&self) -> Option<T>;

    /// Non-blocking pop; `None` means Empty (or contention abort).
    fn try_pop(&self) -> Option<T>;
}

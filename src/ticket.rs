//! Reservation counters for the ring queue cardinalities.
//!
//! The ticket protocol is identical in all four producer/consumer
//! configurations; only the synchronization cost of the two reservation
//! counters changes. A counter shared by several threads needs read-modify-
//! write reservations; a counter owned by a single thread does not. The
//! [`Sequence`] trait captures exactly that difference so the queue core is
//! written once and monomorphised per configuration:
//!
//! | configuration | producer counter | consumer counter |
//! |---------------|------------------|------------------|
//! | SPSC          | [`Exclusive`]    | [`Exclusive`]    |
//! | MPSC          | [`Shared`]       | [`Exclusive`]    |
//! | SPMC          | [`Exclusive`]    | [`Shared`]       |
//! | MPMC          | [`Shared`]       | [`Shared`]       |
//!
//! [`Exclusive`] still stores its value in an `AtomicU64` so that observers
//! on other threads (`len`, `is_empty`) read it without a data race, but it
//! uses only relaxed loads and stores and never a read-modify-write: the
//! slot publish is the synchronization point, so the counter itself carries
//! no ordering. This is the Rust rendering of a "plain integer" counter.

use std::sync::atomic::{AtomicU64, Ordering};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Shared {}
    impl Sealed for super::Exclusive {}
}

/// A monotonic reservation counter handing out tickets.
pub trait Sequence: sealed::Sealed + Send + Sync + 'static {
    /// Whether more than one thread reserves from this counter.
    const SHARED: bool;

    /// A counter starting at ticket zero.
    fn new() -> Self;

    /// Observe the next ticket. Acquire when shared.
    fn load(&self) -> u64;

    /// Relaxed observation for observers (`len`) and destructors.
    fn load_relaxed(&self) -> u64;

    /// Unconditionally reserve the next ticket and return it.
    fn reserve(&self) -> u64;

    /// Reserve ticket `current` only if it is still the next one.
    ///
    /// On failure the counter is untouched and the observed value is
    /// returned, so non-blocking operations never perturb container state
    /// when they give up. May fail spuriously when shared.
    fn try_reserve(&self, current: u64) -> Result<(), u64>;
}

/// Counter reserved from by multiple threads (the M sides).
pub struct Shared(AtomicU64);

impl Sequence for Shared {
    const SHARED: bool = true;

    #[inline]
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    fn load_relaxed(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    fn reserve(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel)
    }

    #[inline]
    fn try_reserve(&self, current: u64) -> Result<(), u64> {
        self.0
            .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
            .map(drop)
    }
}

/// Counter owned by exactly one thread (the S sides).
///
/// The owning side is enforced by the queue handles: the counter is only
/// ever advanced through a non-cloneable handle taking `&mut self`.
pub struct Exclusive(AtomicU64);

impl Sequence for Exclusive {
    const SHARED: bool = false;

    #[inline]
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    fn load_relaxed(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    fn reserve(&self) -> u64 {
        let ticket = self.0.load(Ordering::Relaxed);
        self.0.store(ticket + 1, Ordering::Relaxed);
        ticket
    }

    #[inline]
    fn try_reserve(&self, current: u64) -> Result<(), u64> {
        // Single owner: `current` is by construction the next ticket.
        self.0.store(current + 1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_reserve_is_monotonic() {
        let seq = Shared::new();
        assert_eq!(seq.reserve(), 0);
        assert_eq!(seq.reserve(), 1);
        assert_eq!(seq.load(), 2);
    }

    #[test]
    fn shared_try_reserve_fails_on_stale_ticket() {
        let seq = Shared::new();
        seq.reserve();
        assert_eq!(seq.try_reserve(0), Err(1));
        assert_eq!(seq.load(), 1);
    }

    #[test]
    fn exclusive_try_reserve_always_advances() {
        let seq = Exclusive::new();
        assert_eq!(seq.try_reserve(0), Ok(()));
        assert_eq!(seq.load(), 1);
        assert_eq!(seq.reserve(), 1);
        assert_eq!(seq.load(), 2);
    }
}

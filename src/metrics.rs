use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for a ring container.
///
/// All counters use `Relaxed` ordering: they are purely statistical, no
/// control flow depends on exact values, and eventual visibility is
/// acceptable for observability.
#[derive(Debug, Default)]
pub struct Metrics {
    pushes: AtomicU64,
    pops: AtomicU64,
    failed_tries: AtomicU64,
    spin_waits: AtomicU64,
    cas_retries: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_pushes(&self, n: u64) {
        self.pushes.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_pops(&self, n: u64) {
        self.pops.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_failed_tries(&self, n: u64) {
        self.failed_tries.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_spin_waits(&self, n: u64) {
        self.spin_waits.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_cas_retries(&self, n: u64) {
        self.cas_retries.fetch_add(n, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            failed_tries: self.failed_tries.load(Ordering::Relaxed),
            spin_waits: self.spin_waits.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
        }
    }
}

/// A copyable snapshot of [`Metrics`] values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Completed push operations.
    pub pushes: u64,
    /// Completed pop operations.
    pub pops: u64,
    /// `try_push`/`try_pop` calls that reported Full or Empty.
    pub failed_tries: u64,
    /// Times an operation had to wait on its reserved slot.
    pub spin_waits: u64,
    /// Failed reservation CAS attempts that were retried.
    pub cas_retries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counts() {
        let m = Metrics::new();
        m.add_pushes(3);
        m.add_pops(2);
        m.add_failed_tries(1);

        let s = m.snapshot();
        assert_eq!(s.pushes, 3);
        assert_eq!(s.pops, 2);
        assert_eq!(s.failed_tries, 1);
        assert_eq!(s.spin_waits, 0);
    }
}

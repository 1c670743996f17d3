//! Hazard-pointer registry and deferred reclamation.
//!
//! A [`HazardDomain`] owns a fixed array of hazard records. A consumer
//! publishes the pointer it is about to dereference into its record; a
//! reclaim pass snapshots every published pointer and frees only retired
//! nodes that appear in no snapshot. The domain is an implementation
//! detail of the linked multi-consumer containers and is shared between
//! all handles of one container through an `Arc`.
//!
//! Record ownership is sticky per thread: the first operation a thread
//! performs against a domain claims a record (re-entrant claims return the
//! same one), and the record is released when the thread exits. Running
//! out of records means the thread count exceeds the configured registry
//! size, a programmer error reported by panicking at the claim site.
//!
//! Retired nodes accumulate in a thread-local list and are reclaimed in
//! batches once the list reaches half the registry size. A thread that
//! exits with still-protected entries parks them on the domain's overflow
//! list, which later reclaim passes and the domain's own drop drain, so
//! every retired node is freed exactly once.

use std::cell::RefCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ContainerError;

/// Default hazard-record count of a domain.
pub(crate) const DEFAULT_RECORD_COUNT: usize = 128;

/// One registry entry: the owning thread and the pointer it protects.
pub(crate) struct HazardRecord {
    /// Owning thread id; 0 = unowned.
    owner: AtomicU64,
    protected: AtomicPtr<u8>,
}

impl HazardRecord {
    /// Publish `ptr` as protected.
    ///
    /// SeqCst: the publish must be ordered before the caller's subsequent
    /// re-validation load, and must be visible to a concurrent reclaim
    /// snapshot; a plain release store could still be reordered after the
    /// re-validation on store/load-relaxed architectures.
    #[inline]
    pub(crate) fn protect(&self, ptr: *mut u8) {
        self.protected.store(ptr, Ordering::SeqCst);
    }

    /// Withdraw protection.
    #[inline]
    pub(crate) fn clear(&self) {
        self.protected.store(ptr::null_mut(), Ordering::Release);
    }
}

/// An entry of a retired list: a node awaiting reclamation and the
/// type-erased function that frees it.
struct Retired {
    ptr: *mut u8,
    drop_fn: unsafe fn(*mut u8),
}

// Safety: a retired node is unlinked and owned solely by the reclamation
// machinery; the raw pointer is only dereferenced by `drop_fn`.
unsafe impl Send for Retired {}

/// A fixed-size hazard-pointer registry plus the shared reclamation state.
pub(crate) struct HazardDomain {
    records: Box<[HazardRecord]>,
    /// Entries inherited from exited threads that were still protected at
    /// exit. Off the hot path: touched by reclaim passes and drop only.
    overflow: Mutex<Vec<Retired>>,
    retired_total: AtomicU64,
    reclaimed_total: AtomicU64,
}

impl HazardDomain {
    pub(crate) fn new(record_count: usize) -> Arc<Self> {
        assert!(record_count > 0, "hazard registry cannot be empty");
        let records = (0..record_count)
            .map(|_| HazardRecord {
                owner: AtomicU64::new(0),
                protected: AtomicPtr::new(ptr::null_mut()),
            })
            .collect();
        Arc::new(Self {
            records,
            overflow: Mutex::new(Vec::new()),
            retired_total: AtomicU64::new(0),
            reclaimed_total: AtomicU64::new(0),
        })
    }

    /// Configured record count.
    pub(crate) fn record_count(&self) -> usize {
        self.records.len()
    }

    /// This thread's hazard record for this domain, claiming one on first
    /// use.
    ///
    /// An associated function taking the `Arc` (in the manner of
    /// `Arc::strong_count`) because the thread-local registration keeps a
    /// clone of it, and `self: &Arc<Self>` is not a stable receiver.
    ///
    /// # Panics
    ///
    /// Panics when every record is owned (`RegistryExhausted`): the thread
    /// count exceeds the registry size chosen at construction.
    pub(crate) fn acquire_record(this: &Arc<Self>) -> &HazardRecord {
        let index = THREAD.with(|state| state.borrow_mut().local_or_insert(this).record);
        &this.records[index]
    }

    /// Scan for a record already owned by `thread_id` (re-entrancy) or
    /// claim an unowned one.
    fn claim_record(&self, thread_id: u64) -> Result<usize, ContainerError> {
        for (index, record) in self.records.iter().enumerate() {
            if record.owner.load(Ordering::Acquire) == thread_id {
                return Ok(index);
            }
            if record
                .owner
                .compare_exchange(0, thread_id, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(index);
            }
        }
        Err(ContainerError::RegistryExhausted {
            capacity: self.records.len(),
        })
    }

    /// Defer destruction of `ptr` until no hazard record protects it.
    ///
    /// Associated function for the same reason as
    /// [`acquire_record`](Self::acquire_record).
    pub(crate) fn retire(this: &Arc<Self>, ptr: *mut u8, drop_fn: unsafe fn(*mut u8)) {
        this.retired_total.fetch_add(1, Ordering::Relaxed);
        let threshold = (this.records.len() / 2).max(1);
        THREAD.with(|state| {
            let mut state = state.borrow_mut();
            let local = state.local_or_insert(this);
            local.retired.push(Retired { ptr, drop_fn });
            if local.retired.len() >= threshold {
                this.reclaim(&mut local.retired);
            }
        });
    }

    /// Free every retired entry not present in the hazard snapshot; keep
    /// the rest. Lock-free apart from an opportunistic grab of the
    /// overflow list.
    fn reclaim(&self, retired: &mut Vec<Retired>) -> usize {
        if let Ok(mut overflow) = self.overflow.try_lock() {
            retired.append(&mut overflow);
        }
        if retired.is_empty() {
            return 0;
        }

        let hazards = self.snapshot();
        let mut kept = Vec::with_capacity(retired.len());
        let mut freed = 0;
        for entry in retired.drain(..) {
            if hazards.contains(&entry.ptr) {
                kept.push(entry);
            } else {
                // SAFETY: the node is unlinked, no hazard protects it, and
                // the snapshot ordering guarantees no thread can still be
                // dereferencing it (a later protect must re-validate).
                unsafe { (entry.drop_fn)(entry.ptr) };
                freed += 1;
            }
        }
        *retired = kept;
        self.reclaimed_total.fetch_add(freed as u64, Ordering::Relaxed);
        freed as usize
    }

    /// Collect every currently protected pointer.
    ///
    /// Every record is read, owned or not: a released record always holds
    /// null (protection is withdrawn before ownership), and gating the
    /// read on a separate owner load could miss the publish of a record
    /// claimed while the scan is running.
    fn snapshot(&self) -> Vec<*mut u8> {
        let mut hazards = Vec::with_capacity(self.records.len());
        for record in self.records.iter() {
            let ptr = record.protected.load(Ordering::SeqCst);
            if !ptr.is_null() {
                hazards.push(ptr);
            }
        }
        hazards
    }

    #[cfg(test)]
    fn totals(&self) -> (u64, u64) {
        (
            self.retired_total.load(Ordering::Relaxed),
            self.reclaimed_total.load(Ordering::Relaxed),
        )
    }
}

impl Drop for HazardDomain {
    fn drop(&mut self) {
        // The last Arc is gone: no container user remains, so no hazard
        // can be live. Entries parked by exited threads are freed here.
        let overflow = match self.overflow.get_mut() {
            Ok(overflow) => overflow,
            Err(poisoned) => poisoned.into_inner(),
        };
        for entry in overflow.drain(..) {
            // SAFETY: unlinked node with no possible reader left.
            unsafe { (entry.drop_fn)(entry.ptr) };
        }
    }
}

// ---------------------------------------------------------------------
// Per-thread state
// ---------------------------------------------------------------------

/// Process-local thread identity (1-based; 0 is the unowned sentinel).
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

struct DomainLocal {
    domain: Arc<HazardDomain>,
    record: usize,
    retired: Vec<Retired>,
}

struct ThreadState {
    id: u64,
    domains: Vec<DomainLocal>,
}

impl ThreadState {
    fn local_or_insert(&mut self, domain: &Arc<HazardDomain>) -> &mut DomainLocal {
        let position = self
            .domains
            .iter()
            .position(|local| Arc::ptr_eq(&local.domain, domain));
        match position {
            Some(index) => &mut self.domains[index],
            None => {
                let id = self.id;
                let index = match domain.claim_record(id) {
                    Ok(index) => index,
                    Err(err) => panic!("{err}"),
                };
                self.domains.push(DomainLocal {
                    domain: Arc::clone(domain),
                    record: index,
                    retired: Vec::new(),
                });
                self.domains.last_mut().expect("just pushed")
            }
        }
    }
}

impl Drop for ThreadState {
    // Thread exit: drain what can be drained, park the rest on the
    // domain's overflow list, release the record.
    fn drop(&mut self) {
        for mut local in self.domains.drain(..) {
            local.domain.reclaim(&mut local.retired);
            if !local.retired.is_empty() {
                match local.domain.overflow.lock() {
                    Ok(mut overflow) => overflow.append(&mut local.retired),
                    Err(poisoned) => poisoned.into_inner().append(&mut local.retired),
                }
            }
            let record = &local.domain.records[local.record];
            record.protected.store(ptr::null_mut(), Ordering::Release);
            record.owner.store(0, Ordering::Release);
        }
    }
}

thread_local! {
    static THREAD: RefCell<ThreadState> = RefCell::new(ThreadState {
        id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
        domains: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn free_u64(ptr: *mut u8) {
        drop(Box::from_raw(ptr.cast::<u64>()));
    }

    #[test]
    fn record_claim_is_sticky() {
        let domain = HazardDomain::new(4);
        let first = HazardDomain::acquire_record(&domain) as *const HazardRecord;
        let second = HazardDomain::acquire_record(&domain) as *const HazardRecord;
        assert_eq!(first, second);
    }

    #[test]
    fn claim_fails_when_exhausted() {
        let domain = HazardDomain::new(2);
        assert!(domain.claim_record(10).is_ok());
        assert!(domain.claim_record(11).is_ok());
        assert_eq!(
            domain.claim_record(12),
            Err(ContainerError::RegistryExhausted { capacity: 2 })
        );
        // Re-entrant claim still succeeds.
        assert!(domain.claim_record(10).is_ok());
    }

    #[test]
    fn unprotected_retirees_are_freed() {
        let domain = HazardDomain::new(2); // threshold = 1: reclaim per retire
        let node = Box::into_raw(Box::new(7u64));
        HazardDomain::retire(&domain, node.cast(), free_u64);
        let (retired, reclaimed) = domain.totals();
        assert_eq!(retired, 1);
        assert_eq!(reclaimed, 1);
    }

    #[test]
    fn protected_retirees_survive_until_cleared() {
        let domain = HazardDomain::new(2);
        let node = Box::into_raw(Box::new(7u64));

        let record = HazardDomain::acquire_record(&domain);
        record.protect(node.cast());
        HazardDomain::retire(&domain, node.cast(), free_u64);
        let (_, reclaimed) = domain.totals();
        assert_eq!(reclaimed, 0, "protected node must not be freed");

        record.clear();
        // Next retire crosses the threshold again and frees both.
        let other = Box::into_raw(Box::new(9u64));
        HazardDomain::retire(&domain, other.cast(), free_u64);
        let (retired, reclaimed) = domain.totals();
        assert_eq!(retired, 2);
        assert_eq!(reclaimed, 2);
    }

    #[test]
    fn exited_thread_parks_protected_entries() {
        let domain = HazardDomain::new(2);
        let node = Box::into_raw(Box::new(1u64)) as usize;

        // Main thread keeps the node protected while the worker retires it.
        let record = HazardDomain::acquire_record(&domain);
        record.protect(node as *mut u8);

        let worker_domain = Arc::clone(&domain);
        std::thread::spawn(move || {
            HazardDomain::retire(&worker_domain, node as *mut u8, free_u64);
        })
        .join()
        .unwrap();

        // The worker exited with the entry still protected; it sits on the
        // overflow list until protection is withdrawn.
        let (_, reclaimed) = domain.totals();
        assert_eq!(reclaimed, 0);
        record.clear();

        // A later reclaim pass (here: forced through another retire) or
        // the domain's drop frees it; either way nothing leaks.
        let other = Box::into_raw(Box::new(2u64));
        HazardDomain::retire(&domain, other.cast(), free_u64);
        let (retired, reclaimed) = domain.totals();
        assert_eq!(retired, 2);
        assert_eq!(reclaimed, 2);
    }
}

//! Lock-free linked stack for multiple consumers (MPMC, and SPMC as its
//! special case), with hazard-pointer reclamation.
//!
//! With more than one consumer, a pop that merely CAS-unlinks the head
//! races other consumers still dereferencing the same node; freeing it
//! immediately would be a use-after-free. Instead every consumer follows
//! the hazard protocol:
//!
//! 1. publish the head candidate into this thread's hazard record,
//! 2. re-load the head and loop until the published pointer is stable,
//! 3. CAS the head to its successor,
//! 4. clear the record, move the value out, and *retire* the node.
//!
//! A retired node is only freed by a reclaim pass that observes no hazard
//! record protecting it. A consumer that misses such a pass must have
//! published after the snapshot, and its step-2 re-load then sees a head
//! that is no longer this node, so it never dereferences it.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use super::{drain_list, Node};
use crate::hazard::{HazardDomain, DEFAULT_RECORD_COUNT};
use crate::model::{ConcurrencyModel, Reclaimer, StructureType};
use crate::traits::{ConcurrentStack, Container};

/// Unbounded lock-free LIFO safe for any number of producers and
/// consumers.
pub struct HazardLinkedStack<T> {
    head: AtomicPtr<Node<T>>,
    domain: Arc<HazardDomain>,
}

// Safety: values travel between threads through owned heap nodes; the
// head CASes order the handoff and the hazard domain serialises node
// destruction after all readers.
unsafe impl<T: Send> Send for HazardLinkedStack<T> {}
unsafe impl<T: Send> Sync for HazardLinkedStack<T> {}

/// Frees a retired node without touching the (already moved-out) value.
unsafe fn dealloc_node<T>(ptr: *mut u8) {
    drop(Box::from_raw(ptr.cast::<Node<T>>()));
}

impl<T: Send> HazardLinkedStack<T> {
    /// Reclamation scheme backing this container.
    pub const RECLAIMER: Reclaimer = Reclaimer::HazardPtr;

    /// Creates a stack with the default hazard-registry size (128).
    pub fn new() -> Self {
        Self::with_registry_size(DEFAULT_RECORD_COUNT)
    }

    /// Creates a stack whose hazard registry has `records` entries: the
    /// maximum number of threads that may pop concurrently over the
    /// stack's lifetime.
    pub fn with_registry_size(records: usize) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            domain: HazardDomain::new(records),
        }
    }

    /// Configured hazard-registry size.
    pub fn registry_size(&self) -> usize {
        self.domain.record_count()
    }

    /// Push a value. Never blocks and never fails; the stack is unbounded.
    pub fn push(&self, value: T) {
        let node = Node::boxed(value, self.head.load(Ordering::Relaxed));
        loop {
            // SAFETY: the node is ours until the CAS links it.
            let next = unsafe { (*node).next };
            match self
                .head
                .compare_exchange_weak(next, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => unsafe { (*node).next = current },
            }
        }
    }

    /// Pop the most recently pushed element; `None` when the stack is
    /// empty.
    ///
    /// # Panics
    ///
    /// Panics if every hazard record is already owned by another thread
    /// (more popping threads than the configured registry size).
    pub fn pop(&self) -> Option<T> {
        let record = HazardDomain::acquire_record(&self.domain);

        let mut current = self.head.load(Ordering::Acquire);
        let node = loop {
            // Publish-validate: loop until the head is stable under our
            // hazard, so no reclaim pass can free it while we hold it.
            // The SeqCst protect/re-load pair keeps the publish ordered
            // before the re-validation; a reclaim pass whose snapshot
            // misses this hazard must then have unlinked the node first,
            // and the re-load observes the new head.
            loop {
                if current.is_null() {
                    record.clear();
                    return None;
                }
                record.protect(current.cast());
                let latest = self.head.load(Ordering::SeqCst);
                if latest == current {
                    break;
                }
                current = latest;
            }

            // SAFETY: protected and re-validated; every consumer follows
            // the same protocol, so the node cannot have been freed.
            let next = unsafe { (*current).next };
            match self.head.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(_) => break current,
                Err(latest) => current = latest,
            }
        };
        record.clear();

        // SAFETY: the winning CAS unlinked the node; the value is moved
        // out exactly once and the node itself is deferred to the domain.
        let value = unsafe { std::mem::ManuallyDrop::into_inner(ptr::read(&(*node).value)) };
        HazardDomain::retire(&self.domain, node.cast(), dealloc_node::<T>);
        Some(value)
    }

    /// True when the stack holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl<T: Send> Default for HazardLinkedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for HazardLinkedStack<T> {
    fn drop(&mut self) {
        // Remaining linked nodes still own their values. Nodes retired by
        // pops are value-less and are freed by their retiring threads or
        // by the domain when its last Arc drops.
        unsafe { drain_list(*self.head.get_mut()) };
    }
}

impl<T: Send> Container for HazardLinkedStack<T> {
    const STRUCTURE: StructureType = StructureType::Linked;
    const MODEL: ConcurrencyModel = ConcurrencyModel::Mpmc;

    #[inline]
    fn is_empty(&self) -> bool {
        HazardLinkedStack::is_empty(self)
    }
}

impl<T: Send> ConcurrentStack<T> for HazardLinkedStack<T> {
    fn push(&self, value: T) {
        HazardLinkedStack::push(self, value);
    }

    fn try_push(&self, value: T) -> bool {
        // Unbounded: a push cannot observe Full.
        HazardLinkedStack::push(self, value);
        true
    }

    fn pop(&self) -> Option<T> {
        HazardLinkedStack::pop(self)
    }

    fn try_pop(&self) -> Option<T> {
        HazardLinkedStack::pop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn lifo_single_thread() {
        let stack = HazardLinkedStack::new();
        stack.push("a");
        stack.push("b");
        assert_eq!(stack.pop(), Some("b"));
        assert_eq!(stack.pop(), Some("a"));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn registry_size_is_configurable() {
        let stack = HazardLinkedStack::<u8>::with_registry_size(16);
        assert_eq!(stack.registry_size(), 16);
        assert_eq!(HazardLinkedStack::<u8>::new().registry_size(), 128);
    }

    #[test]
    fn concurrent_push_pop_drains() {
        let stack = Arc::new(HazardLinkedStack::new());
        let popped = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for tid in 0..8usize {
            let stack = Arc::clone(&stack);
            let popped = Arc::clone(&popped);
            handles.push(thread::spawn(move || {
                for _ in 0..5_000 {
                    stack.push(tid);
                    // Another thread may take our element; each push is
                    // matched by exactly one successful pop overall.
                    while stack.pop().is_none() {
                        std::hint::spin_loop();
                    }
                    popped.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(popped.load(Ordering::SeqCst), 8 * 5_000);
        assert!(stack.is_empty());
    }

    #[test]
    fn values_dropped_exactly_once() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROPS.store(0, Ordering::SeqCst);
        {
            let stack = HazardLinkedStack::new();
            for _ in 0..10 {
                stack.push(Tracked);
            }
            for _ in 0..4 {
                drop(stack.pop());
            }
            assert_eq!(DROPS.load(Ordering::SeqCst), 4);
            // Six values remain linked and are dropped with the stack.
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 10);
    }
}

//! Lock-free linked stack for a single consumer (MPSC, and SPSC as its
//! special case).
//!
//! With exactly one consumer there is no reclamation hazard: the consumer
//! is the only thread that ever unlinks and dereferences interior nodes,
//! so a popped node is freed on the spot. The single-consumer contract is
//! a compile-time fact ([`LinkedConsumer`] is not `Clone` and pops
//! through `&mut self`), which is what licenses skipping the hazard
//! machinery entirely.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use super::{drain_list, Node};
use crate::model::{ConcurrencyModel, StructureType};

struct MpscInner<T> {
    head: AtomicPtr<Node<T>>,
}

// Safety: values travel producer -> consumer through owned heap nodes;
// the CAS pairs on head order the handoff.
unsafe impl<T: Send> Send for MpscInner<T> {}
unsafe impl<T: Send> Sync for MpscInner<T> {}

impl<T> Drop for MpscInner<T> {
    fn drop(&mut self) {
        // SAFETY: exclusive access in drop; the list is whatever was
        // pushed and never popped.
        unsafe { drain_list(*self.head.get_mut()) };
    }
}

/// Producer handle of the MPSC linked stack. Cloneable: any number of
/// threads may push.
pub struct LinkedProducer<T> {
    inner: Arc<MpscInner<T>>,
}

/// Consumer handle of the MPSC linked stack. Not `Clone`: the single
/// consumer is what makes immediate node reclamation safe.
pub struct LinkedConsumer<T> {
    inner: Arc<MpscInner<T>>,
}

/// Creates an MPSC linked stack. Covers SPSC as well; fewer producers
/// only reduce contention on the head.
pub fn mpsc_stack<T: Send>() -> (LinkedProducer<T>, LinkedConsumer<T>) {
    let inner = Arc::new(MpscInner {
        head: AtomicPtr::new(std::ptr::null_mut()),
    });
    (
        LinkedProducer {
            inner: Arc::clone(&inner),
        },
        LinkedConsumer { inner },
    )
}

impl<T: Send> LinkedProducer<T> {
    /// Cardinality this container is specialised for.
    pub const MODEL: ConcurrencyModel = ConcurrencyModel::Mpsc;
    /// Backing structure.
    pub const STRUCTURE: StructureType = StructureType::Linked;

    /// Push a value. Never blocks and never fails; the stack is unbounded.
    pub fn push(&mut self, value: T) {
        let node = Node::boxed(value, self.inner.head.load(Ordering::Relaxed));
        loop {
            // SAFETY: the node is ours until the CAS links it.
            let next = unsafe { (*node).next };
            match self
                .inner
                .head
                .compare_exchange_weak(next, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => unsafe { (*node).next = current },
            }
        }
    }

    /// True when the stack holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.head.load(Ordering::Acquire).is_null()
    }
}

impl<T: Send> Clone for LinkedProducer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send> LinkedConsumer<T> {
    /// Pop the most recently pushed element; `None` when the stack is
    /// empty. The popped node is freed immediately.
    pub fn pop(&mut self) -> Option<T> {
        let mut current = self.inner.head.load(Ordering::Acquire);
        loop {
            if current.is_null() {
                return None;
            }
            // SAFETY: only this consumer unlinks nodes, so `current` cannot
            // have been freed; producers never touch a node after linking.
            let next = unsafe { (*current).next };
            match self.inner.head.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(latest) => current = latest,
            }
        }
        // SAFETY: the winning CAS made the node exclusively ours.
        let mut node = unsafe { Box::from_raw(current) };
        Some(unsafe { std::mem::ManuallyDrop::take(&mut node.value) })
    }

    /// True when the stack holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.head.load(Ordering::Acquire).is_null()
    }
}

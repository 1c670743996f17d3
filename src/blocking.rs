//! Mutex + condition-variable queue: the correctness baseline.
//!
//! No lock-free trickery: a plain `VecDeque` behind a mutex with a
//! one-shot stop flag. This is the oracle the lock-free containers are
//! compared against in tests, and a perfectly good job inbox for
//! general-purpose pools that tolerate contention.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::error::ContainerError;
use crate::model::{ConcurrencyModel, StructureType};
use crate::traits::{ConcurrentQueue, Container};

struct State<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// Blocking MPMC FIFO with a one-shot terminal `stop`.
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                stopped: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
        // A poisoned lock means a panic inside push/pop, which never
        // leaves the VecDeque in a broken state; keep going.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append a value and wake one waiter.
    ///
    /// After [`stop`](Self::stop) the value is discarded and
    /// `Terminated` is returned.
    pub fn push(&self, value: T) -> Result<(), ContainerError> {
        {
            let mut state = self.lock();
            if state.stopped {
                return Err(ContainerError::Terminated);
            }
            state.items.push_back(value);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Wait until an element is available or the queue is stopped.
    ///
    /// Returns `None` only once the queue is stopped *and* drained; until
    /// then every buffered element is still handed out in FIFO order.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(value) = state.items.pop_front() {
                return Some(value);
            }
            if state.stopped {
                return None;
            }
            state = match self.not_empty.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Non-blocking pop; `None` when nothing is buffered.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Stop the queue: wake every waiter, reject further pushes, and let
    /// `pop` drain what is buffered before reporting `None`.
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.not_empty.notify_all();
    }

    /// True once [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Buffered element count.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Container for BlockingQueue<T> {
    const STRUCTURE: StructureType = StructureType::Linked;
    const MODEL: ConcurrencyModel = ConcurrencyModel::Mpmc;

    fn is_empty(&self) -> bool {
        BlockingQueue::is_empty(self)
    }
}

impl<T: Send> ConcurrentQueue<T> for BlockingQueue<T> {
    fn push(&self, value: T) {
        let _ = BlockingQueue::push(self, value);
    }

    fn try_push(&self, value: T) -> bool {
        BlockingQueue::push(self, value).is_ok()
    }

    fn pop(&self) -> Option<T> {
        BlockingQueue::pop(self)
    }

    fn try_pop(&self) -> Option<T> {
        BlockingQueue::try_pop(self)
    }
}

//! Property-based tests for the container invariants.
//!
//! Random operation sequences are replayed against std reference models;
//! the bounded-count, idempotent-empty and round-trip properties are
//! checked after every step.

use proptest::prelude::*;
use ringmpmc::{spsc_queue, BlockingQueue, Config, RingQueue, RingStack};
use std::collections::VecDeque;

/// One random container operation.
#[derive(Debug, Clone)]
enum Op {
    Push(u8),
    Pop,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![any::<u8>().prop_map(Op::Push), Just(Op::Pop)],
        0..200,
    )
}

proptest! {
    /// The ring queue agrees with a VecDeque model step by step, and the
    /// in-flight count never exceeds the capacity.
    #[test]
    fn queue_matches_model(ops in ops()) {
        let queue = RingQueue::new(Config::new(3));
        let capacity = queue.capacity();
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    let accepted = queue.try_push(v);
                    prop_assert_eq!(accepted, model.len() < capacity);
                    if accepted {
                        model.push_back(v);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(queue.try_pop(), model.pop_front());
                }
            }
            prop_assert!(queue.len() <= capacity);
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_empty(), model.is_empty());
        }
    }

    /// The ring stack agrees with a Vec model step by step.
    #[test]
    fn stack_matches_model(ops in ops()) {
        let stack = RingStack::new(Config::new(3));
        let capacity = stack.capacity();
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    let accepted = stack.try_push(v);
                    prop_assert_eq!(accepted, model.len() < capacity);
                    if accepted {
                        model.push(v);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(stack.try_pop(), model.pop());
                }
            }
            prop_assert!(stack.len() <= capacity);
            prop_assert_eq!(stack.len(), model.len());
        }
    }

    /// The blocking queue agrees with a VecDeque model (try paths only).
    #[test]
    fn blocking_queue_matches_model(ops in ops()) {
        let queue = BlockingQueue::new();
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    queue.push(v).unwrap();
                    model.push_back(v);
                }
                Op::Pop => {
                    prop_assert_eq!(queue.try_pop(), model.pop_front());
                }
            }
            prop_assert_eq!(queue.len(), model.len());
        }
    }

    /// Empty is idempotent: try_pop on a drained container keeps
    /// reporting Empty until a push completes.
    #[test]
    fn empty_is_idempotent(probes in 1usize..20, value in any::<u16>()) {
        let queue = RingQueue::new(Config::new(2));
        for _ in 0..probes {
            prop_assert_eq!(queue.try_pop(), None);
        }
        prop_assert!(queue.try_push(value));
        prop_assert_eq!(queue.try_pop(), Some(value));
        for _ in 0..probes {
            prop_assert_eq!(queue.try_pop(), None);
        }
    }

    /// Round trip: whatever fits into an SPSC ring comes back unchanged
    /// and in order.
    #[test]
    fn spsc_round_trip(values in prop::collection::vec(".*", 0..16)) {
        let (mut tx, mut rx) = spsc_queue::<String>(Config::new(4));
        for v in &values {
            prop_assert!(tx.try_push(v.clone()));
        }
        for v in &values {
            let popped = rx.try_pop();
            prop_assert_eq!(popped.as_ref(), Some(v));
        }
        prop_assert_eq!(rx.try_pop(), None);
    }

    /// Wraparound: a queue cycled through many rounds of fill/drain keeps
    /// exact FIFO order across slot reuse.
    #[test]
    fn queue_wraparound_preserves_fifo(rounds in 1u64..50) {
        let queue = RingQueue::new(Config::new(1));
        for round in 0..rounds {
            assert!(queue.try_push(round * 2));
            assert!(queue.try_push(round * 2 + 1));
            prop_assert_eq!(queue.try_pop(), Some(round * 2));
            prop_assert_eq!(queue.try_pop(), Some(round * 2 + 1));
        }
        prop_assert!(queue.is_empty());
    }
}

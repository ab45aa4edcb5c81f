//! Property-based invariant tests for listener bookkeeping.
//!
//! 1. A listener is called at most once per dispatch, however often it was subscribed.
//! 2. Listeners are called in first-subscription order.
//! 3. Unsubscribing removes exactly one listener and keeps the others' order.
//! 4. A locked broadcaster calls nobody.

use flowstate::{Broadcaster, Listener, Observable, ObservableOptions, Subscription};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

const POOL: usize = 6;

#[derive(Clone, Debug)]
enum Op {
    Subscribe(usize),
    Unsubscribe(usize),
    Dispatch,
    Lock,
    Unlock,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..POOL).prop_map(Op::Subscribe),
        2 => (0..POOL).prop_map(Op::Unsubscribe),
        3 => Just(Op::Dispatch),
        1 => Just(Op::Lock),
        1 => Just(Op::Unlock),
    ]
}

struct Harness {
    broadcaster: Broadcaster<u32>,
    listeners: Vec<Listener<u32>>,
    subscriptions: Vec<Option<Subscription>>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl Harness {
    fn new() -> Self {
        let calls: Arc<Mutex<Vec<usize>>> = Default::default();
        let listeners = (0..POOL)
            .map(|id| {
                let calls = calls.clone();
                Listener::new(move |_: &u32| calls.lock().unwrap().push(id))
            })
            .collect();

        Self {
            broadcaster: Broadcaster::new(),
            listeners,
            subscriptions: vec![None; POOL],
            calls,
        }
    }

    fn take_calls(&self) -> Vec<usize> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

proptest! {
    #[test]
    fn dispatch_order_matches_model(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let mut harness = Harness::new();
        let mut model: Vec<usize> = Vec::new();
        let mut locked = false;

        for op in ops {
            match op {
                Op::Subscribe(id) => {
                    let listener = harness.listeners[id].clone();
                    let sub = harness
                        .broadcaster
                        .subscribe_with(listener, ObservableOptions::default());
                    harness.subscriptions[id] = Some(sub);
                    if !model.contains(&id) {
                        model.push(id);
                    }
                }
                Op::Unsubscribe(id) => {
                    if let Some(sub) = harness.subscriptions[id].take() {
                        sub.unsubscribe();
                        model.retain(|&m| m != id);
                    }
                }
                Op::Dispatch => {
                    harness.broadcaster.dispatch(&0);
                    let expected = if locked { Vec::new() } else { model.clone() };
                    prop_assert_eq!(expected, harness.take_calls());
                }
                Op::Lock => {
                    harness.broadcaster.lock();
                    locked = true;
                }
                Op::Unlock => {
                    harness.broadcaster.unlock();
                    locked = false;
                }
            }

            prop_assert_eq!(model.len(), harness.broadcaster.len());
            prop_assert_eq!(locked, harness.broadcaster.is_locked());
        }
    }

    #[test]
    fn repeated_subscription_is_called_once(times in 1usize..10) {
        let harness = Harness::new();

        for _ in 0..times {
            harness
                .broadcaster
                .subscribe_with(harness.listeners[0].clone(), ObservableOptions::default());
        }
        harness.broadcaster.dispatch(&0);

        prop_assert_eq!(1, harness.broadcaster.len());
        prop_assert_eq!(vec![0], harness.take_calls());
    }
}

use flowstate::{
    subscribe, AbortCallback, AbortSignal, Broadcaster, CancellationToken, DispatchError,
    Listener, Notifier, Observable, ObservableOptions,
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener<u32>) {
    let log: Arc<Mutex<Vec<String>>> = Default::default();
    let make = {
        let log = log.clone();
        move |name: &'static str| {
            let log = log.clone();
            Listener::new(move |val: &u32| log.lock().unwrap().push(format!("{name}:{val}")))
        }
    };
    (log, make)
}

#[test]
fn same_listener_subscribed_twice_is_called_once() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();
    let listener = make("a");

    broadcaster.subscribe_with(listener.clone(), ObservableOptions::default());
    broadcaster.subscribe_with(listener, ObservableOptions::default());
    broadcaster.dispatch(&1);

    assert_eq!(1, broadcaster.len());
    assert_eq!(vec![String::from("a:1")], log.lock().unwrap().clone());
}

#[test]
fn distinct_closures_are_distinct_listeners() {
    let broadcaster: Broadcaster<u32> = Broadcaster::new();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        broadcaster.subscribe({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });
    }
    broadcaster.dispatch(&0);

    assert_eq!(3, calls.load(Ordering::SeqCst));
}

#[test]
fn dispatch_follows_registration_order() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();

    let first = broadcaster.subscribe_with(make("first"), ObservableOptions::default());
    broadcaster.subscribe_with(make("second"), ObservableOptions::default());
    broadcaster.subscribe_with(make("third"), ObservableOptions::default());

    broadcaster.dispatch(&1);
    first.unsubscribe();
    broadcaster.dispatch(&2);

    assert_eq!(
        vec!["first:1", "second:1", "third:1", "second:2", "third:2"],
        log.lock().unwrap().clone()
    );
}

#[test]
fn locked_broadcaster_drops_dispatches() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();

    broadcaster.subscribe_with(make("a"), ObservableOptions::default());
    broadcaster.lock();
    broadcaster.dispatch(&1);

    // subscriptions are still accepted while locked
    broadcaster.subscribe_with(make("b"), ObservableOptions::default());
    assert!(broadcaster.is_locked());
    assert!(log.lock().unwrap().is_empty());

    broadcaster.unlock();
    broadcaster.dispatch(&2);

    assert_eq!(vec!["a:2", "b:2"], log.lock().unwrap().clone());
}

#[test]
fn unsubscribe_is_idempotent() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();

    let a = broadcaster.subscribe_with(make("a"), ObservableOptions::default());
    broadcaster.subscribe_with(make("b"), ObservableOptions::default());

    a.unsubscribe();
    a.unsubscribe();
    broadcaster.dispatch(&1);

    assert!(!a.is_active());
    assert_eq!(1, broadcaster.len());
    assert_eq!(vec!["b:1"], log.lock().unwrap().clone());
}

#[test]
fn cancelling_the_token_removes_only_its_subscription() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();
    let token = CancellationToken::new();

    let cancelled =
        broadcaster.subscribe_with(make("a"), ObservableOptions::with_signal(token.clone()));
    broadcaster.subscribe_with(make("b"), ObservableOptions::default());

    broadcaster.dispatch(&1);
    token.cancel();
    token.cancel();
    broadcaster.dispatch(&2);

    assert!(token.is_cancelled());
    assert!(!cancelled.is_active());
    assert_eq!(vec!["a:1", "b:1", "b:2"], log.lock().unwrap().clone());
}

#[test]
fn already_cancelled_token_removes_listener_immediately() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();
    let token = CancellationToken::new();
    token.cancel();

    let sub = broadcaster.subscribe_with(make("a"), ObservableOptions::with_signal(token));
    broadcaster.dispatch(&1);

    assert!(!sub.is_active());
    assert!(broadcaster.is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn custom_abort_signals_are_honoured() {
    #[derive(Clone, Default)]
    struct ManualSignal {
        callbacks: Arc<Mutex<Vec<AbortCallback>>>,
    }

    impl ManualSignal {
        fn fire(&self) {
            let callbacks: Vec<_> = self.callbacks.lock().unwrap().drain(..).collect();
            for callback in callbacks {
                callback.run();
            }
        }
    }

    impl AbortSignal for ManualSignal {
        fn on_abort(&self, callback: AbortCallback) {
            self.callbacks.lock().unwrap().push(callback);
        }
    }

    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();
    let signal = ManualSignal::default();

    broadcaster.subscribe_with(make("a"), ObservableOptions::with_signal(signal.clone()));
    signal.fire();
    broadcaster.dispatch(&1);

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn token_forgets_subscriptions_removed_by_hand() {
    let broadcaster: Broadcaster<u32> = Broadcaster::new();
    let token = CancellationToken::new();

    for _ in 0..100 {
        let sub = broadcaster.subscribe_with(
            (|_: &u32| {}).into(),
            ObservableOptions::with_signal(token.clone()),
        );
        sub.unsubscribe();
    }
    let kept = broadcaster.subscribe_with(
        (|_: &u32| {}).into(),
        ObservableOptions::with_signal(token.clone()),
    );

    assert_eq!(1, token.pending());

    token.cancel();

    assert!(!kept.is_active());
    assert_eq!(0, token.pending());
    assert!(broadcaster.is_empty());
}

#[test]
fn listener_panic_does_not_stop_later_listeners() {
    let broadcaster = Broadcaster::new();
    let (log, make) = recorder();

    broadcaster.subscribe(|_: &u32| panic!("listener failed"));
    broadcaster.subscribe_with(make("after"), ObservableOptions::default());

    let result = panic::catch_unwind(AssertUnwindSafe(|| broadcaster.dispatch(&1)));

    assert!(result.is_err());
    assert_eq!(vec!["after:1"], log.lock().unwrap().clone());
}

#[test]
fn try_dispatch_counts_panicked_listeners() {
    let broadcaster: Broadcaster<u32> = Broadcaster::new();

    broadcaster.subscribe(|_| panic!("first"));
    broadcaster.subscribe(|val| panic!("second {val}"));

    assert_eq!(
        Err(DispatchError::ListenerPanicked {
            panicked: 2,
            message: String::from("first"),
        }),
        broadcaster.try_dispatch(&7)
    );
    assert_eq!(
        "2 listener(s) panicked during dispatch: first",
        broadcaster.try_dispatch(&7).unwrap_err().to_string()
    );
}

#[test]
fn listeners_may_unsubscribe_themselves_during_dispatch() {
    let broadcaster: Broadcaster<u32> = Broadcaster::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<flowstate::Subscription>>> = Default::default();

    let sub = broadcaster.subscribe({
        let calls = calls.clone();
        let slot = slot.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = slot.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        }
    });
    *slot.lock().unwrap() = Some(sub);

    broadcaster.dispatch(&1);
    broadcaster.dispatch(&2);

    assert_eq!(1, calls.load(Ordering::SeqCst));
}

#[test]
fn subscription_outliving_broadcaster_is_harmless() {
    let broadcaster: Broadcaster<u32> = Broadcaster::new();
    let sub = broadcaster.subscribe(|_| {});

    drop(broadcaster);

    sub.unsubscribe();
    assert!(!sub.is_active());
}

#[test]
fn notifier_dispatches_unit() {
    let notifier = Notifier::new();
    let calls = Arc::new(AtomicUsize::new(0));

    subscribe(&notifier, {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    });

    notifier.notify();
    notifier.notify();

    assert_eq!(2, calls.load(Ordering::SeqCst));
}

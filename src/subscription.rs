use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
};

type Removal = Box<dyn FnOnce() + Send>;

/// Handle returned by every subscribe operation.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) removes the listener it was created for.
/// Calling it again has no effect. Dropping the handle does **not** unsubscribe, and the handle
/// never keeps the source it came from alive.
///
/// # Examples
/// ```
/// use flowstate::{Observable, Reactive};
///
/// let r = Reactive::new(1);
/// let sub = r.subscribe(|val| println!("{val}"));
///
/// sub.unsubscribe();
/// sub.unsubscribe(); // no-op
/// assert!(!sub.is_active());
/// ```
#[derive(Clone)]
pub struct Subscription {
    removal: Arc<Mutex<Option<Removal>>>,
}

impl Subscription {
    pub(crate) fn new(removal: impl FnOnce() + Send + 'static) -> Self {
        Self {
            removal: Arc::new(Mutex::new(Some(Box::new(removal)))),
        }
    }

    /// Removes the listener. Idempotent.
    pub fn unsubscribe(&self) {
        let removal = self.acq_lock().take();
        if let Some(removal) = removal {
            removal();
        }
    }

    /// `true` until this handle has been unsubscribed, directly or through a cancelled signal.
    pub fn is_active(&self) -> bool {
        self.acq_lock().is_some()
    }

    fn acq_lock(&self) -> MutexGuard<'_, Option<Removal>> {
        self.removal
            .lock()
            .expect("unable to acquire lock on subscription")
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Anything that can announce, once, that the work it guards was aborted.
pub trait AbortSignal: Send + Sync {
    /// Registers a callback that runs when the signal fires.
    ///
    /// Implementations must run the callback at most once, and run it immediately if the signal
    /// has already fired. Callbacks that report [`is_spent`](AbortCallback::is_spent) may be
    /// dropped without running.
    fn on_abort(&self, callback: AbortCallback);
}

/// The callback an [`AbortSignal`] runs to remove one subscription.
pub struct AbortCallback {
    subscription: Subscription,
}

impl AbortCallback {
    /// Removes the subscription.
    pub fn run(self) {
        self.subscription.unsubscribe();
    }

    /// `true` once the subscription was removed some other way.
    pub fn is_spent(&self) -> bool {
        !self.subscription.is_active()
    }
}

impl Debug for AbortCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortCallback")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Options accepted by [`Observable::subscribe_with`](crate::Observable::subscribe_with).
#[derive(Clone, Default)]
pub struct ObservableOptions {
    /// When this signal fires, the subscription is removed.
    pub signal: Option<Arc<dyn AbortSignal>>,
}

impl ObservableOptions {
    pub fn with_signal(signal: impl AbortSignal + 'static) -> Self {
        Self {
            signal: Some(Arc::new(signal)),
        }
    }

    pub(crate) fn attach(&self, subscription: &Subscription) {
        if let Some(signal) = &self.signal {
            signal.on_abort(AbortCallback {
                subscription: subscription.clone(),
            });
        }
    }
}

impl Debug for ObservableOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableOptions")
            .field("signal", &self.signal.is_some())
            .finish()
    }
}

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    callbacks: Vec<AbortCallback>,
}

/// A clonable cancellation token. All clones share one state.
///
/// # Examples
/// ```
/// use flowstate::{CancellationToken, Observable, ObservableOptions, Reactive};
/// use std::sync::{Arc, Mutex};
///
/// let r = Reactive::new(0);
/// let seen: Arc<Mutex<Vec<i32>>> = Default::default();
/// let token = CancellationToken::new();
///
/// r.subscribe_with(
///     {
///         let seen = seen.clone();
///         move |val: &i32| seen.lock().unwrap().push(*val)
///     }
///     .into(),
///     ObservableOptions::with_signal(token.clone()),
/// );
///
/// r.set(1);
/// token.cancel();
/// r.set(2);
///
/// assert_eq!(vec![1], seen.lock().unwrap().clone());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<Mutex<TokenState>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Registered callbacks run on the caller's thread; later calls do nothing.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.acq_lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };

        for callback in callbacks {
            callback.run();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.acq_lock().cancelled
    }

    /// Number of registered subscriptions still waiting for this token.
    pub fn pending(&self) -> usize {
        let mut state = self.acq_lock();
        state.callbacks.retain(|c| !c.is_spent());
        state.callbacks.len()
    }

    fn acq_lock(&self) -> MutexGuard<'_, TokenState> {
        self.state
            .lock()
            .expect("unable to acquire lock on cancellation token")
    }
}

impl AbortSignal for CancellationToken {
    fn on_abort(&self, callback: AbortCallback) {
        let mut state = self.acq_lock();
        if state.cancelled {
            drop(state);
            callback.run();
        } else {
            // subscriptions removed by hand since the last registration
            state.callbacks.retain(|c| !c.is_spent());
            state.callbacks.push(callback);
        }
    }
}

impl Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

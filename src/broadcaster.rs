use crate::{
    error::{panic_message, DispatchError},
    Observable, ObservableOptions, Subscription,
};
use std::{
    any::Any,
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
};

/// A listener callback with identity.
///
/// Two listeners are the same listener when they share one allocation, i.e. one is a clone of
/// the other. Closures converted with [`Listener::new`] or `.into()` are always new listeners.
pub struct Listener<T> {
    callback: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Listener<T> {
    pub fn new(f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(f),
        }
    }

    pub fn call(&self, value: &T) {
        (self.callback)(value)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T, F> From<F> for Listener<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

impl<T> Debug for Listener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

struct BroadcasterInner<T> {
    // kept in registration order; removal must not reorder
    listeners: Mutex<Vec<Listener<T>>>,
    locked: AtomicBool,
}

impl<T> BroadcasterInner<T> {
    fn acq_lock(&self) -> MutexGuard<'_, Vec<Listener<T>>> {
        self.listeners
            .lock()
            .expect("unable to acquire lock on listeners")
    }

    fn remove(&self, listener: &Listener<T>) {
        let mut listeners = self.acq_lock();
        if let Some(pos) = listeners.iter().position(|l| l.ptr_eq(listener)) {
            listeners.remove(pos);
        }
    }
}

/// Synchronous multi-listener dispatcher.
///
/// Listeners are de-duplicated by identity and called in registration order on the caller's
/// thread. While the broadcaster is [locked](Broadcaster::lock), dispatches are dropped but
/// listeners can still be added and removed.
///
/// A panicking listener does not stop the others: every listener runs, then the first panic is
/// resumed (or reported as a [`DispatchError`] by [`try_dispatch`](Broadcaster::try_dispatch)).
///
/// # Examples
/// ```
/// use flowstate::{Broadcaster, Listener, Observable};
/// use std::sync::{Arc, Mutex};
///
/// let broadcaster: Broadcaster<&str> = Broadcaster::new();
/// let log: Arc<Mutex<Vec<String>>> = Default::default();
///
/// let listener = Listener::new({
///     let log = log.clone();
///     move |val: &&str| log.lock().unwrap().push(val.to_string())
/// });
///
/// broadcaster.subscribe_with(listener.clone(), Default::default());
/// broadcaster.subscribe_with(listener, Default::default());
/// broadcaster.dispatch(&"🦀");
///
/// assert_eq!(vec![String::from("🦀")], log.lock().unwrap().clone());
/// ```
pub struct Broadcaster<T> {
    inner: Arc<BroadcasterInner<T>>,
}

impl<T> Broadcaster<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                listeners: Mutex::new(Vec::with_capacity(2)),
                locked: AtomicBool::new(false),
            }),
        }
    }

    /// Suppresses dispatches until [`unlock`](Broadcaster::unlock) is called.
    /// Callers are responsible for pairing the two.
    pub fn lock(&self) {
        self.inner.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.inner.locked.store(false, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.acq_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every registered listener with `value`.
    ///
    /// # Panics
    ///
    /// Resumes the first listener panic after all listeners have been called.
    pub fn dispatch(&self, value: &T) {
        if let Err(payload) = self.dispatch_isolated(value) {
            panic::resume_unwind(payload);
        }
    }

    /// Like [`dispatch`](Broadcaster::dispatch), but reports listener panics as an error.
    ///
    /// # Examples
    /// ```
    /// use flowstate::{Broadcaster, DispatchError, Observable};
    ///
    /// let broadcaster: Broadcaster<u8> = Broadcaster::new();
    /// broadcaster.subscribe(|_| panic!("boom"));
    ///
    /// assert_eq!(
    ///     Err(DispatchError::ListenerPanicked { panicked: 1, message: "boom".into() }),
    ///     broadcaster.try_dispatch(&1),
    /// );
    /// ```
    pub fn try_dispatch(&self, value: &T) -> Result<(), DispatchError> {
        let mut panicked = 0;
        let mut message = None;
        self.for_each_isolated(value, |payload| {
            panicked += 1;
            message.get_or_insert_with(|| panic_message(payload.as_ref()));
        });

        match message {
            None => Ok(()),
            Some(message) => Err(DispatchError::ListenerPanicked { panicked, message }),
        }
    }

    fn dispatch_isolated(&self, value: &T) -> Result<(), Box<dyn Any + Send>> {
        let mut first = None;
        self.for_each_isolated(value, |payload| {
            if first.is_none() {
                first = Some(payload);
            }
        });

        match first {
            None => Ok(()),
            Some(payload) => Err(payload),
        }
    }

    fn for_each_isolated(&self, value: &T, mut on_panic: impl FnMut(Box<dyn Any + Send>)) {
        if self.is_locked() {
            return;
        }

        // listeners may subscribe, unsubscribe or dispatch again while being called
        let listeners = self.inner.acq_lock().clone();

        #[cfg(feature = "tracing")]
        tracing::trace!(listeners = listeners.len(), "dispatching");

        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener.call(value))) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    message = %panic_message(payload.as_ref()),
                    "listener panicked during dispatch"
                );
                on_panic(payload);
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakBroadcaster<T> {
        WeakBroadcaster {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

pub(crate) struct WeakBroadcaster<T> {
    inner: Weak<BroadcasterInner<T>>,
}

impl<T> WeakBroadcaster<T> {
    pub(crate) fn upgrade(&self) -> Option<Broadcaster<T>> {
        Some(Broadcaster {
            inner: self.inner.upgrade()?,
        })
    }
}

impl<T> Clone for WeakBroadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: 'static> Observable<T> for Broadcaster<T> {
    fn subscribe_with(&self, listener: Listener<T>, options: ObservableOptions) -> Subscription {
        {
            let mut listeners = self.inner.acq_lock();
            if !listeners.iter().any(|l| l.ptr_eq(&listener)) {
                listeners.push(listener.clone());
            }
        }

        let broadcaster = self.downgrade();
        let subscription = Subscription::new(move || {
            if let Some(broadcaster) = broadcaster.upgrade() {
                broadcaster.inner.remove(&listener);
            }
        });
        options.attach(&subscription);

        subscription
    }
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("listeners", &self.len())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Shorthand for `Broadcaster<()>`, for events that carry no value.
///
/// # Examples
/// ```
/// use flowstate::{Notifier, Observable};
/// use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
///
/// let notifier = Notifier::new();
/// let count = Arc::new(AtomicUsize::new(0));
/// notifier.subscribe({
///     let count = count.clone();
///     move |_| { count.fetch_add(1, Ordering::SeqCst); }
/// });
///
/// notifier.notify();
/// assert_eq!(1, count.load(Ordering::SeqCst));
/// ```
pub type Notifier = Broadcaster<()>;

impl Broadcaster<()> {
    pub fn notify(&self) {
        self.dispatch(&());
    }
}

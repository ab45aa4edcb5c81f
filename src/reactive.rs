use crate::{
    broadcaster::WeakBroadcaster,
    Accessor, Broadcaster, DispatchError, Flow, Getter, Listener, Observable, ObservableOptions,
    Setter, Structural, Subscription,
};
use std::{
    collections::hash_map::RandomState,
    fmt::Debug,
    hash::{BuildHasher, Hash},
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

/// Reactive value holder.
///
/// Holds one value and notifies its listeners synchronously whenever the value changes.
/// Clones share the same value and listeners.
///
/// # Examples
/// ```
/// use flowstate::Reactive;
///
/// let r = Reactive::new("🦀");
/// ```
pub struct Reactive<T> {
    value: Arc<Mutex<T>>,
    broadcaster: Broadcaster<T>,
}

impl<T> Reactive<T> {
    /// Constructs a new Reactive<T>
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new("🦀");
    /// ```
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            broadcaster: Broadcaster::new(),
        }
    }

    /// Perform some action with the reference to the inner value.
    ///
    /// The value stays locked while `f` runs, so `f` must not call back into this reactive.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(String::from("🦀"));
    /// r.with_value(|s| println!("{}", s));
    /// ```
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.acq_val_lock().deref())
    }

    pub fn downgrade(&self) -> WeakReactive<T> {
        WeakReactive {
            value: Arc::downgrade(&self.value),
            broadcaster: self.broadcaster.downgrade(),
        }
    }

    /// `true` if both handles refer to the same holder.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    fn acq_val_lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().expect("unable to acquire lock on value")
    }
}

impl<T: Clone> Reactive<T> {
    /// Returns a clone/copy of the value inside the reactive
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(String::from("🦀"));
    /// assert_eq!("🦀", r.get());
    /// ```
    pub fn get(&self) -> T {
        self.acq_val_lock().clone()
    }

    /// Replace the value and notify all the listeners, even if the new value is equal to
    /// the current one.
    ///
    /// # Examples
    /// ```
    /// use flowstate::{Observable, Reactive};
    /// use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
    ///
    /// let r = Reactive::new(10);
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// r.subscribe({
    ///     let calls = calls.clone();
    ///     move |_| { calls.fetch_add(1, Ordering::SeqCst); }
    /// });
    ///
    /// r.set_unchecked(10);
    /// r.set_unchecked(10);
    ///
    /// assert_eq!(2, calls.load(Ordering::SeqCst));
    /// ```
    pub fn set_unchecked(&self, value: T) {
        let snapshot = {
            let mut guard = self.acq_val_lock();
            *guard.deref_mut() = value;
            guard.clone()
        };
        self.broadcaster.dispatch(&snapshot);
    }

    /// Update the value inside the reactive and notify all the listeners
    /// without checking if the value is changed after applying the provided function
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(10);
    /// let d = r.to(|val| val + 5);
    ///
    /// // notifies the listeners as usual because value changed from 10 to 20
    /// r.update_unchecked(|_| 20);
    ///
    /// assert_eq!(25, d.get());
    ///
    /// // would still notify the listeners even if the value didn't change
    /// r.update_unchecked(|_| 20);
    ///
    /// assert_eq!(25, d.get());
    /// ```
    pub fn update_unchecked(&self, f: impl FnOnce(&T) -> T) {
        let snapshot = {
            let mut guard = self.acq_val_lock();
            let new_val = f(guard.deref());
            *guard.deref_mut() = new_val;
            guard.clone()
        };
        self.broadcaster.dispatch(&snapshot);
    }

    /// Updates the value in place and notify all the listeners without checking
    /// if the value is changed after applying the provided function.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(vec![1, 2, 3]);
    /// let d = r.to(|nums| nums.iter().sum::<i32>());
    ///
    /// r.update_inplace_unchecked(|nums| {
    ///     nums.push(4);
    ///     nums.push(5);
    ///     nums.push(6);
    /// });
    ///
    /// assert_eq!(21, d.get());
    /// ```
    pub fn update_inplace_unchecked(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut guard = self.acq_val_lock();
            f(guard.deref_mut());
            guard.clone()
        };
        self.broadcaster.dispatch(&snapshot);
    }

    /// Notify all the listeners of the current value by calling them
    /// in the sequence they were added
    ///
    /// # Examples
    ///
    /// ```
    /// use flowstate::{Observable, Reactive};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let r: Reactive<String> = Reactive::new(String::from("🦀"));
    /// let change_log: Arc<Mutex<Vec<String>>> = Default::default();
    ///
    /// r.subscribe({
    ///     let change_log = change_log.clone();
    ///     move |val| change_log.lock().unwrap().push(val.clone())
    /// });
    ///
    /// r.notify();
    /// r.notify();
    ///
    /// assert_eq!(
    ///     vec![String::from("🦀"), String::from("🦀")],
    ///     change_log.lock().unwrap().clone()
    /// );
    /// ```
    pub fn notify(&self) {
        let snapshot = self.get();
        self.broadcaster.dispatch(&snapshot);
    }

    /// Derive a read-only [`Flow`] that is recomputed whenever this reactive changes.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(10);
    /// let d = r.to(|val| val + 5);
    ///
    /// assert_eq!(15, d.get());
    /// ```
    pub fn to<U>(&self, f: impl Fn(&T) -> U + Send + Sync + 'static) -> Flow<U>
    where
        T: Send + 'static,
        U: Clone + PartialEq + Send + 'static,
    {
        Flow::new(self, f)
    }
}

impl<T: Clone + PartialEq> Reactive<T> {
    /// Replace the value and notify all the listeners **ONLY** if it differs from the current one.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(10);
    /// let d = r.to(|val| val + 35);
    ///
    /// r.set(34);
    ///
    /// assert_eq!(34, r.get());
    /// assert_eq!(69, d.get());
    /// ```
    pub fn set(&self, value: T) {
        if let Some(snapshot) = self.replace_if_changed(value) {
            self.broadcaster.dispatch(&snapshot);
        }
    }

    /// Like [`set`](Reactive::set), but listener panics come back as an error instead of
    /// unwinding. Returns whether a dispatch happened.
    pub fn try_set(&self, value: T) -> Result<bool, DispatchError> {
        match self.replace_if_changed(value) {
            Some(snapshot) => self.broadcaster.try_dispatch(&snapshot).map(|()| true),
            None => Ok(false),
        }
    }

    /// Update the value inside the reactive and notify all the listeners
    /// **ONLY** if the value changes after applying the provided function
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(10);
    /// let d = r.to(|val| val + 5);
    ///
    /// r.update(|n| n * 2);
    ///
    /// assert_eq!(25, d.get());
    /// ```
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let snapshot = {
            let mut guard = self.acq_val_lock();
            let new_val = f(guard.deref());
            if &new_val == guard.deref() {
                return;
            }
            *guard.deref_mut() = new_val;
            guard.clone()
        };
        self.broadcaster.dispatch(&snapshot);
    }

    fn replace_if_changed(&self, value: T) -> Option<T> {
        let mut guard = self.acq_val_lock();
        if &value == guard.deref() {
            return None;
        }
        *guard.deref_mut() = value;
        Some(guard.clone())
    }

    /// Build a [`Accessor`] over this reactive. Every call returns a new accessor with its
    /// own cache.
    pub fn accessor(&self) -> Accessor<T>
    where
        T: Send + Sync + 'static,
    {
        Accessor::new(self)
    }

    /// Build the typed accessor generated for `T` by [`accessor!`](crate::accessor).
    pub fn structural(&self) -> T::Accessor
    where
        T: Structural,
    {
        self.accessor().into()
    }
}

impl<T: Clone + Hash> Reactive<T> {
    /// Updates the value in place and notify all the listeners
    /// **ONLY** if the value changes after applying the provided function.
    ///
    /// Change is detected by comparing hashes of the value before and after `f`.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(vec![1, 2, 3]);
    /// let d = r.to(|nums| nums.iter().sum::<i32>());
    ///
    /// r.update_inplace(|nums| {
    ///     nums.push(4);
    ///     nums.push(5);
    ///     nums.push(6);
    /// });
    ///
    /// assert_eq!(21, d.get());
    /// ```
    pub fn update_inplace(&self, f: impl FnOnce(&mut T)) {
        let random_state = RandomState::new();
        let snapshot = {
            let mut guard = self.acq_val_lock();

            let old_hash = random_state.hash_one(guard.deref());
            f(guard.deref_mut());
            let new_hash = random_state.hash_one(guard.deref());

            if old_hash == new_hash {
                return;
            }
            guard.clone()
        };
        self.broadcaster.dispatch(&snapshot);
    }
}

impl<T: 'static> Observable<T> for Reactive<T> {
    fn subscribe_with(&self, listener: Listener<T>, options: ObservableOptions) -> Subscription {
        self.broadcaster.subscribe_with(listener, options)
    }
}

impl<T: Clone> Getter<T> for Reactive<T> {
    fn get(&self) -> T {
        Reactive::get(self)
    }
}

impl<T: Clone + PartialEq> Setter<T> for Reactive<T> {
    fn set(&self, value: T) {
        Reactive::set(self, value)
    }
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

impl<T: Default> Default for Reactive<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Debug> Debug for Reactive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Reactive")
            .field(self.acq_val_lock().deref())
            .finish()
    }
}

/// Non-owning handle to a [`Reactive`].
///
/// Listeners that write back into a parent hold it through this handle so that parent and child
/// do not keep each other alive.
pub struct WeakReactive<T> {
    value: Weak<Mutex<T>>,
    broadcaster: WeakBroadcaster<T>,
}

impl<T> WeakReactive<T> {
    pub fn upgrade(&self) -> Option<Reactive<T>> {
        Some(Reactive {
            value: self.value.upgrade()?,
            broadcaster: self.broadcaster.upgrade()?,
        })
    }
}

impl<T> Clone for WeakReactive<T> {
    fn clone(&self) -> Self {
        Self {
            value: Weak::clone(&self.value),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

impl<T> Debug for WeakReactive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakReactive")
            .field("alive", &(self.value.strong_count() > 0))
            .finish()
    }
}

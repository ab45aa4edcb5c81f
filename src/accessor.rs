use crate::{Flow, Getter, Listener, Observable, ObservableOptions, Reactive, Setter, Subscription};
use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    ptr,
    sync::{Arc, Mutex, MutexGuard, OnceLock, Weak},
};

type Cache = HashMap<&'static str, Box<dyn Any + Send + Sync>>;
type DerivedFn<T, A, R> = dyn Fn(&T, &A) -> R + Send + Sync;
type MutatingFn<T, A> = dyn for<'a> Fn(&'a mut T, &A) -> &'a mut T + Send + Sync;

/// Types that have a typed accessor, usually generated by [`accessor!`](crate::accessor).
pub trait Structural: Clone + PartialEq + Send + Sync + 'static {
    type Accessor: From<Accessor<Self>>;
}

struct AccessorInner<T> {
    state: Reactive<T>,
    mirror: OnceLock<Arc<Mirror<T>>>,
    cache: Mutex<Cache>,
    // set for accessors over a fork, which follow the holder they were forked from
    upstream: Option<Subscription>,
}

impl<T> Drop for AccessorInner<T> {
    fn drop(&mut self) {
        if let Some(upstream) = &self.upstream {
            upstream.unsubscribe();
        }
    }
}

/// Copy of the held value, kept current by one subscription for as long as anything uses it.
struct Mirror<T> {
    value: Mutex<T>,
    upstream: Subscription,
}

impl<T> Mirror<T>
where
    T: Clone + Send + 'static,
{
    fn follow(state: &Reactive<T>) -> Arc<Self> {
        Arc::new_cyclic(|mirror: &Weak<Self>| {
            let upstream = state.subscribe({
                let mirror = Weak::clone(mirror);
                move |value: &T| {
                    if let Some(mirror) = mirror.upgrade() {
                        *mirror.acq_lock() = value.clone();
                    }
                }
            });

            Self {
                value: Mutex::new(state.get()),
                upstream,
            }
        })
    }
}

impl<T> Mirror<T> {
    fn acq_lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().expect("unable to acquire lock on mirror")
    }
}

impl<T> Drop for Mirror<T> {
    fn drop(&mut self) {
        self.upstream.unsubscribe();
    }
}

/// A structural view over a [`Reactive`] holding a struct.
///
/// Each member of the held value is exposed as its own observable:
///
/// * [`field`](Accessor::field) gives a [`Flow`] narrowed to one field. Setting that flow writes
///   the new field value back into the parent.
/// * [`derived`](Accessor::derived) wraps a `&self` method. Calling it returns a [`Flow`] that
///   re-runs the method with the same arguments whenever the parent changes.
/// * [`mutating`](Accessor::mutating) wraps a `&mut self -> &mut Self` method. Calling it mutates
///   the held value and notifies the parent's listeners.
///
/// Members are created on first access and cached by key, so accessing the same key twice gives
/// the same observable. Accessors never share caches, even over the same holder.
///
/// A field flow writes back into the parent for as long as the flow itself is alive, even after
/// the accessor it came from is dropped.
///
/// Most code uses the typed accessor generated by [`accessor!`](crate::accessor) instead of
/// calling these methods directly.
///
/// # Examples
/// ```
/// use flowstate::{Observable, Reactive};
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Counter {
///     count: u32,
/// }
///
/// let state = Reactive::new(Counter { count: 1 });
/// let accessor = state.accessor();
///
/// let count = accessor.field("count", |c| c.count, |c, v| c.count = v);
/// assert!(count.ptr_eq(&accessor.field("count", |c| c.count, |c, v| c.count = v)));
///
/// count.set(5);
/// assert_eq!(Counter { count: 5 }, state.get());
///
/// state.set(Counter { count: 7 });
/// assert_eq!(7, count.get());
/// ```
pub struct Accessor<T> {
    inner: Arc<AccessorInner<T>>,
}

impl<T> Accessor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(state: &Reactive<T>) -> Self {
        Self::following(state, None)
    }

    fn following(state: &Reactive<T>, upstream: Option<Subscription>) -> Self {
        Self {
            inner: Arc::new(AccessorInner {
                state: state.clone(),
                mirror: OnceLock::new(),
                cache: Mutex::new(HashMap::new()),
                upstream,
            }),
        }
    }

    /// The holder this accessor reads from and writes back into.
    pub fn state(&self) -> &Reactive<T> {
        &self.inner.state
    }

    pub fn get(&self) -> T {
        self.inner.state.get()
    }

    pub fn set(&self, value: T) {
        self.inner.state.set(value)
    }

    /// `true` if both handles refer to the same accessor (not merely the same holder).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The observable for one data field.
    ///
    /// `get` narrows the held value to the field; `set` writes a field value into the held value.
    /// When the returned flow changes to a value the held value does not already have, the held
    /// value is updated in place and [`set`](Reactive::set) on the parent.
    ///
    /// # Panics
    ///
    /// If `key` was already used on this accessor for a member of a different type.
    pub fn field<F>(
        &self,
        key: &'static str,
        get: impl Fn(&T) -> F + Send + Sync + 'static,
        set: impl Fn(&mut T, F) + Send + Sync + 'static,
    ) -> Flow<F>
    where
        F: Clone + PartialEq + Send + Sync + 'static,
    {
        self.cached(key, || {
            let mirror = self.mirror();
            let get = Arc::new(get);
            let flow = self.inner.state.to({
                let get = Arc::clone(&get);
                move |value: &T| get(value)
            });

            let parent = self.inner.state.downgrade();
            flow.subscribe(move |field: &F| {
                let snapshot = {
                    let mut mirror = mirror.acq_lock();
                    if get(&*mirror) == *field {
                        return;
                    }
                    set(&mut *mirror, field.clone());
                    T::clone(&*mirror)
                };
                if let Some(parent) = parent.upgrade() {
                    parent.set(snapshot);
                }
            });

            flow
        })
    }

    /// Wraps a method that only reads the held value.
    ///
    /// # Panics
    ///
    /// If `key` was already used on this accessor for a member of a different type.
    pub fn derived<A, R>(
        &self,
        key: &'static str,
        method: impl Fn(&T, &A) -> R + Send + Sync + 'static,
    ) -> DerivedMethod<T, A, R>
    where
        A: Clone + Send + Sync + 'static,
        R: Clone + PartialEq + Send + 'static,
    {
        self.cached(key, || DerivedMethod {
            state: self.inner.state.clone(),
            mirror: self.mirror(),
            method: Arc::new(method),
        })
    }

    /// Wraps a method that mutates the held value and returns a reference to it.
    ///
    /// # Panics
    ///
    /// If `key` was already used on this accessor for a member of a different type.
    pub fn mutating<A>(
        &self,
        key: &'static str,
        method: impl for<'a> Fn(&'a mut T, &A) -> &'a mut T + Send + Sync + 'static,
    ) -> MutatingMethod<T, A>
    where
        A: Clone + Send + Sync + 'static,
    {
        self.cached(key, || MutatingMethod {
            accessor: Arc::downgrade(&self.inner),
            state: self.inner.state.clone(),
            mirror: self.mirror(),
            method: Arc::new(method),
        })
    }

    fn mirror(&self) -> Arc<Mirror<T>> {
        let mirror = self
            .inner
            .mirror
            .get_or_init(|| Mirror::follow(&self.inner.state));
        Arc::clone(mirror)
    }

    fn cached<H>(&self, key: &'static str, build: impl FnOnce() -> H) -> H
    where
        H: Clone + Send + Sync + 'static,
    {
        let mut cache = self
            .inner
            .cache
            .lock()
            .expect("unable to acquire lock on accessor cache");

        if let Some(entry) = cache.get(key) {
            if let Some(handle) = entry.downcast_ref::<H>() {
                return handle.clone();
            }
            drop(cache);
            panic!("accessor key `{key}` is already bound to a member of another type");
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(key, "materializing accessor member");

        let handle = build();
        cache.insert(key, Box::new(handle.clone()));
        handle
    }
}

impl<S> Accessor<Option<S>>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Like [`field`](Accessor::field), for a holder whose value may be absent.
    ///
    /// The flow reads `None` while the held value is `None`. Writing a field into an absent
    /// value does nothing.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// #[derive(Clone, PartialEq, Debug)]
    /// struct User {
    ///     name: String,
    /// }
    ///
    /// let state: Reactive<Option<User>> = Reactive::new(None);
    /// let accessor = state.accessor();
    /// let name = accessor.optional_field("name", |u| u.name.clone(), |u, v| u.name = v);
    ///
    /// assert_eq!(None, name.get());
    ///
    /// state.set(Some(User { name: String::from("ferris") }));
    /// assert_eq!(Some(String::from("ferris")), name.get());
    /// ```
    pub fn optional_field<F>(
        &self,
        key: &'static str,
        get: impl Fn(&S) -> F + Send + Sync + 'static,
        set: impl Fn(&mut S, F) + Send + Sync + 'static,
    ) -> Flow<Option<F>>
    where
        F: Clone + PartialEq + Send + Sync + 'static,
    {
        self.field(
            key,
            move |value: &Option<S>| value.as_ref().map(&get),
            move |value: &mut Option<S>, field: Option<F>| {
                if let (Some(value), Some(field)) = (value.as_mut(), field) {
                    set(value, field);
                }
            },
        )
    }
}

impl<T: 'static> Observable<T> for Accessor<T> {
    fn subscribe_with(&self, listener: Listener<T>, options: ObservableOptions) -> Subscription {
        self.inner.state.subscribe_with(listener, options)
    }
}

impl<T> Getter<T> for Accessor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Accessor::get(self)
    }
}

impl<T> Setter<T> for Accessor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn set(&self, value: T) {
        Accessor::set(self, value)
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Accessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&'static str> = match self.inner.cache.lock() {
            Ok(cache) => cache.keys().copied().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort_unstable();

        f.debug_struct("Accessor")
            .field("members", &keys)
            .finish_non_exhaustive()
    }
}

/// A wrapped `&self` method. See [`Accessor::derived`].
pub struct DerivedMethod<T, A, R> {
    state: Reactive<T>,
    mirror: Arc<Mirror<T>>,
    method: Arc<DerivedFn<T, A, R>>,
}

impl<T, A, R> DerivedMethod<T, A, R>
where
    T: Clone + Send + 'static,
    A: Clone + Send + Sync + 'static,
    R: Clone + PartialEq + Send + 'static,
{
    /// Runs the method on the current value and returns a [`Flow`] of the result.
    ///
    /// The flow re-runs the method with `args` every time the parent changes, and notifies its
    /// own listeners when the result differs. Dropping the flow (or calling
    /// [`detach`](Flow::detach)) stops the re-runs.
    pub fn call(&self, args: A) -> Flow<R> {
        let result = (self.method)(&*self.mirror.acq_lock(), &args);
        let method = Arc::clone(&self.method);
        Flow::seeded(&self.state, result, move |value: &T| method(value, &args), None)
    }
}

impl<T, A, R> Clone for DerivedMethod<T, A, R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            mirror: Arc::clone(&self.mirror),
            method: Arc::clone(&self.method),
        }
    }
}

impl<T, A, R> Debug for DerivedMethod<T, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedMethod").finish_non_exhaustive()
    }
}

/// A wrapped `&mut self -> &mut Self` method. See [`Accessor::mutating`].
pub struct MutatingMethod<T, A> {
    accessor: Weak<AccessorInner<T>>,
    state: Reactive<T>,
    mirror: Arc<Mirror<T>>,
    method: Arc<MutatingFn<T, A>>,
}

impl<T, A> MutatingMethod<T, A>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Runs the method on the held value.
    ///
    /// If the method returns the held value itself, it is taken to have changed in place: the
    /// parent's listeners are notified unconditionally and the accessor the method came from is
    /// returned.
    ///
    /// Otherwise the returned value is cloned into a new holder, which is recomputed on a copy
    /// of the parent's value each time the parent changes, and an accessor over that holder is
    /// returned. The holder follows the parent until that accessor is dropped.
    ///
    /// Only the returned reference is inspected. A method that returns `self` without changing
    /// anything still notifies, and a method that changes `self` but returns some other value
    /// of the same type does not.
    pub fn call(&self, args: A) -> Accessor<T> {
        // the mirror itself only changes through its subscription
        let mut scratch = T::clone(&*self.mirror.acq_lock());
        let held: *const T = &scratch;
        let forked = {
            let returned = (self.method)(&mut scratch, &args);
            if ptr::eq(&*returned, held) {
                None
            } else {
                Some(T::clone(returned))
            }
        };

        let Some(value) = forked else {
            self.state.set_unchecked(scratch);
            return match self.accessor.upgrade() {
                Some(inner) => Accessor { inner },
                None => Accessor::new(&self.state),
            };
        };

        let fork = Reactive::new(value);
        let method = Arc::clone(&self.method);
        let upstream = self.state.subscribe({
            let fork = fork.clone();
            move |value: &T| {
                let mut scratch = value.clone();
                let next = method(&mut scratch, &args).clone();
                fork.set(next);
            }
        });

        Accessor::following(&fork, Some(upstream))
    }
}

impl<T, A> Clone for MutatingMethod<T, A> {
    fn clone(&self) -> Self {
        Self {
            accessor: Weak::clone(&self.accessor),
            state: self.state.clone(),
            mirror: Arc::clone(&self.mirror),
            method: Arc::clone(&self.method),
        }
    }
}

impl<T, A> Debug for MutatingMethod<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutatingMethod").finish_non_exhaustive()
    }
}

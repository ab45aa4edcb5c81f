use crate::{Getter, Listener, Observable, ObservableOptions, Reactive, Setter, Subscription};
use std::{any::Any, fmt::Debug, sync::Arc};

/// A value derived from an upstream [`Observable`].
///
/// The flow recomputes once per upstream dispatch and notifies its own listeners only when the
/// recomputed value differs from the previous one. [`set`](Flow::set) replaces the flow's own
/// value and notifies its listeners; it never writes upstream.
///
/// Clones share one flow. When the last clone is dropped the flow unsubscribes from upstream.
/// A flow made with [`to`](Flow::to) keeps the flow it was chained from alive.
///
/// # Examples
/// ```
/// use flowstate::Reactive;
///
/// let r = Reactive::new(String::from("crab"));
/// let len = r.to(|s| s.len());
/// let even = len.to(|n| n % 2 == 0);
///
/// r.set(String::from("lobster"));
///
/// assert_eq!(7, len.get());
/// assert!(!even.get());
/// ```
pub struct Flow<T> {
    inner: Arc<FlowInner<T>>,
}

struct FlowInner<T> {
    state: Reactive<T>,
    upstream: Subscription,
    _retained: Option<Box<dyn Any + Send + Sync>>,
}

impl<T> Drop for FlowInner<T> {
    fn drop(&mut self) {
        self.upstream.unsubscribe();
    }
}

impl<T> Flow<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new<U, O>(upstream: &O, predicate: impl Fn(&U) -> T + Send + Sync + 'static) -> Self
    where
        O: Observable<U> + Getter<U> + ?Sized,
        U: 'static,
    {
        let initial = predicate(&upstream.get());
        Self::seeded(upstream, initial, predicate, None)
    }

    /// Builds a flow starting at `initial` instead of computing it from upstream.
    pub(crate) fn seeded<U, O>(
        upstream: &O,
        initial: T,
        predicate: impl Fn(&U) -> T + Send + Sync + 'static,
        retained: Option<Box<dyn Any + Send + Sync>>,
    ) -> Self
    where
        O: Observable<U> + ?Sized,
        U: 'static,
    {
        let state = Reactive::new(initial);
        let listener = Listener::new({
            let state = state.clone();
            move |value: &U| state.set(predicate(value))
        });
        let upstream = upstream.subscribe_with(listener, ObservableOptions::default());

        Self {
            inner: Arc::new(FlowInner {
                state,
                upstream,
                _retained: retained,
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.state.get()
    }

    /// Replace this flow's value, notifying its listeners if it changed.
    pub fn set(&self, value: T) {
        self.inner.state.set(value)
    }

    /// Chain another derivation off this flow.
    ///
    /// # Examples
    /// ```
    /// use flowstate::Reactive;
    ///
    /// let r = Reactive::new(2);
    /// // the intermediate flow lives as long as `label`
    /// let label = r.to(|n| n * 10).to(|n| format!("{n}%"));
    ///
    /// r.set(5);
    /// assert_eq!("50%", label.get());
    /// ```
    pub fn to<U>(&self, f: impl Fn(&T) -> U + Send + Sync + 'static) -> Flow<U>
    where
        U: Clone + PartialEq + Send + 'static,
    {
        let initial = f(&self.get());
        let upstream: Box<dyn Any + Send + Sync> = Box::new(self.clone());
        Flow::seeded(self, initial, f, Some(upstream))
    }
}

impl<T> Flow<T> {
    /// Stop following upstream. The flow keeps its last value.
    pub fn detach(&self) {
        self.inner.upstream.unsubscribe();
    }

    pub fn is_attached(&self) -> bool {
        self.inner.upstream.is_active()
    }

    /// `true` if both handles refer to the same flow.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Perform some action with the reference to the current value.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.state.with_value(f)
    }
}

impl<T: 'static> Observable<T> for Flow<T> {
    fn subscribe_with(&self, listener: Listener<T>, options: ObservableOptions) -> Subscription {
        self.inner.state.subscribe_with(listener, options)
    }
}

impl<T> Getter<T> for Flow<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn get(&self) -> T {
        Flow::get(self)
    }
}

impl<T> Setter<T> for Flow<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn set(&self, value: T) {
        Flow::set(self, value)
    }
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Flow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("value", &self.inner.state)
            .field("attached", &self.is_attached())
            .finish()
    }
}

use crate::{Listener, ObservableOptions, Subscription};

/// A source of values that can be subscribed to.
pub trait Observable<T> {
    /// Registers `listener`, honouring `options`.
    fn subscribe_with(&self, listener: Listener<T>, options: ObservableOptions) -> Subscription;

    /// Registers a fresh listener with default options.
    fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.subscribe_with(Listener::new(listener), ObservableOptions::default())
    }
}

/// Read access to a current value.
pub trait Getter<T> {
    fn get(&self) -> T;
}

/// Write access to a current value.
pub trait Setter<T> {
    fn set(&self, value: T);
}

/// A predicate deciding whether a value is acceptable.
///
/// Nothing in this crate calls it; apply it before handing values to a holder.
///
/// # Examples
/// ```
/// use flowstate::{Guarded, Reactive};
///
/// let non_empty = |s: &String| !s.is_empty();
///
/// assert!(non_empty.check(String::new()).is_none());
/// let r = non_empty.check(String::from("🦀")).map(Reactive::new);
/// assert!(r.is_some());
/// ```
pub trait Guarded<T> {
    fn valid(&self, value: &T) -> bool;

    fn check(&self, value: T) -> Option<T> {
        self.valid(&value).then_some(value)
    }
}

impl<T, F> Guarded<T> for F
where
    F: Fn(&T) -> bool,
{
    fn valid(&self, value: &T) -> bool {
        self(value)
    }
}

/// Subscribes `callback` to any [`Observable`].
///
/// # Examples
/// ```
/// use flowstate::{subscribe, Reactive};
/// use std::sync::{Arc, Mutex};
///
/// let r = Reactive::new(1);
/// let seen: Arc<Mutex<Vec<i32>>> = Default::default();
///
/// subscribe(&r, {
///     let seen = seen.clone();
///     move |val| seen.lock().unwrap().push(*val)
/// });
/// r.set(2);
///
/// assert_eq!(vec![2], seen.lock().unwrap().clone());
/// ```
pub fn subscribe<T, O>(object: &O, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription
where
    O: Observable<T> + ?Sized,
{
    object.subscribe_with(Listener::new(callback), ObservableOptions::default())
}

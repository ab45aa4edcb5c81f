//! Synchronous reactive values with derived streams and two-way structural accessors.
//!
//! * [`Broadcaster`] dispatches values to a de-duplicated, ordered set of listeners.
//! * [`Reactive`] holds one value and notifies listeners when it changes.
//! * [`Flow`] derives a value from any [`Observable`] and recomputes it on every upstream change.
//! * [`Accessor`] (and the typed wrappers generated by [`accessor!`]) turns each field and method
//!   of a held struct into its own observable, writing field changes back into the parent.
//!
//! Dispatch is synchronous and depth-first: a `set` returns only after every listener it
//! reaches, directly or through derived values, has run. Equality checks in [`Reactive::set`]
//! and [`Flow`] are what stop write-back loops.
//!
//! ```
//! use flowstate::{accessor, Observable, Reactive};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Player {
//!     name: String,
//!     score: u32,
//! }
//!
//! accessor! {
//!     Player {
//!         fields { name: String, score: u32 }
//!     }
//! }
//!
//! let player = Reactive::new(Player { name: String::from("ferris"), score: 0 });
//! let log: Arc<Mutex<Vec<u32>>> = Default::default();
//!
//! player.subscribe({
//!     let log = log.clone();
//!     move |p| log.lock().unwrap().push(p.score)
//! });
//!
//! let fields = player.structural();
//! fields.score().set(10);
//!
//! assert_eq!(10, player.get().score);
//! assert_eq!(vec![10], log.lock().unwrap().clone());
//! ```
//!
//! Cargo features:
//!
//! - `tracing`: emit [tracing](https://docs.rs/tracing) events for dispatches, listener panics
//!   and accessor members
//! - `serde`: serialize and deserialize [`Reactive`] and [`Flow`] as their current value

mod accessor;
mod broadcaster;
mod error;
mod flow;
mod macros;
mod observable;
mod reactive;
#[cfg(feature = "serde")]
mod serde;
mod subscription;

#[doc(hidden)]
pub use paste;

pub use accessor::{Accessor, DerivedMethod, MutatingMethod, Structural};
pub use broadcaster::{Broadcaster, Listener, Notifier};
pub use error::DispatchError;
pub use flow::Flow;
pub use observable::{subscribe, Getter, Guarded, Observable, Setter};
pub use reactive::{Reactive, WeakReactive};
pub use subscription::{
    AbortCallback, AbortSignal, CancellationToken, ObservableOptions, Subscription,
};

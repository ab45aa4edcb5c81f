/// Generates a typed accessor for a struct.
///
/// For a struct `Target`, this declares `TargetAccessor`, a wrapper around
/// [`Accessor<Target>`](crate::Accessor) with one method per listed member, and implements
/// [`Structural`](crate::Structural) for `Target` so that
/// [`Reactive::structural`](crate::Reactive::structural) returns it.
///
/// * `fields`: each `name: Type` becomes `fn name(&self) -> Flow<Type>`.
/// * `mutating`: each `fn name(args)` must exist on `Target` as
///   `fn name(&mut self, args) -> &mut Self`, and becomes
///   `fn name(&self) -> MutatingMethod<Target, (args,)>`.
/// * `derived`: each `fn name(args) -> R` must exist on `Target` as `fn name(&self, args) -> R`,
///   and becomes `fn name(&self) -> DerivedMethod<Target, (args,), R>`.
///
/// Every section is optional. Arguments are passed to `call` as a tuple and must be `Clone`.
///
/// The visibility written before `Target` is given to `TargetAccessor`, and must be at least as
/// visible as `Target` itself (write `pub Target` for a `pub struct Target`).
///
/// # Examples
/// ```
/// use flowstate::{accessor, Reactive};
///
/// #[derive(Clone, PartialEq, Debug)]
/// pub struct Counter {
///     count: u32,
///     label: String,
/// }
///
/// impl Counter {
///     fn increment(&mut self, by: u32) -> &mut Self {
///         self.count += by;
///         self
///     }
///
///     fn describe(&self, prefix: String) -> String {
///         format!("{prefix}{}={}", self.label, self.count)
///     }
/// }
///
/// accessor! {
///     pub Counter {
///         fields { count: u32, label: String }
///         mutating { fn increment(by: u32); }
///         derived { fn describe(prefix: String) -> String; }
///     }
/// }
///
/// let state = Reactive::new(Counter { count: 1, label: String::from("clicks") });
/// let counter = state.structural();
///
/// let description = counter.describe().call((String::from("> "),));
/// assert_eq!("> clicks=1", description.get());
///
/// counter.increment().call((2,));
/// assert_eq!(3, counter.count().get());
/// assert_eq!("> clicks=3", description.get());
///
/// counter.label().set(String::from("taps"));
/// assert_eq!("taps", state.get().label);
/// ```
#[macro_export]
macro_rules! accessor {
    (
        $(#[$meta:meta])*
        $vis:vis $target:ident {
            $( fields { $( $field:ident : $field_ty:ty ),* $(,)? } )?
            $( mutating { $( fn $mutating:ident ( $( $mutating_arg:ident : $mutating_arg_ty:ty ),* $(,)? ) ; )* } )?
            $( derived { $( fn $derived:ident ( $( $derived_arg:ident : $derived_arg_ty:ty ),* $(,)? ) -> $derived_ret:ty ; )* } )?
        }
    ) => {
        $crate::paste::paste! {
            $(#[$meta])*
            #[derive(Clone, Debug)]
            $vis struct [<$target Accessor>] {
                inner: $crate::Accessor<$target>,
            }

            impl [<$target Accessor>] {
                pub fn new(state: &$crate::Reactive<$target>) -> Self {
                    Self {
                        inner: $crate::Accessor::new(state),
                    }
                }

                $( $(
                    pub fn $field(&self) -> $crate::Flow<$field_ty> {
                        self.inner.field(
                            ::core::stringify!($field),
                            |this: &$target| ::core::clone::Clone::clone(&this.$field),
                            |this: &mut $target, value: $field_ty| this.$field = value,
                        )
                    }
                )* )?

                $( $(
                    pub fn $mutating(
                        &self,
                    ) -> $crate::MutatingMethod<$target, ( $( $mutating_arg_ty, )* )> {
                        self.inner.mutating(
                            ::core::stringify!($mutating),
                            |this: &mut $target, args: &( $( $mutating_arg_ty, )* )| {
                                let ( $( $mutating_arg, )* ) = ::core::clone::Clone::clone(args);
                                this.$mutating( $( $mutating_arg ),* )
                            },
                        )
                    }
                )* )?

                $( $(
                    pub fn $derived(
                        &self,
                    ) -> $crate::DerivedMethod<$target, ( $( $derived_arg_ty, )* ), $derived_ret> {
                        self.inner.derived(
                            ::core::stringify!($derived),
                            |this: &$target, args: &( $( $derived_arg_ty, )* )| {
                                let ( $( $derived_arg, )* ) = ::core::clone::Clone::clone(args);
                                this.$derived( $( $derived_arg ),* )
                            },
                        )
                    }
                )* )?
            }

            impl ::core::ops::Deref for [<$target Accessor>] {
                type Target = $crate::Accessor<$target>;

                fn deref(&self) -> &Self::Target {
                    &self.inner
                }
            }

            impl ::core::convert::From<$crate::Accessor<$target>> for [<$target Accessor>] {
                fn from(inner: $crate::Accessor<$target>) -> Self {
                    Self { inner }
                }
            }

            impl $crate::Structural for $target {
                type Accessor = [<$target Accessor>];
            }
        }
    };
}

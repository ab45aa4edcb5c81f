use std::any::Any;

/// Failure reported by [`Broadcaster::try_dispatch`](crate::Broadcaster::try_dispatch)
/// and [`Reactive::try_set`](crate::Reactive::try_set).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// One or more listeners panicked. Every other listener still ran.
    #[error("{panicked} listener(s) panicked during dispatch: {message}")]
    ListenerPanicked {
        /// Number of listeners that panicked.
        panicked: usize,
        /// Message of the first panic.
        message: String,
    },
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

//! Callback invocation under a [`DeliveryPolicy`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::callback::Callback;
use crate::config::DeliveryPolicy;
use crate::stats::DispatchStats;

/// Invoke `callback` with `event`.
///
/// Under [`DeliveryPolicy::Isolate`] a panic is caught, counted and logged;
/// under [`DeliveryPolicy::Propagate`] it unwinds to the caller.
pub(crate) fn deliver<E>(
    engine: &'static str,
    callback: &Callback<E>,
    event: &E,
    policy: DeliveryPolicy,
    stats: &DispatchStats,
) {
    match policy {
        DeliveryPolicy::Propagate => callback.invoke(event),
        DeliveryPolicy::Isolate => {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(event))) {
                stats.record_failure();
                tracing::warn!(
                    engine,
                    subscriber = ?callback,
                    panic = panic_message(payload.as_ref()),
                    "subscriber panicked, continuing delivery"
                );
                return;
            }
        }
    }
    stats.record_delivery();
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

//! Boundary around host mutation calls.
//!
//! Every call that mutates the host goes through [`guarded`], so a panicking
//! adapter surfaces as a [`HostError::Fault`] instead of unwinding through a
//! manager and aborting its siblings in a bulk operation.

use crate::error::{Fault, HostError, HostResult};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, Location};

/// Run a host call, converting a panic into a located fault.
#[track_caller]
pub fn guarded<F, T>(call: F) -> impl Future<Output = HostResult<T>>
where
    F: Future<Output = HostResult<T>>,
{
    let location = Location::caller();
    async move {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(
                    file = location.file(),
                    line = location.line(),
                    "Host call panicked: {}",
                    message
                );
                Err(HostError::Fault(Fault::at(
                    message,
                    location.file(),
                    location.line(),
                )))
            }
        }
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Host call panicked".to_string()
    }
}

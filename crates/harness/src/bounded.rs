// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-wait primitives.
//!
//! Everything in this crate that can block goes through one of the two
//! functions here. [`bounded`] races an interruptible (future-shaped)
//! operation against a timer scoped to the call. [`bounded_blocking`] runs a
//! genuinely blocking call on a worker thread and joins it with a deadline;
//! when the deadline is missed the worker is abandoned and its eventual
//! result discarded, so the guarded call must be safe to leave in flight.

use std::future::Future;
use std::time::Duration;

/// The time bound elapsed before the operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;

/// Run `operation` unless `limit` elapses first.
///
/// The timer is acquired for the duration of this call and released on
/// return regardless of outcome.
pub async fn bounded<F: Future>(operation: F, limit: Duration) -> Result<F::Output, Expired> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| Expired)
}

/// Run a blocking `operation` on a worker, joining with a deadline.
///
/// On `Expired` the worker keeps running detached until the call returns on
/// its own; its result is discarded.
pub async fn bounded_blocking<T, F>(operation: F, limit: Duration) -> Result<T, Expired>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let worker = tokio::task::spawn_blocking(operation);
    match tokio::time::timeout(limit, worker).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => match join_error.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            // Cancellation cannot happen: we never abort the handle.
            Err(_) => Err(Expired),
        },
        Err(_) => Err(Expired),
    }
}

#[cfg(test)]
#[path = "bounded_tests.rs"]
mod tests;

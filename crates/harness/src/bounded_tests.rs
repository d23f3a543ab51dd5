// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;

#[tokio::test]
async fn fast_future_completes() {
    let result = bounded(async { 41 + 1 }, Duration::from_secs(5)).await;
    assert_eq!(result, Ok(42));
}

#[tokio::test]
async fn slow_future_expires() {
    let result = bounded(
        tokio::time::sleep(Duration::from_secs(30)),
        Duration::from_millis(20),
    )
    .await;
    assert_eq!(result, Err(Expired));
}

#[tokio::test]
async fn expiry_does_not_wait_for_the_operation() {
    let started = std::time::Instant::now();
    let result = bounded(
        tokio::time::sleep(Duration::from_secs(30)),
        Duration::from_millis(20),
    )
    .await;
    assert_eq!(result, Err(Expired));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn fast_blocking_call_completes() {
    let result = bounded_blocking(|| "done", Duration::from_secs(5)).await;
    assert_eq!(result, Ok("done"));
}

#[tokio::test]
async fn slow_blocking_call_is_abandoned() {
    let started = std::time::Instant::now();
    let result = bounded_blocking(
        || {
            std::thread::sleep(Duration::from_millis(500));
            "late"
        },
        Duration::from_millis(20),
    )
    .await;
    assert_eq!(result, Err(Expired));
    // The join returns at the deadline; the worker finishes on its own.
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn abandoned_worker_result_is_discarded() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let result = bounded_blocking(
        move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
            7
        },
        Duration::from_millis(10),
    )
    .await;
    assert_eq!(result, Err(Expired));

    // The worker still runs to completion in the background.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(finished.load(Ordering::SeqCst));
}

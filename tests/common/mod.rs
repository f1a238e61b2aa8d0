#![allow(dead_code)]

use std::time::Duration;

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Lets spawned timer tasks that are due run to completion.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Sleeps on the paused clock, which auto-advances through every timer due
/// in between, then lets the woken timer tasks finish.
pub async fn tick(millis: u64) {
    tokio::time::sleep(ms(millis)).await;
    settle().await;
}

use std::time::Duration;

/// Lifecycle notifications published by a [`BackoffScheduler`](super::BackoffScheduler).
///
/// `Backoff` and `Ready` strictly alternate for a given scheduler; `Fail`
/// replaces `Backoff` once the retry limit set by `fail_after` is reached.
#[derive(Clone, Debug, PartialEq)]
pub enum BackoffEvent<E> {
    /// A timer was armed for `delay`.
    Backoff {
        attempt: u32,
        delay: Duration,
        error: Option<E>,
    },
    /// The timer armed for `attempt` elapsed.
    Ready { attempt: u32, delay: Duration },
    /// The retry limit was reached; the scheduler has been reset.
    Fail { error: Option<E> },
}

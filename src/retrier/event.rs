use crate::errors::RetryError;

/// Notifications published by an [`AttemptRetrier`](super::AttemptRetrier).
#[derive(Clone, Debug, PartialEq)]
pub enum RetrierEvent<T> {
    /// Attempt number `attempt` (1-based) is due. Whoever drives the retrier
    /// runs the operation and reports back with `succeeded` or `failed`.
    Attempt { attempt: u32 },
    Succeeded(T),
    /// The session hit its attempt count or time budget.
    Failed(RetryError),
    Cancelled,
}

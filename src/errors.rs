use std::time::Duration;

use thiserror::Error;

/// Errors raised by the scheduling engines.
///
/// Configuration errors come out of constructors and `fail_after`; the state
/// errors flag misuse of the attempt protocol and are never transient.
/// `Retry` only appears where a whole session is driven to completion, as in
/// `AttemptRetrier::run`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("retrier is already in progress")]
    AlreadyInProgress,

    #[error("retrier attempt is already scheduled")]
    AttemptScheduled,

    #[error("retrier has no session in progress")]
    NotInProgress,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Retry(#[from] RetryError),
}

/// Why a retrier session settled without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("maximum attempt count reached after {attempts} attempts")]
    AttemptCountExceeded { attempts: u32 },

    #[error("maximum attempt time limit reached ({elapsed:?} elapsed, limit {limit:?})")]
    AttemptTimeExceeded { elapsed: Duration, limit: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("retrier was dropped before the session settled")]
    Abandoned,
}

impl RetryError {
    /// True for the two budget failures, false for cancellation or abandonment.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            RetryError::AttemptCountExceeded { .. } | RetryError::AttemptTimeExceeded { .. }
        )
    }
}

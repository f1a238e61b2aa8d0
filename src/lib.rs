//! Retry scheduling for operations that fail transiently.
//!
//! Two independent engines:
//!
//! - [`BackoffScheduler`]: exponential delays capped at a maximum, with
//!   optional upward jitter and an optional retry limit. The caller asks for a
//!   backoff after each failure and retries on [`BackoffEvent::Ready`].
//! - [`AttemptRetrier`]: Fibonacci delays between attempts of an async
//!   operation, bounded by attempt count and elapsed time, with the final
//!   result delivered through a single [`Outcome`].
//!
//! Neither engine runs the retried operation; they decide when the caller
//! should. Timers run on the Tokio runtime.

mod backoff;
pub mod config;
pub mod errors;
mod retrier;
pub mod telemetry;
mod timer;

pub use backoff::{BackoffEvent, BackoffScheduler, ExponentialPlan};
pub use config::{BackoffConfig, ConfigLocation, RetrierConfig};
pub use errors::{Error, RetryError};
pub use retrier::{AttemptRetrier, FibonacciPlan, Outcome, RetrierEvent, SessionOutcome};

#[cfg(test)]
mod tests;

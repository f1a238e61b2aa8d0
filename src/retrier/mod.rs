mod coordinator;
mod event;
mod outcome;
mod plan;

pub use coordinator::AttemptRetrier;
pub use event::RetrierEvent;
pub use outcome::{Outcome, SessionOutcome};
pub use plan::FibonacciPlan;

mod event;
mod plan;
mod scheduler;

pub use event::BackoffEvent;
pub use plan::ExponentialPlan;
pub use scheduler::BackoffScheduler;

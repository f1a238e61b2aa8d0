pub mod session;

pub use session::SessionTelemetry;

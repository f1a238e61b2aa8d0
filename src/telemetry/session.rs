use std::time::Duration;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::RetryError;

/// Correlates the log events of one retrier session.
#[derive(Clone, Debug)]
pub struct SessionTelemetry {
    session_id: Uuid,
    context: String,
}

impl SessionTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn emit_start(&self, initial_delay: Duration) {
        event!(
            Level::DEBUG,
            session_id = %self.session_id,
            context = %self.context,
            initial_delay_ms = initial_delay.as_millis() as u64,
            "retrier.start"
        );
    }

    pub fn emit_attempt(&self, attempt: u32) {
        event!(
            Level::DEBUG,
            session_id = %self.session_id,
            context = %self.context,
            attempt,
            "retrier.attempt"
        );
    }

    pub fn emit_retry(&self, attempt: u32, delay: Duration, error: &str) {
        event!(
            Level::WARN,
            session_id = %self.session_id,
            context = %self.context,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error,
            "retrier.retry"
        );
    }

    pub fn emit_succeeded(&self, attempts: u32) {
        event!(
            Level::DEBUG,
            session_id = %self.session_id,
            context = %self.context,
            attempts,
            "retrier.succeeded"
        );
    }

    pub fn emit_failure(&self, reason: &RetryError) {
        event!(
            Level::ERROR,
            session_id = %self.session_id,
            context = %self.context,
            reason = %reason,
            "retrier.failed"
        );
    }

    pub fn emit_cancelled(&self, attempt: u32) {
        event!(
            Level::INFO,
            session_id = %self.session_id,
            context = %self.context,
            attempt,
            "retrier.cancelled"
        );
    }
}

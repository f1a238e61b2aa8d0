use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{Level, event};

use crate::errors::RetryError;
use crate::telemetry::SessionTelemetry;

/// Settles once with the session's value or the reason it ended without one.
///
/// Resolves to [`RetryError::Abandoned`] if every handle to the retrier is
/// dropped while the session is still open.
#[derive(Debug)]
pub struct Outcome<T> {
    rx: oneshot::Receiver<Result<T, RetryError>>,
}

impl<T> Outcome<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, RetryError>>) -> Self {
        Self { rx }
    }
}

impl<T> Future for Outcome<T> {
    type Output = Result<T, RetryError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(RetryError::Abandoned)))
    }
}

/// Summary logged once per settled session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub attempts: u32,
    pub success: bool,
    pub total_delay: Duration,
}

impl SessionOutcome {
    pub fn log(&self, telemetry: &SessionTelemetry) {
        event!(
            Level::INFO,
            session_id = %telemetry.session_id(),
            context = %telemetry.context(),
            attempts = self.attempts,
            success = self.success,
            total_delay_ms = self.total_delay.as_millis() as u64,
            "retry.outcome"
        );
    }
}

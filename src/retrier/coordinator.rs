use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::warn;

use crate::config::RetrierConfig;
use crate::errors::{Error, RetryError};
use crate::telemetry::SessionTelemetry;
use crate::timer::TimerSlot;

use super::outcome::{Outcome, SessionOutcome};
use super::{FibonacciPlan, RetrierEvent};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_CONTEXT: &str = "retrier";

struct Session<T> {
    resolver: oneshot::Sender<Result<T, RetryError>>,
    started_at: Instant,
    telemetry: SessionTelemetry,
}

struct State<T> {
    plan: FibonacciPlan,
    max_attempts_count: u32,
    max_attempts_time: Option<Duration>,
    context: String,
    attempt: u32,
    timer: TimerSlot,
    session: Option<Session<T>>,
    rng: StdRng,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    events: broadcast::Sender<RetrierEvent<T>>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drives an operation through repeated attempts until it succeeds, is
/// cancelled, or runs out of attempt count or time budget.
///
/// The retrier never runs the operation itself. [`start`](Self::start) opens a
/// session and returns its [`Outcome`]; every [`RetrierEvent::Attempt`] must be
/// answered with exactly one call to [`succeeded`](Self::succeeded) or
/// [`failed`](Self::failed). [`run`](Self::run) wires an async closure into
/// that protocol.
///
/// [`cancel`](Self::cancel) only preempts a scheduled attempt; an attempt that
/// has already been handed to the caller runs to completion.
pub struct AttemptRetrier<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AttemptRetrier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AttemptRetrier<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(config: RetrierConfig) -> Result<Self, Error> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: RetrierConfig, rng: StdRng) -> Result<Self, Error> {
        let plan = FibonacciPlan::new(&config)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let max_attempts_time = (config.max_attempts_time_ms > 0)
            .then(|| Duration::from_millis(config.max_attempts_time_ms));
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    plan,
                    max_attempts_count: config.max_attempts_count,
                    max_attempts_time,
                    context: DEFAULT_CONTEXT.to_string(),
                    attempt: 0,
                    timer: TimerSlot::default(),
                    session: None,
                    rng,
                }),
                events,
            }),
        })
    }

    /// Labels the log events of sessions started from now on.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        self.inner.lock().context = context.into();
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RetrierEvent<T>> {
        self.inner.events.subscribe()
    }

    /// Opens a session and schedules the first attempt after the initial delay.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<Outcome<T>, Error> {
        let mut state = self.inner.lock();
        if state.session.is_some() {
            return Err(Error::AlreadyInProgress);
        }

        let (resolver, rx) = oneshot::channel();
        let telemetry = SessionTelemetry::new(state.context.clone());
        let initial_delay = state.plan.initial_delay();
        telemetry.emit_start(initial_delay);
        state.session = Some(Session {
            resolver,
            started_at: Instant::now(),
            telemetry,
        });
        // a rejected initial delay has already settled the outcome
        self.schedule(&mut state, initial_delay);
        Ok(Outcome::new(rx))
    }

    /// Reports that the current attempt produced `value`; settles the session.
    pub fn succeeded(&self, value: T) -> Result<(), Error> {
        let mut state = self.inner.lock();
        Self::ensure_attempt_in_flight(&state)?;
        self.finish(&mut state, Ok(value));
        Ok(())
    }

    /// Reports that the current attempt failed and schedules the next one.
    ///
    /// `delay_override` replaces the computed delay for this retry and
    /// restarts the Fibonacci progression from it. `error` is only logged.
    pub fn failed(
        &self,
        error: impl fmt::Display,
        delay_override: Option<Duration>,
    ) -> Result<(), Error> {
        let mut state = self.inner.lock();
        Self::ensure_attempt_in_flight(&state)?;

        if state.max_attempts_count > 0 && state.attempt >= state.max_attempts_count {
            let attempts = state.attempt;
            self.finish(&mut state, Err(RetryError::AttemptCountExceeded { attempts }));
            return Ok(());
        }

        let delay = {
            let State {
                plan, rng, attempt, ..
            } = &mut *state;
            plan.next_delay(*attempt, delay_override, rng)
        };
        if !self.schedule(&mut state, delay) {
            return Ok(());
        }
        if let Some(session) = state.session.as_ref() {
            session
                .telemetry
                .emit_retry(state.attempt, delay, &error.to_string());
        }
        Ok(())
    }

    /// Cancels the scheduled attempt, if there is one, and settles the session
    /// with [`RetryError::Cancelled`]. Returns whether anything was cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.lock();
        if !state.timer.is_armed() {
            return false;
        }
        self.finish(&mut state, Err(RetryError::Cancelled));
        true
    }

    /// Runs `handler` on every attempt until it resolves or the session ends.
    pub async fn run<F, Fut, E>(&self, mut handler: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_with(move |_| handler()).await
    }

    /// Like [`run`](Self::run), passing the 1-based attempt number to `handler`.
    pub async fn run_with<F, Fut, E>(&self, mut handler: F) -> Result<T, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut events = self.subscribe();
        let mut outcome = self.start()?;
        loop {
            tokio::select! {
                biased;
                settled = &mut outcome => return settled.map_err(Error::from),
                event = events.recv() => match event {
                    Ok(RetrierEvent::Attempt { attempt }) => match handler(attempt).await {
                        Ok(value) => self.succeeded(value)?,
                        Err(err) => self.failed(err, None)?,
                    },
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "retrier.events_lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RetryError::Abandoned.into());
                    }
                },
            }
        }
    }

    /// Number of attempts fired in the current session.
    pub fn attempt(&self) -> u32 {
        self.inner.lock().attempt
    }

    pub fn is_in_progress(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// True while an attempt is waiting on its timer.
    pub fn is_scheduled(&self) -> bool {
        self.inner.lock().timer.is_armed()
    }

    pub fn max_delay(&self) -> Duration {
        self.inner.lock().plan.max_delay()
    }

    fn ensure_attempt_in_flight(state: &State<T>) -> Result<(), Error> {
        if state.session.is_none() {
            return Err(Error::NotInProgress);
        }
        if state.timer.is_armed() {
            return Err(Error::AttemptScheduled);
        }
        Ok(())
    }

    /// Arms the timer for the next attempt unless doing so would overrun the
    /// time budget, in which case the session fails instead. Returns whether
    /// the timer was armed.
    fn schedule(&self, state: &mut State<T>, delay: Duration) -> bool {
        if let Some(limit) = state.max_attempts_time {
            let elapsed = state
                .session
                .as_ref()
                .map(|session| session.started_at.elapsed())
                .unwrap_or_default();
            if elapsed.checked_add(delay).is_none_or(|end| end > limit) {
                self.finish(state, Err(RetryError::AttemptTimeExceeded { elapsed, limit }));
                return false;
            }
        }
        let weak = Arc::downgrade(&self.inner);
        state
            .timer
            .arm(delay, move |generation| Self::on_attempt(weak, generation));
        true
    }

    /// Publishes the terminal notification, settles the outcome and clears the
    /// run state so the retrier can start a new session.
    fn finish(&self, state: &mut State<T>, result: Result<T, RetryError>) {
        state.timer.clear();
        let attempts = state.attempt;
        state.attempt = 0;
        state.plan.reset();
        let Some(session) = state.session.take() else {
            return;
        };

        let event = match &result {
            Ok(value) => {
                session.telemetry.emit_succeeded(attempts);
                RetrierEvent::Succeeded(value.clone())
            }
            Err(RetryError::Cancelled) => {
                session.telemetry.emit_cancelled(attempts);
                RetrierEvent::Cancelled
            }
            Err(reason) => {
                session.telemetry.emit_failure(reason);
                RetrierEvent::Failed(reason.clone())
            }
        };
        let _ = self.inner.events.send(event);

        SessionOutcome {
            attempts,
            success: result.is_ok(),
            total_delay: session.started_at.elapsed(),
        }
        .log(&session.telemetry);
        // the caller may have dropped the outcome
        let _ = session.resolver.send(result);
    }

    fn on_attempt(inner: Weak<Inner<T>>, generation: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut state = inner.lock();
        if !state.timer.disarm_if_current(generation) {
            return;
        }
        state.attempt += 1;
        let attempt = state.attempt;
        if let Some(session) = state.session.as_ref() {
            session.telemetry.emit_attempt(attempt);
        }
        let _ = inner.events.send(RetrierEvent::Attempt { attempt });
    }
}

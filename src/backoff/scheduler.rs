use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::BackoffConfig;
use crate::errors::Error;
use crate::timer::TimerSlot;

use super::{BackoffEvent, ExponentialPlan};

const EVENT_CAPACITY: usize = 64;

struct State {
    plan: ExponentialPlan,
    attempt: u32,
    delay: Duration,
    max_retries: Option<u32>,
    timer: TimerSlot,
    rng: StdRng,
}

impl State {
    fn reset(&mut self) {
        self.timer.clear();
        self.attempt = 0;
        self.delay = Duration::ZERO;
        self.plan.reset();
    }
}

struct Inner<E> {
    state: Mutex<State>,
    events: broadcast::Sender<BackoffEvent<E>>,
}

impl<E> Inner<E> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exponential backoff driven by a single timer.
///
/// Call [`backoff`](Self::backoff) after each failure; subscribers receive a
/// [`BackoffEvent::Backoff`] immediately and a [`BackoffEvent::Ready`] once the
/// delay has elapsed, at which point the caller may retry. Calling `backoff`
/// while a delay is still pending does nothing.
///
/// The handle is cheap to clone; all clones drive the same schedule. Arming a
/// delay spawns a Tokio task, so `backoff` must run inside a Tokio runtime.
pub struct BackoffScheduler<E = ()> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for BackoffScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> BackoffScheduler<E>
where
    E: Clone + Send + 'static,
{
    pub fn new(config: BackoffConfig) -> Result<Self, Error> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Builds a scheduler whose jitter draws from `rng`.
    pub fn with_rng(config: BackoffConfig, rng: StdRng) -> Result<Self, Error> {
        let plan = ExponentialPlan::new(&config)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    plan,
                    attempt: 0,
                    delay: Duration::ZERO,
                    max_retries: None,
                    timer: TimerSlot::default(),
                    rng,
                }),
                events,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackoffEvent<E>> {
        self.inner.events.subscribe()
    }

    /// Starts the next backoff delay, or reports `Fail` when the retry limit
    /// has been reached. `error` is passed through to the notification untouched.
    pub fn backoff(&self, error: impl Into<Option<E>>) {
        let error = error.into();
        let mut state = self.inner.lock();
        if state.timer.is_armed() {
            debug!(attempt = state.attempt, "backoff.ignored");
            return;
        }

        if state.max_retries == Some(state.attempt) {
            warn!(attempts = state.attempt, "backoff.fail");
            self.publish(BackoffEvent::Fail { error });
            state.reset();
            return;
        }

        let delay = {
            let State { plan, rng, .. } = &mut *state;
            plan.next_delay(rng)
        };
        state.delay = delay;
        let weak = Arc::downgrade(&self.inner);
        state
            .timer
            .arm(delay, move |generation| Self::on_backoff(weak, generation));
        debug!(
            attempt = state.attempt,
            delay_ms = delay.as_millis() as u64,
            "backoff.scheduled"
        );
        self.publish(BackoffEvent::Backoff {
            attempt: state.attempt,
            delay,
            error,
        });
    }

    /// Computes the next delay without arming a timer. Advances the progression.
    pub fn next(&self) -> Duration {
        let mut state = self.inner.lock();
        let State { plan, rng, .. } = &mut *state;
        plan.next_delay(rng)
    }

    /// Cancels any pending delay and restarts the progression from the initial delay.
    pub fn reset(&self) {
        self.inner.lock().reset();
        debug!("backoff.reset");
    }

    /// Limits the scheduler to `max_retries` completed delays: the first call to
    /// [`backoff`](Self::backoff) after that many `Ready` events emits `Fail`.
    pub fn fail_after(&self, max_retries: u32) -> Result<(), Error> {
        if max_retries == 0 {
            return Err(Error::Config(format!(
                "Expected a maximum number of retry greater than 0 but got {max_retries}"
            )));
        }
        self.inner.lock().max_retries = Some(max_retries);
        Ok(())
    }

    /// Zero-based index of the current backoff.
    pub fn attempt(&self) -> u32 {
        self.inner.lock().attempt
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().timer.is_armed()
    }

    pub fn max_delay(&self) -> Duration {
        self.inner.lock().plan.max_delay()
    }

    fn publish(&self, event: BackoffEvent<E>) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn on_backoff(inner: Weak<Inner<E>>, generation: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut state = inner.lock();
        if !state.timer.disarm_if_current(generation) {
            return;
        }
        debug!(attempt = state.attempt, "backoff.ready");
        let _ = inner.events.send(BackoffEvent::Ready {
            attempt: state.attempt,
            delay: state.delay,
        });
        state.attempt += 1;
    }
}

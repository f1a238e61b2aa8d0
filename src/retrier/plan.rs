use std::time::Duration;

use rand::Rng;

use crate::config::RetrierConfig;
use crate::errors::Error;

/// Fibonacci delay progression used between retrier attempts.
///
/// After the first failure the delay is `min`; after that each delay is the
/// sum of the previous two. An explicit override restarts the sequence from
/// the overridden value. Jitter is symmetric, `±delay * randomness`, and the
/// result is never negative. `max` is not applied to computed delays.
#[derive(Clone, Debug)]
pub struct FibonacciPlan {
    initial: Duration,
    min: Duration,
    max: Duration,
    randomness: f64,
    prev: Duration,
    curr: Duration,
}

impl FibonacciPlan {
    pub fn new(config: &RetrierConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            initial: Duration::from_millis(config.initial_delay_ms),
            min: Duration::from_millis(config.min_delay_ms),
            max: Duration::from_millis(config.max_delay_ms),
            randomness: config.randomness,
            prev: Duration::ZERO,
            curr: Duration::ZERO,
        })
    }

    /// Delay before the first attempt of a session; never jittered.
    pub fn initial_delay(&self) -> Duration {
        self.initial
    }

    pub fn max_delay(&self) -> Duration {
        self.max
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn next_delay(
        &mut self,
        attempt: u32,
        delay_override: Option<Duration>,
        rng: &mut impl Rng,
    ) -> Duration {
        let base = match delay_override {
            Some(delay) => {
                self.prev = Duration::ZERO;
                self.curr = delay;
                delay
            }
            None => self.step(attempt),
        };
        self.jitter(base, rng)
    }

    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.curr = Duration::ZERO;
    }

    fn step(&mut self, attempt: u32) -> Duration {
        match attempt {
            0 => self.initial,
            1 => {
                self.curr = self.min;
                self.curr
            }
            _ => {
                let delay = self.curr.saturating_add(self.prev);
                self.prev = self.curr;
                self.curr = delay;
                delay
            }
        }
    }

    fn jitter(&self, base: Duration, rng: &mut impl Rng) -> Duration {
        if self.randomness == 0.0 {
            return base;
        }
        let base_ms = base.as_millis() as f64;
        let offset = base_ms * self.randomness * rng.gen_range(-1.0..=1.0);
        Duration::from_millis((base_ms + offset).round().max(0.0) as u64)
    }
}

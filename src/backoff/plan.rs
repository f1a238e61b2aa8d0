use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;
use crate::errors::Error;

/// Exponential delay progression with upward-only jitter.
///
/// Delays run `initial, initial*factor, initial*factor^2, ...`, each capped at
/// `max_delay`; jitter multiplies the capped delay by `1 + rand * randomization_factor`
/// and the result is capped at `max_delay` again. Values are whole milliseconds.
#[derive(Clone, Debug)]
pub struct ExponentialPlan {
    initial_delay: f64,
    max_delay: f64,
    factor: f64,
    randomization_factor: f64,
    next_base_delay: f64,
}

impl ExponentialPlan {
    pub fn new(config: &BackoffConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            initial_delay: config.initial_delay_ms as f64,
            max_delay: config.max_delay_ms as f64,
            factor: config.factor,
            randomization_factor: config.randomization_factor,
            next_base_delay: config.initial_delay_ms as f64,
        })
    }

    /// Returns the next delay and advances the progression.
    pub fn next_delay(&mut self, rng: &mut impl Rng) -> Duration {
        let raw = self.next_base_delay.min(self.max_delay);
        self.next_base_delay = raw * self.factor;
        let multiple = 1.0 + rng.gen_range(0.0..1.0) * self.randomization_factor;
        let delay = self.max_delay.min((raw * multiple).round());
        Duration::from_millis(delay as u64)
    }

    pub fn reset(&mut self) {
        self.next_base_delay = self.initial_delay;
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn millis(plan: &mut ExponentialPlan, rng: &mut StdRng, n: usize) -> Vec<u64> {
        (0..n)
            .map(|_| plan.next_delay(rng).as_millis() as u64)
            .collect()
    }

    #[test]
    fn doubles_until_capped() {
        let config = BackoffConfig::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(1000));
        let mut plan = ExponentialPlan::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            millis(&mut plan, &mut rng, 10),
            vec![10, 20, 40, 80, 160, 320, 640, 1000, 1000, 1000]
        );
    }

    #[test]
    fn factor_is_configurable() {
        let config = BackoffConfig::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(270))
            .with_factor(3.0);
        let mut plan = ExponentialPlan::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(millis(&mut plan, &mut rng, 5), vec![10, 30, 90, 270, 270]);
    }

    #[test]
    fn jitter_stays_between_base_and_cap() {
        let config = BackoffConfig::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(1000))
            .with_randomization_factor(0.5);
        let mut plan = ExponentialPlan::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let unjittered = [10u64, 20, 40, 80, 160, 320, 640, 1000, 1000, 1000];

        let delays = millis(&mut plan, &mut rng, 10);
        let mut previous = 10;
        for (delay, base) in delays.iter().zip(unjittered) {
            assert!(*delay >= base, "{delay} below base {base}");
            assert!(*delay as f64 <= (base as f64 * 1.5).round().min(1000.0));
            assert!(*delay >= previous);
            previous = *delay;
        }
        assert!(delays.iter().zip(unjittered).any(|(d, b)| *d != b));
    }

    #[test]
    fn reset_restarts_from_initial_delay() {
        let config = BackoffConfig::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(1000));
        let mut plan = ExponentialPlan::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(millis(&mut plan, &mut rng, 3), vec![10, 20, 40]);
        plan.reset();
        assert_eq!(plan.next_delay(&mut rng), Duration::from_millis(10));
    }
}

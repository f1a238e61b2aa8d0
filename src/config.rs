//! read engine configuration from a file or the environment

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::Error;

pub enum ConfigLocation {
    File(String),
    Env,
}

/// Settings for [`BackoffScheduler`](crate::BackoffScheduler). Delays are in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
    pub randomization_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            factor: 2.0,
            randomization_factor: 0.0,
        }
    }
}

impl BackoffConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_randomization_factor(mut self, randomization_factor: f64) -> Self {
        self.randomization_factor = randomization_factor;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_delay_ms < 1 {
            return Err(Error::Config(
                "The initial timeout must be equal to or greater than 1.".into(),
            ));
        }
        if self.max_delay_ms <= 1 {
            return Err(Error::Config("The maximal timeout must be greater than 1.".into()));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(Error::Config(
                "The randomisation factor must be between 0 and 1.".into(),
            ));
        }
        if self.factor.is_nan() || self.factor <= 1.0 {
            return Err(Error::Config("Exponential factor should be greater than 1.".into()));
        }
        if self.max_delay_ms <= self.initial_delay_ms {
            return Err(Error::Config(
                "The maximal backoff delay must be greater than the initial backoff delay.".into(),
            ));
        }
        Ok(())
    }

    pub fn load(loc: ConfigLocation) -> Result<Self, Error> {
        match loc {
            ConfigLocation::File(path) => read_json(&path),
            ConfigLocation::Env => {
                let defaults = Self::default();
                Ok(Self {
                    initial_delay_ms: env_or(
                        "BACKOFF_INITIAL_DELAY_MS",
                        defaults.initial_delay_ms,
                    )?,
                    max_delay_ms: env_or("BACKOFF_MAX_DELAY_MS", defaults.max_delay_ms)?,
                    factor: env_or("BACKOFF_FACTOR", defaults.factor)?,
                    randomization_factor: env_or(
                        "BACKOFF_RANDOMIZATION_FACTOR",
                        defaults.randomization_factor,
                    )?,
                })
            }
        }
    }
}

/// Settings for [`AttemptRetrier`](crate::AttemptRetrier). Delays are in milliseconds.
///
/// A zero `max_attempts_count` or `max_attempts_time_ms` means unbounded.
/// `max_delay_ms` is carried for callers but does not cap the computed delay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrierConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub initial_delay_ms: u64,
    pub max_attempts_count: u32,
    pub max_attempts_time_ms: u64,
    pub randomness: f64,
}

impl RetrierConfig {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min_delay_ms: min.as_millis() as u64,
            max_delay_ms: max.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_attempts_count(mut self, count: u32) -> Self {
        self.max_attempts_count = count;
        self
    }

    pub fn with_max_attempts_time(mut self, time: Duration) -> Self {
        self.max_attempts_time_ms = time.as_millis() as u64;
        self
    }

    pub fn with_randomness(mut self, randomness: f64) -> Self {
        self.randomness = randomness;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.randomness) {
            return Err(Error::Config("The randomness must be between 0 and 1.".into()));
        }
        Ok(())
    }

    pub fn load(loc: ConfigLocation) -> Result<Self, Error> {
        match loc {
            ConfigLocation::File(path) => read_json(&path),
            ConfigLocation::Env => Ok(Self {
                min_delay_ms: env_required("RETRIER_MIN_DELAY_MS")?,
                max_delay_ms: env_required("RETRIER_MAX_DELAY_MS")?,
                initial_delay_ms: env_or("RETRIER_INITIAL_DELAY_MS", 0)?,
                max_attempts_count: env_or("RETRIER_MAX_ATTEMPTS_COUNT", 0)?,
                max_attempts_time_ms: env_or("RETRIER_MAX_ATTEMPTS_TIME_MS", 0)?,
                randomness: env_or("RETRIER_RANDOMNESS", 0.0)?,
            }),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Error> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn env_required<T: FromStr>(key: &str) -> Result<T, Error> {
    let raw = std::env::var(key).map_err(|_| Error::Config(format!("Missing {key} env var")))?;
    parse_env(key, &raw)
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, Error> {
    match std::env::var(key) {
        Ok(raw) => parse_env(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value '{raw}' for {key} env var")))
}

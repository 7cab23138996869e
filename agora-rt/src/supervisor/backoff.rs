//! Restart delay calculation with pluggable growth strategies.
//!
//! Backoff prevents restart storms: each consecutive restart attempt waits
//! longer, following a linear, exponential, or fibonacci curve with optional
//! jitter and a hard cap. Backoff state is per-child and resets after a
//! configurable quiet interval without failures.
//!
//! # Examples
//!
//! ```rust
//! use agora_rt::supervisor::{BackoffConfig, BackoffStrategy, RestartBackoff};
//! use std::time::Duration;
//!
//! let mut backoff = RestartBackoff::new(BackoffConfig {
//!     strategy: BackoffStrategy::Exponential,
//!     base: Duration::from_millis(100),
//!     multiplier: 2.0,
//!     jitter: 0.0,
//!     max_delay: Duration::from_secs(60),
//!     reset_after: Duration::from_secs(30),
//! });
//!
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(200));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(400));
//! ```

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Growth curve for consecutive restart delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * multiplier * attempt`
    Linear,

    /// `base * multiplier^(attempt-1)`
    #[default]
    Exponential,

    /// `base * fib(attempt)` with `fib(1) = fib(2) = 1`
    Fibonacci,
}

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Growth strategy
    pub strategy: BackoffStrategy,

    /// First-attempt delay
    #[serde(with = "duration_millis")]
    pub base: Duration,

    /// Growth factor (linear slope or exponential base)
    pub multiplier: f64,

    /// Random jitter as a ± fraction of the delay, `0.0..=1.0`
    pub jitter: f64,

    /// Hard cap on the delay
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Quiet interval after which the attempt counter resets
    #[serde(with = "duration_millis")]
    pub reset_after: Duration,
}

impl Default for BackoffConfig {
    /// 100ms exponential doubling, no jitter, capped at 60s, resetting
    /// after 30s without failures.
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.0,
            max_delay: Duration::from_secs(60),
            reset_after: Duration::from_secs(30),
        }
    }
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// Attempts beyond this keep the curve flat; the max_delay cap dominates
// long before 64-bit arithmetic could overflow.
const MAX_ATTEMPT_GROWTH: u32 = 32;

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 2..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    if n <= 2 {
        1
    } else {
        b
    }
}

/// Per-child restart delay tracker.
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    config: BackoffConfig,
    attempt: u32,
    last_failure: Option<DateTime<Utc>>,
}

impl RestartBackoff {
    /// Create a tracker with the given configuration.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempt: 0,
            last_failure: None,
        }
    }

    /// Delay before the next restart attempt.
    ///
    /// Advances the attempt counter, applying the quiet-interval reset
    /// first: a failure arriving `reset_after` or more after the previous
    /// one starts the curve over.
    pub fn next_delay(&mut self) -> Duration {
        let now = Utc::now();
        if let Some(last) = self.last_failure {
            if let Ok(quiet) = chrono::Duration::from_std(self.config.reset_after) {
                if now.signed_duration_since(last) >= quiet {
                    self.attempt = 0;
                }
            }
        }
        self.last_failure = Some(now);
        self.attempt = self.attempt.saturating_add(1);

        let attempt = self.attempt.min(MAX_ATTEMPT_GROWTH);
        let base_ms = self.config.base.as_millis() as f64;
        let raw_ms = match self.config.strategy {
            BackoffStrategy::Linear => base_ms * self.config.multiplier * f64::from(attempt),
            BackoffStrategy::Exponential => {
                base_ms * self.config.multiplier.powi(attempt as i32 - 1)
            }
            BackoffStrategy::Fibonacci => base_ms * fibonacci(attempt) as f64,
        };

        let jittered_ms = if self.config.jitter > 0.0 {
            let spread = self.config.jitter.clamp(0.0, 1.0);
            let factor = 1.0 + rand::thread_rng().gen_range(-spread..=spread);
            raw_ms * factor
        } else {
            raw_ms
        };

        Duration::from_millis(jittered_ms.max(0.0) as u64).min(self.config.max_delay)
    }

    /// Restart attempts since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Clear the attempt counter and failure history.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_failure = None;
    }

    /// The configuration in effect.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

//! Retry policy for connecting to a device.
//!
//! The default policy makes three attempts, each bounded by ten seconds,
//! with a fixed one second pause between them:
//!
//! ```
//! use std::time::Duration;
//! use smarttank_core::{Backoff, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_attempts, 3);
//! assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
//! assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
//!
//! let patient = RetryPolicy::default()
//!     .max_attempts(5)
//!     .backoff(Backoff::exponential(Duration::from_millis(500)));
//! assert_eq!(patient.delay_after(3), Duration::from_secs(2));
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pause between failed connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same pause after every failure.
    Fixed(Duration),
    /// `initial * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        /// Pause after the first failure.
        initial: Duration,
        /// Growth factor per failure.
        multiplier: f64,
        /// Upper bound.
        max: Duration,
    },
}

impl Backoff {
    /// Doubling backoff starting at `initial`, capped at 30 seconds.
    pub fn exponential(initial: Duration) -> Self {
        Backoff::Exponential {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(30),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_millis(1000))
    }
}

/// How the connection manager retries a failed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Bound on one whole attempt: connect and service discovery share a
    /// single deadline.
    pub attempt_timeout: Duration,
    /// Pause after a failed attempt.
    pub backoff: Backoff,
    /// Add up to 25% random jitter to each pause.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            backoff: Backoff::default(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A single attempt with the default timeout.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the number of attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the backoff.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Check the policy can make progress.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_config("max_attempts must be at least 1"));
        }
        if self.attempt_timeout.is_zero() {
            return Err(Error::invalid_config("attempt_timeout must be non-zero"));
        }
        if let Backoff::Exponential {
            initial,
            multiplier,
            max,
        } = self.backoff
        {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(Error::invalid_config(format!(
                    "backoff multiplier must be >= 1.0, got {}",
                    multiplier
                )));
            }
            if max < initial {
                return Err(Error::invalid_config(
                    "backoff max must not be below its initial delay",
                ));
            }
        }
        Ok(())
    }

    /// Pause after the `failed_attempt`-th failure (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let exponent = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = initial.as_secs_f64() * multiplier.powi(exponent);
                Duration::from_secs_f64(secs.min(max.as_secs_f64()))
            }
        };

        if self.jitter {
            let jitter_factor = 1.0 + rand::rng().random::<f64>() * 0.25;
            base.mul_f64(jitter_factor)
        } else {
            base
        }
    }
}

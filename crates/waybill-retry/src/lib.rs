//! Bounded retry plans with backoff and jitter.
//!
//! waybill never silently re-books an order; what it does retry are
//! transient infrastructure calls (order-store writes after a confirmed
//! booking, mostly). This crate provides the small retry vocabulary for
//! that: a [`RetryPlan`] describing attempts and backoff, and a [`run`]
//! helper that drives a fallible operation against a plan.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use waybill_retry::{Backoff, RetryPlan};
//!
//! let plan = RetryPlan {
//!     backoff: Backoff::Exponential,
//!     max_attempts: 3,
//!     base_delay: Duration::from_millis(500),
//!     max_delay: Duration::from_secs(10),
//!     jitter: 0.0,
//! };
//! assert_eq!(plan.delay_for(1), Duration::from_millis(500));
//! assert_eq!(plan.delay_for(2), Duration::from_secs(1));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff curve between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay every attempt.
    Constant,
    /// Delay grows linearly with the attempt number.
    Linear,
    /// Delay doubles each attempt (default).
    #[default]
    Exponential,
}

/// How many attempts to make and how long to wait between them.
///
/// Durations serialize as humantime strings (`"500ms"`, `"2s"`) so the
/// plan can live in `.waybill.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPlan {
    #[serde(default)]
    pub backoff: Backoff,
    /// Total attempts, including the first one. `1` means no retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter factor (0.0 = deterministic, 1.0 = full jitter).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_jitter() -> f64 {
    0.3
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self {
            backoff: Backoff::Exponential,
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPlan {
    /// A plan that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to sleep *after* the given failed attempt (1-indexed),
    /// before the next one. Capped at `max_delay`, then jittered.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Constant => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let pow = attempt.saturating_sub(1).min(16);
                self.base_delay.saturating_mul(2_u32.saturating_pow(pow))
            }
        };
        let capped = base.min(self.max_delay);

        if self.jitter <= 0.0 {
            return capped;
        }
        let factor = 1.0 + (rand::random::<f64>() * 2.0 * self.jitter - self.jitter);
        Duration::from_millis((capped.as_millis() as f64 * factor).round() as u64)
    }
}

/// Drive `op` against `plan`, sleeping between attempts.
///
/// `retryable` decides whether a given error is worth another attempt;
/// a non-retryable error is returned immediately. The final error is
/// returned once attempts are exhausted.
pub fn run<T, E, F, P>(plan: &RetryPlan, mut retryable: P, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    P: FnMut(&E) -> bool,
{
    let attempts = plan.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !retryable(&err) || attempt >= attempts {
                    return Err(err);
                }
                std::thread::sleep(plan.delay_for(attempt));
            }
        }
    }
}

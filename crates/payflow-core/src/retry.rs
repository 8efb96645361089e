//! # Retry Strategy
//!
//! Delay schedule shared by confirmation polling and schema fetch retries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay schedule: `interval * rate^retry`, with `retry` capped at `max_retries`.
///
/// A rate of `1.0` gives a linear (constant) schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Maximum number of retries
    pub max_retries: u32,

    /// Base delay in milliseconds
    pub interval_ms: u64,

    /// Growth rate applied per retry
    #[serde(default = "default_rate")]
    pub rate: f64,
}

fn default_rate() -> f64 {
    1.0
}

impl RetryStrategy {
    pub fn linear(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval_ms: interval.as_millis() as u64,
            rate: 1.0,
        }
    }

    pub fn exponential(max_retries: u32, interval: Duration, rate: f64) -> Self {
        Self {
            max_retries,
            interval_ms: interval.as_millis() as u64,
            rate,
        }
    }

    /// Delay before the given retry (0-based).
    pub fn interval(&self, retry: u32) -> Duration {
        let exponent = retry.min(self.max_retries) as i32;
        let millis = self.interval_ms as f64 * self.rate.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::exponential(5, Duration::from_secs(1), 1.5)
    }
}

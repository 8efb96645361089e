//! # Flow Configuration
//!
//! Tunables for the interactors, loaded from environment variables or TOML.

use crate::error::{Failure, PaymentResult};
use crate::retry::RetryStrategy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Longest the native flow may wait for payment confirmation
pub const MAX_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Default number of parameters fetched per schema page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Interactor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Wait for the server to confirm capture after submission
    pub waits_confirmation: bool,

    /// Confirmation timeout in milliseconds, clamped to 180 s
    pub confirmation_timeout_ms: u64,

    /// Schema page size
    pub page_size: usize,

    /// Delay schedule between confirmation polls
    pub poll: RetryStrategy,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            waits_confirmation: true,
            confirmation_timeout_ms: MAX_CONFIRMATION_TIMEOUT.as_millis() as u64,
            page_size: DEFAULT_PAGE_SIZE,
            poll: RetryStrategy::default(),
        }
    }
}

impl FlowConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `PAYFLOW_WAITS_CONFIRMATION`
    /// - `PAYFLOW_CONFIRMATION_TIMEOUT_MS`
    /// - `PAYFLOW_PAGE_SIZE`
    /// - `PAYFLOW_POLL_INTERVAL_MS`
    /// - `PAYFLOW_POLL_RATE`
    /// - `PAYFLOW_POLL_MAX_RETRIES`
    pub fn from_env() -> PaymentResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_vars(|name| env::var(name).ok())
    }

    /// Same as [`FlowConfig::from_env`], reading variables through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> PaymentResult<Self> {
        let mut config = Self::default();
        if let Some(waits) = parse_var(&lookup, "PAYFLOW_WAITS_CONFIRMATION")? {
            config.waits_confirmation = waits;
        }
        if let Some(ms) = parse_var(&lookup, "PAYFLOW_CONFIRMATION_TIMEOUT_MS")? {
            config.confirmation_timeout_ms = ms;
        }
        if let Some(size) = parse_var(&lookup, "PAYFLOW_PAGE_SIZE")? {
            config.page_size = size;
        }
        if let Some(interval) = parse_var(&lookup, "PAYFLOW_POLL_INTERVAL_MS")? {
            config.poll.interval_ms = interval;
        }
        if let Some(rate) = parse_var(&lookup, "PAYFLOW_POLL_RATE")? {
            config.poll.rate = rate;
        }
        if let Some(retries) = parse_var(&lookup, "PAYFLOW_POLL_MAX_RETRIES")? {
            config.poll.max_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> PaymentResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            Failure::configuration(format!("Failed to parse flow config: {}", e)).with_underlying(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Effective confirmation timeout
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms).min(MAX_CONFIRMATION_TIMEOUT)
    }

    /// Builder: set confirmation timeout (clamped on use)
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder: set whether to wait for capture confirmation
    pub fn with_waits_confirmation(mut self, waits: bool) -> Self {
        self.waits_confirmation = waits;
        self
    }

    /// Builder: set the confirmation poll schedule
    pub fn with_poll(mut self, poll: RetryStrategy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn validate(&self) -> PaymentResult<()> {
        if self.page_size == 0 {
            return Err(Failure::configuration("page_size must be greater than zero"));
        }
        if self.poll.interval_ms == 0 {
            return Err(Failure::configuration("poll interval must be greater than zero"));
        }
        if !(self.poll.rate.is_finite() && self.poll.rate >= 1.0) {
            return Err(Failure::configuration("poll rate must be at least 1.0"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> PaymentResult<Option<T>> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Failure::configuration(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}

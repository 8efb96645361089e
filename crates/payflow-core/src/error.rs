//! # Payment Failure Types
//!
//! Typed failures for the payflow engine.
//! Every service call returns `Result<T, Failure>`; interactors resolve
//! failures into phase transitions and never let them escape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Machine-readable failure code.
///
/// Server codes use the dotted form the payment API sends
/// (`card.missing-cvc`, `request.invalid-card`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureCode {
    /// Flow was cancelled by the caller
    Cancelled,
    /// Confirmation wait ran out of time
    Timeout,
    /// Transport could not reach the API
    NetworkUnreachable,
    /// Requested resource does not exist
    NotFound,
    /// Invalid or missing configuration
    Configuration,
    /// Unexpected client-side failure
    Internal,
    /// Server-side validation or processing failure
    Generic(GenericCode),
    /// Code this client does not know about
    Unknown(String),
}

/// Server-side failure codes the interactors react to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericCode {
    RequestInvalidCard,
    CardInvalid,
    CardInvalidNumber,
    CardMissingNumber,
    CardInvalidExpiryDate,
    CardMissingExpiry,
    CardInvalidExpiryMonth,
    CardInvalidExpiryYear,
    CardBadTrackData,
    CardMissingCvc,
    CardFailedCvc,
    CardFailedCvcAndAvs,
    CardInvalidName,
    /// Invalid parameter values for a native payment
    RequestInvalidParameters,
    /// Gateway returned an error without further detail
    GatewayError,
    /// Any other `generic` family code
    Other(String),
}

impl GenericCode {
    fn as_str(&self) -> &str {
        match self {
            GenericCode::RequestInvalidCard => "request.invalid-card",
            GenericCode::CardInvalid => "card.invalid",
            GenericCode::CardInvalidNumber => "card.invalid-number",
            GenericCode::CardMissingNumber => "card.missing-number",
            GenericCode::CardInvalidExpiryDate => "card.invalid-expiry-date",
            GenericCode::CardMissingExpiry => "card.missing-expiry",
            GenericCode::CardInvalidExpiryMonth => "card.invalid-expiry-month",
            GenericCode::CardInvalidExpiryYear => "card.invalid-expiry-year",
            GenericCode::CardBadTrackData => "card.bad-track-data",
            GenericCode::CardMissingCvc => "card.missing-cvc",
            GenericCode::CardFailedCvc => "card.failed-cvc",
            GenericCode::CardFailedCvcAndAvs => "card.failed-cvc-and-avs",
            GenericCode::CardInvalidName => "card.invalid-name",
            GenericCode::RequestInvalidParameters => "request.validation.invalid-parameters",
            GenericCode::GatewayError => "gateway.error",
            GenericCode::Other(raw) => raw.as_str(),
        }
    }
}

impl FailureCode {
    /// Parse a raw server code.
    pub fn from_raw(raw: &str) -> Self {
        let generic = match raw {
            "cancelled" => return FailureCode::Cancelled,
            "timeout" => return FailureCode::Timeout,
            "network.unreachable" => return FailureCode::NetworkUnreachable,
            "resource.not-found" | "not-found" => return FailureCode::NotFound,
            "configuration" => return FailureCode::Configuration,
            "internal" => return FailureCode::Internal,
            "request.invalid-card" => GenericCode::RequestInvalidCard,
            "card.invalid" => GenericCode::CardInvalid,
            "card.invalid-number" => GenericCode::CardInvalidNumber,
            "card.missing-number" => GenericCode::CardMissingNumber,
            "card.invalid-expiry-date" => GenericCode::CardInvalidExpiryDate,
            "card.missing-expiry" => GenericCode::CardMissingExpiry,
            "card.invalid-expiry-month" => GenericCode::CardInvalidExpiryMonth,
            "card.invalid-expiry-year" => GenericCode::CardInvalidExpiryYear,
            "card.bad-track-data" => GenericCode::CardBadTrackData,
            "card.missing-cvc" => GenericCode::CardMissingCvc,
            "card.failed-cvc" => GenericCode::CardFailedCvc,
            "card.failed-cvc-and-avs" => GenericCode::CardFailedCvcAndAvs,
            "card.invalid-name" => GenericCode::CardInvalidName,
            "request.validation.invalid-parameters" => GenericCode::RequestInvalidParameters,
            "gateway.error" => GenericCode::GatewayError,
            other if other.starts_with("card.")
                || other.starts_with("request.")
                || other.starts_with("gateway.") =>
            {
                GenericCode::Other(other.to_string())
            }
            other => return FailureCode::Unknown(other.to_string()),
        };
        FailureCode::Generic(generic)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCode::Cancelled => f.write_str("cancelled"),
            FailureCode::Timeout => f.write_str("timeout"),
            FailureCode::NetworkUnreachable => f.write_str("network.unreachable"),
            FailureCode::NotFound => f.write_str("not-found"),
            FailureCode::Configuration => f.write_str("configuration"),
            FailureCode::Internal => f.write_str("internal"),
            FailureCode::Generic(code) => f.write_str(code.as_str()),
            FailureCode::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for FailureCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FailureCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FailureCode::from_raw(&raw))
    }
}

/// A server-reported problem with one submitted parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidField {
    /// Parameter key as sent in the submission
    pub name: String,
    /// Human-readable explanation
    pub message: String,
}

/// Core failure type for all payment operations
#[derive(Debug, Clone, Error)]
#[error("{code}{suffix}", suffix = .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Failure {
    /// Machine-readable code
    pub code: FailureCode,

    /// Server or client provided message
    pub message: Option<String>,

    /// Parameters the server rejected, if any
    pub invalid_fields: Vec<InvalidField>,

    /// Underlying cause
    #[source]
    pub underlying: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Failure {
    /// Create a failure with the given code and no details
    pub fn new(code: FailureCode) -> Self {
        Self {
            code,
            message: None,
            invalid_fields: Vec::new(),
            underlying: None,
        }
    }

    /// Shorthand for a cancellation failure
    pub fn cancelled() -> Self {
        Self::new(FailureCode::Cancelled)
    }

    /// Shorthand for a timeout failure
    pub fn timeout() -> Self {
        Self::new(FailureCode::Timeout)
    }

    /// Wrap any unexpected error as an internal failure
    pub fn internal(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(FailureCode::Internal).with_underlying(error)
    }

    /// Shorthand for a configuration failure
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FailureCode::Configuration).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_invalid_field(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.invalid_fields.push(InvalidField {
            name: name.into(),
            message: message.into(),
        });
        self
    }

    pub fn with_underlying(mut self, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.underlying = Some(Arc::new(error));
        self
    }

    /// Returns true if repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            FailureCode::NetworkUnreachable
                | FailureCode::Timeout
                | FailureCode::Generic(GenericCode::GatewayError)
        )
    }

    /// Returns true if this failure was caused by cancellation
    pub fn is_cancellation(&self) -> bool {
        self.code == FailureCode::Cancelled
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, Failure>;

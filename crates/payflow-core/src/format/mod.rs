//! # Field Formatting and Validation
//!
//! Pure normalize/validate functions, resolved by [`FieldKind`].
//! Nothing in here performs I/O.

pub mod card_number;
pub mod expiry;
pub mod scheme;
mod text;

use crate::field::FieldKind;
use chrono::NaiveDate;
use thiserror::Error;

/// Local validation failure for a single field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Value is required")]
    Required,

    #[error("Value must be exactly {expected} characters long")]
    Length { expected: usize },

    #[error("Only digits are allowed")]
    NotNumeric,

    #[error("Card number is invalid")]
    InvalidCardNumber,

    #[error("Expiration date is invalid")]
    InvalidExpiry,

    #[error("Card has expired")]
    Expired,

    #[error("Security code must be 3 or 4 digits")]
    InvalidCvc,

    #[error("Email address is invalid")]
    InvalidEmail,

    #[error("Phone number is invalid")]
    InvalidPhone,
}

/// Format raw user input for display.
pub fn format(kind: FieldKind, raw: &str, length: Option<usize>) -> String {
    let formatted = match kind {
        FieldKind::CardNumber => card_number::format(raw),
        FieldKind::Expiry => expiry::format(raw),
        FieldKind::Cvc => text::digits(raw).chars().take(text::MAX_CVC_LENGTH).collect(),
        FieldKind::Numeric => text::digits(raw),
        FieldKind::Phone => text::phone(raw),
        FieldKind::Email => raw.trim().to_string(),
        FieldKind::Text | FieldKind::Name => raw.to_string(),
    };
    match length {
        Some(length) => formatted.chars().take(length).collect(),
        None => formatted,
    }
}

/// Value to send to the server.
pub fn canonical(kind: FieldKind, value: &str) -> String {
    match kind {
        FieldKind::CardNumber => card_number::normalized(value),
        FieldKind::Phone => text::phone_digits(value),
        FieldKind::Text | FieldKind::Name | FieldKind::Email => value.trim().to_string(),
        FieldKind::Numeric | FieldKind::Cvc | FieldKind::Expiry => value.to_string(),
    }
}

/// Validate a formatted value.
pub fn validate(
    kind: FieldKind,
    value: &str,
    length: Option<usize>,
    required: bool,
    today: NaiveDate,
) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return if required { Err(FieldError::Required) } else { Ok(()) };
    }
    if let Some(expected) = length {
        if value.chars().count() != expected {
            return Err(FieldError::Length { expected });
        }
    }
    match kind {
        FieldKind::CardNumber => card_number::validate(value),
        FieldKind::Expiry => expiry::validate(value, today),
        FieldKind::Cvc => text::validate_cvc(value),
        FieldKind::Numeric => text::validate_numeric(value),
        FieldKind::Email => text::validate_email(value),
        FieldKind::Phone => text::validate_phone(value),
        FieldKind::Text | FieldKind::Name => Ok(()),
    }
}

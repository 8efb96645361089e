//! # Expiration Date Formatting
//!
//! Accepts `MM / YY`, `MM/YY`, `MMYY` or `MMYYYY` style input.

use super::FieldError;
use chrono::{Datelike, NaiveDate};

/// Parsed card expiration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiration {
    pub month: u32,
    pub year: i32,
}

/// Format raw input as `MM / YY`, padding single-digit months.
pub fn format(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.starts_with(|c: char| c > '1') {
        digits.insert(0, '0');
    }
    if digits.len() >= 2 && digits[..2].parse::<u32>().map_or(false, |m| m > 12) {
        digits.insert(0, '0');
    }
    digits.truncate(4);
    if digits.len() <= 2 {
        digits
    } else {
        format!("{} / {}", &digits[..2], &digits[2..])
    }
}

pub fn parse(value: &str) -> Option<Expiration> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    let (month, year) = match digits.len() {
        4 => (&digits[..2], 2000 + digits[2..].parse::<i32>().ok()?),
        6 => (&digits[..2], digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    let month = month.parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some(Expiration { month, year })
}

/// Valid through the last day of the expiration month.
pub fn validate(value: &str, today: NaiveDate) -> Result<(), FieldError> {
    let expiration = parse(value).ok_or(FieldError::InvalidExpiry)?;
    if (expiration.year, expiration.month) < (today.year(), today.month()) {
        return Err(FieldError::Expired);
    }
    Ok(())
}

//! # Card Number Formatting
//!
//! Normalization, display grouping, issuer prefix extraction and Luhn
//! validation for primary account numbers.

use super::scheme::{self, AMEX, DINERS};
use super::FieldError;

/// Number of leading digits that identify the issuer
pub const IIN_LENGTH: usize = 6;

const MIN_LENGTH: usize = 12;
const MAX_LENGTH: usize = 19;

/// Digits only, capped at the longest possible card number.
pub fn normalized(number: &str) -> String {
    number
        .chars()
        .filter(char::is_ascii_digit)
        .take(MAX_LENGTH)
        .collect()
}

/// Group digits for display: 4-6-5 for American Express, 4-6-4 for
/// Diners Club, groups of four otherwise.
pub fn format(number: &str) -> String {
    let digits = normalized(number);
    let pattern: &[usize] = match scheme::scheme(&digits) {
        Some(s) if s == AMEX => &[4, 6, 5],
        Some(s) if s == DINERS && digits.len() <= 14 => &[4, 6, 4],
        _ => &[4, 4, 4, 4, 3],
    };

    let mut groups = Vec::new();
    let mut rest = digits.as_str();
    for &size in pattern {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at(size.min(rest.len()));
        groups.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.join(" ")
}

/// Issuer identification number, once enough digits are entered.
pub fn issuer_identification_number(number: &str) -> Option<String> {
    let digits = normalized(number);
    (digits.len() >= IIN_LENGTH).then(|| digits[..IIN_LENGTH].to_string())
}

pub fn validate(number: &str) -> Result<(), FieldError> {
    let digits = normalized(number);
    if (MIN_LENGTH..=MAX_LENGTH).contains(&digits.len()) && luhn(&digits) {
        Ok(())
    } else {
        Err(FieldError::InvalidCardNumber)
    }
}

fn luhn(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

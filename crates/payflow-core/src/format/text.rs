//! Free-form kinds: cvc, numeric, email, phone.

use super::FieldError;

pub(super) const MAX_CVC_LENGTH: usize = 4;

const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

pub(super) fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Keeps digits, a leading `+` and common separators.
pub(super) fn phone(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        let keep = c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (c == '+' && i == 0);
        if keep {
            out.push(c);
        }
    }
    out
}

pub(super) fn phone_digits(value: &str) -> String {
    let prefix = if value.trim_start().starts_with('+') { "+" } else { "" };
    format!("{prefix}{}", digits(value))
}

pub(super) fn validate_cvc(value: &str) -> Result<(), FieldError> {
    let all_digits = value.chars().all(|c| c.is_ascii_digit());
    if all_digits && (3..=MAX_CVC_LENGTH).contains(&value.len()) {
        Ok(())
    } else {
        Err(FieldError::InvalidCvc)
    }
}

pub(super) fn validate_numeric(value: &str) -> Result<(), FieldError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FieldError::NotNumeric)
    }
}

pub(super) fn validate_email(value: &str) -> Result<(), FieldError> {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return Err(FieldError::InvalidEmail);
    };
    let domain_ok = match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    };
    if local.is_empty() || !domain_ok || value.contains(char::is_whitespace) {
        return Err(FieldError::InvalidEmail);
    }
    Ok(())
}

pub(super) fn validate_phone(value: &str) -> Result<(), FieldError> {
    let count = digits(value).len();
    if (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&count) {
        Ok(())
    } else {
        Err(FieldError::InvalidPhone)
    }
}

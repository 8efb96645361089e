//! # Local Scheme Detection
//!
//! Static prefix table used to give immediate scheme feedback while the
//! issuer lookup is in flight. Longest matching prefix wins.

pub const VISA: &str = "visa";
pub const MASTERCARD: &str = "mastercard";
pub const AMEX: &str = "american express";
pub const DISCOVER: &str = "discover";
pub const DINERS: &str = "diners club";
pub const JCB: &str = "jcb";
pub const UNIONPAY: &str = "china union pay";
pub const MAESTRO: &str = "maestro";

struct PrefixRange {
    low: u32,
    high: u32,
    digits: usize,
    scheme: &'static str,
}

const fn range(low: u32, high: u32, digits: usize, scheme: &'static str) -> PrefixRange {
    PrefixRange { low, high, digits, scheme }
}

const PREFIXES: &[PrefixRange] = &[
    range(4, 4, 1, VISA),
    range(51, 55, 2, MASTERCARD),
    range(2221, 2720, 4, MASTERCARD),
    range(34, 34, 2, AMEX),
    range(37, 37, 2, AMEX),
    range(6011, 6011, 4, DISCOVER),
    range(644, 649, 3, DISCOVER),
    range(65, 65, 2, DISCOVER),
    range(300, 305, 3, DINERS),
    range(36, 36, 2, DINERS),
    range(38, 39, 2, DINERS),
    range(3528, 3589, 4, JCB),
    range(62, 62, 2, UNIONPAY),
    range(50, 50, 2, MAESTRO),
    range(56, 58, 2, MAESTRO),
    range(63, 63, 2, MAESTRO),
    range(67, 67, 2, MAESTRO),
];

/// Infer the card scheme from the leading digits of `number`.
///
/// Non-digit characters are ignored. Returns `None` when no prefix matches.
pub fn scheme(number: &str) -> Option<&'static str> {
    let digits: String = number.chars().filter(char::is_ascii_digit).take(6).collect();
    PREFIXES
        .iter()
        .filter(|entry| digits.len() >= entry.digits)
        .filter(|entry| {
            digits[..entry.digits]
                .parse::<u32>()
                .map(|prefix| (entry.low..=entry.high).contains(&prefix))
                .unwrap_or(false)
        })
        .max_by_key(|entry| entry.digits)
        .map(|entry| entry.scheme)
}

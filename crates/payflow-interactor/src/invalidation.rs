//! Mapping server failures back onto the input fields they concern.

use crate::card::CardField;
use payflow_core::{Failure, FailureCode, FieldId, GenericCode};

/// Most recent server rejection, shown until the user fixes the fields it
/// invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentError {
    pub code: FailureCode,
    pub message: String,
    pub invalid_fields: Vec<FieldId>,
}

impl RecentError {
    /// True once every field this error invalidated is valid again.
    pub(crate) fn is_resolved(&self, mut is_valid: impl FnMut(&FieldId) -> bool) -> bool {
        self.invalid_fields.iter().all(|id| is_valid(id))
    }
}

pub(crate) const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";
const INVALID_PARAMETERS_MESSAGE: &str = "Some of the values you entered are invalid.";

/// Message category for a card rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CardErrorKind {
    Card,
    CardNumber,
    Expiration,
    TrackData,
    Cvc,
    CardholderName,
    Generic,
}

impl CardErrorKind {
    pub(crate) fn message(self) -> &'static str {
        match self {
            CardErrorKind::Card => "The card details are invalid.",
            CardErrorKind::CardNumber => "The card number is invalid.",
            CardErrorKind::Expiration => "The expiration date is invalid.",
            CardErrorKind::TrackData => "The expiration date or security code is invalid.",
            CardErrorKind::Cvc => "The security code is invalid.",
            CardErrorKind::CardholderName => "The cardholder name is invalid.",
            CardErrorKind::Generic => GENERIC_MESSAGE,
        }
    }
}

/// Fields to invalidate and the message category for a tokenization failure.
pub(crate) fn card_invalidation(code: &FailureCode) -> (&'static [CardField], CardErrorKind) {
    use CardField::*;
    use GenericCode::*;

    let FailureCode::Generic(generic) = code else {
        return (&[], CardErrorKind::Generic);
    };
    match generic {
        RequestInvalidCard | CardInvalid => {
            (&[Number, Expiration, Cvc, CardholderName], CardErrorKind::Card)
        }
        CardInvalidNumber | CardMissingNumber => (&[Number], CardErrorKind::CardNumber),
        CardInvalidExpiryDate | CardMissingExpiry | CardInvalidExpiryMonth | CardInvalidExpiryYear => {
            (&[Expiration], CardErrorKind::Expiration)
        }
        CardBadTrackData => (&[Expiration, Cvc], CardErrorKind::TrackData),
        CardMissingCvc | CardFailedCvc | CardFailedCvcAndAvs => (&[Cvc], CardErrorKind::Cvc),
        CardInvalidName => (&[CardholderName], CardErrorKind::CardholderName),
        _ => (&[], CardErrorKind::Generic),
    }
}

/// Message to show for a native submission failure.
pub(crate) fn native_message(failure: &Failure) -> String {
    if failure.invalid_fields.is_empty() {
        return GENERIC_MESSAGE.to_string();
    }
    failure
        .message
        .clone()
        .unwrap_or_else(|| INVALID_PARAMETERS_MESSAGE.to_string())
}

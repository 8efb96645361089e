use crate::invalidation::RecentError;
use payflow_core::format::card_number;
use payflow_core::{Card, Failure, Field, FieldId, FieldKind, IssuerInformation};
use std::fmt;

/// Fixed set of card form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardField {
    Number,
    Expiration,
    Cvc,
    CardholderName,
}

impl CardField {
    pub const ALL: [CardField; 4] = [
        CardField::Number,
        CardField::Expiration,
        CardField::Cvc,
        CardField::CardholderName,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CardField::Number => "number",
            CardField::Expiration => "expiration",
            CardField::Cvc => "cvc",
            CardField::CardholderName => "cardholder_name",
        }
    }

    pub fn id(self) -> FieldId {
        FieldId::new(self.key())
    }

    fn from_id(id: &FieldId) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == id.as_str())
    }
}

impl fmt::Display for CardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintSource {
    /// Static prefix table
    Local,
    /// Issuer lookup
    Issuer,
}

/// What is known about the card's issuer so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerHint {
    pub scheme: String,
    pub co_scheme: Option<String>,
    pub card_type: Option<String>,
    pub bank_name: Option<String>,
    pub category: Option<String>,
    pub source: HintSource,
}

impl IssuerHint {
    pub(crate) fn local(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            co_scheme: None,
            card_type: None,
            bank_name: None,
            category: None,
            source: HintSource::Local,
        }
    }

    pub(crate) fn from_issuer(information: IssuerInformation) -> Self {
        Self {
            scheme: information.scheme,
            co_scheme: information.co_scheme,
            card_type: information.card_type,
            bank_name: information.bank_name,
            category: information.category,
            source: HintSource::Issuer,
        }
    }

    /// Whether the card can be processed with `scheme`
    pub fn supports(&self, scheme: &str) -> bool {
        self.scheme == scheme || self.co_scheme.as_deref() == Some(scheme)
    }
}

/// Card form being filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStarted {
    pub number: Field,
    pub expiration: Field,
    pub cvc: Field,
    pub cardholder_name: Field,
    pub issuer_hint: Option<IssuerHint>,
    pub preferred_scheme: Option<String>,
    pub recent_error: Option<RecentError>,
}

impl CardStarted {
    pub(crate) fn new() -> Self {
        Self {
            number: Field::new(CardField::Number.id(), "Card number", FieldKind::CardNumber),
            expiration: Field::new(CardField::Expiration.id(), "Expiration date", FieldKind::Expiry),
            cvc: Field::new(CardField::Cvc.id(), "CVC", FieldKind::Cvc),
            cardholder_name: Field::new(
                CardField::CardholderName.id(),
                "Cardholder name",
                FieldKind::Name,
            ),
            issuer_hint: None,
            preferred_scheme: None,
            recent_error: None,
        }
    }

    pub fn field(&self, field: CardField) -> &Field {
        match field {
            CardField::Number => &self.number,
            CardField::Expiration => &self.expiration,
            CardField::Cvc => &self.cvc,
            CardField::CardholderName => &self.cardholder_name,
        }
    }

    pub(crate) fn field_mut(&mut self, field: CardField) -> &mut Field {
        match field {
            CardField::Number => &mut self.number,
            CardField::Expiration => &mut self.expiration,
            CardField::Cvc => &mut self.cvc,
            CardField::CardholderName => &mut self.cardholder_name,
        }
    }

    /// Issuer identification number of the current card number
    pub fn iin(&self) -> Option<String> {
        card_number::issuer_identification_number(&self.number.value)
    }

    pub fn are_fields_valid(&self) -> bool {
        CardField::ALL.iter().all(|field| self.field(*field).is_valid)
    }

    pub fn is_tokenize_allowed(&self) -> bool {
        self.are_fields_valid() && self.recent_error.is_none()
    }

    /// Drop the recent error once the user has fixed every field it flagged.
    pub(crate) fn clear_resolved_error(&mut self) -> bool {
        let resolved = self.recent_error.as_ref().map_or(false, |error| {
            error.is_resolved(|id| CardField::from_id(id).map_or(true, |f| self.field(f).is_valid))
        });
        if resolved {
            self.recent_error = None;
        }
        resolved
    }
}

/// Successfully tokenized card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub card: Card,
    /// Card number as it was displayed to the user
    pub card_number: String,
}

#[derive(Debug, Clone)]
pub enum CardTokenizationState {
    Idle,
    Started(CardStarted),
    /// Tokenization in flight; carries the form it was started from
    Tokenizing(CardStarted),
    Tokenized(Tokenized),
    Failure(Failure),
}

impl CardTokenizationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CardTokenizationState::Tokenized(_) | CardTokenizationState::Failure(_)
        )
    }

    /// Form snapshot, if the interactor is collecting or tokenizing it
    pub fn started(&self) -> Option<&CardStarted> {
        match self {
            CardTokenizationState::Started(started) | CardTokenizationState::Tokenizing(started) => {
                Some(started)
            }
            _ => None,
        }
    }
}

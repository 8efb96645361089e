//! # Fields
//!
//! User-editable inputs collected during a payment attempt, either described
//! by the server (native payment parameters) or fixed (card form).

use crate::format::{self, FieldError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a field, selects its formatter and validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Text,
    Email,
    Phone,
    CardNumber,
    Expiry,
    Cvc,
    Name,
}

/// Stable field identifier (the parameter key for server-driven fields)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FieldId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Server-provided description of a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Parameter key
    pub key: FieldId,

    /// Name to show next to the input
    pub display_name: String,

    /// Parameter type
    #[serde(rename = "type")]
    pub kind: FieldKind,

    /// Exact required length, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    /// Whether an empty value is acceptable
    #[serde(default)]
    pub required: bool,
}

/// A single user-editable datum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: FieldId,
    pub label: String,
    pub kind: FieldKind,
    pub length: Option<usize>,
    pub required: bool,

    /// Current value, already passed through the kind's formatter
    pub value: String,

    /// False only after a failed local validation or a server rejection
    pub is_valid: bool,

    /// Message explaining why the field is invalid
    pub error_message: Option<String>,
}

impl Field {
    pub fn new(id: impl Into<FieldId>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            length: None,
            required: true,
            value: String::new(),
            is_valid: true,
            error_message: None,
        }
    }

    pub fn with_length(mut self, length: Option<usize>) -> Self {
        self.length = length;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Replace the value with the formatted form of `raw`.
    ///
    /// Returns false if the formatted value equals the current one, in which
    /// case nothing changes. Otherwise the field becomes valid again.
    pub fn set_value(&mut self, raw: &str) -> bool {
        let formatted = format::format(self.kind, raw, self.length);
        if formatted == self.value {
            return false;
        }
        self.value = formatted;
        self.is_valid = true;
        self.error_message = None;
        true
    }

    /// Check the current value locally; never touches the network.
    pub fn validate(&self, today: NaiveDate) -> Result<(), FieldError> {
        format::validate(self.kind, &self.value, self.length, self.required, today)
    }

    /// Value in the form the server expects
    pub fn canonical_value(&self) -> String {
        format::canonical(self.kind, &self.value)
    }

    pub fn invalidate(&mut self, message: Option<String>) {
        self.is_valid = false;
        self.error_message = message;
    }
}

impl From<FieldSpec> for Field {
    fn from(spec: FieldSpec) -> Self {
        Field::new(spec.key, spec.display_name, spec.kind)
            .with_length(spec.length)
            .with_required(spec.required)
    }
}

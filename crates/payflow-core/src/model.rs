//! # Payment Models
//!
//! Request and response types exchanged with the remote payment API.

use crate::field::{FieldId, FieldSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque references identifying the payment being authorized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentContext {
    /// Invoice being paid
    pub invoice_id: String,

    /// Gateway configuration used for the native payment
    pub gateway_configuration_id: String,
}

impl PaymentContext {
    pub fn new(invoice_id: impl Into<String>, gateway_configuration_id: impl Into<String>) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            gateway_configuration_id: gateway_configuration_id.into(),
        }
    }
}

/// Cursor-based pagination for the parameter schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Return parameters after this key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<FieldId>,

    /// Page size
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }

    pub fn after(key: FieldId, limit: usize) -> Self {
        Self {
            after: Some(key),
            limit,
        }
    }
}

/// Presentation details of the gateway processing the payment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// One page of server-described parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchemaPage {
    #[serde(default)]
    pub gateway: GatewayInfo,

    pub parameters: Vec<FieldSpec>,

    /// More parameters can be fetched after the last one
    #[serde(default)]
    pub has_more: bool,
}

/// Action the customer must take outside the app (approve in a banking app, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAction {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Authorization outcome as known by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Still waiting on the customer or the gateway
    Pending,
    /// Payment captured
    Captured,
}

/// Result of submitting parameter values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_customer_action: Option<CustomerAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_outcome: Option<Outcome>,
}

impl SubmitResponse {
    pub fn captured() -> Self {
        Self {
            pending_customer_action: None,
            final_outcome: Some(Outcome::Captured),
        }
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            pending_customer_action: Some(CustomerAction {
                message: message.into(),
                image_url: None,
            }),
            final_outcome: Some(Outcome::Pending),
        }
    }
}

/// Card data to tokenize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTokenizationRequest {
    /// Digits only
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
    pub name: String,

    /// Scheme the card should be processed with when co-branded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_scheme: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Tokenized card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,

    pub scheme: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_scheme: Option<String>,

    pub last_4_digits: String,
    pub exp_month: u32,
    pub exp_year: i32,

    pub created_at: DateTime<Utc>,
}

/// Issuer metadata resolved from the issuer identification number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerInformation {
    pub scheme: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_scheme: Option<String>,

    /// debit, credit, prepaid
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl IssuerInformation {
    /// Only the scheme is known
    pub fn scheme_only(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            co_scheme: None,
            card_type: None,
            bank_name: None,
            brand: None,
            category: None,
        }
    }

    pub fn with_co_scheme(mut self, co_scheme: impl Into<String>) -> Self {
        self.co_scheme = Some(co_scheme.into());
        self
    }
}

//! # Remote Payment Service Traits
//!
//! Interface boundary to the payment API. Transport, wire encoding and the
//! mapping of transport errors into [`Failure`](crate::Failure) live behind
//! these traits.
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │   InvoicesService (trait)    │   │     CardsService (trait)     │
//! │  ├── fetch_parameter_schema()│   │  ├── tokenize()              │
//! │  ├── submit_parameters()     │   │  └── issuer_information()    │
//! │  └── poll_confirmation()     │   │                              │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!               ▲                                   ▲
//!               │                                   │
//!   NativePaymentInteractor          CardTokenizationInteractor
//! ```

use crate::error::PaymentResult;
use crate::model::{
    Card, CardTokenizationRequest, IssuerInformation, Outcome, PageRequest, ParameterSchemaPage,
    PaymentContext, SubmitResponse,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Invoice operations used by native alternative payments.
#[async_trait]
pub trait InvoicesService: Send + Sync {
    /// Fetch one page of the parameters the gateway needs.
    async fn fetch_parameter_schema(
        &self,
        context: &PaymentContext,
        page: &PageRequest,
    ) -> PaymentResult<ParameterSchemaPage>;

    /// Submit parameter values keyed by parameter key.
    ///
    /// Rejected values come back as a failure whose `invalid_fields` name the
    /// offending keys.
    async fn submit_parameters(
        &self,
        context: &PaymentContext,
        values: &HashMap<String, String>,
    ) -> PaymentResult<SubmitResponse>;

    /// Ask the server whether the payment has been finalized.
    async fn poll_confirmation(&self, context: &PaymentContext) -> PaymentResult<Outcome>;
}

/// Card operations used by card tokenization.
#[async_trait]
pub trait CardsService: Send + Sync {
    async fn tokenize(&self, request: &CardTokenizationRequest) -> PaymentResult<Card>;

    /// Resolve issuer metadata. Callers cancel by dropping the future.
    async fn issuer_information(&self, iin: &str) -> PaymentResult<IssuerInformation>;
}

/// Type alias for a shared invoices service (dynamic dispatch)
pub type BoxedInvoicesService = Arc<dyn InvoicesService>;

/// Type alias for a shared cards service (dynamic dispatch)
pub type BoxedCardsService = Arc<dyn CardsService>;

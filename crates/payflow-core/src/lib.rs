//! # payflow-core
//!
//! Core types and traits for the payflow authorization engine.
//!
//! This crate provides:
//! - `Field`, `FieldKind` and the per-kind formatters/validators in [`format`]
//! - `InvoicesService` and `CardsService`, the boundary to the payment API
//! - Request/response models (`ParameterSchemaPage`, `SubmitResponse`, `Card`, ...)
//! - `Failure` and `FailureCode` for typed error handling
//! - `FlowConfig` and `RetryStrategy` for tuning the interactors
//!
//! ## Example
//!
//! ```rust
//! use payflow_core::{Field, FieldKind};
//!
//! let mut number = Field::new("number", "Card number", FieldKind::CardNumber);
//! number.set_value("4242424242424242");
//!
//! assert_eq!(number.value, "4242 4242 4242 4242");
//! assert_eq!(number.canonical_value(), "4242424242424242");
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod format;
pub mod model;
pub mod retry;
pub mod service;

// Re-exports for convenience
pub use config::{FlowConfig, DEFAULT_PAGE_SIZE, MAX_CONFIRMATION_TIMEOUT};
pub use error::{Failure, FailureCode, GenericCode, InvalidField, PaymentResult};
pub use field::{Field, FieldId, FieldKind, FieldSpec};
pub use format::FieldError;
pub use model::{
    Card, CardTokenizationRequest, CustomerAction, GatewayInfo, IssuerInformation, Outcome,
    PageRequest, ParameterSchemaPage, PaymentContext, SubmitResponse,
};
pub use retry::RetryStrategy;
pub use service::{BoxedCardsService, BoxedInvoicesService, CardsService, InvoicesService};

//! # Delegates
//!
//! Optional capabilities the caller can plug into an interactor. The
//! interactor only holds a `Weak` reference; when the delegate is absent or
//! dropped every decision falls back to the built-in policy.

use async_trait::async_trait;
use payflow_core::{Card, Failure, IssuerInformation, PaymentResult};

/// Lifecycle events of card tokenization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardTokenizationEvent {
    WillStart,
    DidStart,
    /// A field value or the preferred scheme changed
    ParametersChanged,
    WillTokenize,
    DidTokenize(Card),
    /// Card was tokenized and processed
    DidComplete,
}

#[async_trait]
pub trait CardTokenizationDelegate: Send + Sync {
    fn on_event(&self, _event: CardTokenizationEvent) {}

    /// Scheme to process a co-branded card with. Defaults to the primary scheme.
    fn preferred_scheme(&self, issuer: &IssuerInformation) -> Option<String> {
        Some(issuer.scheme.clone())
    }

    /// Extra step run after tokenization, e.g. authorizing an invoice with
    /// the new card. A failure sends the flow back to the started phase.
    async fn process_tokenized_card(&self, _card: &Card) -> PaymentResult<()> {
        Ok(())
    }

    /// Return false to end the flow on `failure` instead of letting the user
    /// correct their input.
    fn should_continue_tokenization(&self, _failure: &Failure) -> bool {
        true
    }
}

/// Lifecycle events of a native alternative payment
#[derive(Debug, Clone)]
pub enum NativePaymentEvent {
    WillStart,
    DidStart,
    ParametersChanged,
    WillSubmit,
    DidSubmit { awaiting_confirmation: bool },
    DidFailToSubmit(Failure),
    WillWaitForConfirmation,
    DidCompletePayment,
    DidFail(Failure),
}

pub trait NativePaymentDelegate: Send + Sync {
    fn on_event(&self, event: NativePaymentEvent);
}

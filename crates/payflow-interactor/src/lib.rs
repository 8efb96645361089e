//! # payflow-interactor
//!
//! Payment authorization state machines.
//!
//! - [`NativePaymentInteractor`]: server-described parameters, submission and
//!   a bounded wait for out-of-band confirmation
//! - [`CardTokenizationInteractor`]: card form with live issuer lookup and
//!   tokenization
//!
//! Each interactor is an actor on its own Tokio task. Commands and the
//! results of the operations it spawned are handled one at a time, every
//! transition is published on a `watch` channel and the final outcome is
//! reported once through a [`Completion`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use payflow_core::BoxedCardsService;
//! use payflow_interactor::{CardField, CardTokenizationConfiguration, CardTokenizationInteractor};
//!
//! async fn pay(cards: BoxedCardsService) -> payflow_core::PaymentResult<()> {
//!     let (interactor, completion) =
//!         CardTokenizationInteractor::spawn(cards, CardTokenizationConfiguration::default(), None);
//!
//!     interactor.start();
//!     interactor.update_field(CardField::Number, "4242 4242 4242 4242");
//!     interactor.update_field(CardField::Expiration, "12/30");
//!     interactor.update_field(CardField::Cvc, "123");
//!     interactor.update_field(CardField::CardholderName, "Jane Doe");
//!     interactor.tokenize();
//!
//!     let card = completion.wait().await?;
//!     println!("tokenized {}", card.id);
//!     Ok(())
//! }
//! ```

pub mod card;
mod confirmation;
pub mod delegate;
mod invalidation;
pub mod native;
mod retry;
mod runtime;
mod slot;

pub use card::{
    CardField, CardStarted, CardTokenizationConfiguration, CardTokenizationInteractor,
    CardTokenizationState, HintSource, IssuerHint, Tokenized,
};
pub use delegate::{
    CardTokenizationDelegate, CardTokenizationEvent, NativePaymentDelegate, NativePaymentEvent,
};
pub use invalidation::RecentError;
pub use native::{
    AwaitingConfirmation, NativePaymentConfiguration, NativePaymentInteractor, NativePaymentState,
    NativeStarted,
};
pub use retry::retry_with;
pub use runtime::Completion;
pub use slot::OperationId;

//! # Card Tokenization
//!
//! Collects card details, resolves the issuer while the number is typed and
//! exchanges the card for a token.
//!
//! ```text
//! Idle ──start──▶ Started ──tokenize──▶ Tokenizing ──ok──▶ Tokenized
//!                    ▲                      │
//!                    └──── recoverable ─────┘──── fatal / cancel ──▶ Failure
//! ```

mod state;

pub use state::{CardField, CardStarted, CardTokenizationState, HintSource, IssuerHint, Tokenized};

use crate::delegate::{CardTokenizationDelegate, CardTokenizationEvent};
use crate::invalidation::{self, RecentError};
use crate::runtime::{completion_channel, Completion, CompletionSender, Handle, Mailbox, StatePublisher};
use crate::slot::{OperationId, OperationSlot};
use chrono::Utc;
use payflow_core::format::{expiry, scheme};
use payflow_core::{
    BoxedCardsService, Card, CardTokenizationRequest, Failure, IssuerInformation, PaymentResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Caller-supplied data attached to every tokenization request
#[derive(Debug, Clone, Default)]
pub struct CardTokenizationConfiguration {
    pub metadata: HashMap<String, String>,
}

impl CardTokenizationConfiguration {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug)]
enum Command {
    Start,
    UpdateField(CardField, String),
    SetPreferredScheme(String),
    Tokenize,
    Cancel,
}

#[derive(Debug)]
enum Message {
    Command(Command),
    IssuerResolved {
        operation: OperationId,
        iin: String,
        result: PaymentResult<IssuerInformation>,
    },
    Tokenized {
        operation: OperationId,
        result: PaymentResult<Card>,
    },
    Processed {
        operation: OperationId,
        card: Card,
        result: PaymentResult<()>,
    },
}

/// Handle to a running card tokenization flow.
///
/// Cloning the handle is cheap; the flow stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct CardTokenizationInteractor {
    handle: Handle<Message, CardTokenizationState>,
    attempt_id: Uuid,
}

impl CardTokenizationInteractor {
    /// Spawn the interactor on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn(
        cards: BoxedCardsService,
        configuration: CardTokenizationConfiguration,
        delegate: Option<Weak<dyn CardTokenizationDelegate>>,
    ) -> (Self, Completion<Card>) {
        let attempt_id = Uuid::new_v4();
        let (sender, inbox) = mpsc::unbounded_channel();
        let (publisher, state) = StatePublisher::new(CardTokenizationState::Idle);
        let (completion, completion_handle) = completion_channel();

        let actor = CardTokenizationActor {
            cards,
            configuration,
            delegate,
            state: CardTokenizationState::Idle,
            publisher,
            completion,
            mailbox: Mailbox::new(&sender),
            lookup: OperationSlot::new("issuer_lookup"),
            tokenization: OperationSlot::new("tokenization"),
        };
        tokio::spawn(
            actor
                .run(inbox)
                .instrument(info_span!("card_tokenization", attempt = %attempt_id)),
        );

        let interactor = Self {
            handle: Handle::new(sender, state),
            attempt_id,
        };
        (interactor, completion_handle)
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn update_field(&self, field: CardField, value: impl Into<String>) {
        self.send(Command::UpdateField(field, value.into()));
    }

    /// Pick the scheme a co-branded card is processed with.
    ///
    /// Ignored unless `scheme` is the hinted scheme or co-scheme.
    pub fn set_preferred_scheme(&self, scheme: impl Into<String>) {
        self.send(Command::SetPreferredScheme(scheme.into()));
    }

    pub fn tokenize(&self) {
        self.send(Command::Tokenize);
    }

    pub fn cancel(&self) {
        self.send(Command::Cancel);
    }

    /// Latest published state
    pub fn state(&self) -> CardTokenizationState {
        self.handle.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<CardTokenizationState> {
        self.handle.subscribe()
    }

    fn send(&self, command: Command) {
        self.handle.send(Message::Command(command));
    }
}

struct CardTokenizationActor {
    cards: BoxedCardsService,
    configuration: CardTokenizationConfiguration,
    delegate: Option<Weak<dyn CardTokenizationDelegate>>,
    state: CardTokenizationState,
    publisher: StatePublisher<CardTokenizationState>,
    completion: CompletionSender<Card>,
    mailbox: Mailbox<Message>,
    lookup: OperationSlot,
    tokenization: OperationSlot,
}

impl CardTokenizationActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = inbox.recv().await {
            self.handle(message);
        }
        debug!("card tokenization interactor stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Command(Command::Start) => self.start(),
            Message::Command(Command::UpdateField(field, value)) => self.update_field(field, value),
            Message::Command(Command::SetPreferredScheme(scheme)) => self.set_preferred_scheme(scheme),
            Message::Command(Command::Tokenize) => self.tokenize(),
            Message::Command(Command::Cancel) => self.cancel(),
            Message::IssuerResolved {
                operation,
                iin,
                result,
            } => self.issuer_resolved(operation, iin, result),
            Message::Tokenized { operation, result } => self.tokenized(operation, result),
            Message::Processed {
                operation,
                card,
                result,
            } => self.processed(operation, card, result),
        }
    }

    fn start(&mut self) {
        if !matches!(self.state, CardTokenizationState::Idle) {
            debug!("ignoring start, interactor already started");
            return;
        }
        self.emit(CardTokenizationEvent::WillStart);
        self.set_state(CardTokenizationState::Started(CardStarted::new()));
        info!("card tokenization started");
        self.emit(CardTokenizationEvent::DidStart);
    }

    fn update_field(&mut self, field: CardField, value: String) {
        let CardTokenizationState::Started(current) = &self.state else {
            debug!(%field, "ignoring field update outside of started phase");
            return;
        };
        let mut started = current.clone();
        let previous_iin = started.iin();
        if !started.field_mut(field).set_value(&value) {
            return;
        }
        debug!(%field, "did update field value");
        if started.clear_resolved_error() {
            debug!("recent error resolved");
        }
        if field == CardField::Number {
            self.update_issuer_hint(&mut started, previous_iin);
        }
        self.set_state(CardTokenizationState::Started(started));
        self.emit(CardTokenizationEvent::ParametersChanged);
    }

    fn update_issuer_hint(&mut self, started: &mut CardStarted, previous_iin: Option<String>) {
        let iin = started.iin();
        if iin.is_some() && iin == previous_iin {
            return;
        }
        started.issuer_hint = scheme::scheme(&started.number.value).map(IssuerHint::local);
        started.preferred_scheme = None;
        self.lookup.cancel();

        let Some(iin) = iin else {
            return;
        };
        debug!(%iin, "will fetch issuer information");
        let cards = Arc::clone(&self.cards);
        let key = iin.clone();
        self.lookup.spawn(
            &self.mailbox,
            async move { cards.issuer_information(&key).await },
            move |operation, result| Message::IssuerResolved {
                operation,
                iin,
                result,
            },
        );
    }

    fn issuer_resolved(
        &mut self,
        operation: OperationId,
        iin: String,
        result: PaymentResult<IssuerInformation>,
    ) {
        if !self.lookup.finish(operation) {
            return;
        }
        let CardTokenizationState::Started(current) = &self.state else {
            debug!(%iin, "discarding issuer information outside of started phase");
            return;
        };
        if current.iin().as_deref() != Some(iin.as_str()) {
            debug!(%iin, "discarding issuer information for stale card number");
            return;
        }
        let information = match result {
            Ok(information) => information,
            Err(failure) => {
                warn!(%iin, %failure, "did fail to fetch issuer information");
                return;
            }
        };

        let mut started = current.clone();
        started.preferred_scheme = match self.delegate() {
            Some(delegate) => delegate.preferred_scheme(&information),
            None => Some(information.scheme.clone()),
        };
        started.issuer_hint = Some(IssuerHint::from_issuer(information));
        debug!(%iin, preferred_scheme = ?started.preferred_scheme, "did resolve issuer");
        self.set_state(CardTokenizationState::Started(started));
    }

    fn set_preferred_scheme(&mut self, scheme: String) {
        let CardTokenizationState::Started(current) = &self.state else {
            debug!(%scheme, "ignoring preferred scheme outside of started phase");
            return;
        };
        let supported = current
            .issuer_hint
            .as_ref()
            .map_or(false, |hint| hint.supports(&scheme));
        if !supported {
            info!(%scheme, hint = ?current.issuer_hint, "ignoring unsupported preferred scheme");
            return;
        }
        let mut started = current.clone();
        started.preferred_scheme = Some(scheme);
        self.set_state(CardTokenizationState::Started(started));
        self.emit(CardTokenizationEvent::ParametersChanged);
    }

    fn tokenize(&mut self) {
        let CardTokenizationState::Started(current) = &self.state else {
            debug!("ignoring tokenize outside of started phase");
            return;
        };
        if !current.is_tokenize_allowed() {
            debug!("ignoring tokenize, card details are invalid");
            return;
        }

        let mut started = current.clone();
        let today = Utc::now().date_naive();
        let mut locally_valid = true;
        for field in CardField::ALL {
            let value = started.field_mut(field);
            if let Err(error) = value.validate(today) {
                debug!(%field, %error, "field failed local validation");
                value.invalidate(Some(error.to_string()));
                locally_valid = false;
            }
        }
        if !locally_valid {
            self.set_state(CardTokenizationState::Started(started));
            self.emit(CardTokenizationEvent::ParametersChanged);
            return;
        }
        let Some(expiration) = expiry::parse(&started.expiration.value) else {
            return;
        };

        let request = CardTokenizationRequest {
            number: started.number.canonical_value(),
            exp_month: expiration.month,
            exp_year: expiration.year,
            cvc: started.cvc.canonical_value(),
            name: started.cardholder_name.canonical_value(),
            preferred_scheme: started.preferred_scheme.clone(),
            metadata: self.configuration.metadata.clone(),
        };
        self.emit(CardTokenizationEvent::WillTokenize);
        self.set_state(CardTokenizationState::Tokenizing(started));
        info!(lookup_pending = self.lookup.is_busy(), "tokenizing card");

        let cards = Arc::clone(&self.cards);
        self.tokenization.spawn(
            &self.mailbox,
            async move { cards.tokenize(&request).await },
            |operation, result| Message::Tokenized { operation, result },
        );
    }

    fn tokenized(&mut self, operation: OperationId, result: PaymentResult<Card>) {
        if !self.tokenization.finish(operation) {
            return;
        }
        let card = match result {
            Ok(card) => card,
            Err(failure) => return self.recover(failure),
        };
        info!(card = %card.id, scheme = %card.scheme, "did tokenize card");
        self.emit(CardTokenizationEvent::DidTokenize(card.clone()));

        match self.delegate() {
            Some(delegate) => {
                let processing = card.clone();
                self.tokenization.spawn(
                    &self.mailbox,
                    async move { delegate.process_tokenized_card(&processing).await },
                    move |operation, result| Message::Processed {
                        operation,
                        card,
                        result,
                    },
                );
            }
            None => self.complete(card),
        }
    }

    fn processed(&mut self, operation: OperationId, card: Card, result: PaymentResult<()>) {
        if !self.tokenization.finish(operation) {
            return;
        }
        match result {
            Ok(()) => self.complete(card),
            Err(failure) => {
                warn!(card = %card.id, %failure, "did fail to process tokenized card");
                self.recover(failure)
            }
        }
    }

    fn complete(&mut self, card: Card) {
        let CardTokenizationState::Tokenizing(snapshot) = &self.state else {
            warn!("unexpected tokenization result outside of tokenizing phase");
            return;
        };
        let tokenized = Tokenized {
            card: card.clone(),
            card_number: snapshot.number.value.clone(),
        };
        self.lookup.cancel();
        self.set_state(CardTokenizationState::Tokenized(tokenized));
        self.emit(CardTokenizationEvent::DidComplete);
        self.completion.complete(Ok(card));
    }

    /// Return to the form after a failed attempt, or end the flow if the
    /// delegate declines to continue.
    fn recover(&mut self, failure: Failure) {
        let should_continue = self
            .delegate()
            .map_or(true, |delegate| delegate.should_continue_tokenization(&failure));
        let CardTokenizationState::Tokenizing(snapshot) = &self.state else {
            return self.fail(failure);
        };
        if !should_continue {
            return self.fail(failure);
        }

        let mut started = snapshot.clone();
        let (fields, kind) = invalidation::card_invalidation(&failure.code);
        for field in fields {
            started.field_mut(*field).invalidate(None);
        }
        started.recent_error = Some(RecentError {
            code: failure.code.clone(),
            message: kind.message().to_string(),
            invalid_fields: fields.iter().map(|field| field.id()).collect(),
        });
        warn!(%failure, invalidated = fields.len(), "did fail to tokenize card");
        self.set_state(CardTokenizationState::Started(started));
        self.emit(CardTokenizationEvent::ParametersChanged);
    }

    fn cancel(&mut self) {
        match self.state {
            CardTokenizationState::Started(_) | CardTokenizationState::Tokenizing(_) => {
                self.fail(Failure::cancelled().with_message("Card tokenization was cancelled"))
            }
            _ => debug!("ignoring cancel, nothing to cancel"),
        }
    }

    fn fail(&mut self, failure: Failure) {
        if self.state.is_terminal() {
            return;
        }
        self.lookup.cancel();
        self.tokenization.cancel();
        info!(%failure, "card tokenization failed");
        self.set_state(CardTokenizationState::Failure(failure.clone()));
        self.completion.complete(Err(failure));
    }

    fn set_state(&mut self, state: CardTokenizationState) {
        self.state = state;
        self.publisher.publish(&self.state);
    }

    fn delegate(&self) -> Option<Arc<dyn CardTokenizationDelegate>> {
        self.delegate.as_ref().and_then(Weak::upgrade)
    }

    fn emit(&self, event: CardTokenizationEvent) {
        if let Some(delegate) = self.delegate() {
            delegate.on_event(event);
        }
    }
}

//! # Native Alternative Payments
//!
//! Drives a payment whose parameters are described by the server: fetch the
//! schema (page by page), collect values, submit them and wait for the
//! customer to confirm out of band.
//!
//! ```text
//! Idle ─▶ Starting ─▶ Started ⇄ LoadingMore
//!            │           │ ▲
//!            ▼           ▼ │ recoverable
//!     Failure(restartable) Submitting ─▶ AwaitingConfirmation ─▶ Captured
//!                                   ├──▶ Submitted
//!                                   └──▶ Captured
//! ```

mod state;

pub use state::{AwaitingConfirmation, NativePaymentState, NativeStarted};

use crate::confirmation::wait_for_confirmation;
use crate::delegate::{NativePaymentDelegate, NativePaymentEvent};
use crate::invalidation::{self, RecentError};
use crate::retry::retry_with;
use crate::runtime::{completion_channel, Completion, CompletionSender, Handle, Mailbox, StatePublisher};
use crate::slot::{OperationId, OperationSlot};
use chrono::Utc;
use payflow_core::{
    BoxedInvoicesService, Failure, Field, FieldId, FlowConfig, GatewayInfo, Outcome, PageRequest,
    ParameterSchemaPage, PaymentContext, PaymentResult, RetryStrategy, SubmitResponse,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Settings of a single native payment attempt
#[derive(Debug, Clone)]
pub struct NativePaymentConfiguration {
    pub context: PaymentContext,
    pub flow: FlowConfig,
    /// Retries for retryable schema fetch failures
    pub schema_retry: RetryStrategy,
}

impl NativePaymentConfiguration {
    pub fn new(context: PaymentContext) -> Self {
        Self {
            context,
            flow: FlowConfig::default(),
            schema_retry: RetryStrategy::exponential(3, Duration::from_millis(100), 3.0),
        }
    }

    pub fn with_flow(mut self, flow: FlowConfig) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_schema_retry(mut self, retry: RetryStrategy) -> Self {
        self.schema_retry = retry;
        self
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Restart,
    LoadMore,
    UpdateField(FieldId, String),
    Submit,
    Cancel,
}

#[derive(Debug)]
enum Message {
    Command(Command),
    SchemaLoaded {
        operation: OperationId,
        result: PaymentResult<ParameterSchemaPage>,
    },
    MoreLoaded {
        operation: OperationId,
        result: PaymentResult<ParameterSchemaPage>,
    },
    SubmissionFinished {
        operation: OperationId,
        result: PaymentResult<SubmitResponse>,
    },
    ConfirmationFinished {
        operation: OperationId,
        result: PaymentResult<()>,
    },
}

/// Handle to a running native payment flow.
#[derive(Debug, Clone)]
pub struct NativePaymentInteractor {
    handle: Handle<Message, NativePaymentState>,
    attempt_id: Uuid,
}

impl NativePaymentInteractor {
    /// Spawn the interactor on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn(
        invoices: BoxedInvoicesService,
        configuration: NativePaymentConfiguration,
        delegate: Option<Weak<dyn NativePaymentDelegate>>,
    ) -> (Self, Completion<()>) {
        let attempt_id = Uuid::new_v4();
        let (sender, inbox) = mpsc::unbounded_channel();
        let (publisher, state) = StatePublisher::new(NativePaymentState::Idle);
        let (completion, completion_handle) = completion_channel();

        let span = info_span!(
            "native_payment",
            attempt = %attempt_id,
            invoice = %configuration.context.invoice_id
        );
        let actor = NativePaymentActor {
            invoices,
            configuration,
            delegate,
            state: NativePaymentState::Idle,
            publisher,
            completion,
            mailbox: Mailbox::new(&sender),
            request: OperationSlot::new("request"),
            confirmation: OperationSlot::new("confirmation"),
        };
        tokio::spawn(actor.run(inbox).instrument(span));

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

    /// Start over after a failed start
    pub fn restart(&self) {
        self.send(Command::Restart);
    }

    /// Fetch the next page of parameters, if the server announced one
    pub fn load_more(&self) {
        self.send(Command::LoadMore);
    }

    pub fn update_field(&self, id: impl Into<FieldId>, value: impl Into<String>) {
        self.send(Command::UpdateField(id.into(), value.into()));
    }

    pub fn submit(&self) {
        self.send(Command::Submit);
    }

    pub fn cancel(&self) {
        self.send(Command::Cancel);
    }

    pub fn state(&self) -> NativePaymentState {
        self.handle.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<NativePaymentState> {
        self.handle.subscribe()
    }

    fn send(&self, command: Command) {
        self.handle.send(Message::Command(command));
    }
}

struct NativePaymentActor {
    invoices: BoxedInvoicesService,
    configuration: NativePaymentConfiguration,
    delegate: Option<Weak<dyn NativePaymentDelegate>>,
    state: NativePaymentState,
    publisher: StatePublisher<NativePaymentState>,
    completion: CompletionSender<()>,
    mailbox: Mailbox<Message>,
    /// Schema fetches and submission
    request: OperationSlot,
    confirmation: OperationSlot,
}

impl NativePaymentActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = inbox.recv().await {
            self.handle(message);
        }
        debug!("native payment interactor stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Command(Command::Start) => self.start(),
            Message::Command(Command::Restart) => self.restart(),
            Message::Command(Command::LoadMore) => self.load_more(),
            Message::Command(Command::UpdateField(id, value)) => self.update_field(id, value),
            Message::Command(Command::Submit) => self.submit(),
            Message::Command(Command::Cancel) => self.cancel(),
            Message::SchemaLoaded { operation, result } => self.schema_loaded(operation, result),
            Message::MoreLoaded { operation, result } => self.more_loaded(operation, result),
            Message::SubmissionFinished { operation, result } => {
                self.submission_finished(operation, result)
            }
            Message::ConfirmationFinished { operation, result } => {
                self.confirmation_finished(operation, result)
            }
        }
    }

    fn start(&mut self) {
        if !matches!(self.state, NativePaymentState::Idle) {
            debug!("ignoring start, interactor already started");
            return;
        }
        self.begin_start();
    }

    fn restart(&mut self) {
        if !matches!(self.state, NativePaymentState::Failure { restartable: true, .. }) {
            debug!("ignoring restart, start has not failed");
            return;
        }
        info!("restarting native payment");
        self.begin_start();
    }

    fn begin_start(&mut self) {
        self.emit(NativePaymentEvent::WillStart);
        self.set_state(NativePaymentState::Starting);

        let invoices = Arc::clone(&self.invoices);
        let context = self.configuration.context.clone();
        let page = PageRequest::first(self.configuration.flow.page_size);
        let retry = self.configuration.schema_retry.clone();
        self.request.spawn(
            &self.mailbox,
            async move {
                retry_with(&retry, || invoices.fetch_parameter_schema(&context, &page)).await
            },
            |operation, result| Message::SchemaLoaded { operation, result },
        );
    }

    fn schema_loaded(&mut self, operation: OperationId, result: PaymentResult<ParameterSchemaPage>) {
        if !self.request.finish(operation) {
            return;
        }
        if !matches!(self.state, NativePaymentState::Starting) {
            warn!("unexpected parameter schema outside of starting phase");
            return;
        }
        match result {
            Ok(page) => {
                let started = NativeStarted {
                    gateway: page.gateway,
                    fields: page.parameters.into_iter().map(Field::from).collect(),
                    are_more_available: page.has_more,
                    recent_error: None,
                };
                info!(
                    parameters = started.fields.len(),
                    more = started.are_more_available,
                    "native payment started"
                );
                self.set_state(NativePaymentState::Started(started));
                self.emit(NativePaymentEvent::DidStart);
            }
            Err(failure) => {
                warn!(%failure, "did fail to start native payment");
                self.set_state(NativePaymentState::Failure {
                    failure,
                    restartable: true,
                });
            }
        }
    }

    fn load_more(&mut self) {
        let NativePaymentState::Started(current) = &self.state else {
            debug!("ignoring load more outside of started phase");
            return;
        };
        if !current.are_more_available {
            debug!("ignoring load more, no more parameters available");
            return;
        }
        let page_size = self.configuration.flow.page_size;
        let page = match current.fields.last() {
            Some(last) => PageRequest::after(last.id.clone(), page_size),
            // Empty first page, nothing to continue after yet.
            None => PageRequest::first(page_size),
        };
        debug!(after = ?page.after, "will load more parameters");
        let snapshot = current.clone();
        self.set_state(NativePaymentState::LoadingMore(snapshot));

        let invoices = Arc::clone(&self.invoices);
        let context = self.configuration.context.clone();
        self.request.spawn(
            &self.mailbox,
            async move { invoices.fetch_parameter_schema(&context, &page).await },
            |operation, result| Message::MoreLoaded { operation, result },
        );
    }

    fn more_loaded(&mut self, operation: OperationId, result: PaymentResult<ParameterSchemaPage>) {
        if !self.request.finish(operation) {
            return;
        }
        let NativePaymentState::LoadingMore(snapshot) = &self.state else {
            warn!("unexpected parameter page outside of loading phase");
            return;
        };
        let mut started = snapshot.clone();
        match result {
            Ok(page) => {
                started.fields.extend(page.parameters.into_iter().map(Field::from));
                started.are_more_available = page.has_more;
                debug!(parameters = started.fields.len(), "did load more parameters");
            }
            Err(failure) => warn!(%failure, "did fail to load more parameters"),
        }
        self.set_state(NativePaymentState::Started(started));
        self.emit(NativePaymentEvent::ParametersChanged);
    }

    fn update_field(&mut self, id: FieldId, value: String) {
        let NativePaymentState::Started(current) = &self.state else {
            debug!(field = %id, "ignoring field update outside of started phase");
            return;
        };
        let mut started = current.clone();
        let Some(field) = started.field_mut(&id) else {
            debug!(field = %id, "ignoring update of unknown field");
            return;
        };
        if !field.set_value(&value) {
            return;
        }
        debug!(field = %id, "did update field value");
        if started.clear_resolved_error() {
            debug!("recent error resolved");
        }
        self.set_state(NativePaymentState::Started(started));
        self.emit(NativePaymentEvent::ParametersChanged);
    }

    fn submit(&mut self) {
        let NativePaymentState::Started(current) = &self.state else {
            debug!("ignoring submit outside of started phase");
            return;
        };
        if !current.is_submit_allowed() {
            debug!("ignoring submit, parameters are invalid");
            return;
        }

        let mut started = current.clone();
        let today = Utc::now().date_naive();
        let mut locally_valid = true;
        for field in started.fields.iter_mut() {
            if let Err(error) = field.validate(today) {
                debug!(field = %field.id, %error, "field failed local validation");
                field.invalidate(Some(error.to_string()));
                locally_valid = false;
            }
        }
        if !locally_valid {
            self.set_state(NativePaymentState::Started(started));
            self.emit(NativePaymentEvent::ParametersChanged);
            return;
        }

        let values: HashMap<String, String> = started
            .fields
            .iter()
            .map(|field| (field.id.to_string(), field.canonical_value()))
            .collect();
        self.emit(NativePaymentEvent::WillSubmit);
        self.set_state(NativePaymentState::Submitting(started));
        info!(parameters = values.len(), "submitting parameters");

        let invoices = Arc::clone(&self.invoices);
        let context = self.configuration.context.clone();
        self.request.spawn(
            &self.mailbox,
            async move { invoices.submit_parameters(&context, &values).await },
            |operation, result| Message::SubmissionFinished { operation, result },
        );
    }

    fn submission_finished(&mut self, operation: OperationId, result: PaymentResult<SubmitResponse>) {
        if !self.request.finish(operation) {
            return;
        }
        let NativePaymentState::Submitting(snapshot) = &self.state else {
            warn!("unexpected submission result outside of submitting phase");
            return;
        };
        let response = match result {
            Ok(response) => response,
            Err(failure) => {
                let snapshot = snapshot.clone();
                return self.recover(snapshot, failure);
            }
        };
        let gateway = snapshot.gateway.clone();

        if response.final_outcome == Some(Outcome::Captured) {
            self.emit(NativePaymentEvent::DidSubmit {
                awaiting_confirmation: false,
            });
            return self.capture(gateway);
        }
        if !self.configuration.flow.waits_confirmation {
            self.emit(NativePaymentEvent::DidSubmit {
                awaiting_confirmation: false,
            });
            info!("parameters submitted, not waiting for confirmation");
            self.cancel_operations();
            self.set_state(NativePaymentState::Submitted { gateway });
            return self.completion.complete(Ok(()));
        }

        self.emit(NativePaymentEvent::DidSubmit {
            awaiting_confirmation: true,
        });
        self.await_confirmation(AwaitingConfirmation {
            gateway,
            customer_action: response.pending_customer_action,
        });
    }

    fn await_confirmation(&mut self, awaiting: AwaitingConfirmation) {
        let timeout = self.configuration.flow.confirmation_timeout();
        let deadline = Instant::now() + timeout;
        info!(?timeout, "waiting for payment confirmation");
        self.emit(NativePaymentEvent::WillWaitForConfirmation);
        self.set_state(NativePaymentState::AwaitingConfirmation(awaiting));

        let invoices = Arc::clone(&self.invoices);
        let context = self.configuration.context.clone();
        let poll = self.configuration.flow.poll.clone();
        self.confirmation.spawn(
            &self.mailbox,
            wait_for_confirmation(invoices, context, deadline, poll),
            |operation, result| Message::ConfirmationFinished { operation, result },
        );
    }

    fn confirmation_finished(&mut self, operation: OperationId, result: PaymentResult<()>) {
        if !self.confirmation.finish(operation) {
            return;
        }
        let NativePaymentState::AwaitingConfirmation(awaiting) = &self.state else {
            warn!("unexpected confirmation outside of awaiting phase");
            return;
        };
        match result {
            Ok(()) => {
                let gateway = awaiting.gateway.clone();
                self.capture(gateway)
            }
            Err(failure) => self.fail(failure),
        }
    }

    /// Back to the parameters after a rejected submission, flagging the
    /// fields the server complained about.
    fn recover(&mut self, snapshot: NativeStarted, failure: Failure) {
        self.emit(NativePaymentEvent::DidFailToSubmit(failure.clone()));

        let mut started = snapshot;
        let mut invalid_fields = Vec::new();
        for invalid in &failure.invalid_fields {
            let id = FieldId::new(invalid.name.as_str());
            match started.field_mut(&id) {
                Some(field) => {
                    field.invalidate(Some(invalid.message.clone()));
                    invalid_fields.push(id);
                }
                None => debug!(field = %id, "server rejected unknown field"),
            }
        }
        started.recent_error = Some(RecentError {
            code: failure.code.clone(),
            message: invalidation::native_message(&failure),
            invalid_fields,
        });
        warn!(%failure, "did fail to submit parameters");
        self.set_state(NativePaymentState::Started(started));
    }

    fn capture(&mut self, gateway: GatewayInfo) {
        info!("payment captured");
        self.cancel_operations();
        self.set_state(NativePaymentState::Captured { gateway });
        self.emit(NativePaymentEvent::DidCompletePayment);
        self.completion.complete(Ok(()));
    }

    fn cancel(&mut self) {
        match self.state {
            NativePaymentState::Idle => debug!("ignoring cancel, not started"),
            _ if self.state.is_terminal() => debug!("ignoring cancel, already finished"),
            _ => self.fail(Failure::cancelled().with_message("Native payment was cancelled")),
        }
    }

    fn fail(&mut self, failure: Failure) {
        if self.state.is_terminal() {
            return;
        }
        self.cancel_operations();
        info!(%failure, "native payment failed");
        self.set_state(NativePaymentState::Failure {
            failure: failure.clone(),
            restartable: false,
        });
        self.emit(NativePaymentEvent::DidFail(failure.clone()));
        self.completion.complete(Err(failure));
    }

    fn cancel_operations(&mut self) {
        self.request.cancel();
        self.confirmation.cancel();
    }

    fn set_state(&mut self, state: NativePaymentState) {
        self.state = state;
        self.publisher.publish(&self.state);
    }

    fn emit(&self, event: NativePaymentEvent) {
        if let Some(delegate) = self.delegate.as_ref().and_then(Weak::upgrade) {
            delegate.on_event(event);
        }
    }
}

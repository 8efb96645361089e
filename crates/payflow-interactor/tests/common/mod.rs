//! Scriptable in-memory services shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use payflow_core::format::scheme;
use payflow_core::{
    Card, CardTokenizationRequest, CardsService, Failure, FieldKind, FieldSpec, GatewayInfo,
    InvoicesService, IssuerInformation, Outcome, PageRequest, ParameterSchemaPage, PaymentContext,
    PaymentResult, SubmitResponse,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

pub fn context() -> PaymentContext {
    PaymentContext::new("iv_test", "gway_conf_test")
}

pub fn gateway() -> GatewayInfo {
    GatewayInfo {
        display_name: "BLIK".to_string(),
        logo_url: Some("https://example.test/blik.png".to_string()),
    }
}

pub fn spec(key: &str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key: key.into(),
        display_name: key.to_string(),
        kind,
        length: None,
        required: true,
    }
}

/// `count` numeric parameters named `param_{offset}`, `param_{offset + 1}`, ...
pub fn numeric_specs(offset: usize, count: usize) -> Vec<FieldSpec> {
    (offset..offset + count)
        .map(|i| spec(&format!("param_{i}"), FieldKind::Numeric))
        .collect()
}

pub fn page(parameters: Vec<FieldSpec>, has_more: bool) -> ParameterSchemaPage {
    ParameterSchemaPage {
        gateway: gateway(),
        parameters,
        has_more,
    }
}

/// Wait until the published state satisfies `predicate`.
pub async fn wait_for<S: Clone>(
    receiver: &mut watch::Receiver<S>,
    predicate: impl FnMut(&S) -> bool,
) -> S {
    tokio::time::timeout(Duration::from_secs(600), receiver.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("interactor dropped")
        .clone()
}

fn next<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().unwrap().pop_front()
}

// ============================================================================
// Invoices
// ============================================================================

#[derive(Default)]
pub struct MockInvoices {
    schema_pages: Mutex<VecDeque<PaymentResult<ParameterSchemaPage>>>,
    submit_responses: Mutex<VecDeque<PaymentResult<SubmitResponse>>>,
    poll_responses: Mutex<VecDeque<PaymentResult<Outcome>>>,
    captured_at: Mutex<Option<Instant>>,
    schema_gate: Mutex<Option<Arc<Notify>>>,

    pub page_requests: Mutex<Vec<PageRequest>>,
    pub submissions: Mutex<Vec<HashMap<String, String>>>,
    pub fetch_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
}

impl MockInvoices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, result: PaymentResult<ParameterSchemaPage>) {
        self.schema_pages.lock().unwrap().push_back(result);
    }

    pub fn push_submit(&self, result: PaymentResult<SubmitResponse>) {
        self.submit_responses.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: PaymentResult<Outcome>) {
        self.poll_responses.lock().unwrap().push_back(result);
    }

    /// Hold schema fetches until the returned notify is signalled.
    pub fn gate_schema(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.schema_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Polls at or after `at` report the payment as captured.
    pub fn capture_at(&self, at: Instant) {
        *self.captured_at.lock().unwrap() = Some(at);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl InvoicesService for MockInvoices {
    async fn fetch_parameter_schema(
        &self,
        _context: &PaymentContext,
        page: &PageRequest,
    ) -> PaymentResult<ParameterSchemaPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.page_requests.lock().unwrap().push(page.clone());
        let gate = self.schema_gate.lock().unwrap().clone();
        pass(gate).await;
        next(&self.schema_pages).unwrap_or_else(|| Ok(self::page(vec![], false)))
    }

    async fn submit_parameters(
        &self,
        _context: &PaymentContext,
        values: &HashMap<String, String>,
    ) -> PaymentResult<SubmitResponse> {
        self.submissions.lock().unwrap().push(values.clone());
        next(&self.submit_responses).unwrap_or_else(|| Ok(SubmitResponse::pending("Confirm in your app")))
    }

    async fn poll_confirmation(&self, _context: &PaymentContext) -> PaymentResult<Outcome> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = next(&self.poll_responses) {
            return result;
        }
        let captured = self
            .captured_at
            .lock()
            .unwrap()
            .map_or(false, |at| Instant::now() >= at);
        Ok(if captured { Outcome::Captured } else { Outcome::Pending })
    }
}

// ============================================================================
// Cards
// ============================================================================

#[derive(Default)]
pub struct MockCards {
    issuers: Mutex<HashMap<String, PaymentResult<IssuerInformation>>>,
    lookup_gates: Mutex<HashMap<String, Arc<Notify>>>,
    tokenize_responses: Mutex<VecDeque<PaymentResult<Card>>>,
    tokenize_gate: Mutex<Option<Arc<Notify>>>,

    pub lookups: Mutex<Vec<String>>,
    pub tokenize_requests: Mutex<Vec<CardTokenizationRequest>>,
}

impl MockCards {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn issuer(&self, iin: &str, result: PaymentResult<IssuerInformation>) {
        self.issuers.lock().unwrap().insert(iin.to_string(), result);
    }

    /// Hold lookups of `iin` until the returned notify is signalled.
    pub fn gate_lookup(&self, iin: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lookup_gates
            .lock()
            .unwrap()
            .insert(iin.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn gate_tokenize(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.tokenize_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn push_tokenize(&self, result: PaymentResult<Card>) {
        self.tokenize_responses.lock().unwrap().push_back(result);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }

    pub fn tokenize_count(&self) -> usize {
        self.tokenize_requests.lock().unwrap().len()
    }
}

pub fn card_for(request: &CardTokenizationRequest) -> Card {
    Card {
        id: "card_test".to_string(),
        scheme: scheme::scheme(&request.number).unwrap_or("unknown").to_string(),
        co_scheme: None,
        preferred_scheme: request.preferred_scheme.clone(),
        last_4_digits: request.number[request.number.len() - 4..].to_string(),
        exp_month: request.exp_month,
        exp_year: request.exp_year,
        created_at: Utc::now(),
    }
}

async fn pass(gate: Option<Arc<Notify>>) {
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

#[async_trait]
impl CardsService for MockCards {
    async fn tokenize(&self, request: &CardTokenizationRequest) -> PaymentResult<Card> {
        self.tokenize_requests.lock().unwrap().push(request.clone());
        let gate = self.tokenize_gate.lock().unwrap().clone();
        pass(gate).await;
        next(&self.tokenize_responses).unwrap_or_else(|| Ok(card_for(request)))
    }

    async fn issuer_information(&self, iin: &str) -> PaymentResult<IssuerInformation> {
        self.lookups.lock().unwrap().push(iin.to_string());
        let gate = self.lookup_gates.lock().unwrap().get(iin).cloned();
        pass(gate).await;
        let result = self.issuers.lock().unwrap().get(iin).cloned();
        result.unwrap_or_else(|| Err(Failure::new(payflow_core::FailureCode::NotFound)))
    }
}

/// Run `future` to completion and return how long it took on the Tokio clock.
pub async fn timed<F: Future>(future: F) -> (F::Output, Duration) {
    let started = Instant::now();
    let output = future.await;
    (output, started.elapsed())
}

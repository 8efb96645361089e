//! # Sandbox Services
//!
//! In-memory stand-ins for the payment API with realistic latency. The
//! invoice captures after a few confirmation polls; the card service knows
//! a handful of issuer prefixes.

use async_trait::async_trait;
use chrono::Utc;
use payflow_core::format::{card_number, scheme};
use payflow_core::{
    Card, CardTokenizationRequest, CardsService, Failure, FailureCode, FieldId, FieldKind,
    FieldSpec, GatewayInfo, GenericCode, InvoicesService, IssuerInformation, Outcome, PageRequest,
    ParameterSchemaPage, PaymentContext, PaymentResult, SubmitResponse,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument};

const LATENCY: Duration = Duration::from_millis(150);

pub struct SandboxInvoices {
    parameters: Vec<FieldSpec>,
    polls_until_capture: u32,
    polls: AtomicU32,
}

impl SandboxInvoices {
    pub fn new(polls_until_capture: u32) -> Self {
        let parameter = |key: &str, name: &str, kind, length| FieldSpec {
            key: FieldId::new(key),
            display_name: name.to_string(),
            kind,
            length,
            required: true,
        };
        Self {
            parameters: vec![
                parameter("email", "Email", FieldKind::Email, None),
                parameter("phone", "Phone number", FieldKind::Phone, None),
                parameter("blik_code", "BLIK code", FieldKind::Numeric, Some(6)),
            ],
            polls_until_capture,
            polls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl InvoicesService for SandboxInvoices {
    #[instrument(skip(self), fields(invoice = %context.invoice_id))]
    async fn fetch_parameter_schema(
        &self,
        context: &PaymentContext,
        page: &PageRequest,
    ) -> PaymentResult<ParameterSchemaPage> {
        sleep(LATENCY).await;
        let start = match &page.after {
            Some(after) => self
                .parameters
                .iter()
                .position(|spec| &spec.key == after)
                .map(|index| index + 1)
                .ok_or_else(|| Failure::new(FailureCode::NotFound).with_message("Unknown parameter"))?,
            None => 0,
        };
        let end = (start + page.limit).min(self.parameters.len());
        Ok(ParameterSchemaPage {
            gateway: GatewayInfo {
                display_name: "BLIK".to_string(),
                logo_url: None,
            },
            parameters: self.parameters[start..end].to_vec(),
            has_more: end < self.parameters.len(),
        })
    }

    async fn submit_parameters(
        &self,
        _context: &PaymentContext,
        values: &HashMap<String, String>,
    ) -> PaymentResult<SubmitResponse> {
        sleep(LATENCY).await;
        if values.get("blik_code").map(String::as_str) == Some("000000") {
            return Err(
                Failure::new(FailureCode::Generic(GenericCode::RequestInvalidParameters))
                    .with_invalid_field("blik_code", "BLIK code has expired"),
            );
        }
        Ok(SubmitResponse::pending("Confirm the payment in your banking app"))
    }

    async fn poll_confirmation(&self, _context: &PaymentContext) -> PaymentResult<Outcome> {
        sleep(LATENCY).await;
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(polls, "confirmation poll");
        Ok(if polls >= self.polls_until_capture {
            Outcome::Captured
        } else {
            Outcome::Pending
        })
    }
}

#[derive(Default)]
pub struct SandboxCards;

#[async_trait]
impl CardsService for SandboxCards {
    async fn tokenize(&self, request: &CardTokenizationRequest) -> PaymentResult<Card> {
        sleep(LATENCY).await;
        if request.cvc == "000" {
            return Err(Failure::new(FailureCode::Generic(GenericCode::CardFailedCvc)));
        }
        let last_4_digits = request
            .number
            .get(request.number.len().saturating_sub(4)..)
            .unwrap_or_default()
            .to_string();
        Ok(Card {
            id: format!("card_{}", Utc::now().timestamp_millis()),
            scheme: scheme::scheme(&request.number).unwrap_or("unknown").to_string(),
            co_scheme: None,
            preferred_scheme: request.preferred_scheme.clone(),
            last_4_digits,
            exp_month: request.exp_month,
            exp_year: request.exp_year,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn issuer_information(&self, iin: &str) -> PaymentResult<IssuerInformation> {
        sleep(LATENCY).await;
        match iin {
            "424242" => Ok(IssuerInformation::scheme_only(scheme::VISA)),
            "497010" => Ok(IssuerInformation::scheme_only(scheme::VISA).with_co_scheme("carte bancaire")),
            _ => scheme::scheme(iin)
                .filter(|_| iin.len() == card_number::IIN_LENGTH)
                .map(IssuerInformation::scheme_only)
                .ok_or_else(|| Failure::new(FailureCode::NotFound)),
        }
    }
}

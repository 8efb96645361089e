//! Integration tests for the card tokenization interactor.

mod common;

use async_trait::async_trait;
use common::{wait_for, MockCards};
use payflow_core::{Card, Failure, FailureCode, GenericCode, IssuerInformation, PaymentResult};
use payflow_interactor::{
    CardField, CardStarted, CardTokenizationConfiguration, CardTokenizationDelegate,
    CardTokenizationEvent, CardTokenizationInteractor, CardTokenizationState, Completion,
    HintSource,
};
use std::sync::{Arc, Mutex, Weak};

const VISA: &str = "4242424242424242";
const MASTERCARD: &str = "5555555555554444";

fn spawn(cards: &Arc<MockCards>) -> (CardTokenizationInteractor, Completion<Card>) {
    CardTokenizationInteractor::spawn(cards.clone(), CardTokenizationConfiguration::default(), None)
}

fn spawn_with_delegate(
    cards: &Arc<MockCards>,
    delegate: &Arc<TestDelegate>,
) -> (CardTokenizationInteractor, Completion<Card>) {
    let weak: Weak<dyn CardTokenizationDelegate> =
        Arc::downgrade(delegate) as Weak<dyn CardTokenizationDelegate>;
    CardTokenizationInteractor::spawn(cards.clone(), CardTokenizationConfiguration::default(), Some(weak))
}

fn form(state: &CardTokenizationState) -> Option<&CardStarted> {
    match state {
        CardTokenizationState::Started(started) => Some(started),
        _ => None,
    }
}

fn fill(interactor: &CardTokenizationInteractor, number: &str) {
    interactor.update_field(CardField::Number, number);
    interactor.update_field(CardField::Expiration, "1230");
    interactor.update_field(CardField::Cvc, "123");
    interactor.update_field(CardField::CardholderName, "Jane Doe");
}

async fn filled(interactor: &CardTokenizationInteractor) -> CardStarted {
    let mut states = interactor.subscribe();
    let state = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| !started.cardholder_name.value.is_empty())
    })
    .await;
    form(&state).cloned().unwrap()
}

#[tokio::test]
async fn test_preferred_scheme_follows_issuer_lookup() {
    let cards = MockCards::new();
    cards.issuer("424242", Ok(IssuerInformation::scheme_only("visa")));
    let gate = cards.gate_lookup("424242");
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    interactor.update_field(CardField::Number, VISA);
    let typed = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| !started.number.value.is_empty())
    })
    .await;
    let typed = form(&typed).unwrap();
    assert_eq!(typed.number.value, "4242 4242 4242 4242");
    assert_eq!(typed.iin().as_deref(), Some("424242"));
    assert_eq!(typed.preferred_scheme, None);
    let hint = typed.issuer_hint.as_ref().unwrap();
    assert_eq!((hint.scheme.as_str(), hint.source), ("visa", HintSource::Local));

    gate.notify_one();
    let resolved = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.preferred_scheme.is_some())
    })
    .await;
    let resolved = form(&resolved).unwrap();
    assert_eq!(resolved.preferred_scheme.as_deref(), Some("visa"));
    assert_eq!(resolved.issuer_hint.as_ref().unwrap().source, HintSource::Issuer);
    assert_eq!(*cards.lookups.lock().unwrap(), vec!["424242".to_string()]);
}

#[tokio::test]
async fn test_stale_lookup_never_applies() {
    let cards = MockCards::new();
    cards.issuer("424242", Ok(IssuerInformation::scheme_only("visa")));
    cards.issuer("555555", Ok(IssuerInformation::scheme_only("mastercard")));
    let visa_gate = cards.gate_lookup("424242");
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    interactor.update_field(CardField::Number, VISA);
    interactor.update_field(CardField::Number, MASTERCARD);
    wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.preferred_scheme.as_deref() == Some("mastercard"))
    })
    .await;

    visa_gate.notify_one();
    interactor.update_field(CardField::Cvc, "123");
    let latest = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| !started.cvc.value.is_empty())
    })
    .await;
    tokio::task::yield_now().await;

    let latest = form(&latest).unwrap();
    assert_eq!(latest.preferred_scheme.as_deref(), Some("mastercard"));
    assert_eq!(latest.issuer_hint.as_ref().unwrap().scheme, "mastercard");
    let current = interactor.state();
    assert_eq!(
        form(&current).unwrap().preferred_scheme.as_deref(),
        Some("mastercard")
    );
}

#[tokio::test]
async fn test_unchanged_prefix_does_not_refetch() {
    let cards = MockCards::new();
    cards.issuer("424242", Ok(IssuerInformation::scheme_only("visa")));
    let (interactor, _completion) = spawn(&cards);

    interactor.start();
    interactor.update_field(CardField::Number, "4242424242");
    interactor.update_field(CardField::Number, VISA);
    fill(&interactor, VISA);
    let started = filled(&interactor).await;
    tokio::task::yield_now().await;

    assert_eq!(started.number.value, "4242 4242 4242 4242");
    assert_eq!(cards.lookup_count(), 1);
}

#[tokio::test]
async fn test_short_number_clears_preferred_scheme() {
    let cards = MockCards::new();
    cards.issuer("424242", Ok(IssuerInformation::scheme_only("visa")));
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    interactor.update_field(CardField::Number, VISA);
    wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.preferred_scheme.is_some())
    })
    .await;

    interactor.update_field(CardField::Number, "42");
    let shortened = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.number.value == "42")
    })
    .await;
    let shortened = form(&shortened).unwrap();
    assert_eq!(shortened.preferred_scheme, None);
    let hint = shortened.issuer_hint.as_ref().unwrap();
    assert_eq!((hint.scheme.as_str(), hint.source), ("visa", HintSource::Local));
}

#[tokio::test]
async fn test_lookup_failure_keeps_local_hint() {
    let cards = MockCards::new();
    let (interactor, _completion) = spawn(&cards);

    interactor.start();
    fill(&interactor, MASTERCARD);
    let started = filled(&interactor).await;
    tokio::task::yield_now().await;

    assert_eq!(started.issuer_hint.unwrap().scheme, "mastercard");
    assert_eq!(started.preferred_scheme, None);
}

#[tokio::test]
async fn test_preferred_scheme_must_match_hint() {
    let cards = MockCards::new();
    cards.issuer(
        "424242",
        Ok(IssuerInformation::scheme_only("visa").with_co_scheme("carte bancaire")),
    );
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    interactor.update_field(CardField::Number, VISA);
    wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.preferred_scheme.is_some())
    })
    .await;

    interactor.set_preferred_scheme("jcb");
    interactor.set_preferred_scheme("carte bancaire");
    let chosen = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| {
            started.preferred_scheme.as_deref() == Some("carte bancaire")
        })
    })
    .await;
    assert_eq!(
        form(&chosen).unwrap().issuer_hint.as_ref().unwrap().co_scheme.as_deref(),
        Some("carte bancaire")
    );

    interactor.set_preferred_scheme("jcb");
    interactor.update_field(CardField::Cvc, "123");
    let after = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| !started.cvc.value.is_empty())
    })
    .await;
    assert_eq!(
        form(&after).unwrap().preferred_scheme.as_deref(),
        Some("carte bancaire")
    );
}

#[tokio::test]
async fn test_tokenize_success() {
    let cards = MockCards::new();
    cards.issuer("424242", Ok(IssuerInformation::scheme_only("visa")));
    let configuration = CardTokenizationConfiguration::default().with_metadata("order", "42");
    let (interactor, completion) =
        CardTokenizationInteractor::spawn(cards.clone(), configuration, None);
    let mut states = interactor.subscribe();

    interactor.start();
    fill(&interactor, VISA);
    wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.preferred_scheme.is_some() && !started.cardholder_name.value.is_empty())
    })
    .await;
    interactor.tokenize();

    let card = completion.wait().await.unwrap();
    assert_eq!(card.last_4_digits, "4242");
    assert_eq!((card.exp_month, card.exp_year), (12, 2030));

    match interactor.state() {
        CardTokenizationState::Tokenized(tokenized) => {
            assert_eq!(tokenized.card, card);
            assert_eq!(tokenized.card_number, "4242 4242 4242 4242");
        }
        other => panic!("unexpected state {other:?}"),
    }

    let request = cards.tokenize_requests.lock().unwrap()[0].clone();
    assert_eq!(request.number, VISA);
    assert_eq!(request.name, "Jane Doe");
    assert_eq!(request.preferred_scheme.as_deref(), Some("visa"));
    assert_eq!(request.metadata["order"], "42");
}

#[tokio::test]
async fn test_missing_cvc_invalidates_only_cvc() {
    let cards = MockCards::new();
    cards.push_tokenize(Err(Failure::new(FailureCode::Generic(GenericCode::CardMissingCvc))));
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    fill(&interactor, VISA);
    let snapshot = filled(&interactor).await;
    interactor.tokenize();

    let restored = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.recent_error.is_some())
    })
    .await;
    let restored = form(&restored).unwrap();

    assert!(!restored.cvc.is_valid);
    assert!(restored.number.is_valid);
    assert!(restored.expiration.is_valid);
    assert!(restored.cardholder_name.is_valid);
    for field in CardField::ALL {
        assert_eq!(restored.field(field).value, snapshot.field(field).value);
    }

    let error = restored.recent_error.as_ref().unwrap();
    assert_eq!(error.code, FailureCode::from_raw("card.missing-cvc"));
    assert_eq!(error.invalid_fields, vec![CardField::Cvc.id()]);
    assert!(!restored.is_tokenize_allowed());

    // Re-entering the cvc resolves the error.
    interactor.update_field(CardField::Cvc, "456");
    let fixed = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.recent_error.is_none())
    })
    .await;
    assert!(form(&fixed).unwrap().is_tokenize_allowed());
}

#[tokio::test]
async fn test_unmapped_failure_invalidates_nothing() {
    let cards = MockCards::new();
    cards.push_tokenize(Err(Failure::new(FailureCode::NetworkUnreachable)));
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    fill(&interactor, VISA);
    filled(&interactor).await;
    interactor.tokenize();

    let restored = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.recent_error.is_some())
    })
    .await;
    let restored = form(&restored).unwrap();
    assert!(restored.are_fields_valid());
    assert!(restored.recent_error.as_ref().unwrap().invalid_fields.is_empty());
}

#[tokio::test]
async fn test_local_validation_blocks_tokenization() {
    let cards = MockCards::new();
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    interactor.update_field(CardField::Number, "4242424242424241");
    interactor.update_field(CardField::Expiration, "0120");
    interactor.update_field(CardField::Cvc, "12");
    interactor.tokenize();

    let rejected = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| !started.are_fields_valid())
    })
    .await;
    let rejected = form(&rejected).unwrap();
    assert!(!rejected.number.is_valid);
    assert!(!rejected.expiration.is_valid);
    assert!(!rejected.cvc.is_valid);
    assert!(!rejected.cardholder_name.is_valid);
    assert!(rejected.expiration.error_message.is_some());
    assert!(rejected.recent_error.is_none());
    assert_eq!(cards.tokenize_count(), 0);
}

#[tokio::test]
async fn test_cancel_while_tokenizing() {
    let cards = MockCards::new();
    let gate = cards.gate_tokenize();
    let (interactor, completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.start();
    fill(&interactor, VISA);
    filled(&interactor).await;
    interactor.tokenize();
    wait_for(&mut states, |s| matches!(s, CardTokenizationState::Tokenizing(_))).await;

    interactor.cancel();
    interactor.cancel();
    let failure = completion.wait().await.unwrap_err();
    assert!(failure.is_cancellation());

    gate.notify_one();
    tokio::task::yield_now().await;
    assert!(matches!(interactor.state(), CardTokenizationState::Failure(_)));
}

#[tokio::test]
async fn test_commands_before_start_are_ignored() {
    let cards = MockCards::new();
    let (interactor, _completion) = spawn(&cards);
    let mut states = interactor.subscribe();

    interactor.update_field(CardField::Number, VISA);
    interactor.tokenize();
    interactor.cancel();
    interactor.start();

    let started = wait_for(&mut states, |s| matches!(s, CardTokenizationState::Started(_))).await;
    assert!(form(&started).unwrap().number.value.is_empty());
    assert_eq!(cards.lookup_count(), 0);
}

#[tokio::test]
async fn test_dropping_interactor_cancels_completion() {
    let cards = MockCards::new();
    let (interactor, completion) = spawn(&cards);
    interactor.start();
    drop(interactor);

    assert!(completion.wait().await.unwrap_err().is_cancellation());
}

struct TestDelegate {
    continue_after_failure: bool,
    panics_while_processing: bool,
    processing: Mutex<Option<PaymentResult<()>>>,
    events: Mutex<Vec<CardTokenizationEvent>>,
}

impl TestDelegate {
    fn new(continue_after_failure: bool, processing: Option<PaymentResult<()>>) -> Arc<Self> {
        Arc::new(Self {
            continue_after_failure,
            panics_while_processing: false,
            processing: Mutex::new(processing),
            events: Mutex::new(Vec::new()),
        })
    }

    fn panicking() -> Arc<Self> {
        Arc::new(Self {
            continue_after_failure: true,
            panics_while_processing: true,
            processing: Mutex::new(None),
            events: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CardTokenizationDelegate for TestDelegate {
    fn on_event(&self, event: CardTokenizationEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn preferred_scheme(&self, issuer: &IssuerInformation) -> Option<String> {
        issuer.co_scheme.clone().or_else(|| Some(issuer.scheme.clone()))
    }

    async fn process_tokenized_card(&self, _card: &Card) -> PaymentResult<()> {
        if self.panics_while_processing {
            panic!("card vault unavailable");
        }
        self.processing.lock().unwrap().take().unwrap_or(Ok(()))
    }

    fn should_continue_tokenization(&self, _failure: &Failure) -> bool {
        self.continue_after_failure
    }
}

#[tokio::test]
async fn test_delegate_chooses_preferred_scheme() {
    let cards = MockCards::new();
    cards.issuer(
        "424242",
        Ok(IssuerInformation::scheme_only("visa").with_co_scheme("carte bancaire")),
    );
    let delegate = TestDelegate::new(true, None);
    let (interactor, _completion) = spawn_with_delegate(&cards, &delegate);
    let mut states = interactor.subscribe();

    interactor.start();
    interactor.update_field(CardField::Number, VISA);
    let resolved = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.preferred_scheme.is_some())
    })
    .await;
    assert_eq!(
        form(&resolved).unwrap().preferred_scheme.as_deref(),
        Some("carte bancaire")
    );
}

#[tokio::test]
async fn test_delegate_processing_failure_returns_to_form() {
    let cards = MockCards::new();
    let declined = Failure::new(FailureCode::Generic(GenericCode::CardFailedCvc));
    let delegate = TestDelegate::new(true, Some(Err(declined)));
    let (interactor, _completion) = spawn_with_delegate(&cards, &delegate);
    let mut states = interactor.subscribe();

    interactor.start();
    fill(&interactor, VISA);
    filled(&interactor).await;
    interactor.tokenize();

    let restored = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.recent_error.is_some())
    })
    .await;
    assert!(!form(&restored).unwrap().cvc.is_valid);

    let events = delegate.events.lock().unwrap().clone();
    assert!(events.contains(&CardTokenizationEvent::WillTokenize));
    assert!(events
        .iter()
        .any(|event| matches!(event, CardTokenizationEvent::DidTokenize(_))));
    assert!(!events.contains(&CardTokenizationEvent::DidComplete));
}

#[tokio::test]
async fn test_delegate_panic_returns_to_form_as_internal_failure() {
    let cards = MockCards::new();
    let delegate = TestDelegate::panicking();
    let (interactor, completion) = spawn_with_delegate(&cards, &delegate);
    let mut states = interactor.subscribe();

    interactor.start();
    fill(&interactor, VISA);
    filled(&interactor).await;
    interactor.tokenize();

    let restored = wait_for(&mut states, |s| {
        form(s).map_or(false, |started| started.recent_error.is_some())
    })
    .await;
    let started = form(&restored).unwrap();
    assert_eq!(
        started.recent_error.as_ref().unwrap().code,
        FailureCode::Internal
    );
    assert!(started.are_fields_valid());

    // The interactor is still responsive.
    interactor.cancel();
    let failure = completion.wait().await.unwrap_err();
    assert_eq!(failure.code, FailureCode::Cancelled);
}

#[tokio::test]
async fn test_delegate_can_end_flow_on_failure() {
    let cards = MockCards::new();
    cards.push_tokenize(Err(Failure::new(FailureCode::Generic(GenericCode::CardInvalid))));
    let gate = cards.gate_lookup("424242");
    let delegate = TestDelegate::new(false, None);
    let (interactor, completion) = spawn_with_delegate(&cards, &delegate);

    interactor.start();
    fill(&interactor, VISA);
    filled(&interactor).await;
    interactor.tokenize();

    let failure = completion.wait().await.unwrap_err();
    assert_eq!(failure.code, FailureCode::Generic(GenericCode::CardInvalid));
    assert!(matches!(interactor.state(), CardTokenizationState::Failure(_)));

    // The outstanding lookup was cancelled with the flow.
    gate.notify_one();
    tokio::task::yield_now().await;
    assert!(matches!(interactor.state(), CardTokenizationState::Failure(_)));
}

#[tokio::test]
async fn test_delegate_events_for_successful_flow() {
    let cards = MockCards::new();
    let delegate = TestDelegate::new(true, None);
    let (interactor, completion) = spawn_with_delegate(&cards, &delegate);

    interactor.start();
    fill(&interactor, MASTERCARD);
    filled(&interactor).await;
    interactor.tokenize();
    let card = completion.wait().await.unwrap();

    let events = delegate.events.lock().unwrap().clone();
    assert_eq!(events.first(), Some(&CardTokenizationEvent::WillStart));
    assert_eq!(events[1], CardTokenizationEvent::DidStart);
    assert_eq!(
        events[events.len() - 3..],
        [
            CardTokenizationEvent::WillTokenize,
            CardTokenizationEvent::DidTokenize(card),
            CardTokenizationEvent::DidComplete,
        ]
    );
}

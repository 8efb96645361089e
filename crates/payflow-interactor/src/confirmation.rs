//! # Confirmation Wait
//!
//! Bounded wait for the server to finalize a payment after the customer
//! acted out of band. Runs on a spawned task; cancelling means aborting it.

use payflow_core::{BoxedInvoicesService, Failure, Outcome, PaymentContext, PaymentResult, RetryStrategy};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, instrument, warn};

/// Poll until the payment is captured or `deadline` passes.
///
/// A capture observed before the deadline wins. Retryable poll failures are
/// logged and polled again; any other failure ends the wait.
#[instrument(skip(service, poll), fields(invoice = %context.invoice_id))]
pub(crate) async fn wait_for_confirmation(
    service: BoxedInvoicesService,
    context: PaymentContext,
    deadline: Instant,
    poll: RetryStrategy,
) -> PaymentResult<()> {
    let polling = async {
        let mut attempt: u32 = 0;
        loop {
            match service.poll_confirmation(&context).await {
                Ok(Outcome::Captured) => return Ok(()),
                Ok(Outcome::Pending) => debug!(attempt, "payment is not confirmed yet"),
                Err(failure) if failure.is_retryable() => {
                    warn!(attempt, %failure, "confirmation poll failed, will poll again")
                }
                Err(failure) => return Err(failure),
            }
            sleep(poll.interval(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    };

    match timeout_at(deadline, polling).await {
        Ok(result) => result,
        Err(_) => Err(Failure::timeout().with_message("Payment confirmation timed out")),
    }
}

//! # Operation Slots
//!
//! A slot holds at most one in-flight asynchronous operation. Spawning into
//! an occupied slot aborts the previous occupant first, so only the newest
//! operation can ever report back as current.

use crate::runtime::Mailbox;
use payflow_core::{Failure, PaymentResult};
use std::fmt;
use std::future::Future;
use tokio::task::AbortHandle;
use tracing::{debug, error, Instrument};

/// Identifies one spawned operation; results carry it back to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Running {
    id: OperationId,
    abort: AbortHandle,
}

/// Single-slot cancellable operation owned by an interactor.
pub(crate) struct OperationSlot {
    name: &'static str,
    next_id: u64,
    current: Option<Running>,
}

impl OperationSlot {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: 0,
            current: None,
        }
    }

    /// Cancel the current occupant and run `future` in its place.
    ///
    /// The output is turned into a mailbox message with `into_message`. A
    /// panicking operation still reports back, as an internal failure.
    /// Returns `None` when the mailbox is closed and nothing was spawned.
    pub(crate) fn spawn<M, T, F, C>(
        &mut self,
        mailbox: &Mailbox<M>,
        future: F,
        into_message: C,
    ) -> Option<OperationId>
    where
        M: Send + 'static,
        T: Send + 'static,
        F: Future<Output = PaymentResult<T>> + Send + 'static,
        C: FnOnce(OperationId, PaymentResult<T>) -> M + Send + 'static,
    {
        mailbox.sender()?;
        self.cancel();

        self.next_id += 1;
        let id = OperationId(self.next_id);
        let name = self.name;
        let task = tokio::spawn(future.in_current_span());
        let abort = task.abort_handle();
        let mailbox = mailbox.clone();
        tokio::spawn(async move {
            let output = match task.await {
                Ok(output) => output,
                Err(e) if e.is_panic() => {
                    error!(slot = name, operation = %id, "operation panicked");
                    Err(Failure::internal(e).with_message("Operation failed unexpectedly"))
                }
                // Aborted, nobody is waiting for it.
                Err(_) => return,
            };
            if let Some(sender) = mailbox.sender() {
                let _ = sender.send(into_message(id, output));
            }
        }
        .in_current_span());
        self.current = Some(Running { id, abort });
        debug!(slot = self.name, operation = %id, "spawned operation");
        Some(id)
    }

    /// Returns true if `id` is the current occupant.
    pub(crate) fn is_current(&self, id: OperationId) -> bool {
        self.current.as_ref().map_or(false, |running| running.id == id)
    }

    /// Clear the slot if `id` is the current occupant.
    ///
    /// Returns false for results of superseded or cancelled operations,
    /// which callers must drop.
    pub(crate) fn finish(&mut self, id: OperationId) -> bool {
        if self.is_current(id) {
            self.current = None;
            true
        } else {
            debug!(slot = self.name, operation = %id, "dropping stale result");
            false
        }
    }

    /// Abort the current occupant, if any. Returns true if one was running.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(running) => {
                running.abort.abort();
                debug!(slot = self.name, operation = %running.id, "cancelled operation");
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.current.is_some()
    }
}

impl Drop for OperationSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

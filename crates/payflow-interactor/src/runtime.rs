//! # Interactor Runtime
//!
//! Scaffolding shared by both interactors: the serialized mailbox, the
//! published state and the one-shot completion.
//!
//! ```text
//!  caller ──command──▶ ┌─────────┐        ┌──────────────┐
//!                      │ mailbox │──────▶ │ actor (owns  │──watch──▶ caller
//!  spawned op ─result─▶└─────────┘        │    state)    │
//!                                         └──────────────┘
//! ```

use payflow_core::{Failure, PaymentResult};
use std::fmt::Debug;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

/// Weak handle to an actor's own mailbox.
///
/// Spawned operations upgrade it to post results. Holding it does not keep
/// the actor alive once every caller handle is gone.
pub(crate) struct Mailbox<M> {
    weak: mpsc::WeakUnboundedSender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            weak: self.weak.clone(),
        }
    }
}

impl<M> Mailbox<M> {
    pub(crate) fn new(sender: &mpsc::UnboundedSender<M>) -> Self {
        Self {
            weak: sender.downgrade(),
        }
    }

    pub(crate) fn sender(&self) -> Option<mpsc::UnboundedSender<M>> {
        self.weak.upgrade()
    }
}

/// Publishes every state transition to observers.
pub(crate) struct StatePublisher<S> {
    sender: watch::Sender<S>,
}

impl<S: Clone + Debug> StatePublisher<S> {
    pub(crate) fn new(initial: S) -> (Self, watch::Receiver<S>) {
        let (sender, receiver) = watch::channel(initial);
        (Self { sender }, receiver)
    }

    pub(crate) fn publish(&self, state: &S) {
        // No receivers is fine, the latest value is still retained.
        self.sender.send_replace(state.clone());
    }
}

/// Sending half of the completion channel; fires at most once.
pub(crate) struct CompletionSender<T> {
    sender: Option<oneshot::Sender<PaymentResult<T>>>,
}

impl<T: Debug> CompletionSender<T> {
    pub(crate) fn complete(&mut self, result: PaymentResult<T>) {
        match self.sender.take() {
            Some(sender) => {
                debug!(success = result.is_ok(), "reporting completion");
                if sender.send(result).is_err() {
                    debug!("completion receiver dropped");
                }
            }
            None => warn!(?result, "completion already reported, ignoring"),
        }
    }
}

/// Final outcome of an interactor, reported exactly once.
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<PaymentResult<T>>,
}

impl<T> Completion<T> {
    /// Wait for the flow to finish.
    ///
    /// If the interactor is dropped before reaching a final phase this
    /// resolves to a cancellation failure.
    pub async fn wait(self) -> PaymentResult<T> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(Failure::cancelled().with_message("Interactor dropped before completing")),
        }
    }
}

pub(crate) fn completion_channel<T>() -> (CompletionSender<T>, Completion<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        CompletionSender {
            sender: Some(sender),
        },
        Completion { receiver },
    )
}

/// Calling side of an interactor: queues commands and observes state.
#[derive(Debug)]
pub(crate) struct Handle<C, S> {
    commands: mpsc::UnboundedSender<C>,
    state: watch::Receiver<S>,
}

impl<C, S> Clone for Handle<C, S> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }
}

impl<C: Debug, S: Clone> Handle<C, S> {
    pub(crate) fn new(commands: mpsc::UnboundedSender<C>, state: watch::Receiver<S>) -> Self {
        Self { commands, state }
    }

    pub(crate) fn send(&self, command: C) {
        if let Err(e) = self.commands.send(command) {
            warn!(command = ?e.0, "interactor is gone, dropping command");
        }
    }

    pub(crate) fn state(&self) -> S {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<S> {
        self.state.clone()
    }
}

use crate::invalidation::RecentError;
use payflow_core::{CustomerAction, Failure, Field, FieldId, GatewayInfo};

/// Parameters collected from the user so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStarted {
    pub gateway: GatewayInfo,
    /// Ordered as the server returned them, pages appended in order
    pub fields: Vec<Field>,
    pub are_more_available: bool,
    pub recent_error: Option<RecentError>,
}

impl NativeStarted {
    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|field| &field.id == id)
    }

    pub(crate) fn field_mut(&mut self, id: &FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| &field.id == id)
    }

    pub fn are_fields_valid(&self) -> bool {
        self.fields.iter().all(|field| field.is_valid)
    }

    pub fn is_submit_allowed(&self) -> bool {
        self.are_fields_valid() && self.recent_error.is_none()
    }

    pub(crate) fn clear_resolved_error(&mut self) -> bool {
        let resolved = self.recent_error.as_ref().map_or(false, |error| {
            error.is_resolved(|id| self.field(id).map_or(true, |field| field.is_valid))
        });
        if resolved {
            self.recent_error = None;
        }
        resolved
    }
}

/// Submitted; waiting for the server to finalize the payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwaitingConfirmation {
    pub gateway: GatewayInfo,
    /// What the customer has to do out of band, e.g. approve in a banking app
    pub customer_action: Option<CustomerAction>,
}

#[derive(Debug, Clone)]
pub enum NativePaymentState {
    Idle,
    /// Fetching the first page of parameters
    Starting,
    Started(NativeStarted),
    /// Fetching the next page; carries the parameters loaded so far
    LoadingMore(NativeStarted),
    /// Submission in flight; carries the parameters it was started from
    Submitting(NativeStarted),
    /// Accepted by the server, confirmation not awaited
    Submitted {
        gateway: GatewayInfo,
    },
    AwaitingConfirmation(AwaitingConfirmation),
    Captured {
        gateway: GatewayInfo,
    },
    Failure {
        failure: Failure,
        /// Start failed; `restart()` tries again
        restartable: bool,
    },
}

impl NativePaymentState {
    pub fn is_terminal(&self) -> bool {
        match self {
            NativePaymentState::Submitted { .. } | NativePaymentState::Captured { .. } => true,
            NativePaymentState::Failure { restartable, .. } => !restartable,
            _ => false,
        }
    }

    pub fn started(&self) -> Option<&NativeStarted> {
        match self {
            NativePaymentState::Started(started)
            | NativePaymentState::LoadingMore(started)
            | NativePaymentState::Submitting(started) => Some(started),
            _ => None,
        }
    }
}

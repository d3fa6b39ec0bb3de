//! Status transitions for purchase requests.
//!
//! Planning is pure: [`PurchaseRequest::plan_transition`] evaluates the guard
//! and returns the outcome without touching the aggregate. The caller commits
//! the outcome to storage first and only then applies it in memory, so a
//! failed commit leaves nothing to undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{ExternalDecision, PurchaseRequest, PurchaseRequestId, RequestStatus};
use crate::errors::DomainError;
use crate::store::StatusChange;

pub const DECISION_LABEL_MAX_LEN: usize = 80;
pub const DECISION_NOTES_MAX_LEN: usize = 240;

/// The answer of an external decision-maker, before it is recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub approved: bool,
    pub label: String,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestTransition {
    Confirm,
    Reject,
    ExternalDecision(Verdict),
}

impl RequestTransition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Reject => "reject",
            Self::ExternalDecision(_) => "external_decision",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    /// False for idempotent manual no-ops, which need no write.
    pub changed: bool,
    pub decision: Option<ExternalDecision>,
}

impl TransitionOutcome {
    /// The write that commits this outcome, if any.
    ///
    /// Manual transitions are compare-and-set against the status the guard saw.
    /// External decisions overwrite whatever is stored.
    pub fn status_change(&self, request_id: PurchaseRequestId) -> Option<StatusChange> {
        if !self.changed {
            return None;
        }
        let expected = if self.decision.is_some() { None } else { Some(self.from) };
        Some(StatusChange {
            request_id,
            expected,
            status: self.to,
            decision: self.decision.clone(),
        })
    }
}

/// Guard table for the three-state lifecycle.
pub fn next_status(
    current: RequestStatus,
    transition: &RequestTransition,
) -> Result<RequestStatus, DomainError> {
    use RequestStatus::{Confirmed, Pending, Rejected};

    match (current, transition) {
        (Pending | Confirmed, RequestTransition::Confirm) => Ok(Confirmed),
        (Rejected, RequestTransition::Confirm) => {
            Err(DomainError::IllegalTransition { current, attempted: Confirmed })
        }
        (Pending | Rejected, RequestTransition::Reject) => Ok(Rejected),
        (Confirmed, RequestTransition::Reject) => {
            Err(DomainError::IllegalTransition { current, attempted: Rejected })
        }
        (_, RequestTransition::ExternalDecision(verdict)) => {
            Ok(if verdict.approved { Confirmed } else { Rejected })
        }
    }
}

impl PurchaseRequest {
    pub fn plan_transition(
        &self,
        transition: &RequestTransition,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let to = next_status(self.status, transition)?;

        let outcome = match transition {
            RequestTransition::ExternalDecision(verdict) => TransitionOutcome {
                from: self.status,
                to,
                changed: true,
                decision: Some(record_verdict(verdict, to, now)),
            },
            RequestTransition::Confirm | RequestTransition::Reject => TransitionOutcome {
                from: self.status,
                to,
                changed: self.status != to,
                decision: None,
            },
        };
        Ok(outcome)
    }

    pub fn apply_outcome(&mut self, outcome: &TransitionOutcome) {
        self.status = outcome.to;
        if let Some(decision) = &outcome.decision {
            self.external_decision = Some(decision.clone());
        }
    }
}

fn record_verdict(verdict: &Verdict, status: RequestStatus, now: DateTime<Utc>) -> ExternalDecision {
    let label = verdict.label.trim();
    let label = if label.is_empty() { status.as_str() } else { label };
    let notes = verdict
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|notes| !notes.is_empty())
        .map(|notes| truncate_chars(notes, DECISION_NOTES_MAX_LEN));

    ExternalDecision {
        label: truncate_chars(label, DECISION_LABEL_MAX_LEN),
        notes,
        decided_at: now,
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

//! Delegation of the approval decision to an external service.
//!
//! The core builds a canonical snapshot of the request, hands it to an
//! [`ApprovalGateway`] and turns the answer into a [`Verdict`]. Whether the
//! integration is available is decided once, when [`ApprovalDelegation`] is
//! constructed from configuration.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::catalog::CatalogItemId;
use crate::domain::request::{PurchaseRequest, PurchaseRequestId};
use crate::errors::ApplicationError;
use crate::lifecycle::Verdict;

/// What the external service sees. Lines are ordered by line id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSnapshot {
    pub request_id: PurchaseRequestId,
    pub requester: String,
    pub department: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_value: Decimal,
    pub items: Vec<ApprovalSnapshotItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSnapshotItem {
    pub item_id: CatalogItemId,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub line_total: Decimal,
}

impl ApprovalSnapshot {
    pub fn from_request(request: &PurchaseRequest) -> Self {
        let mut lines = request.lines.iter().collect::<Vec<_>>();
        lines.sort_by_key(|line| line.id);

        Self {
            request_id: request.id,
            requester: request.requester_name.clone(),
            department: request.department.clone(),
            total_value: request.total_value,
            items: lines
                .into_iter()
                .map(|line| ApprovalSnapshotItem {
                    item_id: line.item_id,
                    name: line.item_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                })
                .collect(),
        }
    }
}

/// The external service's answer as it arrives on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<ApprovalDecision> for Verdict {
    fn from(value: ApprovalDecision) -> Self {
        Self { approved: value.approved, label: value.decision, notes: value.notes }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("approval service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable approval response: {0}")]
    Decode(String),
    #[error("approval service timed out")]
    Timeout,
}

#[async_trait]
pub trait ApprovalGateway: Send + Sync {
    /// One attempt, no retries.
    async fn request_decision(
        &self,
        snapshot: &ApprovalSnapshot,
    ) -> Result<ApprovalDecision, GatewayError>;
}

#[derive(Clone, Default)]
pub struct ApprovalDelegation {
    gateway: Option<Arc<dyn ApprovalGateway>>,
}

impl ApprovalDelegation {
    pub fn disabled() -> Self {
        Self { gateway: None }
    }

    pub fn enabled(gateway: Arc<dyn ApprovalGateway>) -> Self {
        Self { gateway: Some(gateway) }
    }

    pub fn is_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Fails with `IntegrationDisabled` when no gateway was configured.
    pub fn ensure_enabled(&self) -> Result<(), ApplicationError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(ApplicationError::IntegrationDisabled)
        }
    }

    pub async fn decide(&self, request: &PurchaseRequest) -> Result<ApprovalDecision, ApplicationError> {
        let Some(gateway) = &self.gateway else {
            return Err(ApplicationError::IntegrationDisabled);
        };

        let snapshot = ApprovalSnapshot::from_request(request);
        match gateway.request_decision(&snapshot).await {
            Ok(decision) => {
                info!(
                    event_name = "approval.decision.received",
                    request_id = %request.id,
                    approved = decision.approved,
                    decision = %decision.decision,
                    "external approval decision received"
                );
                Ok(decision)
            }
            Err(error) => {
                warn!(
                    event_name = "approval.decision.unavailable",
                    request_id = %request.id,
                    reason = %error,
                    "external approval decision unavailable"
                );
                Err(ApplicationError::ExternalDecisionUnavailable(error.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for ApprovalDelegation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalDelegation").field("enabled", &self.is_enabled()).finish()
    }
}

/// Gateway that answers every call with a fixed result and records the
/// snapshots it was given.
pub struct ScriptedApprovalGateway {
    response: Result<ApprovalDecision, GatewayError>,
    calls: Mutex<Vec<ApprovalSnapshot>>,
}

impl ScriptedApprovalGateway {
    pub fn answering(decision: ApprovalDecision) -> Self {
        Self { response: Ok(decision), calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(error: GatewayError) -> Self {
        Self { response: Err(error), calls: Mutex::new(Vec::new()) }
    }

    pub async fn calls(&self) -> Vec<ApprovalSnapshot> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ApprovalGateway for ScriptedApprovalGateway {
    async fn request_decision(
        &self,
        snapshot: &ApprovalSnapshot,
    ) -> Result<ApprovalDecision, GatewayError> {
        self.calls.lock().await.push(snapshot.clone());
        self.response.clone()
    }
}

use std::sync::Arc;

use tracing::{error, info};

use crate::approvals::{ApprovalDecision, ApprovalDelegation};
use crate::clock::{Clock, SystemClock};
use crate::domain::catalog::{CatalogItem, CatalogItemId};
use crate::domain::request::{
    NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestLine,
};
use crate::errors::{ApplicationError, NotFoundTarget};
use crate::lifecycle::{RequestTransition, Verdict};
use crate::lines::{normalize, RequestDraft};
use crate::store::{ProcurementStore, StatusUpdate, StoreError};

/// Reload-and-retry bound for manual transitions that lose a status race.
pub const MAX_TRANSITION_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegationOutcome {
    pub request: PurchaseRequest,
    pub decision: ApprovalDecision,
}

pub struct PurchaseRequestService<S: ?Sized> {
    store: Arc<S>,
    delegation: ApprovalDelegation,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for PurchaseRequestService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            delegation: self.delegation.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> PurchaseRequestService<S>
where
    S: ProcurementStore + ?Sized,
{
    pub fn new(store: Arc<S>, delegation: ApprovalDelegation) -> Self {
        Self { store, delegation, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn delegation(&self) -> &ApprovalDelegation {
        &self.delegation
    }

    pub async fn create_request(
        &self,
        draft: RequestDraft,
    ) -> Result<PurchaseRequest, ApplicationError> {
        let normalized = normalize(self.store.as_ref(), &draft).await?;

        let request = NewPurchaseRequest {
            id: PurchaseRequestId::generate(),
            requester_name: normalized.requester_name,
            department: normalized.department,
            requested_at: self.clock.now(),
            total_value: normalized.total_value,
            lines: normalized.lines,
        };

        let mut stored = self
            .store
            .create_request(request)
            .await
            .map_err(|error| persistence_failure("create_request", error))?;
        stored.sort_lines();

        info!(
            event_name = "request.created",
            request_id = %stored.id,
            line_count = stored.lines.len(),
            total_value = %stored.total_value,
            "purchase request created"
        );
        Ok(stored)
    }

    pub async fn list_requests(&self) -> Result<Vec<PurchaseRequest>, ApplicationError> {
        let mut requests = self
            .store
            .list_requests()
            .await
            .map_err(|error| persistence_failure("list_requests", error))?;
        requests.iter_mut().for_each(PurchaseRequest::sort_lines);
        Ok(requests)
    }

    pub async fn get_request(
        &self,
        id: PurchaseRequestId,
    ) -> Result<PurchaseRequest, ApplicationError> {
        let mut request = self
            .store
            .find_request(id)
            .await
            .map_err(|error| persistence_failure("get_request", error))?
            .ok_or(ApplicationError::NotFound(NotFoundTarget::Request(id)))?;
        request.sort_lines();
        Ok(request)
    }

    pub async fn get_request_line(
        &self,
        request_id: PurchaseRequestId,
        item_id: CatalogItemId,
    ) -> Result<PurchaseRequestLine, ApplicationError> {
        let line = self
            .store
            .find_request_line(request_id, item_id)
            .await
            .map_err(|error| persistence_failure("get_request_line", error))?;
        if let Some(line) = line {
            return Ok(line);
        }

        // Distinguish an unknown request from a request without that item.
        self.get_request(request_id).await?;
        Err(ApplicationError::NotFound(NotFoundTarget::RequestLine { request_id, item_id }))
    }

    pub async fn confirm_request(
        &self,
        id: PurchaseRequestId,
    ) -> Result<PurchaseRequest, ApplicationError> {
        self.apply_manual_transition(id, RequestTransition::Confirm).await
    }

    pub async fn reject_request(
        &self,
        id: PurchaseRequestId,
    ) -> Result<PurchaseRequest, ApplicationError> {
        self.apply_manual_transition(id, RequestTransition::Reject).await
    }

    /// Asks the external service to decide `id` and records its answer.
    ///
    /// The integration check runs before anything is loaded. A failed call
    /// leaves the stored request exactly as it was.
    pub async fn delegate_approval(
        &self,
        id: PurchaseRequestId,
    ) -> Result<DelegationOutcome, ApplicationError> {
        self.delegation.ensure_enabled()?;

        let mut request = self.get_request(id).await?;
        let decision = self.delegation.decide(&request).await?;

        let transition = RequestTransition::ExternalDecision(Verdict::from(decision.clone()));
        let outcome = request.plan_transition(&transition, self.clock.now())?;
        let Some(change) = outcome.status_change(id) else {
            return Ok(DelegationOutcome { request, decision });
        };

        match self
            .store
            .update_status(change)
            .await
            .map_err(|error| persistence_failure("delegate_approval", error))?
        {
            StatusUpdate::Applied => {
                request.apply_outcome(&outcome);
                info!(
                    event_name = "request.externally_decided",
                    request_id = %id,
                    from = %outcome.from,
                    to = %outcome.to,
                    "external decision recorded"
                );
                Ok(DelegationOutcome { request, decision })
            }
            // Unconditional writes carry no expected status, so they never conflict.
            StatusUpdate::NotFound | StatusUpdate::Conflict { .. } => {
                Err(ApplicationError::NotFound(NotFoundTarget::Request(id)))
            }
        }
    }

    pub async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, ApplicationError> {
        self.store
            .list_catalog_items()
            .await
            .map_err(|error| persistence_failure("list_catalog_items", error))
    }

    pub async fn get_catalog_item(&self, id: CatalogItemId) -> Result<CatalogItem, ApplicationError> {
        self.store
            .find_catalog_item(id)
            .await
            .map_err(|error| persistence_failure("get_catalog_item", error))?
            .ok_or(ApplicationError::NotFound(NotFoundTarget::CatalogItem(id)))
    }

    async fn apply_manual_transition(
        &self,
        id: PurchaseRequestId,
        transition: RequestTransition,
    ) -> Result<PurchaseRequest, ApplicationError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let mut request = self.get_request(id).await?;
            let outcome = request.plan_transition(&transition, self.clock.now())?;
            let Some(change) = outcome.status_change(id) else {
                return Ok(request);
            };

            match self
                .store
                .update_status(change)
                .await
                .map_err(|error| persistence_failure(transition.name(), error))?
            {
                StatusUpdate::Applied => {
                    request.apply_outcome(&outcome);
                    info!(
                        event_name = "request.transitioned",
                        request_id = %id,
                        transition = transition.name(),
                        from = %outcome.from,
                        to = %outcome.to,
                        "request status changed"
                    );
                    return Ok(request);
                }
                StatusUpdate::NotFound => {
                    return Err(ApplicationError::NotFound(NotFoundTarget::Request(id)));
                }
                StatusUpdate::Conflict { current } => {
                    info!(
                        event_name = "request.transition_conflict",
                        request_id = %id,
                        transition = transition.name(),
                        expected = %outcome.from,
                        current = %current,
                        attempt,
                        "status changed concurrently, re-evaluating"
                    );
                }
            }
        }

        Err(persistence_failure(
            transition.name(),
            StoreError(format!("request {id} kept changing concurrently")),
        ))
    }
}

fn persistence_failure(operation: &'static str, failure: StoreError) -> ApplicationError {
    error!(event_name = "store.failure", operation, reason = %failure, "storage operation failed");
    ApplicationError::from(failure)
}

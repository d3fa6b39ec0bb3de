use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::catalog::{CatalogItem, CatalogItemId};
use crate::domain::request::{
    NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestLine, RequestLineId,
};

use super::{ProcurementStore, StatusChange, StatusUpdate, StoreError};

/// Map-backed store used by service tests and local experiments.
#[derive(Default)]
pub struct InMemoryProcurementStore {
    catalog: RwLock<BTreeMap<CatalogItemId, CatalogItem>>,
    requests: RwLock<HashMap<PurchaseRequestId, PurchaseRequest>>,
    last_line_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl InMemoryProcurementStore {
    pub fn with_catalog(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let catalog = items.into_iter().map(|item| (item.id, item)).collect();
        Self { catalog: RwLock::new(catalog), ..Self::default() }
    }

    /// Makes every subsequent write fail, to exercise commit failures.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("in-memory store is rejecting writes".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcurementStore for InMemoryProcurementStore {
    async fn find_catalog_items(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, StoreError> {
        let catalog = self.catalog.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| catalog.get(id))
            .filter(|item| item.active)
            .map(|item| (item.id, item.clone()))
            .collect())
    }

    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let catalog = self.catalog.read().await;
        let mut items = catalog.values().filter(|item| item.active).cloned().collect::<Vec<_>>();
        items.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(items)
    }

    async fn find_catalog_item(
        &self,
        id: CatalogItemId,
    ) -> Result<Option<CatalogItem>, StoreError> {
        let catalog = self.catalog.read().await;
        Ok(catalog.get(&id).filter(|item| item.active).cloned())
    }

    async fn create_request(
        &self,
        request: NewPurchaseRequest,
    ) -> Result<PurchaseRequest, StoreError> {
        self.check_writable()?;

        let status = request.status();
        let lines = request
            .lines
            .into_iter()
            .map(|line| PurchaseRequestLine {
                id: RequestLineId(self.last_line_id.fetch_add(1, Ordering::SeqCst) + 1),
                request_id: request.id,
                item_id: line.item_id,
                item_name: line.item_name,
                item_description: line.item_description,
                category: line.category,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
            })
            .collect();

        let stored = PurchaseRequest {
            id: request.id,
            requester_name: request.requester_name,
            department: request.department,
            requested_at: request.requested_at,
            status,
            total_value: request.total_value,
            external_decision: None,
            lines,
        };

        let mut requests = self.requests.write().await;
        if requests.contains_key(&stored.id) {
            return Err(StoreError(format!("request {} already exists", stored.id)));
        }
        requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_requests(&self) -> Result<Vec<PurchaseRequest>, StoreError> {
        let requests = self.requests.read().await;
        let mut listed = requests.values().cloned().collect::<Vec<_>>();
        listed.sort_by(|left, right| right.requested_at.cmp(&left.requested_at));
        Ok(listed)
    }

    async fn find_request(
        &self,
        id: PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, StoreError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_request_line(
        &self,
        request_id: PurchaseRequestId,
        item_id: CatalogItemId,
    ) -> Result<Option<PurchaseRequestLine>, StoreError> {
        let requests = self.requests.read().await;
        Ok(requests
            .get(&request_id)
            .and_then(|request| request.line_for_item(item_id))
            .cloned())
    }

    async fn update_status(&self, change: StatusChange) -> Result<StatusUpdate, StoreError> {
        self.check_writable()?;

        let mut requests = self.requests.write().await;
        let Some(request) = requests.get_mut(&change.request_id) else {
            return Ok(StatusUpdate::NotFound);
        };

        if let Some(expected) = change.expected {
            if request.status != expected {
                return Ok(StatusUpdate::Conflict { current: request.status });
            }
        }

        request.status = change.status;
        if let Some(decision) = change.decision {
            request.external_decision = Some(decision);
        }
        Ok(StatusUpdate::Applied)
    }
}

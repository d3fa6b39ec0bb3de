use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use procura_core::domain::catalog::{CatalogItem, CatalogItemId};
use procura_core::domain::request::{
    NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestLine,
};
use procura_core::store::{ProcurementStore, StatusChange, StatusUpdate, StoreError};

use super::{
    CatalogRepository, PurchaseRequestRepository, SqlCatalogRepository,
    SqlPurchaseRequestRepository,
};
use crate::DbPool;

/// SQLite-backed storage collaborator for the purchase-request service.
pub struct SqlProcurementStore {
    catalog: SqlCatalogRepository,
    requests: SqlPurchaseRequestRepository,
}

impl SqlProcurementStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            catalog: SqlCatalogRepository::new(pool.clone()),
            requests: SqlPurchaseRequestRepository::new(pool),
        }
    }
}

#[async_trait]
impl ProcurementStore for SqlProcurementStore {
    async fn find_catalog_items(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, StoreError> {
        Ok(self.catalog.find_active_by_ids(ids).await?)
    }

    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        Ok(self.catalog.list_active().await?)
    }

    async fn find_catalog_item(
        &self,
        id: CatalogItemId,
    ) -> Result<Option<CatalogItem>, StoreError> {
        Ok(self.catalog.find_active_by_id(id).await?)
    }

    async fn create_request(
        &self,
        request: NewPurchaseRequest,
    ) -> Result<PurchaseRequest, StoreError> {
        Ok(self.requests.create(request).await?)
    }

    async fn list_requests(&self) -> Result<Vec<PurchaseRequest>, StoreError> {
        Ok(self.requests.list().await?)
    }

    async fn find_request(
        &self,
        id: PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, StoreError> {
        Ok(self.requests.find_by_id(id).await?)
    }

    async fn find_request_line(
        &self,
        request_id: PurchaseRequestId,
        item_id: CatalogItemId,
    ) -> Result<Option<PurchaseRequestLine>, StoreError> {
        Ok(self.requests.find_line(request_id, item_id).await?)
    }

    async fn update_status(&self, change: StatusChange) -> Result<StatusUpdate, StoreError> {
        Ok(self.requests.update_status(change).await?)
    }
}

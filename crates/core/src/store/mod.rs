//! Storage collaborator contract.
//!
//! The core never talks to a database directly. Adapters implement
//! [`ProcurementStore`] and own all durable state; the service loads an
//! aggregate, decides in memory, and commits through this trait.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::{CatalogItem, CatalogItemId};
use crate::domain::request::{
    ExternalDecision, NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestLine,
    RequestStatus,
};

pub mod memory;

pub use memory::InMemoryProcurementStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct StoreError(pub String);

/// A status write. `expected` turns the write into a compare-and-set on the
/// current status; `None` overwrites unconditionally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub request_id: PurchaseRequestId,
    pub expected: Option<RequestStatus>,
    pub status: RequestStatus,
    pub decision: Option<ExternalDecision>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied,
    NotFound,
    Conflict { current: RequestStatus },
}

#[async_trait]
pub trait ProcurementStore: Send + Sync {
    /// Active catalog items among `ids`. Unknown or inactive ids are omitted.
    async fn find_catalog_items(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, StoreError>;

    /// Active catalog items ordered by name.
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, StoreError>;

    async fn find_catalog_item(&self, id: CatalogItemId)
        -> Result<Option<CatalogItem>, StoreError>;

    /// Stores the request and every line atomically and returns the stored aggregate.
    async fn create_request(&self, request: NewPurchaseRequest)
        -> Result<PurchaseRequest, StoreError>;

    /// Newest first.
    async fn list_requests(&self) -> Result<Vec<PurchaseRequest>, StoreError>;

    async fn find_request(
        &self,
        id: PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, StoreError>;

    async fn find_request_line(
        &self,
        request_id: PurchaseRequestId,
        item_id: CatalogItemId,
    ) -> Result<Option<PurchaseRequestLine>, StoreError>;

    /// Writes status and decision fields in a single commit.
    async fn update_status(&self, change: StatusChange) -> Result<StatusUpdate, StoreError>;
}

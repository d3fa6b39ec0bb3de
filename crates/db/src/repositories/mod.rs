use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use procura_core::domain::catalog::{CatalogItem, CatalogItemId};
use procura_core::domain::request::{
    NewPurchaseRequest, PurchaseRequest, PurchaseRequestId, PurchaseRequestLine,
};
use procura_core::store::{StatusChange, StatusUpdate, StoreError};
use rust_decimal::Decimal;
use thiserror::Error;

pub mod catalog;
pub mod request;
pub mod store;

pub use catalog::SqlCatalogRepository;
pub use request::SqlPurchaseRequestRepository;
pub use store::SqlProcurementStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        StoreError(value.to_string())
    }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_active_by_ids(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<CatalogItem>, RepositoryError>;
    async fn find_active_by_id(
        &self,
        id: CatalogItemId,
    ) -> Result<Option<CatalogItem>, RepositoryError>;
    async fn upsert(&self, item: &CatalogItem) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PurchaseRequestRepository: Send + Sync {
    async fn create(&self, request: NewPurchaseRequest)
        -> Result<PurchaseRequest, RepositoryError>;
    async fn list(&self) -> Result<Vec<PurchaseRequest>, RepositoryError>;
    async fn find_by_id(
        &self,
        id: PurchaseRequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError>;
    async fn find_line(
        &self,
        request_id: PurchaseRequestId,
        item_id: CatalogItemId,
    ) -> Result<Option<PurchaseRequestLine>, RepositoryError>;
    async fn update_status(&self, change: StatusChange) -> Result<StatusUpdate, RepositoryError>;
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim()).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::domain::catalog::{CatalogItem, CatalogItemId};
use crate::store::{ProcurementStore, StoreError};

/// Resolves a set of catalog ids to the items that exist and are active.
///
/// Unknown ids are not an error: omission from the returned map is the
/// not-found signal, and callers decide what to do with the gap.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn resolve(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, StoreError>;
}

#[async_trait]
impl<S> CatalogLookup for S
where
    S: ProcurementStore + ?Sized,
{
    async fn resolve(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, StoreError> {
        self.find_catalog_items(ids).await
    }
}

/// A fixed, already-loaded catalog.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn find(&self, id: CatalogItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id && item.active)
    }
}

#[async_trait]
impl CatalogLookup for Catalog {
    async fn resolve(
        &self,
        ids: &BTreeSet<CatalogItemId>,
    ) -> Result<HashMap<CatalogItemId, CatalogItem>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.find(*id)).map(|item| (item.id, item.clone())).collect())
    }
}

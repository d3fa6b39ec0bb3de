//! Line normalization: turns raw `(item, quantity)` pairs into priced lines.
//!
//! Validation and pricing are split so the pure half can be exercised without
//! a catalog. Nothing here persists anything; an error at any step means the
//! caller has nothing to store.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogLookup;
use crate::domain::catalog::{CatalogItem, CatalogItemId};
use crate::domain::request::NewRequestLine;
use crate::errors::{ApplicationError, NotFoundTarget, ValidationFailure};

pub const REQUESTER_NAME_MAX_LEN: usize = 120;
pub const DEPARTMENT_MAX_LEN: usize = 240;
pub const QUANTITY_MAX: u32 = 1000;

/// One raw pair as received from a caller. Values are not trusted yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub item_id: i64,
    pub quantity: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    #[serde(default)]
    pub requester_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub items: Vec<RequestedItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedItem {
    pub item_id: CatalogItemId,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedDraft {
    pub requester_name: String,
    pub department: String,
    pub items: Vec<ValidatedItem>,
}

impl ValidatedDraft {
    /// Distinct ids in first-seen order.
    pub fn item_ids(&self) -> Vec<CatalogItemId> {
        let mut seen = BTreeSet::new();
        self.items
            .iter()
            .map(|item| item.item_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub requester_name: String,
    pub department: String,
    pub lines: Vec<NewRequestLine>,
    pub total_value: Decimal,
}

pub fn validate_draft(draft: &RequestDraft) -> Result<ValidatedDraft, ValidationFailure> {
    let requester_name = draft.requester_name.trim();
    if requester_name.is_empty() {
        return Err(ValidationFailure::RequesterRequired);
    }
    if requester_name.chars().count() > REQUESTER_NAME_MAX_LEN {
        return Err(ValidationFailure::RequesterTooLong { max: REQUESTER_NAME_MAX_LEN });
    }

    let department = draft.department.trim();
    if department.chars().count() > DEPARTMENT_MAX_LEN {
        return Err(ValidationFailure::DepartmentTooLong { max: DEPARTMENT_MAX_LEN });
    }

    if draft.items.is_empty() {
        return Err(ValidationFailure::NoItems);
    }

    // Non-positive ids and quantities are dropped, not reported.
    let items = draft
        .items
        .iter()
        .filter(|item| item.item_id > 0)
        .filter_map(|item| {
            u32::try_from(item.quantity)
                .ok()
                .filter(|quantity| *quantity > 0)
                .map(|quantity| ValidatedItem { item_id: CatalogItemId(item.item_id), quantity })
        })
        .collect::<Vec<_>>();

    if items.is_empty() {
        return Err(ValidationFailure::NoValidItems);
    }
    if items.iter().any(|item| item.quantity > QUANTITY_MAX) {
        return Err(ValidationFailure::QuantityTooLarge { max: QUANTITY_MAX });
    }

    Ok(ValidatedDraft {
        requester_name: requester_name.to_owned(),
        department: department.to_owned(),
        items,
    })
}

pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Prices every validated item against `catalog`.
///
/// Fails with the full list of unresolved ids if any item is missing; no
/// partial result is produced.
pub fn price_lines(
    validated: ValidatedDraft,
    catalog: &HashMap<CatalogItemId, CatalogItem>,
) -> Result<NormalizedRequest, ApplicationError> {
    let missing = validated
        .item_ids()
        .into_iter()
        .filter(|id| !catalog.contains_key(id))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ApplicationError::NotFound(NotFoundTarget::CatalogItems(missing)));
    }

    let mut lines = Vec::with_capacity(validated.items.len());
    for requested in &validated.items {
        let Some(item) = catalog.get(&requested.item_id) else {
            return Err(ApplicationError::NotFound(NotFoundTarget::CatalogItems(vec![
                requested.item_id,
            ])));
        };
        lines.push(NewRequestLine {
            item_id: item.id,
            item_name: item.name.clone(),
            item_description: item.description.clone(),
            category: item.category.clone(),
            quantity: requested.quantity,
            unit_price: item.unit_price,
            line_total: line_total(item.unit_price, requested.quantity),
        });
    }

    let total_value = lines.iter().map(|line| line.line_total).sum();

    Ok(NormalizedRequest {
        requester_name: validated.requester_name,
        department: validated.department,
        lines,
        total_value,
    })
}

pub async fn normalize<L>(
    lookup: &L,
    draft: &RequestDraft,
) -> Result<NormalizedRequest, ApplicationError>
where
    L: CatalogLookup + ?Sized,
{
    let validated = validate_draft(draft)?;
    let ids = validated.item_ids().into_iter().collect::<BTreeSet<_>>();
    let catalog = lookup.resolve(&ids).await?;
    price_lines(validated, &catalog)
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::CatalogItemId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PurchaseRequestId(pub Uuid);

impl PurchaseRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PurchaseRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PurchaseRequestId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestLineId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded when an external collaborator decided the request.
///
/// The label, notes and timestamp only ever change together with the status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDecision {
    pub label: String,
    pub notes: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// A stored line. Prices are the snapshot taken when the request was created;
/// item name, description and category are joined from the catalog for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestLine {
    pub id: RequestLineId,
    pub request_id: PurchaseRequestId,
    pub item_id: CatalogItemId,
    pub item_name: String,
    pub item_description: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: PurchaseRequestId,
    pub requester_name: String,
    pub department: String,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub total_value: Decimal,
    pub external_decision: Option<ExternalDecision>,
    pub lines: Vec<PurchaseRequestLine>,
}

impl PurchaseRequest {
    pub fn line_for_item(&self, item_id: CatalogItemId) -> Option<&PurchaseRequestLine> {
        self.lines.iter().find(|line| line.item_id == item_id)
    }

    pub fn lines_total(&self) -> Decimal {
        self.lines.iter().map(|line| line.line_total).sum()
    }

    /// Lines in line-id order, the order every consumer observes.
    pub fn sort_lines(&mut self) {
        self.lines.sort_by_key(|line| line.id);
    }
}

/// A line that has been priced but not yet stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequestLine {
    pub item_id: CatalogItemId,
    pub item_name: String,
    pub item_description: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// A request ready to be persisted in the `Pending` state.
///
/// Built from the line normalizer's output so `total_value` always equals the
/// sum of `lines[*].line_total` and `lines` is never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseRequest {
    pub id: PurchaseRequestId,
    pub requester_name: String,
    pub department: String,
    pub requested_at: DateTime<Utc>,
    pub total_value: Decimal,
    pub lines: Vec<NewRequestLine>,
}

impl NewPurchaseRequest {
    pub fn status(&self) -> RequestStatus {
        RequestStatus::Pending
    }
}

pub mod approvals;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod lines;
pub mod service;
pub mod store;

pub use approvals::{
    ApprovalDecision, ApprovalDelegation, ApprovalGateway, ApprovalSnapshot, ApprovalSnapshotItem,
    GatewayError,
};
pub use catalog::{Catalog, CatalogLookup};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::catalog::{CatalogItem, CatalogItemId};
pub use domain::request::{
    ExternalDecision, NewPurchaseRequest, NewRequestLine, PurchaseRequest, PurchaseRequestId,
    PurchaseRequestLine, RequestLineId, RequestStatus,
};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError, ValidationFailure};
pub use lifecycle::{RequestTransition, TransitionOutcome, Verdict};
pub use lines::{RequestDraft, RequestedItem};
pub use service::{DelegationOutcome, PurchaseRequestService};
pub use store::{ProcurementStore, StatusChange, StatusUpdate, StoreError};

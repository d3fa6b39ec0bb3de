use serde::Serialize;
use thiserror::Error;

use crate::domain::catalog::CatalogItemId;
use crate::domain::request::{PurchaseRequestId, RequestStatus};
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("requester required")]
    RequesterRequired,
    #[error("requester name exceeds {max} characters")]
    RequesterTooLong { max: usize },
    #[error("department exceeds {max} characters")]
    DepartmentTooLong { max: usize },
    #[error("no items")]
    NoItems,
    #[error("no valid items")]
    NoValidItems,
    #[error("quantity exceeds {max}")]
    QuantityTooLarge { max: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("{}", describe_illegal_transition(.current, .attempted))]
    IllegalTransition { current: RequestStatus, attempted: RequestStatus },
}

fn describe_illegal_transition(current: &RequestStatus, attempted: &RequestStatus) -> String {
    match (*current, *attempted) {
        (RequestStatus::Rejected, RequestStatus::Confirmed) => {
            "rejected requests cannot be confirmed".to_owned()
        }
        (RequestStatus::Confirmed, RequestStatus::Rejected) => {
            "confirmed requests cannot be rejected".to_owned()
        }
        (current, attempted) => {
            format!("requests cannot move from {current} to {attempted}")
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotFoundTarget {
    CatalogItems(Vec<CatalogItemId>),
    CatalogItem(CatalogItemId),
    Request(PurchaseRequestId),
    RequestLine { request_id: PurchaseRequestId, item_id: CatalogItemId },
}

impl NotFoundTarget {
    pub fn missing_items(&self) -> Vec<CatalogItemId> {
        match self {
            Self::CatalogItems(ids) => ids.clone(),
            Self::CatalogItem(id) => vec![*id],
            Self::Request(_) | Self::RequestLine { .. } => Vec::new(),
        }
    }
}

impl std::fmt::Display for NotFoundTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CatalogItems(ids) => {
                let ids = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "catalog items not found: {}", ids.join(", "))
            }
            Self::CatalogItem(id) => write!(f, "item {id} not found"),
            Self::Request(id) => write!(f, "request {id} not found"),
            Self::RequestLine { request_id, item_id } => {
                write!(f, "item {item_id} is not associated with request {request_id}")
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    NotFound(NotFoundTarget),
    #[error("external approval integration is disabled")]
    IntegrationDisabled,
    #[error("external decision unavailable: {0}")]
    ExternalDecisionUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ValidationFailure> for ApplicationError {
    fn from(value: ValidationFailure) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.0)
    }
}

/// Stable classification of every failure the service can return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    IllegalTransition,
    IntegrationDisabled,
    ExternalDecisionUnavailable,
    Persistence,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::IllegalTransition => "illegal_transition",
            Self::IntegrationDisabled => "integration_disabled",
            Self::ExternalDecisionUnavailable => "external_decision_unavailable",
            Self::Persistence => "persistence",
            Self::Configuration => "configuration",
        }
    }
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(DomainError::Validation(_)) => ErrorKind::Validation,
            Self::Domain(DomainError::IllegalTransition { .. }) => ErrorKind::IllegalTransition,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::IntegrationDisabled => ErrorKind::IntegrationDisabled,
            Self::ExternalDecisionUnavailable(_) => ErrorKind::ExternalDecisionUnavailable,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { kind: ErrorKind, message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, missing_items: Vec<CatalogItemId>, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { kind: ErrorKind, message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } | Self::NotFound { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "External approval is disabled. Configure the approval section to enable it."
                    .to_owned()
            }
            Self::BadGateway { .. } => {
                "No decision could be obtained from the external approval service.".to_owned()
            }
            Self::Internal { .. } => "An unexpected internal error occurred.".to_owned(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let kind = value.kind();
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { kind, message: error.to_string(), correlation_id }
            }
            ApplicationError::NotFound(target) => Self::NotFound {
                message: target.to_string(),
                missing_items: target.missing_items(),
                correlation_id,
            },
            ApplicationError::IntegrationDisabled => Self::ServiceUnavailable {
                message: "external approval integration is disabled".to_owned(),
                correlation_id,
            },
            ApplicationError::ExternalDecisionUnavailable(message) => {
                Self::BadGateway { message, correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Configuration(message) => {
                Self::Internal { kind, message, correlation_id }
            }
        }
    }
}

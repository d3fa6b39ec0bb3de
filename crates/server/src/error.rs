use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use procura_core::errors::{ApplicationError, ErrorKind, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_items: Option<Vec<i64>>,
}

/// Transport wrapper that turns service failures into JSON responses.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        let kind = error.kind();
        match kind {
            ErrorKind::Persistence | ErrorKind::Configuration => error!(
                event_name = "api.request.failed",
                correlation_id,
                error_kind = kind.as_str(),
                error = %error,
                "request failed"
            ),
            _ => warn!(
                event_name = "api.request.rejected",
                correlation_id,
                error_kind = kind.as_str(),
                error = %error,
                "request rejected"
            ),
        }
        Self(error.into_interface(correlation_id))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match &self.0 {
            InterfaceError::BadRequest { kind, .. } | InterfaceError::Internal { kind, .. } => {
                kind.as_str()
            }
            InterfaceError::NotFound { .. } => ErrorKind::NotFound.as_str(),
            InterfaceError::ServiceUnavailable { .. } => ErrorKind::IntegrationDisabled.as_str(),
            InterfaceError::BadGateway { .. } => ErrorKind::ExternalDecisionUnavailable.as_str(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let missing_items = match &self.0 {
            InterfaceError::NotFound { missing_items, .. } if !missing_items.is_empty() => {
                Some(missing_items.iter().map(|id| id.0).collect())
            }
            _ => None,
        };

        ErrorBody {
            error: self.error_code(),
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
            missing_items,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use procura_core::domain::catalog::CatalogItemId;
    use procura_core::errors::{ApplicationError, NotFoundTarget, ValidationFailure};

    use super::ApiError;

    #[test]
    fn each_failure_kind_has_its_own_status() {
        let cases = [
            (ApplicationError::from(ValidationFailure::NoItems), StatusCode::BAD_REQUEST),
            (
                ApplicationError::NotFound(NotFoundTarget::CatalogItem(CatalogItemId(9))),
                StatusCode::NOT_FOUND,
            ),
            (ApplicationError::IntegrationDisabled, StatusCode::SERVICE_UNAVAILABLE),
            (
                ApplicationError::ExternalDecisionUnavailable("timeout".to_owned()),
                StatusCode::BAD_GATEWAY,
            ),
            (ApplicationError::Persistence("locked".to_owned()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from_application(error, "corr").status(), expected);
        }
    }

    #[test]
    fn missing_catalog_items_are_listed_in_the_body() {
        let error = ApiError::from_application(
            ApplicationError::NotFound(NotFoundTarget::CatalogItems(vec![
                CatalogItemId(7),
                CatalogItemId(8),
            ])),
            "corr-7",
        );

        let body = serde_json::to_value(error.body()).expect("serialize");
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["correlation_id"], "corr-7");
        assert_eq!(body["missing_items"], serde_json::json!([7, 8]));
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let error = ApiError::from_application(
            ApplicationError::Persistence("database is locked".to_owned()),
            "corr-9",
        );

        let body = serde_json::to_value(error.body()).expect("serialize");
        assert_eq!(body["error"], "persistence");
        assert!(body.get("missing_items").is_none());
        assert!(!body["message"].as_str().unwrap_or_default().contains("locked"));
    }
}

//! JSON API for purchase requests and the catalog.
//!
//! - `GET  /api/items`                                   active catalog items
//! - `GET  /api/items/{id}`                              one catalog item
//! - `POST /api/requests`                                create a request
//! - `GET  /api/requests`                                all requests, newest first
//! - `GET  /api/requests/{id}`                           one request
//! - `GET  /api/requests/{id}/items/{item_id}`           one line of a request
//! - `POST /api/requests/{id}/confirm`                   confirm manually
//! - `POST /api/requests/{id}/reject`                    reject manually
//! - `POST /api/requests/{id}/external-approval`         delegate to the approval service

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use procura_core::approvals::ApprovalDecision;
use procura_core::domain::catalog::{CatalogItem, CatalogItemId};
use procura_core::domain::request::{PurchaseRequest, PurchaseRequestId, PurchaseRequestLine};
use procura_core::errors::InterfaceError;
use procura_core::lines::RequestDraft;
use procura_core::service::{DelegationOutcome, PurchaseRequestService};
use procura_core::store::ProcurementStore;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

pub type SharedService = PurchaseRequestService<dyn ProcurementStore>;

#[derive(Clone)]
pub struct ApiState {
    service: Arc<SharedService>,
}

impl ApiState {
    pub fn new(service: SharedService) -> Self {
        Self { service: Arc::new(service) }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CatalogItemResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub unit_price: Decimal,
}

impl From<CatalogItem> for CatalogItemResponse {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id.0,
            name: item.name,
            description: item.description,
            category: item.category,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestLineResponse {
    pub line_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub item_description: String,
    pub category: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub line_total: Decimal,
}

impl From<PurchaseRequestLine> for RequestLineResponse {
    fn from(line: PurchaseRequestLine) -> Self {
        Self {
            line_id: line.id.0,
            item_id: line.item_id.0,
            item_name: line.item_name,
            item_description: line.item_description,
            category: line.category,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub request_id: String,
    pub requester_name: String,
    pub department: String,
    pub requested_at: DateTime<Utc>,
    pub status: &'static str,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_value: Decimal,
    pub external_decision: Option<String>,
    pub external_decision_notes: Option<String>,
    pub external_decision_at: Option<DateTime<Utc>>,
    pub items: Vec<RequestLineResponse>,
}

impl From<PurchaseRequest> for RequestResponse {
    fn from(request: PurchaseRequest) -> Self {
        let (external_decision, external_decision_notes, external_decision_at) =
            match request.external_decision {
                Some(decision) => (Some(decision.label), decision.notes, Some(decision.decided_at)),
                None => (None, None, None),
            };

        Self {
            request_id: request.id.to_string(),
            requester_name: request.requester_name,
            department: request.department,
            requested_at: request.requested_at,
            status: request.status.as_str(),
            total_value: request.total_value,
            external_decision,
            external_decision_notes,
            external_decision_at,
            items: request.lines.into_iter().map(RequestLineResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DelegationResponse {
    pub request: RequestResponse,
    pub external_response: ApprovalDecision,
}

impl From<DelegationOutcome> for DelegationResponse {
    fn from(outcome: DelegationOutcome) -> Self {
        Self { request: outcome.request.into(), external_response: outcome.decision }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/api/items", get(list_items))
        .route("/api/items/{id}", get(get_item))
        .route("/api/requests", get(list_requests).post(create_request))
        .route("/api/requests/{id}", get(get_request))
        .route("/api/requests/{id}/items/{item_id}", get(get_request_line))
        .route("/api/requests/{id}/confirm", post(confirm_request))
        .route("/api/requests/{id}/reject", post(reject_request))
        .route("/api/requests/{id}/external-approval", post(delegate_approval))
        .with_state(state)
}

async fn banner() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Purchase Requests Service running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_items(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<CatalogItemResponse>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let items = state
        .service
        .list_catalog_items()
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(items.into_iter().map(CatalogItemResponse::from).collect()))
}

async fn get_item(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CatalogItemResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let id = parse_item_id(&raw_id, &correlation_id)?;
    let item = state
        .service
        .get_catalog_item(id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(item.into()))
}

async fn create_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<RequestDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id(&headers);
    let created = state
        .service
        .create_request(draft)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    info!(
        event_name = "api.request.created",
        correlation_id = %correlation_id,
        request_id = %created.id,
        "purchase request created"
    );

    let location = format!("/api/requests/{}", created.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(RequestResponse::from(created))))
}

async fn list_requests(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RequestResponse>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let requests = state
        .service
        .list_requests()
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(requests.into_iter().map(RequestResponse::from).collect()))
}

async fn get_request(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RequestResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let id = parse_request_id(&raw_id, &correlation_id)?;
    let request = state
        .service
        .get_request(id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(request.into()))
}

async fn get_request_line(
    State(state): State<ApiState>,
    Path((raw_request_id, raw_item_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<RequestLineResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request_id = parse_request_id(&raw_request_id, &correlation_id)?;
    let item_id = parse_item_id(&raw_item_id, &correlation_id)?;
    let line = state
        .service
        .get_request_line(request_id, item_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(line.into()))
}

async fn confirm_request(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RequestResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let id = parse_request_id(&raw_id, &correlation_id)?;
    let request = state
        .service
        .confirm_request(id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(request.into()))
}

async fn reject_request(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RequestResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let id = parse_request_id(&raw_id, &correlation_id)?;
    let request = state
        .service
        .reject_request(id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(request.into()))
}

async fn delegate_approval(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DelegationResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let id = parse_request_id(&raw_id, &correlation_id)?;
    let outcome = state
        .service
        .delegate_approval(id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(outcome.into()))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// Malformed ids can never match a stored row, so they read as not found.
fn parse_request_id(raw: &str, correlation_id: &str) -> Result<PurchaseRequestId, ApiError> {
    raw.parse::<PurchaseRequestId>().map_err(|_| unknown_path_id("request", raw, correlation_id))
}

fn parse_item_id(raw: &str, correlation_id: &str) -> Result<CatalogItemId, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map(CatalogItemId)
        .map_err(|_| unknown_path_id("item", raw, correlation_id))
}

fn unknown_path_id(entity: &str, raw: &str, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::NotFound {
        message: format!("{entity} {raw} not found"),
        missing_items: Vec::new(),
        correlation_id: correlation_id.to_owned(),
    })
}

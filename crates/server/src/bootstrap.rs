use std::sync::Arc;

use axum::Router;
use procura_core::approvals::ApprovalDelegation;
use procura_core::config::{AppConfig, ApprovalConfig, ConfigError};
use procura_core::service::PurchaseRequestService;
use procura_core::store::ProcurementStore;
use procura_db::{connect_with_config, migrations, DbPool, SqlProcurementStore};
use thiserror::Error;
use tracing::info;

use crate::api::{self, ApiState, SharedService};
use crate::approval_client::HttpApprovalGateway;
use crate::health;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: SharedService,
}

impl Application {
    pub fn router(&self) -> Router {
        api::router(ApiState::new(self.service.clone())).merge(health::router(
            self.db_pool.clone(),
            self.service.delegation().is_enabled(),
        ))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("approval client could not be built: {0}")]
    ApprovalClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let delegation = approval_delegation(&config.approval)?;
    let store: Arc<dyn ProcurementStore> = Arc::new(SqlProcurementStore::new(db_pool.clone()));
    let service = PurchaseRequestService::new(store, delegation);

    Ok(Application { config, db_pool, service })
}

/// Turns the approval section into the capability handed to the service.
pub fn approval_delegation(config: &ApprovalConfig) -> Result<ApprovalDelegation, BootstrapError> {
    if !config.is_active() {
        info!(
            event_name = "system.bootstrap.approval_disabled",
            correlation_id = "bootstrap",
            "external approval delegation disabled"
        );
        return Ok(ApprovalDelegation::disabled());
    }

    let gateway = HttpApprovalGateway::from_config(config).map_err(BootstrapError::ApprovalClient)?;
    info!(
        event_name = "system.bootstrap.approval_enabled",
        correlation_id = "bootstrap",
        endpoint = %gateway.endpoint(),
        timeout_secs = config.timeout_secs,
        "external approval delegation enabled"
    );
    Ok(ApprovalDelegation::enabled(Arc::new(gateway)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use procura_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(overrides: ConfigOverrides) -> Result<Application, BootstrapError> {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..overrides
            },
            ..LoadOptions::default()
        })?;
        bootstrap_with_config(config).await
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_approval_url() {
        let result = bootstrap(ConfigOverrides {
            approval_enabled: Some(true),
            approval_base_url: Some("ftp://approvals.local".to_string()),
            ..ConfigOverrides::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("approval.base_url"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_applies_schema_and_wires_delegation() {
        let app = bootstrap(ConfigOverrides {
            approval_enabled: Some(true),
            approval_base_url: Some("http://127.0.0.1:9".to_string()),
            ..ConfigOverrides::default()
        })
        .await
        .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('catalog_item', 'purchase_request', 'purchase_request_line')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 3);
        assert!(app.service.delegation().is_enabled());

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn router_serves_health_and_api() {
        let app = bootstrap(ConfigOverrides::default()).await.expect("bootstrap");
        assert!(!app.service.delegation().is_enabled());
        let router = app.router();

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::builder().uri("/api/items").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], b"[]");

        app.db_pool.close().await;
    }
}

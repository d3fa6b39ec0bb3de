use std::time::Duration;

use async_trait::async_trait;
use procura_core::approvals::{ApprovalDecision, ApprovalGateway, ApprovalSnapshot, GatewayError};
use procura_core::config::ApprovalConfig;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

const ERROR_BODY_PREVIEW_LEN: usize = 512;

/// Outbound client for the external approval service.
pub struct HttpApprovalGateway {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    bearer_token: Option<SecretString>,
}

impl HttpApprovalGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        bearer_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into(), api_key, bearer_token })
    }

    pub fn from_config(config: &ApprovalConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.endpoint_url(),
            config.api_key.clone(),
            config.bearer_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ApprovalGateway for HttpApprovalGateway {
    async fn request_decision(
        &self,
        snapshot: &ApprovalSnapshot,
    ) -> Result<ApprovalDecision, GatewayError> {
        let mut request = self.client.post(&self.endpoint).json(snapshot);
        if let Some(api_key) = &self.api_key {
            request = request.header("X-API-Key", api_key.expose_secret());
        }
        if let Some(token) = &self.bearer_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        debug!(
            event_name = "approval.client.request",
            request_id = %snapshot.request_id,
            endpoint = %self.endpoint,
            "posting approval snapshot"
        );

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => preview(&body),
                Err(error) => {
                    warn!(
                        event_name = "approval.client.body_unreadable",
                        request_id = %snapshot.request_id,
                        status = status.as_u16(),
                        body_error = %error,
                        "could not read the approval service error body"
                    );
                    format!("<unreadable body: {error}>")
                }
            };
            warn!(
                event_name = "approval.client.rejected",
                request_id = %snapshot.request_id,
                status = status.as_u16(),
                body = %body,
                "approval service returned a non-success status"
            );
            return Err(GatewayError::Status { status: status.as_u16(), body });
        }

        response.json::<ApprovalDecision>().await.map_err(|error| {
            if error.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Decode(error.to_string())
            }
        })
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(error.to_string())
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_PREVIEW_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}

//! Client for the upstream REST API.
//!
//! Everything the portal shows comes from here. The [`Backend`] trait is the
//! seam the rest of the service depends on, so tests can swap in a stub.

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde_json::Value;
use service_core::error::AppError;
use std::time::Duration;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::models::{normalize_list, Normalize};

/// Upstream collections the portal reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Clients,
    Invoices,
    Payments,
    PaymentLinks,
    ServiceRequests,
    Subscriptions,
    AuditLogs,
    SystemSettings,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Users => "/api/users",
            Resource::Clients => "/api/clients",
            Resource::Invoices => "/api/invoices",
            Resource::Payments => "/api/payments",
            Resource::PaymentLinks => "/api/payment-links",
            Resource::ServiceRequests => "/api/service-requests",
            Resource::Subscriptions => "/api/subscriptions",
            Resource::AuditLogs => "/api/audit-logs",
            Resource::SystemSettings => "/api/system-settings",
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Clients => "clients",
            Resource::Invoices => "invoices",
            Resource::Payments => "payments",
            Resource::PaymentLinks => "payment_links",
            Resource::ServiceRequests => "service_requests",
            Resource::Subscriptions => "subscriptions",
            Resource::AuditLogs => "audit_logs",
            Resource::SystemSettings => "system_settings",
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream unreachable: {0}")]
    Transport(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream returned an unreadable body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout => AppError::GatewayTimeout(err.to_string()),
            UpstreamError::Status { status: 401, .. } => {
                AppError::Unauthorized(anyhow::anyhow!("Upstream rejected credentials"))
            }
            UpstreamError::Status { status: 403, .. } => {
                AppError::Forbidden(anyhow::anyhow!("Upstream denied access"))
            }
            UpstreamError::Status { status: 404, .. } => {
                AppError::NotFound(anyhow::anyhow!("Upstream resource not found"))
            }
            UpstreamError::Status { status: 400, body } => {
                AppError::BadRequest(anyhow::anyhow!("Upstream rejected request: {}", body))
            }
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Operations the portal needs from the upstream API.
#[async_trait]
pub trait Backend: Send + Sync {
    /// GET a collection, optionally filtered by query parameters.
    async fn fetch(&self, resource: Resource, query: &[(&str, String)])
        -> Result<Value, UpstreamError>;

    /// PUT a whole object to a resource.
    async fn replace(&self, resource: Resource, body: &Value) -> Result<Value, UpstreamError>;

    /// POST to an arbitrary path on behalf of the caller.
    async fn post(
        &self,
        path: &str,
        body: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, UpstreamError>;
}

/// Fetch a collection and normalize it, recording failures per resource.
pub async fn fetch_list<R>(
    backend: &dyn Backend,
    resource: Resource,
    query: &[(&str, String)],
) -> Result<Vec<R::Output>, UpstreamError>
where
    R: DeserializeOwned + Normalize,
{
    match backend.fetch(resource, query).await {
        Ok(payload) => Ok(normalize_list::<R>(payload)),
        Err(e) => {
            record_failure(resource);
            tracing::warn!(resource = resource.label(), error = %e, "Upstream fetch failed");
            Err(e)
        }
    }
}

pub fn record_failure(resource: Resource) {
    counter!("upstream_failures_total", "resource" => resource.label()).increment(1);
}

/// [`Backend`] over HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_token: Option<Secret<String>>,
}

impl HttpBackend {
    pub fn new(config: &UpstreamConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        authorization: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match (authorization, &self.api_token) {
            (Some(header), _) => request.header(reqwest::header::AUTHORIZATION, header),
            (None, Some(token)) => request.bearer_auth(token.expose_secret()),
            (None, None) => request,
        }
    }

    async fn read(response: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(
        &self,
        resource: Resource,
        query: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let url = self.url(resource.path());
        let request = self.authorize(self.client.get(&url).query(query), None);
        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send GET request to {}: {}", url, e);
            UpstreamError::from(e)
        })?;
        Self::read(response).await
    }

    async fn replace(&self, resource: Resource, body: &Value) -> Result<Value, UpstreamError> {
        let url = self.url(resource.path());
        let request = self.authorize(self.client.put(&url).json(body), None);
        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send PUT request to {}: {}", url, e);
            UpstreamError::from(e)
        })?;
        Self::read(response).await
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let url = self.url(path);
        let request = self.authorize(self.client.post(&url).json(body), authorization);
        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send POST request to {}: {}", url, e);
            UpstreamError::from(e)
        })?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as HttpStatus;

    #[test]
    fn status_errors_map_to_app_errors() {
        let cases = [
            (401, HttpStatus::UNAUTHORIZED),
            (403, HttpStatus::FORBIDDEN),
            (404, HttpStatus::NOT_FOUND),
            (400, HttpStatus::BAD_REQUEST),
            (500, HttpStatus::BAD_GATEWAY),
        ];
        for (status, expected) in cases {
            let err: AppError = UpstreamError::Status {
                status,
                body: String::new(),
            }
            .into();
            assert_eq!(err.status_code(), expected, "upstream {status}");
        }
        let timeout: AppError = UpstreamError::Timeout.into();
        assert_eq!(timeout.status_code(), HttpStatus::GATEWAY_TIMEOUT);
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let backend = HttpBackend::new(&UpstreamConfig {
            base_url: "http://api.local/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.url(Resource::Invoices.path()), "http://api.local/api/invoices");
    }
}

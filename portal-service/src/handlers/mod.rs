//! HTTP handlers for portal-service.

pub mod audit;
pub mod dashboard;
pub mod health;
pub mod mfa;
pub mod notifications;
pub mod settings;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;

/// Header identifying the portal session that owns a notification queue.
pub const SESSION_HEADER: &str = "x-portal-session";

fn session_id(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
}

/// The caller's portal session; rejects requests without one.
#[derive(Debug, Clone)]
pub struct PortalSession(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for PortalSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_id(parts).map(PortalSession).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Missing {} header", SESSION_HEADER))
        })
    }
}

/// The caller's portal session, when one was sent.
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalSession(session_id(parts)))
    }
}

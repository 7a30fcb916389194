use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use validator::Validate;

use super::PortalSession;
use crate::models::{Notification, NotificationKind};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShowNotificationRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
    #[validate(range(max = 600_000))]
    pub duration_ms: Option<u64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    PortalSession(session): PortalSession,
) -> Json<Vec<Notification>> {
    Json(state.notifications.list(&session))
}

pub async fn show_notification(
    State(state): State<AppState>,
    PortalSession(session): PortalSession,
    Json(request): Json<ShowNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let handle = state.notifications.show(
        &session,
        request.kind,
        request.title,
        request.message,
        request.duration_ms,
    );

    Ok((StatusCode::CREATED, Json(json!({ "id": handle.id() }))))
}

pub async fn dismiss_notification(
    State(state): State<AppState>,
    PortalSession(session): PortalSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.notifications.dismiss(&session, &id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Notification {} not found",
            id
        )))
    }
}

/// Tear down the session's queue and cancel its pending expiry timers.
pub async fn clear_notifications(
    State(state): State<AppState>,
    PortalSession(session): PortalSession,
) -> Json<serde_json::Value> {
    let discarded = state.notifications.unsubscribe(&session);
    tracing::debug!(session = %session, discarded, "Notification queue closed");
    Json(json!({ "discarded": discarded }))
}

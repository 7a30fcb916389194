use axum::{extract::State, Json};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::SettingsPatch;
use crate::services::VersionedSettings;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSettingsRequest {
    pub expected_version: u64,
    #[serde(default)]
    pub changes: SettingsPatch,
}

pub async fn get_settings(State(state): State<AppState>) -> Json<VersionedSettings> {
    Json(state.settings.snapshot().await)
}

/// 409 when `expectedVersion` is stale, 422 when the merged record is invalid.
pub async fn patch_settings(
    State(state): State<AppState>,
    Json(request): Json<PatchSettingsRequest>,
) -> Result<Json<VersionedSettings>, AppError> {
    if request.changes.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No changes supplied")));
    }

    let updated = state
        .settings
        .patch(
            request.expected_version,
            &request.changes,
            state.backend.as_ref(),
        )
        .await?;

    Ok(Json(updated))
}

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

use crate::services::mfa::{
    extract_backup_codes, forward, render_backup_codes_file, BackupCodesRequest, MfaAction,
    MfaTokenRequest, BACKUP_CODES_FILENAME,
};
use crate::AppState;

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

pub async fn setup_totp(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let response = forward(
        state.backend.as_ref(),
        &state.logger,
        MfaAction::SetupTotp,
        json!({}),
        authorization(&headers),
    )
    .await?;
    Ok(Json(response))
}

pub async fn enable_mfa(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MfaTokenRequest>,
) -> Result<Json<Value>, AppError> {
    request.validate()?;
    let response = forward(
        state.backend.as_ref(),
        &state.logger,
        MfaAction::Enable,
        json!({ "token": request.token }),
        authorization(&headers),
    )
    .await?;
    Ok(Json(response))
}

pub async fn disable_mfa(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MfaTokenRequest>,
) -> Result<Json<Value>, AppError> {
    request.validate()?;
    let response = forward(
        state.backend.as_ref(),
        &state.logger,
        MfaAction::Disable,
        json!({ "token": request.token }),
        authorization(&headers),
    )
    .await?;
    Ok(Json(response))
}

pub async fn generate_backup_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let mut response = forward(
        state.backend.as_ref(),
        &state.logger,
        MfaAction::GenerateBackupCodes,
        json!({}),
        authorization(&headers),
    )
    .await?;

    // Older upstreams nest the list or use snake_case; the portal reads `backupCodes`.
    let codes = extract_backup_codes(&response);
    if let Value::Object(map) = &mut response {
        map.entry("backupCodes").or_insert_with(|| json!(codes));
    }
    Ok(Json(response))
}

/// Plain-text file of the codes the caller was just shown.
pub async fn download_backup_codes(
    Json(request): Json<BackupCodesRequest>,
) -> Result<Response, AppError> {
    request.validate()?;
    let body = render_backup_codes_file(&request.codes, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", BACKUP_CODES_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}

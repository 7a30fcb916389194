//! MFA endpoints proxied to the upstream auth API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::observability::SecureLogger;
use validator::Validate;

use crate::services::upstream::Backend;

pub const BACKUP_CODES_FILENAME: &str = "mfa-backup-codes.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaAction {
    SetupTotp,
    Enable,
    Disable,
    GenerateBackupCodes,
}

impl MfaAction {
    pub fn path(&self) -> &'static str {
        match self {
            MfaAction::SetupTotp => "/api/auth/mfa/setup-totp",
            MfaAction::Enable => "/api/auth/mfa/enable",
            MfaAction::Disable => "/api/auth/mfa/disable",
            MfaAction::GenerateBackupCodes => "/api/auth/mfa/generate-backup-codes",
        }
    }
}

/// One-time code from an authenticator app (or a backup code when disabling).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MfaTokenRequest {
    #[validate(length(min = 6, max = 16))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BackupCodesRequest {
    #[validate(length(min = 1, max = 32))]
    pub codes: Vec<String>,
}

/// Relay an MFA call upstream with the caller's credentials.
///
/// Bodies carry one-time codes, and a masked code still shows most of its
/// digits, so log lines only name the fields that were sent.
pub async fn forward(
    backend: &dyn Backend,
    logger: &SecureLogger,
    action: MfaAction,
    body: Value,
    authorization: Option<&str>,
) -> Result<Value, AppError> {
    if authorization.is_none() {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Missing Authorization header"
        )));
    }

    let context = log_context(action, &body, None);
    logger.debug(&format!("MFA request to {}", action.path()), Some(&context));

    backend
        .post(action.path(), &body, authorization)
        .await
        .map_err(|e| {
            let context = log_context(action, &body, Some(&e.to_string()));
            logger.error(
                &format!("MFA request to {} failed", action.path()),
                Some(&context),
            );
            AppError::from(e)
        })
}

fn log_context(action: MfaAction, body: &Value, error: Option<&str>) -> Value {
    let fields: Vec<&str> = body
        .as_object()
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default();
    let mut context = serde_json::json!({ "path": action.path(), "fields": fields });
    if let Some(error) = error {
        context["error"] = Value::String(error.to_string());
    }
    context
}

/// Pull the code list out of a `generate-backup-codes` response.
pub fn extract_backup_codes(response: &Value) -> Vec<String> {
    let list = response
        .get("backupCodes")
        .or_else(|| response.get("backup_codes"))
        .or_else(|| response.get("codes"))
        .or_else(|| response.get("data").and_then(|data| data.get("backupCodes")));

    list.and_then(Value::as_array)
        .map(|codes| {
            codes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn render_backup_codes_file(codes: &[String], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("TechProcessing LLC - MFA Backup Codes\n");
    out.push_str("=====================================\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str("Keep these codes somewhere safe. Each code can be used once to sign in\n");
    out.push_str("if you lose access to your authenticator app.\n\n");
    for (i, code) in codes.iter().enumerate() {
        out.push_str(&format!("{:>2}. {}\n", i + 1, code));
    }
    out.push_str("\nGenerating new backup codes invalidates all previous codes.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn backup_file_follows_template() {
        let at = Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap();
        let codes = vec!["AAAA-1111".to_string(), "BBBB-2222".to_string()];
        let file = render_backup_codes_file(&codes, at);

        assert!(file.starts_with("TechProcessing LLC - MFA Backup Codes\n"));
        assert!(file.contains("Generated: 2024-06-15 09:30:00 UTC"));
        assert!(file.contains(" 1. AAAA-1111\n"));
        assert!(file.contains(" 2. BBBB-2222\n"));
        assert!(file.ends_with("invalidates all previous codes.\n"));
    }

    #[test]
    fn extracts_codes_from_known_shapes() {
        assert_eq!(extract_backup_codes(&json!({ "backupCodes": ["a", "b"] })), ["a", "b"]);
        assert_eq!(extract_backup_codes(&json!({ "data": { "backupCodes": ["c"] } })), ["c"]);
        assert!(extract_backup_codes(&json!({ "ok": true })).is_empty());
    }

    #[test]
    fn token_length_is_validated() {
        assert!(MfaTokenRequest { token: "123".into() }.validate().is_err());
        assert!(MfaTokenRequest { token: "123456".into() }.validate().is_ok());
        assert!(BackupCodesRequest { codes: vec![] }.validate().is_err());
    }

    #[test]
    fn log_context_names_fields_without_values() {
        let body = json!({ "token": "482913", "codes": ["AAAA-1111"] });
        let context = log_context(MfaAction::Disable, &body, Some("upstream 500"));
        let rendered = context.to_string();

        assert!(!rendered.contains("4829"));
        assert!(!rendered.contains("AAAA"));
        assert_eq!(context["path"], "/api/auth/mfa/disable");
        assert_eq!(context["error"], "upstream 500");
        let mut fields: Vec<_> = context["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f.as_str().unwrap())
            .collect();
        fields.sort();
        assert_eq!(fields, ["codes", "token"]);
    }

    #[test]
    fn paths_match_upstream_routes() {
        assert_eq!(MfaAction::Enable.path(), "/api/auth/mfa/enable");
        assert_eq!(
            MfaAction::GenerateBackupCodes.path(),
            "/api/auth/mfa/generate-backup-codes"
        );
    }
}

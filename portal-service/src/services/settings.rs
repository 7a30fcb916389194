//! Versioned system settings with optimistic concurrency.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use tokio::sync::RwLock;
use validator::Validate;

use crate::models::{SettingsPatch, SystemSettings};
use crate::services::upstream::{record_failure, Backend, Resource};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedSettings {
    pub version: u64,
    pub settings: SystemSettings,
    pub updated_at: DateTime<Utc>,
    /// False while the record is local defaults that upstream never confirmed.
    pub synced: bool,
}

pub struct SettingsStore {
    current: RwLock<VersionedSettings>,
}

impl SettingsStore {
    pub fn new(settings: SystemSettings) -> Self {
        Self::with_record(settings, true)
    }

    /// Defaults that must be reconciled with upstream before any save.
    pub fn unsynced() -> Self {
        Self::with_record(SystemSettings::default(), false)
    }

    fn with_record(settings: SystemSettings, synced: bool) -> Self {
        Self {
            current: RwLock::new(VersionedSettings {
                version: 1,
                settings,
                updated_at: Utc::now(),
                synced,
            }),
        }
    }

    /// Seed from upstream, falling back to unsynced defaults if it cannot be read.
    pub async fn load_from(backend: &dyn Backend) -> Self {
        match fetch_settings(backend).await {
            Ok(settings) => Self::new(settings),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Could not load settings, serving defaults until upstream answers"
                );
                Self::unsynced()
            }
        }
    }

    pub async fn snapshot(&self) -> VersionedSettings {
        self.current.read().await.clone()
    }

    /// Apply `patch` if `expected_version` is still current.
    ///
    /// The merged record is validated and pushed upstream before it is
    /// committed locally; a failed push leaves the stored version untouched.
    pub async fn patch(
        &self,
        expected_version: u64,
        patch: &SettingsPatch,
        backend: &dyn Backend,
    ) -> Result<VersionedSettings, AppError> {
        let mut current = self.current.write().await;

        // Unsynced defaults never reach upstream. Adopting the real record
        // bumps the version, so the caller has to re-read before retrying.
        if !current.synced {
            let settings = fetch_settings(backend).await.map_err(|e| {
                tracing::warn!(error = %e, "Settings still unreadable upstream, refusing save");
                AppError::ServiceUnavailable
            })?;
            *current = VersionedSettings {
                version: current.version + 1,
                settings,
                updated_at: Utc::now(),
                synced: true,
            };
            tracing::info!(version = current.version, "System settings synced from upstream");
        }

        if current.version != expected_version {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Settings changed since version {}; current version is {}",
                expected_version,
                current.version
            )));
        }

        let merged = patch.apply_to(&current.settings);
        merged.validate()?;

        if merged == current.settings {
            return Ok(current.clone());
        }

        let body = serde_json::to_value(&merged)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Serialize settings: {}", e)))?;
        backend
            .replace(Resource::SystemSettings, &body)
            .await
            .map_err(|e| {
                record_failure(Resource::SystemSettings);
                tracing::error!(error = %e, "Failed to persist settings upstream");
                AppError::from(e)
            })?;

        *current = VersionedSettings {
            version: current.version + 1,
            settings: merged,
            updated_at: Utc::now(),
            synced: true,
        };
        tracing::info!(version = current.version, "System settings updated");

        Ok(current.clone())
    }
}

async fn fetch_settings(backend: &dyn Backend) -> Result<SystemSettings, String> {
    let payload = backend
        .fetch(Resource::SystemSettings, &[])
        .await
        .map_err(|e| {
            record_failure(Resource::SystemSettings);
            e.to_string()
        })?;
    decode_settings(payload).map_err(|e| format!("unreadable settings payload: {}", e))
}

fn decode_settings(payload: Value) -> Result<SystemSettings, serde_json::Error> {
    let inner = match payload {
        Value::Object(mut map) if matches!(map.get("data"), Some(Value::Object(_))) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_bare_and_enveloped_payloads() {
        let bare = decode_settings(json!({ "general": { "companyName": "A" } })).unwrap();
        assert_eq!(bare.general.company_name, "A");

        let wrapped =
            decode_settings(json!({ "data": { "general": { "companyName": "B" } } })).unwrap();
        assert_eq!(wrapped.general.company_name, "B");
    }

    #[test]
    fn rejects_wrongly_typed_payload() {
        assert!(decode_settings(json!({ "security": { "mfaRequired": "sometimes" } })).is_err());
    }

    #[tokio::test]
    async fn new_store_starts_at_version_one() {
        let store = SettingsStore::new(SystemSettings::default());
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.synced);
        assert!(!SettingsStore::unsynced().snapshot().await.synced);
    }
}

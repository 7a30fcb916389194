use config::{Config as Cfg, File};
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::DEFAULT_ALLOWED_ORIGINS;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Service credential sent when the caller did not supply one.
    #[serde(default)]
    pub api_token: Option<Secret<String>>,
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            api_token: None,
            timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_duration_ms")]
    pub default_duration_ms: u64,
    #[serde(default = "default_error_duration_ms")]
    pub error_duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration_ms(),
            error_duration_ms: default_error_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    /// Serve generated placeholder entries when the upstream log is unreachable.
    #[serde(default)]
    pub demo_fallback: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            fetch_limit: default_fetch_limit(),
            demo_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl DashboardConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

fn default_upstream_timeout_ms() -> u64 {
    10_000
}

fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
}

fn default_duration_ms() -> u64 {
    5_000
}

fn default_error_duration_ms() -> u64 {
    7_000
}

fn default_fetch_limit() -> usize {
    1_000
}

fn default_fetch_timeout_ms() -> u64 {
    8_000
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
            notifications: NotificationConfig::default(),
            audit: AuditConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl PortalConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("portal-service/config/base").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: PortalConfig = config.try_deserialize()?;

        if loaded.common.environment.is_production() && loaded.upstream.api_token.is_none() {
            tracing::warn!("No upstream service token configured; relying on caller credentials");
        }

        Ok(loaded)
    }
}

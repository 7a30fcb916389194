pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use config::PortalConfig;
use service_core::middleware::CorsPolicy;
use service_core::observability::SecureLogger;
use services::{Backend, NotificationHub, SettingsStore};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub backend: Arc<dyn Backend>,
    pub notifications: NotificationHub,
    pub settings: Arc<SettingsStore>,
    pub cors: Arc<CorsPolicy>,
    pub logger: SecureLogger,
}

impl AppState {
    pub fn new(config: PortalConfig, backend: Arc<dyn Backend>, settings: SettingsStore) -> Self {
        Self {
            notifications: NotificationHub::new(&config.notifications),
            cors: Arc::new(CorsPolicy::new(&config.cors.allowed_origins)),
            logger: SecureLogger::new(config.common.environment),
            settings: Arc::new(settings),
            backend,
            config: Arc::new(config),
        }
    }
}

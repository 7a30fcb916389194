//! Router construction and server lifecycle.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    cors_middleware, metrics_middleware, request_id_middleware, security_headers_middleware,
    REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::PortalConfig;
use crate::handlers::{audit, dashboard, health, mfa, notifications, settings};
use crate::services::{Backend, HttpBackend, SettingsStore};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/notifications",
            get(notifications::list_notifications)
                .post(notifications::show_notification)
                .delete(notifications::clear_notifications),
        )
        .route(
            "/notifications/:id",
            delete(notifications::dismiss_notification),
        )
        .route("/audit-logs", get(audit::list_audit_logs))
        .route("/audit-logs/stats", get(audit::audit_stats))
        .route("/audit-logs/export", get(audit::export_audit_logs))
        .route("/dashboard/admin", get(dashboard::admin_dashboard))
        .route("/dashboard/clients/:id", get(dashboard::client_dashboard))
        .route("/dashboard/agents/:id", get(dashboard::agent_dashboard))
        .route(
            "/settings",
            get(settings::get_settings).patch(settings::patch_settings),
        )
        .route("/mfa/setup-totp", post(mfa::setup_totp))
        .route("/mfa/enable", post(mfa::enable_mfa))
        .route("/mfa/disable", post(mfa::disable_mfa))
        .route("/mfa/backup-codes", post(mfa::generate_backup_codes))
        .route(
            "/mfa/backup-codes/download",
            post(mfa::download_backup_codes),
        );

    let cors = state.cors.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .nest("/api", api)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn_with_state(cors, cors_middleware))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build against the configured upstream.
    pub async fn build(config: PortalConfig) -> Result<Self, AppError> {
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config.upstream)?);
        Self::build_with_backend(config, backend).await
    }

    /// Build against any [`Backend`]; tests pass a stub here.
    pub async fn build_with_backend(
        config: PortalConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, AppError> {
        let settings = SettingsStore::load_from(backend.as_ref()).await;
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let state = AppState::new(config, backend, settings);

        // Port 0 binds a random port for testing.
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            environment = state.config.common.environment.as_str(),
            allowed_origins = state.cors.allowed_origins().len(),
            "Portal service listening"
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

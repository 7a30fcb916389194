use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;

use super::OptionalSession;
use crate::services::dashboard::{self, AdminStats, AgentStats, ClientStats, DashboardLoad};
use crate::AppState;

/// Surface a partial-data warning to the caller's session, once per load.
fn announce<T: Serialize>(state: &AppState, session: &OptionalSession, load: &DashboardLoad<T>) {
    if let (Some(warning), OptionalSession(Some(session))) = (&load.warning, session) {
        state
            .notifications
            .show_warning(session, "Dashboard", Some(warning.clone()));
    }
}

fn check_id(kind: &str, id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() || id.len() > 64 {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid {} id", kind)));
    }
    Ok(())
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    session: OptionalSession,
) -> Json<DashboardLoad<AdminStats>> {
    let load = dashboard::load_admin(
        state.backend.as_ref(),
        state.config.dashboard.fetch_timeout(),
    )
    .await;
    announce(&state, &session, &load);
    Json(load)
}

pub async fn client_dashboard(
    State(state): State<AppState>,
    session: OptionalSession,
    Path(client_id): Path<String>,
) -> Result<Json<DashboardLoad<ClientStats>>, AppError> {
    check_id("client", &client_id)?;
    let load = dashboard::load_client(
        state.backend.as_ref(),
        &client_id,
        state.config.dashboard.fetch_timeout(),
    )
    .await;
    announce(&state, &session, &load);
    Ok(Json(load))
}

pub async fn agent_dashboard(
    State(state): State<AppState>,
    session: OptionalSession,
    Path(agent_id): Path<String>,
) -> Result<Json<DashboardLoad<AgentStats>>, AppError> {
    check_id("agent", &agent_id)?;
    let load = dashboard::load_agent(
        state.backend.as_ref(),
        &agent_id,
        state.config.dashboard.fetch_timeout(),
    )
    .await;
    announce(&state, &session, &load);
    Ok(Json(load))
}

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::models::AuditLog;
use crate::services::audit::{
    caller_offset, compute_stats, csv_filename, export_csv, filter_logs, placeholder_logs,
    sort_logs, AuditFilter, AuditSource, AuditStats, DateRange, SortKey, SortOrder,
    PLACEHOLDER_COUNT,
};
use crate::AppState;

/// Query string accepted by the audit endpoints. Unknown values fall back to
/// "no filter" rather than rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub search: Option<String>,
    pub action: Option<String>,
    pub user: Option<String>,
    pub severity: Option<String>,
    pub date_range: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    /// Minutes west of UTC, as reported by the browser.
    pub tz_offset: Option<String>,
}

impl AuditQuery {
    fn filter(&self) -> AuditFilter {
        AuditFilter {
            search: self.search.clone(),
            action: AuditFilter::selection(self.action.clone()),
            user: AuditFilter::selection(self.user.clone()),
            severity: AuditFilter::selection(self.severity.clone()),
            date_range: self
                .date_range
                .as_deref()
                .map(DateRange::parse)
                .unwrap_or_default(),
        }
    }

    fn sort(&self) -> (SortKey, SortOrder) {
        (
            self.sort_by.as_deref().map(SortKey::parse).unwrap_or_default(),
            self.sort_order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
        )
    }

    fn clock(&self) -> CallerClock {
        let offset = self
            .tz_offset
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .and_then(caller_offset);
        match offset {
            Some(offset) => CallerClock::Offset(Utc::now().with_timezone(&offset)),
            None => CallerClock::Server(Local::now()),
        }
    }

    /// Filtered and ordered copy of `logs`.
    fn view(&self, logs: &[AuditLog], clock: &CallerClock) -> Vec<AuditLog> {
        let mut view = clock.filter(logs, &self.filter());
        let (key, order) = self.sort();
        sort_logs(&mut view, key, order);
        view
    }
}

/// "Now" as the caller sees it. Day windows are cut at the caller's midnight;
/// without a `tzOffset` the server's zone is used.
enum CallerClock {
    Offset(DateTime<FixedOffset>),
    Server(DateTime<Local>),
}

impl CallerClock {
    fn filter(&self, logs: &[AuditLog], filter: &AuditFilter) -> Vec<AuditLog> {
        match self {
            CallerClock::Offset(now) => filter_logs(logs, filter, now),
            CallerClock::Server(now) => filter_logs(logs, filter, now),
        }
    }

    fn stats(&self, logs: &[AuditLog]) -> AuditStats {
        match self {
            CallerClock::Offset(now) => compute_stats(logs, now),
            CallerClock::Server(now) => compute_stats(logs, now),
        }
    }

    fn today(&self) -> NaiveDate {
        match self {
            CallerClock::Offset(now) => now.date_naive(),
            CallerClock::Server(now) => now.date_naive(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub logs: Vec<AuditLog>,
    pub total: usize,
    pub filtered_total: usize,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Generated sample entries, only when the live source is unavailable and
    /// the demo fallback is enabled. Never mixed into `logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Vec<AuditLog>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatsResponse {
    pub stats: AuditStats,
    pub source: &'static str,
}

async fn load(state: &AppState) -> AuditSource {
    AuditSource::load(state.backend.as_ref(), state.config.audit.fetch_limit).await
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<AuditLogResponse> {
    let source = load(&state).await;
    let clock = query.clock();
    let logs = query.view(source.records(), &clock);

    let (warning, placeholder) = match &source {
        AuditSource::Unavailable(reason) => {
            tracing::warn!(reason = %reason, "Audit log source unavailable");
            let placeholder = state.config.audit.demo_fallback.then(|| {
                query.view(&placeholder_logs(PLACEHOLDER_COUNT, Utc::now()), &clock)
            });
            (Some("Audit logs are currently unavailable.".to_string()), placeholder)
        }
        _ => (None, None),
    };

    Json(AuditLogResponse {
        total: source.records().len(),
        filtered_total: logs.len(),
        logs,
        source: source.kind(),
        warning,
        placeholder,
    })
}

pub async fn audit_stats(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<AuditStatsResponse> {
    let source = load(&state).await;
    Json(AuditStatsResponse {
        stats: query.clock().stats(source.records()),
        source: source.kind(),
    })
}

/// CSV of the current filtered view.
pub async fn export_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Response, AppError> {
    let source = load(&state).await;
    if let AuditSource::Unavailable(reason) = &source {
        return Err(AppError::BadGateway(reason.clone()));
    }

    let clock = query.clock();
    let logs = query.view(source.records(), &clock);
    let filename = csv_filename(clock.today());
    tracing::info!(rows = logs.len(), filename = %filename, "Exporting audit logs");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        export_csv(&logs),
    )
        .into_response())
}

//! Audit trail filtering, ordering, statistics and CSV export.
//!
//! All functions here are pure over an already-normalized slice of
//! [`AuditLog`]s; "now" is passed in so date-range behavior is testable in any
//! time zone.

use chrono::{
    DateTime, Duration, FixedOffset, Months, NaiveDate, SecondsFormat, TimeZone, Utc,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{normalize_counted, AuditLog, RawAuditLog};
use crate::services::upstream::{record_failure, Backend, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Yesterday,
    LastWeek,
    LastMonth,
}

impl DateRange {
    /// Unrecognized values mean no date constraint.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "today" => DateRange::Today,
            "yesterday" => DateRange::Yesterday,
            "lastWeek" | "last_week" | "week" => DateRange::LastWeek,
            "lastMonth" | "last_month" | "month" => DateRange::LastMonth,
            _ => DateRange::All,
        }
    }

    /// Half-open `[start, end)` window relative to local midnight of `now`.
    pub fn bounds<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let today = now.date_naive();
        let midnight = |date: NaiveDate| local_midnight(&now.timezone(), date);
        match self {
            DateRange::All => (None, None),
            DateRange::Today => (midnight(today), None),
            DateRange::Yesterday => {
                let start = today.pred_opt().and_then(midnight);
                (start, midnight(today))
            }
            DateRange::LastWeek => (
                today
                    .checked_sub_signed(Duration::days(7))
                    .and_then(midnight),
                None,
            ),
            DateRange::LastMonth => (
                today.checked_sub_months(Months::new(1)).and_then(midnight),
                None,
            ),
        }
    }

    pub fn contains<Tz: TimeZone>(&self, timestamp: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
        let (start, end) = self.bounds(now);
        start.map_or(true, |start| *timestamp >= start) && end.map_or(true, |end| *timestamp < end)
    }
}

/// Zone for a browser-reported offset in minutes, signed like JavaScript's
/// `Date#getTimezoneOffset` (UTC-5 is `300`). Offsets beyond ±14h are rejected.
pub fn caller_offset(minutes: i32) -> Option<FixedOffset> {
    if minutes.abs() > 14 * 60 {
        return None;
    }
    FixedOffset::west_opt(minutes * 60)
}

/// Start of `date` in `tz`, as UTC. Falls back to the earliest valid instant
/// when midnight does not exist locally.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            naive
                .checked_add_signed(Duration::hours(1))
                .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        })
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Timestamp,
    Action,
    User,
    Severity,
    Ip,
}

impl SortKey {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "action" => SortKey::Action,
            "user" | "userName" => SortKey::User,
            "severity" => SortKey::Severity,
            "ip" | "ipAddress" => SortKey::Ip,
            _ => SortKey::Timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

/// Criteria applied by [`filter_logs`]. `None` means unfiltered.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub search: Option<String>,
    pub action: Option<String>,
    pub user: Option<String>,
    pub severity: Option<String>,
    pub date_range: DateRange,
}

impl AuditFilter {
    /// Normalizes a select value: empty or `all` means no filter.
    pub fn selection(raw: Option<String>) -> Option<String> {
        raw.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
    }

    fn matches<Tz: TimeZone>(&self, log: &AuditLog, needle: Option<&str>, now: &DateTime<Tz>) -> bool {
        if let Some(needle) = needle {
            let hit = [&log.action, &log.description, &log.user_name, &log.ip_address]
                .iter()
                .any(|field| field.to_lowercase().contains(needle));
            if !hit {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if log.action != *action {
                return false;
            }
        }
        if let Some(user) = &self.user {
            if log.user_name != *user {
                return false;
            }
        }
        if let Some(severity) = &self.severity {
            if !log.severity.eq_ignore_ascii_case(severity) {
                return false;
            }
        }
        self.date_range.contains(&log.timestamp, now)
    }
}

/// Search, then exact-match selects, then the date window.
pub fn filter_logs<Tz: TimeZone>(
    logs: &[AuditLog],
    filter: &AuditFilter,
    now: &DateTime<Tz>,
) -> Vec<AuditLog> {
    let needle = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    logs.iter()
        .filter(|log| filter.matches(log, needle.as_deref(), now))
        .cloned()
        .collect()
}

/// Stable sort; equal keys keep their input order in both directions.
pub fn sort_logs(logs: &mut [AuditLog], key: SortKey, order: SortOrder) {
    let compare = |a: &AuditLog, b: &AuditLog| -> Ordering {
        match key {
            SortKey::Timestamp => a.timestamp.cmp(&b.timestamp),
            SortKey::Action => a.action.to_lowercase().cmp(&b.action.to_lowercase()),
            SortKey::User => a.user_name.to_lowercase().cmp(&b.user_name.to_lowercase()),
            SortKey::Severity => a.severity.cmp(&b.severity),
            SortKey::Ip => a.ip_address.cmp(&b.ip_address),
        }
    };
    match order {
        SortOrder::Asc => logs.sort_by(compare),
        SortOrder::Desc => logs.sort_by(|a, b| compare(b, a)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub today: usize,
    pub critical: usize,
    pub user_actions: usize,
    pub system_actions: usize,
    pub security_events: usize,
    pub admin_actions: usize,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Keyword-bucketed counters. Buckets overlap: one entry can count toward
/// several of them.
pub fn compute_stats<Tz: TimeZone>(logs: &[AuditLog], now: &DateTime<Tz>) -> AuditStats {
    let (today_start, _) = DateRange::Today.bounds(now);
    let mut stats = AuditStats {
        total: logs.len(),
        ..AuditStats::default()
    };

    for log in logs {
        let action = log.action.to_lowercase();
        let category = log.category.as_str();
        let severity = log.severity.as_str();

        if today_start.map_or(false, |start| log.timestamp >= start) {
            stats.today += 1;
        }
        if matches!(severity, "critical" | "error")
            || contains_any(&action, &["delete", "remove", "security", "auth"])
        {
            stats.critical += 1;
        }
        if category == "user" || contains_any(&action, &["user", "login", "logout", "profile"]) {
            stats.user_actions += 1;
        }
        if category == "system"
            || contains_any(&action, &["system", "backup", "config", "setting"])
        {
            stats.system_actions += 1;
        }
        if matches!(category, "security" | "auth")
            || contains_any(
                &action,
                &["security", "auth", "login", "password", "mfa", "permission"],
            )
        {
            stats.security_events += 1;
        }
        if category == "admin"
            || contains_any(&action, &["admin", "delete", "create", "update", "role"])
        {
            stats.admin_actions += 1;
        }
    }

    stats
}

const CSV_COLUMNS: [&str; 7] = [
    "Timestamp",
    "Action",
    "User",
    "Severity",
    "Category",
    "IP Address",
    "Description",
];

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Header row followed by one quoted row per entry, each newline-terminated.
pub fn export_csv(logs: &[AuditLog]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');
    for log in logs {
        let timestamp = log.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let row = [
            timestamp.as_str(),
            log.action.as_str(),
            log.user_name.as_str(),
            log.severity.as_str(),
            log.category.as_str(),
            log.ip_address.as_str(),
            log.description.as_str(),
        ]
        .map(quote)
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

pub fn csv_filename(date: NaiveDate) -> String {
    format!("audit-logs-{}.csv", date.format("%Y-%m-%d"))
}

/// Outcome of loading the audit trail from upstream.
#[derive(Debug, Clone)]
pub enum AuditSource {
    Live(Vec<AuditLog>),
    Empty,
    Unavailable(String),
}

impl AuditSource {
    /// A payload whose records are all unreadable counts as unavailable, not
    /// as an empty trail.
    pub async fn load(backend: &dyn Backend, limit: usize) -> Self {
        let query = [("limit", limit.to_string())];
        let payload = match backend.fetch(Resource::AuditLogs, &query).await {
            Ok(payload) => payload,
            Err(e) => {
                record_failure(Resource::AuditLogs);
                tracing::warn!(error = %e, "Audit log fetch failed");
                return AuditSource::Unavailable(e.to_string());
            }
        };

        match normalize_counted::<RawAuditLog>(payload) {
            (_, mut logs) if !logs.is_empty() => {
                logs.truncate(limit);
                AuditSource::Live(logs)
            }
            (0, _) => AuditSource::Empty,
            (received, _) => {
                record_failure(Resource::AuditLogs);
                tracing::warn!(received, "No readable audit records in upstream payload");
                AuditSource::Unavailable(format!(
                    "upstream returned {} audit records, none readable",
                    received
                ))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuditSource::Live(_) => "live",
            AuditSource::Empty => "empty",
            AuditSource::Unavailable(_) => "unavailable",
        }
    }

    /// Live records only; never includes placeholders.
    pub fn records(&self) -> &[AuditLog] {
        match self {
            AuditSource::Live(logs) => logs,
            _ => &[],
        }
    }
}

pub const PLACEHOLDER_COUNT: usize = 50;

const DEMO_ACTIONS: [(&str, &str, &str); 10] = [
    ("USER_LOGIN", "auth", "info"),
    ("USER_LOGOUT", "auth", "info"),
    ("INVOICE_CREATE", "billing", "info"),
    ("INVOICE_UPDATE", "billing", "info"),
    ("PAYMENT_REFUND", "billing", "warning"),
    ("USER_DELETE", "admin", "warning"),
    ("SETTINGS_UPDATE", "system", "info"),
    ("BACKUP_COMPLETED", "system", "info"),
    ("PASSWORD_RESET", "security", "warning"),
    ("LOGIN_FAILED", "security", "error"),
];

const DEMO_USERS: [&str; 5] = [
    "Admin User",
    "Jane Agent",
    "John Client",
    "Support Desk",
    "System",
];

/// Synthetic entries spread over the last 30 days, newest first.
pub fn placeholder_logs(count: usize, now: DateTime<Utc>) -> Vec<AuditLog> {
    let mut rng = rand::thread_rng();
    let mut logs: Vec<AuditLog> = (0..count)
        .map(|i| {
            let (action, category, severity) = DEMO_ACTIONS[i % DEMO_ACTIONS.len()];
            let user = DEMO_USERS.choose(&mut rng).copied().unwrap_or("System");
            let age = Duration::minutes(rng.gen_range(0..30 * 24 * 60));
            AuditLog {
                id: format!("demo-{}", i + 1),
                timestamp: now - age,
                action: action.to_string(),
                severity: severity.to_string(),
                category: category.to_string(),
                user_name: user.to_string(),
                ip_address: format!("192.168.1.{}", rng.gen_range(2..255)),
                description: format!("Sample {} event", action.to_lowercase().replace('_', " ")),
                resource: None,
                user_agent: None,
            }
        })
        .collect();
    sort_logs(&mut logs, SortKey::Timestamp, SortOrder::Desc);
    logs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(id: &str, ts: DateTime<Utc>, action: &str, severity: &str, category: &str) -> AuditLog {
        AuditLog {
            id: id.to_string(),
            timestamp: ts,
            action: action.to_string(),
            severity: severity.to_string(),
            category: category.to_string(),
            user_name: "Ada".to_string(),
            ip_address: "10.0.0.1".to_string(),
            description: String::new(),
            resource: None,
            user_agent: None,
        }
    }

    fn at(tz: &FixedOffset, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn midnight_is_today_and_late_yesterday_is_not() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = at(&tz, 2024, 6, 15, 14, 30);
        let midnight = at(&tz, 2024, 6, 15, 0, 0).with_timezone(&Utc);
        let late = at(&tz, 2024, 6, 14, 23, 59).with_timezone(&Utc);

        assert!(DateRange::Today.contains(&midnight, &now));
        assert!(!DateRange::Today.contains(&late, &now));
        assert!(DateRange::Yesterday.contains(&late, &now));
        assert!(!DateRange::Yesterday.contains(&midnight, &now));
    }

    #[test]
    fn day_windows_follow_the_callers_offset() {
        let server_now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        // 23:30 on the 14th for a caller at UTC-5.
        let late_evening = Utc.with_ymd_and_hms(2024, 6, 15, 4, 30, 0).unwrap();

        let caller = caller_offset(300).unwrap();
        let caller_now = server_now.with_timezone(&caller);
        assert!(!DateRange::Today.contains(&late_evening, &caller_now));
        assert!(DateRange::Yesterday.contains(&late_evening, &caller_now));
        let stats = compute_stats(&[log("1", late_evening, "VIEW", "info", "")], &caller_now);
        assert_eq!(stats.today, 0);

        assert!(DateRange::Today.contains(&late_evening, &server_now));
    }

    #[test]
    fn caller_offset_uses_browser_sign_and_rejects_nonsense() {
        assert_eq!(caller_offset(300), FixedOffset::west_opt(5 * 3600));
        assert_eq!(caller_offset(-330), FixedOffset::east_opt(5 * 3600 + 1800));
        assert!(caller_offset(15 * 60).is_none());
        assert!(caller_offset(-20_000).is_none());
    }

    #[test]
    fn last_week_and_month_are_calendar_based() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = at(&tz, 2024, 3, 31, 12, 0);

        let week_edge = at(&tz, 2024, 3, 24, 0, 0).with_timezone(&Utc);
        assert!(DateRange::LastWeek.contains(&week_edge, &now));
        assert!(!DateRange::LastWeek.contains(&(week_edge - Duration::seconds(1)), &now));

        // Feb has no 31st; checked_sub_months clamps to the 29th.
        let month_edge = at(&tz, 2024, 2, 29, 0, 0).with_timezone(&Utc);
        assert!(DateRange::LastMonth.contains(&month_edge, &now));
        assert!(!DateRange::LastMonth.contains(&(month_edge - Duration::seconds(1)), &now));
    }

    #[test]
    fn filters_apply_search_selects_and_severity_case_insensitively() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut logs = vec![
            log("1", now, "USER_LOGIN", "info", "auth"),
            log("2", now, "INVOICE_DELETE", "warning", "billing"),
            log("3", now, "USER_LOGOUT", "info", "auth"),
        ];
        logs[1].description = "Removed invoice INV-7".to_string();

        let by_search = filter_logs(
            &logs,
            &AuditFilter {
                search: Some("inv-7".into()),
                ..Default::default()
            },
            &now,
        );
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].id, "2");

        let by_severity = filter_logs(
            &logs,
            &AuditFilter {
                severity: AuditFilter::selection(Some("INFO".into())),
                action: AuditFilter::selection(Some("all".into())),
                ..Default::default()
            },
            &now,
        );
        assert_eq!(by_severity.len(), 2);

        let by_action = filter_logs(
            &logs,
            &AuditFilter {
                action: Some("USER_LOGOUT".into()),
                ..Default::default()
            },
            &now,
        );
        assert_eq!(by_action[0].id, "3");
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut logs = vec![
            log("a", t, "B", "info", "x"),
            log("b", t, "A", "info", "x"),
            log("c", t, "B", "info", "x"),
        ];

        sort_logs(&mut logs, SortKey::Action, SortOrder::Desc);
        let ids: Vec<_> = logs.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "b"]);

        sort_logs(&mut logs, SortKey::Action, SortOrder::Asc);
        let ids: Vec<_> = logs.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn default_sort_is_newest_first() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut logs = vec![
            log("old", t, "X", "info", "x"),
            log("new", t + Duration::hours(1), "X", "info", "x"),
        ];
        sort_logs(&mut logs, SortKey::default(), SortOrder::default());
        assert_eq!(logs[0].id, "new");
    }

    #[test]
    fn user_delete_counts_as_critical_and_admin() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let stats = compute_stats(&[log("1", now, "USER_DELETE", "info", "general")], &now);

        assert_eq!(stats.total, 1);
        assert_eq!(stats.today, 1);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.admin_actions, 1);
        assert_eq!(stats.user_actions, 1);
        assert_eq!(stats.system_actions, 0);
        assert_eq!(stats.security_events, 0);
    }

    #[test]
    fn category_and_severity_drive_buckets_without_keywords() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);
        let stats = compute_stats(
            &[
                log("1", yesterday, "EXPORT", "error", "system"),
                log("2", yesterday, "VIEW", "info", "security"),
            ],
            &now,
        );
        assert_eq!(stats.today, 0);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.system_actions, 1);
        assert_eq!(stats.security_events, 1);
    }

    #[test]
    fn csv_quotes_and_doubles_embedded_quotes() {
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap();
        let mut entry = log("1", t, "NOTE", "info", "general");
        entry.description = r#"He said, "hi""#.to_string();

        let csv = export_csv(&[entry]);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Timestamp,Action,User,Severity,Category,IP Address,Description"
        );
        assert!(lines[1].starts_with(r#""2024-06-15T09:30:00.000Z","NOTE","Ada""#));
        assert!(lines[1].ends_with(r#","He said, ""hi""""#));
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn csv_filename_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        assert_eq!(csv_filename(date), "audit-logs-2024-02-03.csv");
    }

    #[test]
    fn placeholders_are_marked_and_ordered() {
        let now = Utc::now();
        let logs = placeholder_logs(PLACEHOLDER_COUNT, now);
        assert_eq!(logs.len(), 50);
        assert!(logs.iter().all(|l| l.id.starts_with("demo-")));
        assert!(logs.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn unparseable_query_values_fall_back_to_defaults() {
        assert_eq!(DateRange::parse("fortnight"), DateRange::All);
        assert_eq!(DateRange::parse("lastWeek"), DateRange::LastWeek);
        assert_eq!(SortKey::parse("nope"), SortKey::Timestamp);
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse(""), SortOrder::Desc);
    }
}

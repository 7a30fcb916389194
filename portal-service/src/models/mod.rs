//! Portal entities and the upstream wire shapes they are normalized from.
//!
//! The upstream API has shipped several spellings of most fields over time
//! (`fullName` / `full_name` / `name`, `secureToken` / `token`, ...). Each entity
//! has a `Raw*` struct accepting every known spelling and a [`Normalize`] impl
//! that resolves them exactly once, at ingestion.

pub mod audit_log;
pub mod billing;
pub mod notification;
pub mod service_request;
pub mod settings;
pub mod user;

pub use audit_log::{AuditLog, RawAuditLog};
pub use billing::{
    money_total, BillingInterval, Invoice, InvoiceStatus, Payment, PaymentLink,
    PaymentLinkStatus, PaymentStatus, RawInvoice, RawPayment, RawPaymentLink, RawSubscription,
    Subscription, SubscriptionStatus,
};
pub use notification::{Notification, NotificationKind};
pub use service_request::{
    Attachment, PriceAdjustment, RawServiceRequest, ServiceRequest, ServiceRequestStatus,
};
pub use settings::{SettingsPatch, SystemSettings};
pub use user::{RawUser, Role, User};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Conversion from an upstream wire record into a portal entity.
///
/// Returns `None` when the record lacks something the portal cannot work
/// without (usually its id).
pub trait Normalize {
    type Output;

    fn normalize(self) -> Option<Self::Output>;
}

/// Coerce an upstream payload into a list of entities.
///
/// Accepts a bare array or a `{ "data": [...] }` envelope; anything else is an
/// empty list. Records that fail to decode or normalize are skipped.
pub fn normalize_list<R>(payload: Value) -> Vec<R::Output>
where
    R: DeserializeOwned + Normalize,
{
    normalize_counted::<R>(payload).1
}

/// [`normalize_list`], also returning how many records the payload carried
/// before malformed ones were dropped.
pub fn normalize_counted<R>(payload: Value) -> (usize, Vec<R::Output>)
where
    R: DeserializeOwned + Normalize,
{
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let total = items.len();
    let normalized: Vec<R::Output> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<R>(item) {
            Ok(raw) => raw.normalize(),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable upstream record");
                None
            }
        })
        .collect();

    if normalized.len() < total {
        tracing::warn!(
            kept = normalized.len(),
            skipped = total - normalized.len(),
            entity = std::any::type_name::<R>(),
            "Dropped malformed upstream records"
        );
    }

    (total, normalized)
}

/// Upper-cased, underscore-separated form used to compare status spellings.
pub(crate) fn status_key(raw: &str) -> String {
    raw.trim().to_uppercase().replace([' ', '-'], "_")
}

/// Parse the timestamp formats the upstream emits: RFC 3339, naive
/// date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Lenient field decoders for upstream records.
pub(crate) mod de {
    use super::parse_timestamp;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Ids arrive as strings, integers or (rarely) missing.
    pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Timestamps arrive as strings or epoch milliseconds; unparseable values
    /// become `None` rather than failing the record.
    pub fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => parse_timestamp(&s),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn parse_timestamp_accepts_upstream_formats() {
        let rfc = parse_timestamp("2024-03-05T10:15:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 8);

        let naive = parse_timestamp("2024-03-05T10:15:00.123").unwrap();
        assert_eq!(naive.minute(), 15);

        let date = parse_timestamp("2024-03-05").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 5));

        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn status_key_folds_case_and_separators() {
        assert_eq!(status_key(" in-progress "), "IN_PROGRESS");
        assert_eq!(status_key("On Hold"), "ON_HOLD");
        assert_eq!(status_key("paid"), "PAID");
    }

    #[test]
    fn normalize_list_coerces_non_arrays_to_empty() {
        assert!(normalize_list::<RawUser>(json!({ "error": "nope" })).is_empty());
        assert!(normalize_list::<RawUser>(json!("users")).is_empty());
        assert!(normalize_list::<RawUser>(Value::Null).is_empty());
    }

    #[test]
    fn normalize_list_unwraps_data_envelope_and_skips_bad_records() {
        let payload = json!({
            "data": [
                { "id": 1, "email": "a@example.com", "role": "ADMIN" },
                { "email": "no-id@example.com" },
                "not an object"
            ]
        });
        let users = normalize_list::<RawUser>(payload);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "1");
    }
}

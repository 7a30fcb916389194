use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    /// Errors linger longer than everything else.
    pub fn default_duration_ms(&self, default_ms: u64, error_ms: u64) -> u64 {
        match self {
            NotificationKind::Error => error_ms,
            _ => default_ms,
        }
    }
}

/// An ephemeral message shown to one portal session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message,
            duration_ms,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_use_the_longer_duration() {
        assert_eq!(NotificationKind::Error.default_duration_ms(5000, 7000), 7000);
        assert_eq!(NotificationKind::Info.default_duration_ms(5000, 7000), 5000);
    }

    #[test]
    fn serializes_kind_as_type() {
        let notification = Notification::new(NotificationKind::Warning, "Heads up", None, 5000);
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["durationMs"], 5000);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn ids_are_unique() {
        let a = Notification::new(NotificationKind::Info, "a", None, 1);
        let b = Notification::new(NotificationKind::Info, "a", None, 1);
        assert_ne!(a.id, b.id);
    }
}

use super::{de, Normalize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit trail entry, reconciled from either upstream naming convention.
///
/// `severity` and `category` are lower-cased at ingestion; `action` keeps the
/// upstream spelling (`USER_DELETE`, `invoice.created`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub severity: String,
    pub category: String,
    pub user_name: String,
    pub ip_address: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuditUser {
    #[serde(default, alias = "full_name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuditLog {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "created_at", deserialize_with = "de::opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, alias = "action_type")]
    pub action_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user_name: Option<String>,
    #[serde(default, alias = "user_email")]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user: Option<RawAuditUser>,
    #[serde(default, alias = "ip_address")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default, alias = "resource_type")]
    pub resource_type: Option<String>,
    #[serde(default, alias = "user_agent")]
    pub user_agent: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Normalize for RawAuditLog {
    type Output = AuditLog;

    fn normalize(self) -> Option<AuditLog> {
        let timestamp = self.timestamp.or(self.created_at)?;

        let (nested_name, nested_email) = match self.user {
            Some(user) => (non_blank(user.full_name.or(user.name)), non_blank(user.email)),
            None => (None, None),
        };
        let user_name = non_blank(self.user_name)
            .or(nested_name)
            .or(non_blank(self.user_email))
            .or(nested_email)
            .unwrap_or_else(|| "System".to_string());

        let description = non_blank(self.description)
            .or_else(|| match self.details {
                Some(Value::String(text)) => non_blank(Some(text)),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_default();

        Some(AuditLog {
            id: self.id?,
            timestamp,
            action: non_blank(self.action)
                .or(non_blank(self.action_type))
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            severity: non_blank(self.severity)
                .or(non_blank(self.level))
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            category: non_blank(self.category)
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_else(|| "general".to_string()),
            user_name,
            ip_address: non_blank(self.ip_address)
                .or(non_blank(self.ip))
                .unwrap_or_default(),
            description,
            resource: non_blank(self.resource).or(non_blank(self.resource_type)),
            user_agent: non_blank(self.user_agent),
        })
    }
}

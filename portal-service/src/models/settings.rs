//! System-wide settings and the partial updates applied to them.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    #[validate(nested)]
    pub general: GeneralSettings,
    #[validate(nested)]
    pub security: SecuritySettings,
    #[validate(nested)]
    pub notifications: NotificationSettings,
    #[validate(nested)]
    pub performance: PerformanceSettings,
    #[validate(nested)]
    pub backup: BackupSettings,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            security: SecuritySettings::default(),
            notifications: NotificationSettings::default(),
            performance: PerformanceSettings::default(),
            backup: BackupSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralSettings {
    #[validate(length(min = 1, max = 120))]
    pub company_name: String,
    #[validate(email)]
    pub support_email: String,
    #[validate(length(min = 1, max = 64))]
    pub timezone: String,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub maintenance_mode: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            company_name: "Tech Processing LLC".to_string(),
            support_email: "support@techprocessingllc.com".to_string(),
            timezone: "America/New_York".to_string(),
            currency: "USD".to_string(),
            maintenance_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    pub mfa_required: bool,
    #[validate(range(min = 5, max = 1440))]
    pub session_timeout_minutes: u32,
    #[validate(range(min = 8, max = 128))]
    pub password_min_length: u32,
    #[validate(range(min = 1, max = 20))]
    pub max_login_attempts: u32,
    #[validate(range(min = 1, max = 1440))]
    pub lockout_minutes: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            mfa_required: false,
            session_timeout_minutes: 60,
            password_min_length: 12,
            max_login_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub invoice_reminders: bool,
    pub payment_receipts: bool,
    #[validate(range(min = 0, max = 60))]
    pub reminder_days_before_due: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_enabled: true,
            sms_enabled: false,
            invoice_reminders: true,
            payment_receipts: true,
            reminder_days_before_due: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceSettings {
    #[validate(range(min = 0, max = 86400))]
    pub cache_ttl_seconds: u32,
    #[validate(range(min = 10, max = 1000))]
    pub page_size: u32,
    #[validate(range(min = 1, max = 10000))]
    pub rate_limit_per_minute: u32,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            page_size: 50,
            rate_limit_per_minute: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupSettings {
    pub enabled: bool,
    pub frequency: BackupFrequency,
    #[validate(range(min = 1, max = 3650))]
    pub retention_days: u32,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: BackupFrequency::Daily,
            retention_days: 30,
        }
    }
}

/// Field-level changes to [`SystemSettings`]. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub general: Option<GeneralPatch>,
    pub security: Option<SecurityPatch>,
    pub notifications: Option<NotificationPatch>,
    pub performance: Option<PerformancePatch>,
    pub backup: Option<BackupPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralPatch {
    pub company_name: Option<String>,
    pub support_email: Option<String>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub maintenance_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityPatch {
    pub mfa_required: Option<bool>,
    pub session_timeout_minutes: Option<u32>,
    pub password_min_length: Option<u32>,
    pub max_login_attempts: Option<u32>,
    pub lockout_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPatch {
    pub email_enabled: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub invoice_reminders: Option<bool>,
    pub payment_receipts: Option<bool>,
    pub reminder_days_before_due: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformancePatch {
    pub cache_ttl_seconds: Option<u32>,
    pub page_size: Option<u32>,
    pub rate_limit_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupPatch {
    pub enabled: Option<bool>,
    pub frequency: Option<BackupFrequency>,
    pub retention_days: Option<u32>,
}

fn assign<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self == &SettingsPatch::default()
    }

    /// Produce the settings that result from applying this patch to `base`.
    pub fn apply_to(&self, base: &SystemSettings) -> SystemSettings {
        let mut next = base.clone();

        if let Some(general) = self.general.clone() {
            assign(&mut next.general.company_name, general.company_name);
            assign(&mut next.general.support_email, general.support_email);
            assign(&mut next.general.timezone, general.timezone);
            assign(&mut next.general.currency, general.currency);
            assign(&mut next.general.maintenance_mode, general.maintenance_mode);
        }
        if let Some(security) = &self.security {
            assign(&mut next.security.mfa_required, security.mfa_required);
            assign(
                &mut next.security.session_timeout_minutes,
                security.session_timeout_minutes,
            );
            assign(
                &mut next.security.password_min_length,
                security.password_min_length,
            );
            assign(
                &mut next.security.max_login_attempts,
                security.max_login_attempts,
            );
            assign(&mut next.security.lockout_minutes, security.lockout_minutes);
        }
        if let Some(notifications) = &self.notifications {
            assign(
                &mut next.notifications.email_enabled,
                notifications.email_enabled,
            );
            assign(&mut next.notifications.sms_enabled, notifications.sms_enabled);
            assign(
                &mut next.notifications.invoice_reminders,
                notifications.invoice_reminders,
            );
            assign(
                &mut next.notifications.payment_receipts,
                notifications.payment_receipts,
            );
            assign(
                &mut next.notifications.reminder_days_before_due,
                notifications.reminder_days_before_due,
            );
        }
        if let Some(performance) = &self.performance {
            assign(
                &mut next.performance.cache_ttl_seconds,
                performance.cache_ttl_seconds,
            );
            assign(&mut next.performance.page_size, performance.page_size);
            assign(
                &mut next.performance.rate_limit_per_minute,
                performance.rate_limit_per_minute,
            );
        }
        if let Some(backup) = &self.backup {
            assign(&mut next.backup.enabled, backup.enabled);
            assign(&mut next.backup.frequency, backup.frequency);
            assign(&mut next.backup.retention_days, backup.retention_days);
        }

        next
    }
}

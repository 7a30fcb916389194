pub mod audit;
pub mod dashboard;
pub mod metrics;
pub mod mfa;
pub mod notifications;
pub mod settings;
pub mod upstream;

pub use audit::{AuditFilter, AuditSource, AuditStats, DateRange, SortKey, SortOrder};
pub use dashboard::{AdminStats, AgentStats, ClientStats, DashboardLoad};
pub use metrics::{get_metrics, init_metrics};
pub use notifications::{NotificationHandle, NotificationHub, SubscriptionGuard};
pub use settings::{SettingsStore, VersionedSettings};
pub use upstream::{Backend, HttpBackend, Resource, UpstreamError};

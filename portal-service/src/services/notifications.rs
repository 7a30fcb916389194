//! Per-session queues of ephemeral notifications.
//!
//! Each shown notification gets an expiry timer. Timers are children of their
//! subscriber's [`CancellationToken`], so tearing a session down cancels every
//! timer it still owns instead of leaving them to fire against a dead queue.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::NotificationConfig;
use crate::models::{Notification, NotificationKind};

struct SubscriberQueue {
    items: Vec<Notification>,
    token: CancellationToken,
}

impl SubscriberQueue {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            token: CancellationToken::new(),
        }
    }
}

struct HubInner {
    queues: DashMap<String, SubscriberQueue>,
    default_duration_ms: u64,
    error_duration_ms: u64,
}

#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

/// Returned by [`NotificationHub::show`]; dismisses one notification early.
pub struct NotificationHandle {
    id: String,
    subscriber: String,
    token: CancellationToken,
    hub: NotificationHub,
}

impl NotificationHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the expiry timer can no longer fire.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn dismiss(self) -> bool {
        self.token.cancel();
        self.hub.remove(&self.subscriber, &self.id)
    }
}

/// Unsubscribes its session when dropped.
pub struct SubscriptionGuard {
    subscriber: String,
    hub: NotificationHub,
}

impl SubscriptionGuard {
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.subscriber);
    }
}

impl NotificationHub {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                queues: DashMap::new(),
                default_duration_ms: config.default_duration_ms,
                error_duration_ms: config.error_duration_ms,
            }),
        }
    }

    pub fn subscribe(&self, subscriber: &str) -> SubscriptionGuard {
        self.inner
            .queues
            .entry(subscriber.to_string())
            .or_insert_with(SubscriberQueue::new);
        SubscriptionGuard {
            subscriber: subscriber.to_string(),
            hub: self.clone(),
        }
    }

    /// Queue a notification and schedule its removal.
    ///
    /// `duration_ms` of `None` uses the configured default for `kind`; `Some(0)`
    /// keeps the notification until it is dismissed. Must be called from
    /// within a Tokio runtime.
    pub fn show(
        &self,
        subscriber: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        message: Option<String>,
        duration_ms: Option<u64>,
    ) -> NotificationHandle {
        let duration_ms = duration_ms.unwrap_or_else(|| {
            kind.default_duration_ms(self.inner.default_duration_ms, self.inner.error_duration_ms)
        });
        let notification = Notification::new(kind, title, message, duration_ms);
        let id = notification.id.clone();

        let token = {
            let mut queue = self
                .inner
                .queues
                .entry(subscriber.to_string())
                .or_insert_with(SubscriberQueue::new);
            queue.items.push(notification);
            queue.token.child_token()
        };

        if duration_ms > 0 {
            let hub = self.clone();
            let timer = token.clone();
            let owner = subscriber.to_string();
            let expiring = id.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = timer.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_millis(duration_ms)) => {
                        hub.remove(&owner, &expiring);
                    }
                }
            });
        }

        tracing::debug!(subscriber = %subscriber, id = %id, ?kind, duration_ms, "Notification queued");

        NotificationHandle {
            id,
            subscriber: subscriber.to_string(),
            token,
            hub: self.clone(),
        }
    }

    pub fn show_success(
        &self,
        subscriber: &str,
        title: impl Into<String>,
        message: Option<String>,
    ) -> NotificationHandle {
        self.show(subscriber, NotificationKind::Success, title, message, None)
    }

    pub fn show_error(
        &self,
        subscriber: &str,
        title: impl Into<String>,
        message: Option<String>,
    ) -> NotificationHandle {
        self.show(subscriber, NotificationKind::Error, title, message, None)
    }

    pub fn show_warning(
        &self,
        subscriber: &str,
        title: impl Into<String>,
        message: Option<String>,
    ) -> NotificationHandle {
        self.show(subscriber, NotificationKind::Warning, title, message, None)
    }

    pub fn show_info(
        &self,
        subscriber: &str,
        title: impl Into<String>,
        message: Option<String>,
    ) -> NotificationHandle {
        self.show(subscriber, NotificationKind::Info, title, message, None)
    }

    /// Current notifications for a subscriber, oldest first.
    pub fn list(&self, subscriber: &str) -> Vec<Notification> {
        self.inner
            .queues
            .get(subscriber)
            .map(|queue| queue.items.clone())
            .unwrap_or_default()
    }

    pub fn dismiss(&self, subscriber: &str, id: &str) -> bool {
        self.remove(subscriber, id)
    }

    /// Drop the subscriber's queue and cancel all of its pending timers.
    /// Returns how many notifications were discarded.
    pub fn unsubscribe(&self, subscriber: &str) -> usize {
        match self.inner.queues.remove(subscriber) {
            Some((_, queue)) => {
                queue.token.cancel();
                queue.items.len()
            }
            None => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.queues.len()
    }

    /// Removes one notification. A queue left empty is evicted, so sessions
    /// that stop calling in leave nothing behind once their timers fire.
    fn remove(&self, subscriber: &str, id: &str) -> bool {
        let removed = match self.inner.queues.get_mut(subscriber) {
            Some(mut queue) => {
                let before = queue.items.len();
                queue.items.retain(|n| n.id != id);
                queue.items.len() != before
            }
            None => false,
        };

        if removed {
            let evicted = self
                .inner
                .queues
                .remove_if(subscriber, |_, queue| queue.items.is_empty());
            if let Some((_, queue)) = evicted {
                queue.token.cancel();
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> NotificationHub {
        NotificationHub::new(&NotificationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn info_expires_after_default_duration() {
        let hub = hub();
        hub.show_info("s1", "Saved", None);

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        assert_eq!(hub.list("s1").len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(hub.list("s1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn errors_linger_for_seven_seconds() {
        let hub = hub();
        hub.show_error("s1", "Failed", Some("Try again".into()));

        tokio::time::sleep(Duration::from_millis(6_000)).await;
        assert_eq!(hub.list("s1").len(), 1);

        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert!(hub.list("s1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_is_sticky() {
        let hub = hub();
        let handle = hub.show("s1", NotificationKind::Warning, "Pinned", None, Some(0));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hub.list("s1").len(), 1);

        assert!(handle.dismiss());
        assert!(hub.list("s1").is_empty());
    }

    #[tokio::test]
    async fn notifications_are_not_coalesced() {
        let hub = hub();
        hub.show_success("s1", "Same", None);
        hub.show_success("s1", "Same", None);
        hub.show_success("s2", "Other", None);

        assert_eq!(hub.list("s1").len(), 2);
        assert_eq!(hub.list("s2").len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_cancels_outstanding_timers() {
        let hub = hub();
        let first = hub.show_info("s1", "One", None);
        let second = hub.show_error("s1", "Two", None);
        let other = hub.show_info("s2", "Elsewhere", None);

        assert_eq!(hub.unsubscribe("s1"), 2);

        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(!other.is_cancelled());
        assert!(hub.list("s1").is_empty());
    }

    #[tokio::test]
    async fn dropping_guard_tears_down_session() {
        let hub = hub();
        let handle = {
            let _guard = hub.subscribe("s9");
            hub.show_info("s9", "Hello", None)
        };
        assert!(handle.is_cancelled());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_sessions_are_evicted() {
        let hub = hub();
        for i in 0..1_000 {
            hub.show_info(&format!("sess-{}", i), "Saved", None);
        }
        assert_eq!(hub.subscriber_count(), 1_000);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_survives_while_anything_is_pending() {
        let hub = hub();
        hub.show_info("s1", "Short", None);
        let pinned = hub.show("s1", NotificationKind::Warning, "Pinned", None, Some(0));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(hub.list("s1").len(), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert!(!pinned.is_cancelled());

        assert!(pinned.dismiss());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dismiss_unknown_id_is_false() {
        let hub = hub();
        hub.show_info("s1", "Hi", None);
        assert!(!hub.dismiss("s1", "nope"));
        assert!(!hub.dismiss("missing", "nope"));
    }
}

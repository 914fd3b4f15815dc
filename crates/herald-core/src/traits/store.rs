//! Persistence seam for notifications, subscriptions and transmissions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    Notification, NotificationCategory, NotificationSeverity, NotificationStatus, Subscription,
    Transmission, TransmissionStatus,
};

/// Record store.
///
/// Writes are at-least-once and there are no cross-record transactions.
/// `insert_*` assigns a fresh id and stamps `created`/`modified`; a duplicate
/// slug (compared case-insensitively) is a `Conflict`. `save_*` replaces the
/// record with the same id and stamps `modified`. Every method returns the
/// stored copy so callers see the assigned fields.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Notifications ─────────────────────────────────────

    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;

    async fn save_notification(&self, notification: Notification) -> Result<Notification>;

    /// Delete by id. Missing ids are ignored; returns the number removed.
    async fn delete_notifications(&self, ids: &[String]) -> Result<usize>;

    async fn find_notification_by_slug(&self, slug: &str) -> Result<Option<Notification>>;

    async fn find_notifications_by_severity_and_status(
        &self,
        severity: NotificationSeverity,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>>;

    /// Notifications last modified before `before`, optionally of one status.
    async fn find_notifications_modified_before(
        &self,
        status: Option<NotificationStatus>,
        before: DateTime<Utc>,
    ) -> Result<Vec<Notification>>;

    /// Newest first, at most `limit`. `sender` matches case-insensitively
    /// anywhere in the notification's sender.
    async fn find_notifications_by_sender(&self, sender: &str, limit: usize) -> Result<Vec<Notification>>;

    /// Created within `start..=end`; a missing bound is open. Newest first,
    /// at most `limit`.
    async fn find_notifications_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Notification>>;

    /// Notifications carrying any of `labels` (case-insensitive). Newest
    /// first, at most `limit`.
    async fn find_notifications_by_labels(&self, labels: &[String], limit: usize) -> Result<Vec<Notification>>;

    /// Newest first, at most `limit`.
    async fn find_notifications_by_status(
        &self,
        status: NotificationStatus,
        limit: usize,
    ) -> Result<Vec<Notification>>;

    // ─── Subscriptions ─────────────────────────────────────

    async fn insert_subscription(&self, subscription: Subscription) -> Result<Subscription>;

    async fn save_subscription(&self, subscription: Subscription) -> Result<Subscription>;

    /// Returns false when nothing had that id.
    async fn delete_subscription(&self, id: &str) -> Result<bool>;

    async fn find_subscription_by_slug(&self, slug: &str) -> Result<Option<Subscription>>;

    /// Subscriptions whose categories contain any of `categories` or whose
    /// labels contain any of `labels` (case-insensitive).
    async fn find_subscriptions_by_categories_or_labels(
        &self,
        categories: &[NotificationCategory],
        labels: &[String],
    ) -> Result<Vec<Subscription>>;

    /// Oldest first.
    async fn find_all_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// `receiver` matches case-insensitively anywhere in the receiver.
    async fn find_subscriptions_by_receiver(&self, receiver: &str) -> Result<Vec<Subscription>>;

    // ─── Transmissions ─────────────────────────────────────

    async fn insert_transmission(&self, transmission: Transmission) -> Result<Transmission>;

    async fn save_transmission(&self, transmission: Transmission) -> Result<Transmission>;

    async fn find_transmissions_by_status_and_resend_count_less_than(
        &self,
        status: TransmissionStatus,
        resend_limit: u32,
    ) -> Result<Vec<Transmission>>;

    /// Newest first, at most `limit`.
    async fn find_transmissions_by_notification_slug(
        &self,
        slug: &str,
        limit: usize,
    ) -> Result<Vec<Transmission>>;

    /// Newest first, at most `limit`.
    async fn find_transmissions_by_status(
        &self,
        status: TransmissionStatus,
        limit: usize,
    ) -> Result<Vec<Transmission>>;

    /// Created within `start..=end`; a missing bound is open. Newest first,
    /// at most `limit`.
    async fn find_transmissions_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Transmission>>;

    /// Delete every transmission whose embedded notification id is in `ids`.
    async fn delete_transmissions_by_notifications(&self, ids: &[String]) -> Result<usize>;

    async fn delete_transmissions_by_status_modified_before(
        &self,
        status: TransmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<usize>;
}

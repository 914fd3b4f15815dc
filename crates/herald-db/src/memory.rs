//! In-memory store. Used by tests and for ephemeral runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use herald_core::traits::Store;
use herald_core::types::{
    Notification, NotificationCategory, NotificationSeverity, NotificationStatus, Subscription,
    Transmission, TransmissionStatus,
};

#[derive(Default)]
struct Tables {
    notifications: HashMap<String, Notification>,
    subscriptions: HashMap<String, Subscription>,
    transmissions: HashMap<String, Transmission>,
}

/// Store backed by hash maps keyed on record id.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| HeraldError::Store(format!("memory store poisoned: {e}")))
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn newest_first<T>(mut list: Vec<T>, limit: usize, created: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    list.sort_by_key(|r| std::cmp::Reverse(created(r)));
    list.truncate(limit);
    list
}

fn within(at: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.is_none_or(|s| at >= s) && end.is_none_or(|e| at <= e)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Store for MemoryStore {
    // ─── Notifications ─────────────────────────────────────

    async fn insert_notification(&self, mut notification: Notification) -> Result<Notification> {
        let mut tables = self.lock()?;
        if tables
            .notifications
            .values()
            .any(|n| n.slug.eq_ignore_ascii_case(&notification.slug))
        {
            return Err(HeraldError::Conflict(format!(
                "notification slug '{}' exists",
                notification.slug
            )));
        }
        let now = Utc::now();
        notification.id = new_id();
        notification.created = now;
        notification.modified = now;
        tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn save_notification(&self, mut notification: Notification) -> Result<Notification> {
        let mut tables = self.lock()?;
        if !tables.notifications.contains_key(&notification.id) {
            return Err(HeraldError::not_found(format!("notification {}", notification.id)));
        }
        if tables.notifications.values().any(|n| {
            n.id != notification.id && n.slug.eq_ignore_ascii_case(&notification.slug)
        }) {
            return Err(HeraldError::Conflict(format!(
                "notification slug '{}' exists",
                notification.slug
            )));
        }
        notification.modified = Utc::now();
        tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn delete_notifications(&self, ids: &[String]) -> Result<usize> {
        let mut tables = self.lock()?;
        Ok(ids
            .iter()
            .filter(|id| tables.notifications.remove(id.as_str()).is_some())
            .count())
    }

    async fn find_notification_by_slug(&self, slug: &str) -> Result<Option<Notification>> {
        let tables = self.lock()?;
        Ok(tables
            .notifications
            .values()
            .find(|n| n.slug.eq_ignore_ascii_case(slug))
            .cloned())
    }

    async fn find_notifications_by_severity_and_status(
        &self,
        severity: NotificationSeverity,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>> {
        let tables = self.lock()?;
        let mut found: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.severity == severity && n.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(found)
    }

    async fn find_notifications_modified_before(
        &self,
        status: Option<NotificationStatus>,
        before: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let tables = self.lock()?;
        Ok(tables
            .notifications
            .values()
            .filter(|n| n.modified < before && status.is_none_or(|s| n.status == s))
            .cloned()
            .collect())
    }

    async fn find_notifications_by_sender(&self, sender: &str, limit: usize) -> Result<Vec<Notification>> {
        let tables = self.lock()?;
        let found = tables
            .notifications
            .values()
            .filter(|n| contains_ignore_case(&n.sender, sender))
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |n: &Notification| n.created))
    }

    async fn find_notifications_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let tables = self.lock()?;
        let found = tables
            .notifications
            .values()
            .filter(|n| within(n.created, start, end))
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |n: &Notification| n.created))
    }

    async fn find_notifications_by_labels(&self, labels: &[String], limit: usize) -> Result<Vec<Notification>> {
        let tables = self.lock()?;
        let found = tables
            .notifications
            .values()
            .filter(|n| {
                n.label_set()
                    .iter()
                    .any(|have| labels.iter().any(|want| want.eq_ignore_ascii_case(have)))
            })
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |n: &Notification| n.created))
    }

    async fn find_notifications_by_status(
        &self,
        status: NotificationStatus,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let tables = self.lock()?;
        let found = tables
            .notifications
            .values()
            .filter(|n| n.status == status)
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |n: &Notification| n.created))
    }

    // ─── Subscriptions ─────────────────────────────────────

    async fn insert_subscription(&self, mut subscription: Subscription) -> Result<Subscription> {
        let mut tables = self.lock()?;
        if tables
            .subscriptions
            .values()
            .any(|s| s.slug.eq_ignore_ascii_case(&subscription.slug))
        {
            return Err(HeraldError::Conflict(format!(
                "subscription slug '{}' exists",
                subscription.slug
            )));
        }
        let now = Utc::now();
        subscription.id = new_id();
        subscription.created = now;
        subscription.modified = now;
        tables
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn save_subscription(&self, mut subscription: Subscription) -> Result<Subscription> {
        let mut tables = self.lock()?;
        if !tables.subscriptions.contains_key(&subscription.id) {
            return Err(HeraldError::not_found(format!("subscription {}", subscription.id)));
        }
        subscription.modified = Utc::now();
        tables
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn delete_subscription(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.subscriptions.remove(id).is_some())
    }

    async fn find_subscription_by_slug(&self, slug: &str) -> Result<Option<Subscription>> {
        let tables = self.lock()?;
        Ok(tables
            .subscriptions
            .values()
            .find(|s| s.slug.eq_ignore_ascii_case(slug))
            .cloned())
    }

    async fn find_subscriptions_by_categories_or_labels(
        &self,
        categories: &[NotificationCategory],
        labels: &[String],
    ) -> Result<Vec<Subscription>> {
        let tables = self.lock()?;
        let mut found: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.matches(categories, labels))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(found)
    }

    async fn find_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        let tables = self.lock()?;
        let mut all: Vec<Subscription> = tables.subscriptions.values().cloned().collect();
        all.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(all)
    }

    async fn find_subscriptions_by_receiver(&self, receiver: &str) -> Result<Vec<Subscription>> {
        let tables = self.lock()?;
        let mut found: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| contains_ignore_case(&s.receiver, receiver))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(found)
    }

    // ─── Transmissions ─────────────────────────────────────

    async fn insert_transmission(&self, mut transmission: Transmission) -> Result<Transmission> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        transmission.id = new_id();
        transmission.created = now;
        transmission.modified = now;
        tables
            .transmissions
            .insert(transmission.id.clone(), transmission.clone());
        Ok(transmission)
    }

    async fn save_transmission(&self, mut transmission: Transmission) -> Result<Transmission> {
        let mut tables = self.lock()?;
        if !tables.transmissions.contains_key(&transmission.id) {
            return Err(HeraldError::not_found(format!("transmission {}", transmission.id)));
        }
        transmission.modified = Utc::now();
        tables
            .transmissions
            .insert(transmission.id.clone(), transmission.clone());
        Ok(transmission)
    }

    async fn find_transmissions_by_status_and_resend_count_less_than(
        &self,
        status: TransmissionStatus,
        resend_limit: u32,
    ) -> Result<Vec<Transmission>> {
        let tables = self.lock()?;
        let mut found: Vec<Transmission> = tables
            .transmissions
            .values()
            .filter(|t| t.status == status && t.resend_count < resend_limit)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(found)
    }

    async fn find_transmissions_by_notification_slug(
        &self,
        slug: &str,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        let tables = self.lock()?;
        let found = tables
            .transmissions
            .values()
            .filter(|t| t.notification.slug.eq_ignore_ascii_case(slug))
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |t: &Transmission| t.created))
    }

    async fn find_transmissions_by_status(
        &self,
        status: TransmissionStatus,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        let tables = self.lock()?;
        let found = tables
            .transmissions
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |t: &Transmission| t.created))
    }

    async fn find_transmissions_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        let tables = self.lock()?;
        let found = tables
            .transmissions
            .values()
            .filter(|t| within(t.created, start, end))
            .cloned()
            .collect();
        Ok(newest_first(found, limit, |t: &Transmission| t.created))
    }

    async fn delete_transmissions_by_notifications(&self, ids: &[String]) -> Result<usize> {
        let mut tables = self.lock()?;
        let before = tables.transmissions.len();
        tables
            .transmissions
            .retain(|_, t| !ids.contains(&t.notification.id));
        Ok(before - tables.transmissions.len())
    }

    async fn delete_transmissions_by_status_modified_before(
        &self,
        status: TransmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tables = self.lock()?;
        let count = tables.transmissions.len();
        tables
            .transmissions
            .retain(|_, t| !(t.status == status && t.modified < before));
        Ok(count - tables.transmissions.len())
    }
}

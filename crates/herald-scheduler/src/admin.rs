//! Administration of subscriptions and read access to the transmission ledger.

use std::sync::Arc;

use herald_core::error::{HeraldError, Result};
use herald_core::traits::Store;
use chrono::{DateTime, Utc};
use herald_core::types::{NotificationCategory, Subscription, Transmission, TransmissionStatus};

pub struct SubscriptionHandler {
    store: Arc<dyn Store>,
}

impl SubscriptionHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate and store. A taken slug is a `Conflict`.
    pub async fn create(&self, subscription: Subscription) -> Result<Subscription> {
        subscription.validate()?;
        for channel in &subscription.channels {
            channel.validate()?;
        }
        let stored = self.store.insert_subscription(subscription).await?;
        tracing::info!(
            "📝 Subscription '{}' for {} ({} channel(s))",
            stored.slug,
            stored.receiver,
            stored.channels.len()
        );
        Ok(stored)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Subscription> {
        self.store
            .find_subscription_by_slug(slug)
            .await?
            .ok_or_else(|| HeraldError::not_found(format!("subscription {slug}")))
    }

    /// Replace the subscription with the same slug, keeping its id.
    pub async fn update(&self, mut subscription: Subscription) -> Result<Subscription> {
        subscription.validate()?;
        for channel in &subscription.channels {
            channel.validate()?;
        }
        let existing = self.find_by_slug(&subscription.slug).await?;
        subscription.id = existing.id;
        subscription.created = existing.created;
        let saved = self.store.save_subscription(subscription).await?;
        tracing::info!("✏️ Subscription '{}' updated", saved.slug);
        Ok(saved)
    }

    pub async fn list_all(&self) -> Result<Vec<Subscription>> {
        self.store.find_all_subscriptions().await
    }

    pub async fn find_by_categories_or_labels(
        &self,
        categories: &[NotificationCategory],
        labels: &[String],
    ) -> Result<Vec<Subscription>> {
        self.store
            .find_subscriptions_by_categories_or_labels(categories, labels)
            .await
    }

    pub async fn find_by_receiver(&self, receiver: &str) -> Result<Vec<Subscription>> {
        self.store.find_subscriptions_by_receiver(receiver).await
    }

    pub async fn delete_by_slug(&self, slug: &str) -> Result<()> {
        let subscription = self.find_by_slug(slug).await?;
        self.store.delete_subscription(&subscription.id).await?;
        tracing::info!("🗑️ Subscription '{slug}' deleted");
        Ok(())
    }
}

/// Bounded queries over the transmission ledger.
pub struct TransmissionHandler {
    store: Arc<dyn Store>,
}

impl TransmissionHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn find_by_notification_slug(&self, slug: &str, limit: usize) -> Result<Vec<Transmission>> {
        self.store.find_transmissions_by_notification_slug(slug, limit).await
    }

    pub async fn find_failed(&self, limit: usize) -> Result<Vec<Transmission>> {
        self.store
            .find_transmissions_by_status(TransmissionStatus::Failed, limit)
            .await
    }

    pub async fn find_escalated(&self, limit: usize) -> Result<Vec<Transmission>> {
        self.store
            .find_transmissions_by_status(TransmissionStatus::Escalated, limit)
            .await
    }

    /// Created within `start..=end`, either bound open.
    pub async fn find_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        self.store.find_transmissions_created_between(start, end, limit).await
    }
}

//! Notification intake. Critical notifications go out immediately; normal
//! ones are left for the distribution sweep.

use std::sync::Arc;

use herald_core::error::{HeraldError, Result};
use herald_core::traits::Store;
use chrono::{DateTime, Utc};
use herald_core::types::{Notification, NotificationStatus};

use crate::coordinator::{Coordinator, Dispatch};
use crate::watermark::Watermarks;

/// Outcome of accepting one notification.
#[derive(Debug)]
pub struct Receipt {
    pub notification: Notification,
    /// Present for critical notifications, which are distributed on receipt.
    pub dispatch: Option<Dispatch>,
}

pub struct NotificationHandler {
    store: Arc<dyn Store>,
    coordinator: Arc<Coordinator>,
    watermarks: Arc<Watermarks>,
}

impl NotificationHandler {
    pub fn new(store: Arc<dyn Store>, coordinator: Arc<Coordinator>, watermarks: Arc<Watermarks>) -> Self {
        Self { store, coordinator, watermarks }
    }

    pub async fn receive(&self, mut notification: Notification) -> Result<Receipt> {
        notification.validate()?;
        notification.status = NotificationStatus::New;

        let stored = match self.store.insert_notification(notification).await {
            Ok(stored) => stored,
            Err(HeraldError::Conflict(_)) => {
                return Err(HeraldError::validation("duplicated notification slug"));
            }
            Err(e) => return Err(e),
        };
        tracing::info!(
            "📥 Notification '{}' received ({}, from {})",
            stored.slug,
            stored.severity.as_str(),
            stored.sender
        );

        if !stored.is_critical() {
            self.watermarks.notification_created(stored.created);
            return Ok(Receipt { notification: stored, dispatch: None });
        }

        let dispatch = self.coordinator.distribute(&stored).await?;
        let mut processed = stored;
        processed.transition(NotificationStatus::Processed)?;
        let saved = self.store.save_notification(processed).await?;
        Ok(Receipt { notification: saved, dispatch: Some(dispatch) })
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Notification> {
        self.store
            .find_notification_by_slug(slug)
            .await?
            .ok_or_else(|| HeraldError::not_found(format!("notification {slug}")))
    }

    pub async fn find_by_sender(&self, sender: &str, limit: usize) -> Result<Vec<Notification>> {
        self.store.find_notifications_by_sender(sender, limit).await
    }

    /// Created within `start..=end`, either bound open.
    pub async fn find_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        self.store.find_notifications_created_between(start, end, limit).await
    }

    pub async fn find_by_labels(&self, labels: &[String], limit: usize) -> Result<Vec<Notification>> {
        self.store.find_notifications_by_labels(labels, limit).await
    }

    /// Notifications still waiting for the distribution sweep.
    pub async fn find_new(&self, limit: usize) -> Result<Vec<Notification>> {
        self.store
            .find_notifications_by_status(NotificationStatus::New, limit)
            .await
    }

    /// Remove a notification and every transmission recorded for it.
    pub async fn delete_by_slug(&self, slug: &str) -> Result<()> {
        let notification = self.find_by_slug(slug).await?;
        let ids = vec![notification.id];
        let transmissions = self.store.delete_transmissions_by_notifications(&ids).await?;
        self.store.delete_notifications(&ids).await?;
        tracing::info!("🗑️ Notification '{slug}' deleted with {transmissions} transmission(s)");
        Ok(())
    }
}

//! Age-based removal of notifications and transmissions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use herald_core::traits::Store;
use herald_core::types::{NotificationStatus, TransmissionStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub notifications: usize,
    pub transmissions: usize,
}

pub struct CleanupService {
    store: Arc<dyn Store>,
    default_age: Duration,
}

fn cutoff(age: Duration) -> Result<DateTime<Utc>> {
    let age = chrono::Duration::from_std(age)
        .map_err(|e| HeraldError::validation(format!("age out of range: {e}")))?;
    Utc::now()
        .checked_sub_signed(age)
        .ok_or_else(|| HeraldError::validation("age reaches before the epoch"))
}

impl CleanupService {
    pub fn new(store: Arc<dyn Store>, default_age: Duration) -> Self {
        Self { store, default_age }
    }

    /// Remove everything older than the configured age.
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        self.cleanup_older_than(self.default_age).await
    }

    /// Remove notifications of any status, with their transmissions.
    pub async fn cleanup_older_than(&self, age: Duration) -> Result<CleanupReport> {
        self.remove_notifications(None, age).await
    }

    pub async fn delete_processed_older_than(&self, age: Duration) -> Result<CleanupReport> {
        self.remove_notifications(Some(NotificationStatus::Processed), age).await
    }

    pub async fn delete_transmissions_older_than(
        &self,
        status: TransmissionStatus,
        age: Duration,
    ) -> Result<usize> {
        let removed = self
            .store
            .delete_transmissions_by_status_modified_before(status, cutoff(age)?)
            .await?;
        tracing::info!("🧹 Removed {removed} {status} transmission(s) older than {age:?}");
        Ok(removed)
    }

    async fn remove_notifications(
        &self,
        status: Option<NotificationStatus>,
        age: Duration,
    ) -> Result<CleanupReport> {
        let old = self
            .store
            .find_notifications_modified_before(status, cutoff(age)?)
            .await?;
        if old.is_empty() {
            return Ok(CleanupReport::default());
        }
        let ids: Vec<String> = old.into_iter().map(|n| n.id).collect();
        let transmissions = self.store.delete_transmissions_by_notifications(&ids).await?;
        let notifications = self.store.delete_notifications(&ids).await?;
        tracing::info!(
            "🧹 Removed {notifications} notification(s) and {transmissions} transmission(s) older than {age:?}"
        );
        Ok(CleanupReport { notifications, transmissions })
    }
}

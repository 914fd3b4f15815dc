//! Escalation handler: when a critical transmission runs out of resends,
//! synthesize a new notification describing it and send that to the
//! `ESCALATION` subscription.

use std::sync::{Arc, Weak};

use herald_core::error::{HeraldError, Result};
use herald_core::traits::Store;
use herald_core::types::{
    ESCALATION_SUBSCRIPTION_SLUG, Notification, NotificationStatus, Transmission,
};

use crate::coordinator::{Coordinator, Dispatch};

pub const ESCALATED_PREFIX: &str = "escalated-";
pub const ESCALATION_NOTICE: &str = "This notification is escalated by the transmission";

pub struct EscalationHandler {
    store: Arc<dyn Store>,
    coordinator: Weak<Coordinator>,
}

impl EscalationHandler {
    pub fn new(store: Arc<dyn Store>, coordinator: Weak<Coordinator>) -> Self {
        Self { store, coordinator }
    }

    /// Build, insert and distribute the escalation notification. Not retried.
    pub async fn escalate(&self, transmission: &Transmission) -> Result<Dispatch> {
        let subscription = self
            .store
            .find_subscription_by_slug(ESCALATION_SUBSCRIPTION_SLUG)
            .await?
            .ok_or_else(|| {
                HeraldError::not_found(format!(
                    "subscription {ESCALATION_SUBSCRIPTION_SLUG} for escalating transmission {}",
                    transmission.id
                ))
            })?;
        let coordinator = self
            .coordinator
            .upgrade()
            .ok_or_else(|| HeraldError::service("coordinator is gone"))?;

        let escalated = self.insert(transmission).await?;
        tracing::warn!(
            "🚨 Escalated '{}' as '{}' to {}",
            transmission.notification.slug,
            escalated.slug,
            subscription.receiver
        );
        Ok(coordinator.send_via_subscription(&escalated, &subscription))
    }

    /// Each notification's first escalation takes `escalated-<slug>`; further
    /// escalations of the same notification append the transmission id.
    async fn insert(&self, transmission: &Transmission) -> Result<Notification> {
        let candidate = escalated_notification(transmission);
        match self.store.insert_notification(candidate.clone()).await {
            Err(HeraldError::Conflict(_)) => {
                let mut retry = candidate;
                retry.slug = format!("{}-{}", retry.slug, transmission.id);
                self.store.insert_notification(retry).await
            }
            other => other,
        }
    }
}

/// The synthetic notification for an exhausted transmission.
pub fn escalated_notification(transmission: &Transmission) -> Notification {
    let original = &transmission.notification;
    let mut escalated = original.clone();
    escalated.id = String::new();
    escalated.slug = format!("{ESCALATED_PREFIX}{}", original.slug);
    escalated.sender = format!("{ESCALATED_PREFIX}{}", original.sender);
    escalated.content = format!("{ESCALATION_NOTICE} {transmission}\n{}", original.content);
    escalated.status = NotificationStatus::Escalated;
    escalated
}

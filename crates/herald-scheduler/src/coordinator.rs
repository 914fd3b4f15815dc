//! Distribution coordinator: resolves subscribers for a notification and
//! fans it out to every channel they registered.

use std::sync::Arc;

use herald_core::config::DistributionConfig;
use herald_core::error::Result;
use herald_core::traits::{Deliverer, Store};
use herald_core::types::{Channel, Notification, Subscription, Transmission};

use crate::escalation::EscalationHandler;
use crate::pool::{TaskHandle, WorkerPool};
use crate::sender::ChannelSender;
use crate::watermark::Watermarks;

/// A channel that failed validation and was not sent.
#[derive(Debug, Clone)]
pub struct RejectedChannel {
    pub receiver: String,
    pub channel: Channel,
    pub reason: String,
}

/// Everything one fan-out started. Delivery runs in the background; join the
/// handles to observe it.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub handles: Vec<TaskHandle<Transmission>>,
    pub rejected: Vec<RejectedChannel>,
}

impl Dispatch {
    pub fn dispatched(&self) -> usize {
        self.handles.len()
    }

    pub fn merge(&mut self, other: Dispatch) {
        self.handles.extend(other.handles);
        self.rejected.extend(other.rejected);
    }

    /// Wait for every send, in dispatch order.
    pub async fn join_all(self) -> Vec<Result<Transmission>> {
        futures::future::join_all(self.handles.into_iter().map(TaskHandle::join)).await
    }
}

pub struct Coordinator {
    store: Arc<dyn Store>,
    sender: Arc<ChannelSender>,
}

impl Coordinator {
    /// Wire the coordinator, its channel sender and the escalation handler,
    /// which points back at the coordinator.
    pub fn new(
        store: Arc<dyn Store>,
        deliverers: Vec<Arc<dyn Deliverer>>,
        watermarks: Arc<Watermarks>,
        pool: WorkerPool,
        config: &DistributionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|coordinator| {
            let escalation = EscalationHandler::new(store.clone(), coordinator.clone());
            let sender = ChannelSender::new(
                store.clone(),
                deliverers,
                escalation,
                watermarks,
                pool,
                config,
            );
            Self {
                store,
                sender: Arc::new(sender),
            }
        })
    }

    pub fn sender(&self) -> &Arc<ChannelSender> {
        &self.sender
    }

    /// Send to every subscription whose categories or labels match.
    pub async fn distribute(&self, notification: &Notification) -> Result<Dispatch> {
        notification.validate()?;
        let subscriptions = self
            .store
            .find_subscriptions_by_categories_or_labels(
                &notification.category_set(),
                &notification.label_set(),
            )
            .await?;

        if subscriptions.is_empty() {
            tracing::info!("📭 No subscribers for '{}'", notification.slug);
        } else {
            tracing::info!(
                "📨 Distributing '{}' to {} subscription(s)",
                notification.slug,
                subscriptions.len()
            );
        }

        let mut dispatch = Dispatch::default();
        for subscription in &subscriptions {
            dispatch.merge(self.send_via_subscription(notification, subscription));
        }
        Ok(dispatch)
    }

    /// One send per channel; invalid channels are reported, not fatal.
    pub fn send_via_subscription(
        &self,
        notification: &Notification,
        subscription: &Subscription,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();
        for channel in &subscription.channels {
            match self.send_via_channel(notification, channel, &subscription.receiver) {
                Ok(handle) => dispatch.handles.push(handle),
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Skipping {channel} of subscription '{}': {e}",
                        subscription.slug
                    );
                    dispatch.rejected.push(RejectedChannel {
                        receiver: subscription.receiver.clone(),
                        channel: channel.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        dispatch
    }

    pub fn send_via_channel(
        &self,
        notification: &Notification,
        channel: &Channel,
        receiver: &str,
    ) -> Result<TaskHandle<Transmission>> {
        self.sender
            .send(notification.clone(), channel.clone(), receiver.to_string())
    }

    pub fn resend_via_channel(&self, transmission: Transmission) -> Result<TaskHandle<Transmission>> {
        self.sender.resend(transmission)
    }
}

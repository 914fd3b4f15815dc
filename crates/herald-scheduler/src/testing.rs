//! Test fixtures: scripted strategies, a read-counting store and a wired harness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::config::HeraldConfig;
use herald_core::error::Result;
use herald_core::traits::{Deliverer, Store};
use herald_core::types::*;
use herald_db::MemoryStore;

use crate::coordinator::Coordinator;
use crate::sender::ChannelSender;
use crate::service::Herald;
use crate::watermark::Watermarks;

// ─── Strategies ───────────────────────────────────────────

/// Records every attempt; fails the next `n` attempts on request.
pub struct ScriptedDeliverer {
    kind: ChannelKind,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    latency: Mutex<Duration>,
}

impl ScriptedDeliverer {
    fn new(kind: ChannelKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
        })
    }

    pub fn email() -> Arc<Self> {
        Self::new(ChannelKind::Email)
    }

    pub fn rest() -> Arc<Self> {
        Self::new(ChannelKind::Rest)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }
}

#[async_trait]
impl Deliverer for ScriptedDeliverer {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn deliver(&self, notification: &Notification, _channel: &Channel) -> TransmissionRecord {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            TransmissionRecord::failed(format!("scripted failure for {}", notification.slug))
        } else {
            TransmissionRecord::sent("scripted ok")
        }
    }
}

// ─── Store ────────────────────────────────────────────────

/// Memory store that counts read queries.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn all_notifications(&self) -> Vec<Notification> {
        let far = Utc::now() + chrono::Duration::days(1);
        self.inner.find_notifications_modified_before(None, far).await.unwrap()
    }

    pub async fn all_transmissions(&self) -> Vec<Transmission> {
        let mut all = Vec::new();
        for status in [
            TransmissionStatus::Sent,
            TransmissionStatus::Failed,
            TransmissionStatus::Acknowledged,
            TransmissionStatus::Escalated,
        ] {
            all.extend(self.inner.find_transmissions_by_status(status, usize::MAX).await.unwrap());
        }
        all
    }

    pub async fn transmission(&self, id: &str) -> Option<Transmission> {
        self.all_transmissions().await.into_iter().find(|t| t.id == id)
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.inner.insert_notification(notification).await
    }

    async fn save_notification(&self, notification: Notification) -> Result<Notification> {
        self.inner.save_notification(notification).await
    }

    async fn delete_notifications(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete_notifications(ids).await
    }

    async fn find_notification_by_slug(&self, slug: &str) -> Result<Option<Notification>> {
        self.read();
        self.inner.find_notification_by_slug(slug).await
    }

    async fn find_notifications_by_severity_and_status(
        &self,
        severity: NotificationSeverity,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>> {
        self.read();
        self.inner.find_notifications_by_severity_and_status(severity, status).await
    }

    async fn find_notifications_modified_before(
        &self,
        status: Option<NotificationStatus>,
        before: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        self.read();
        self.inner.find_notifications_modified_before(status, before).await
    }

    async fn find_notifications_by_sender(&self, sender: &str, limit: usize) -> Result<Vec<Notification>> {
        self.read();
        self.inner.find_notifications_by_sender(sender, limit).await
    }

    async fn find_notifications_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        self.read();
        self.inner.find_notifications_created_between(start, end, limit).await
    }

    async fn find_notifications_by_labels(&self, labels: &[String], limit: usize) -> Result<Vec<Notification>> {
        self.read();
        self.inner.find_notifications_by_labels(labels, limit).await
    }

    async fn find_notifications_by_status(
        &self,
        status: NotificationStatus,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        self.read();
        self.inner.find_notifications_by_status(status, limit).await
    }

    async fn insert_subscription(&self, subscription: Subscription) -> Result<Subscription> {
        self.inner.insert_subscription(subscription).await
    }

    async fn save_subscription(&self, subscription: Subscription) -> Result<Subscription> {
        self.inner.save_subscription(subscription).await
    }

    async fn delete_subscription(&self, id: &str) -> Result<bool> {
        self.inner.delete_subscription(id).await
    }

    async fn find_subscription_by_slug(&self, slug: &str) -> Result<Option<Subscription>> {
        self.read();
        self.inner.find_subscription_by_slug(slug).await
    }

    async fn find_subscriptions_by_categories_or_labels(
        &self,
        categories: &[NotificationCategory],
        labels: &[String],
    ) -> Result<Vec<Subscription>> {
        self.read();
        self.inner.find_subscriptions_by_categories_or_labels(categories, labels).await
    }

    async fn find_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.read();
        self.inner.find_all_subscriptions().await
    }

    async fn find_subscriptions_by_receiver(&self, receiver: &str) -> Result<Vec<Subscription>> {
        self.read();
        self.inner.find_subscriptions_by_receiver(receiver).await
    }

    async fn insert_transmission(&self, transmission: Transmission) -> Result<Transmission> {
        self.inner.insert_transmission(transmission).await
    }

    async fn save_transmission(&self, transmission: Transmission) -> Result<Transmission> {
        self.inner.save_transmission(transmission).await
    }

    async fn find_transmissions_by_status_and_resend_count_less_than(
        &self,
        status: TransmissionStatus,
        resend_limit: u32,
    ) -> Result<Vec<Transmission>> {
        self.read();
        self.inner
            .find_transmissions_by_status_and_resend_count_less_than(status, resend_limit)
            .await
    }

    async fn find_transmissions_by_notification_slug(
        &self,
        slug: &str,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        self.read();
        self.inner.find_transmissions_by_notification_slug(slug, limit).await
    }

    async fn find_transmissions_by_status(
        &self,
        status: TransmissionStatus,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        self.read();
        self.inner.find_transmissions_by_status(status, limit).await
    }

    async fn find_transmissions_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        self.read();
        self.inner.find_transmissions_created_between(start, end, limit).await
    }

    async fn delete_transmissions_by_notifications(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete_transmissions_by_notifications(ids).await
    }

    async fn delete_transmissions_by_status_modified_before(
        &self,
        status: TransmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<usize> {
        self.inner
            .delete_transmissions_by_status_modified_before(status, before)
            .await
    }
}

// ─── Harness ──────────────────────────────────────────────

pub fn test_config(resend_limit: u32) -> HeraldConfig {
    let mut config = HeraldConfig::default();
    config.distribution.resend_limit = resend_limit;
    config.distribution.pool_size = 4;
    config.distribution.critical_resend_delay_ms = 20;
    config.distribution.normal_sweep_interval_ms = 20;
    config.distribution.normal_resend_interval_ms = 20;
    config
}

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub email: Arc<ScriptedDeliverer>,
    pub rest: Arc<ScriptedDeliverer>,
    pub watermarks: Arc<Watermarks>,
    pub coordinator: Arc<Coordinator>,
    pub herald: Herald,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_limit(2).await
    }

    pub async fn with_limit(resend_limit: u32) -> Self {
        Self::build(test_config(resend_limit), true)
    }

    /// Only the EMAIL strategy is registered.
    pub async fn email_only() -> Self {
        Self::build(test_config(2), false)
    }

    fn build(config: HeraldConfig, with_rest: bool) -> Self {
        let store = Arc::new(CountingStore::default());
        let email = ScriptedDeliverer::email();
        let rest = ScriptedDeliverer::rest();
        let mut deliverers: Vec<Arc<dyn Deliverer>> = vec![email.clone()];
        if with_rest {
            deliverers.push(rest.clone());
        }
        let herald = Herald::new(config, store.clone(), deliverers);
        Self {
            store,
            email,
            rest,
            watermarks: herald.watermarks().clone(),
            coordinator: herald.coordinator().clone(),
            herald,
        }
    }

    pub fn sender(&self) -> &Arc<ChannelSender> {
        self.coordinator.sender()
    }

    pub fn delay(&self) -> Duration {
        self.herald.config().distribution.critical_resend_delay()
    }

    pub async fn subscribe(&self, subscription: Subscription) -> Subscription {
        self.store.insert_subscription(subscription).await.unwrap()
    }

    /// Escalations go out over REST so they are counted apart from EMAIL.
    pub async fn subscribe_escalation(&self) -> Subscription {
        self.subscribe(
            Subscription::new(ESCALATION_SUBSCRIPTION_SLUG, "escalation-desk")
                .with_channel(Channel::rest("http://pager.local/escalations", HttpMethod::Post)),
        )
        .await
    }
}

pub async fn stored_notification(h: &Harness, slug: &str, severity: NotificationSeverity) -> Notification {
    h.store
        .insert_notification(
            Notification::new(slug, "sensor", severity, "content")
                .with_category(NotificationCategory::SwHealth),
        )
        .await
        .unwrap()
}

/// Poll `cond` until it holds; panics after two seconds.
pub async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

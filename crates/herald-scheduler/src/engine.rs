//! Sweep engine: the fixed-delay loops that drive normal-severity work.
//!
//! Each sweep consults its watermark first and returns without touching the
//! store when nothing changed since its last pass. The loop runs one tick,
//! sleeps the interval, and repeats until the shutdown signal flips.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::error::Result;
use herald_core::traits::Store;
use herald_core::types::{NotificationSeverity, NotificationStatus, TransmissionStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::coordinator::Coordinator;
use crate::pool::WorkerPool;
use crate::watermark::Watermarks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Watermarks showed nothing to do; the store was not queried.
    Skipped,
    /// Number of records handed to the coordinator.
    Processed(usize),
}

/// A periodic batch job.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    async fn tick(&self) -> Result<SweepOutcome>;
}

// ─── Normal distribution ──────────────────────────────────

/// Distributes `NORMAL` notifications still in `NEW`.
pub struct NormalDistributionSweep {
    store: Arc<dyn Store>,
    coordinator: Arc<Coordinator>,
    watermarks: Arc<Watermarks>,
    interval: Duration,
}

impl NormalDistributionSweep {
    pub fn new(
        store: Arc<dyn Store>,
        coordinator: Arc<Coordinator>,
        watermarks: Arc<Watermarks>,
        interval: Duration,
    ) -> Self {
        Self { store, coordinator, watermarks, interval }
    }
}

#[async_trait]
impl Sweep for NormalDistributionSweep {
    fn name(&self) -> &'static str {
        "normal-distribution"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<SweepOutcome> {
        if self.watermarks.distribution_is_clean() {
            return Ok(SweepOutcome::Skipped);
        }
        // Anything created after this instant is left dirty for the next tick.
        let started = Utc::now();
        let pending = self
            .store
            .find_notifications_by_severity_and_status(NotificationSeverity::Normal, NotificationStatus::New)
            .await?;

        let count = pending.len();
        for mut notification in pending {
            self.coordinator.distribute(&notification).await?;
            notification.transition(NotificationStatus::Processed)?;
            self.store.save_notification(notification).await?;
        }

        self.watermarks.sweep_processed(started);
        if count > 0 {
            tracing::info!("📬 Normal sweep distributed {count} notification(s)");
        }
        Ok(SweepOutcome::Processed(count))
    }
}

// ─── Normal resend ────────────────────────────────────────

/// Resends every failed transmission that still has budget. A critical one
/// whose timer is armed is in flight and comes back as a `Conflict`; one whose
/// timer was lost (process restart) is recovered here.
pub struct NormalResendSweep {
    store: Arc<dyn Store>,
    coordinator: Arc<Coordinator>,
    watermarks: Arc<Watermarks>,
    resend_limit: u32,
    interval: Duration,
}

impl NormalResendSweep {
    pub fn new(
        store: Arc<dyn Store>,
        coordinator: Arc<Coordinator>,
        watermarks: Arc<Watermarks>,
        resend_limit: u32,
        interval: Duration,
    ) -> Self {
        Self { store, coordinator, watermarks, resend_limit, interval }
    }
}

#[async_trait]
impl Sweep for NormalResendSweep {
    fn name(&self) -> &'static str {
        "normal-resend"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<SweepOutcome> {
        if self.watermarks.resend_is_clean() {
            return Ok(SweepOutcome::Skipped);
        }
        let started = Utc::now();
        let failed = self
            .store
            .find_transmissions_by_status_and_resend_count_less_than(TransmissionStatus::Failed, self.resend_limit)
            .await?;

        let mut resent = 0;
        for transmission in failed {
            let id = transmission.id.clone();
            match self.coordinator.resend_via_channel(transmission) {
                Ok(_) => resent += 1,
                Err(e) => tracing::warn!("⚠️ Resend of {id} skipped: {e}"),
            }
        }

        self.watermarks.resend_processed(started);
        if resent > 0 {
            tracing::info!("🔁 Resend sweep resent {resent} transmission(s)");
        }
        Ok(SweepOutcome::Processed(resent))
    }
}

// ─── Loop ─────────────────────────────────────────────────

/// Run `sweep` on the pool, then wait its interval, until `shutdown` is set.
pub fn spawn_sweep(
    sweep: Arc<dyn Sweep>,
    pool: WorkerPool,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("⏰ Sweep '{}' started (every {:?})", sweep.name(), sweep.interval());
        loop {
            if *shutdown.borrow() {
                break;
            }

            let body = sweep.clone();
            match pool.spawn(sweep.name(), async move { body.tick().await }).join().await {
                Ok(SweepOutcome::Skipped) => tracing::trace!("Sweep '{}' skipped", sweep.name()),
                Ok(SweepOutcome::Processed(n)) => {
                    tracing::debug!("Sweep '{}' processed {n}", sweep.name())
                }
                // Already logged by the pool.
                Err(_) => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(sweep.interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("🛑 Sweep '{}' stopped", sweep.name());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, wait_for};
    use herald_core::types::{
        Channel, Notification, NotificationCategory, Subscription, Transmission, TransmissionRecord,
    };

    async fn subscribe_sw(h: &Harness) {
        h.subscribe(
            Subscription::new("sw", "sw-team")
                .with_categories([NotificationCategory::SwHealth])
                .with_channel(Channel::email(["sw@example.com"])),
        )
        .await;
    }

    fn normal(slug: &str) -> Notification {
        Notification::new(slug, "app", NotificationSeverity::Normal, "degraded")
            .with_category(NotificationCategory::SwHealth)
    }

    #[tokio::test]
    async fn test_distribution_sweep_processes_new_normal() {
        let h = Harness::new().await;
        subscribe_sw(&h).await;
        h.herald.notifications().receive(normal("n-1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;

        let outcome = h.herald.distribution_sweep().tick().await.unwrap();
        assert_eq!(outcome, SweepOutcome::Processed(1));
        let stored = h.store.find_notification_by_slug("n-1").await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Processed);
        wait_for(|| h.email.calls() == 1).await;
    }

    #[tokio::test]
    async fn test_idle_tick_makes_no_store_queries() {
        let h = Harness::new().await;
        subscribe_sw(&h).await;
        h.herald.notifications().receive(normal("n-2")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;

        let sweep = h.herald.distribution_sweep();
        assert_eq!(sweep.tick().await.unwrap(), SweepOutcome::Processed(1));
        let reads = h.store.reads();
        assert_eq!(sweep.tick().await.unwrap(), SweepOutcome::Skipped);
        assert_eq!(h.store.reads(), reads);
    }

    #[tokio::test]
    async fn test_resend_sweep_recovers_critical_without_timer() {
        let h = Harness::with_limit(2).await;
        let critical = h
            .store
            .insert_notification(
                Notification::new("crit", "app", NotificationSeverity::Critical, "down")
                    .with_category(NotificationCategory::SwHealth),
            )
            .await
            .unwrap();
        // Failed before a restart: stored, but no timer armed in this process.
        let orphan = h
            .store
            .insert_transmission(Transmission::first(
                critical,
                "ops",
                Channel::email(["a@example.com"]),
                TransmissionRecord::failed("relay down"),
            ))
            .await
            .unwrap();

        assert_eq!(h.herald.resend_sweep().tick().await.unwrap(), SweepOutcome::Processed(1));
        wait_for(|| h.email.calls() == 1).await;
        let mut recovered = None;
        for _ in 0..100 {
            recovered = h.store.transmission(&orphan.id).await;
            if recovered.as_ref().is_some_and(|t| t.status == TransmissionStatus::Sent) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let recovered = recovered.unwrap();
        assert_eq!(recovered.status, TransmissionStatus::Sent);
        assert_eq!(recovered.resend_count, 1);
    }

    #[tokio::test]
    async fn test_resend_sweep_leaves_armed_critical_to_its_timer() {
        let h = Harness::with_limit(2).await;
        h.email.fail_next(1);
        let critical = h
            .store
            .insert_notification(
                Notification::new("crit-live", "app", NotificationSeverity::Critical, "down")
                    .with_category(NotificationCategory::SwHealth),
            )
            .await
            .unwrap();
        let t = h
            .coordinator
            .send_via_channel(&critical, &Channel::email(["a@example.com"]), "a")
            .unwrap()
            .join()
            .await
            .unwrap();
        assert_eq!(t.status, TransmissionStatus::Failed);

        assert_eq!(h.herald.resend_sweep().tick().await.unwrap(), SweepOutcome::Processed(0));
        wait_for(|| h.email.calls() == 2).await;
        tokio::time::sleep(h.delay() * 3).await;
        assert_eq!(h.email.calls(), 2);
    }

    #[tokio::test]
    async fn test_resend_sweep_retries_normal_failures() {
        let h = Harness::new().await;
        subscribe_sw(&h).await;
        h.email.fail_next(1);
        h.herald.notifications().receive(normal("flaky")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        h.herald.distribution_sweep().tick().await.unwrap();
        wait_for(|| h.email.calls() == 1).await;
        // Let the failed write land before sweeping.
        let slug = "flaky";
        let mut failed = Vec::new();
        for _ in 0..100 {
            failed = h.store.find_transmissions_by_notification_slug(slug, 10).await.unwrap();
            if failed.first().is_some_and(|t| t.status == TransmissionStatus::Failed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(failed.len(), 1);

        assert_eq!(h.herald.resend_sweep().tick().await.unwrap(), SweepOutcome::Processed(1));
        wait_for(|| h.email.calls() == 2).await;
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let h = Harness::new().await;
        let handles = h.herald.spawn_sweeps();
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.herald.shutdown();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .expect("sweep did not stop")
                .unwrap();
        }
    }
}

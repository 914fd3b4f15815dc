//! Channel sender: one delivery attempt per call, recorded in the
//! transmission ledger, followed by the severity-specific failure policy.
//!
//! ```text
//! send(n, channel, receiver)          resend(t)
//!   validate ──────────────┐           validate + claim in-flight slot
//!                          ▼                 │
//!           deliverer[channel.kind()].deliver()
//!                          │
//!        insert Transmission / append record + save
//!                          │
//!                  FAILED and not escalated?
//!          ┌───────────────┴────────────────┐
//!      CRITICAL                           NORMAL
//!   count < limit → delayed resend     bump "transmission failed"
//!   otherwise     → escalate, ESCALATED   watermark
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use herald_core::config::DistributionConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::{Deliverer, Store};
use herald_core::types::{
    Channel, ChannelKind, Notification, NotificationSeverity, NotificationStatus, Transmission,
};

use crate::escalation::EscalationHandler;
use crate::pool::{TaskHandle, WorkerPool};
use crate::watermark::Watermarks;

/// Releases a transmission's in-flight slot when dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

pub struct ChannelSender {
    store: Arc<dyn Store>,
    deliverers: HashMap<ChannelKind, Arc<dyn Deliverer>>,
    escalation: EscalationHandler,
    watermarks: Arc<Watermarks>,
    pool: WorkerPool,
    resend_limit: u32,
    critical_resend_delay: Duration,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ChannelSender {
    pub fn new(
        store: Arc<dyn Store>,
        deliverers: Vec<Arc<dyn Deliverer>>,
        escalation: EscalationHandler,
        watermarks: Arc<Watermarks>,
        pool: WorkerPool,
        config: &DistributionConfig,
    ) -> Self {
        let deliverers = deliverers
            .into_iter()
            .map(|d| (d.kind(), d))
            .collect::<HashMap<_, _>>();
        Self {
            store,
            deliverers,
            escalation,
            watermarks,
            pool,
            resend_limit: config.resend_limit,
            critical_resend_delay: config.critical_resend_delay(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn resend_limit(&self) -> u32 {
        self.resend_limit
    }

    /// Channel kinds with a registered strategy.
    pub fn kinds(&self) -> Vec<ChannelKind> {
        self.deliverers.keys().copied().collect()
    }

    // ─── Validation ────────────────────────────────────────

    fn deliverer_for(&self, channel: &Channel) -> Result<Arc<dyn Deliverer>> {
        self.deliverers.get(&channel.kind()).cloned().ok_or_else(|| {
            HeraldError::validation(format!("no delivery strategy registered for {}", channel.kind()))
        })
    }

    fn check_send(&self, notification: &Notification, channel: &Channel) -> Result<Arc<dyn Deliverer>> {
        if notification.id.is_empty() || notification.slug.trim().is_empty() {
            return Err(HeraldError::validation("notification has no identity"));
        }
        channel.validate()?;
        self.deliverer_for(channel)
    }

    fn check_resend(&self, transmission: &Transmission) -> Result<Arc<dyn Deliverer>> {
        if transmission.id.is_empty() {
            return Err(HeraldError::validation("transmission has no identity"));
        }
        if transmission.is_escalated() {
            return Err(HeraldError::validation(format!(
                "transmission {} is escalated",
                transmission.id
            )));
        }
        self.check_send(&transmission.notification, &transmission.channel)
    }

    fn claim(&self, id: &str) -> Result<InFlightGuard> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|e| HeraldError::service(format!("in-flight set poisoned: {e}")))?;
        if !set.insert(id.to_string()) {
            return Err(HeraldError::Conflict(format!("transmission {id} is already being resent")));
        }
        Ok(InFlightGuard {
            set: self.in_flight.clone(),
            id: id.to_string(),
        })
    }

    // ─── Send ──────────────────────────────────────────────

    /// Validate, then deliver on the pool.
    pub fn send(
        self: &Arc<Self>,
        notification: Notification,
        channel: Channel,
        receiver: String,
    ) -> Result<TaskHandle<Transmission>> {
        let deliverer = self.check_send(&notification, &channel)?;
        let name = format!("send {} → {receiver} via {}", notification.slug, channel.kind());
        let this = self.clone();
        Ok(self.pool.spawn(name, async move {
            this.attempt_first(deliverer, notification, channel, receiver).await
        }))
    }

    /// Validate and deliver on the current task.
    pub async fn send_now(
        self: &Arc<Self>,
        notification: Notification,
        channel: Channel,
        receiver: String,
    ) -> Result<Transmission> {
        let deliverer = self.check_send(&notification, &channel)?;
        self.attempt_first(deliverer, notification, channel, receiver).await
    }

    async fn attempt_first(
        self: &Arc<Self>,
        deliverer: Arc<dyn Deliverer>,
        notification: Notification,
        channel: Channel,
        receiver: String,
    ) -> Result<Transmission> {
        let record = deliverer.deliver(&notification, &channel).await;
        let transmission = Transmission::first(notification, receiver, channel, record);
        let stored = match self.store.insert_transmission(transmission.clone()).await {
            Ok(stored) => stored,
            Err(e) => return Err(ledger_gap(&transmission, e)),
        };
        tracing::debug!(
            "📝 Transmission {} for '{}' → {} ({})",
            stored.id,
            stored.notification.slug,
            stored.receiver,
            stored.status
        );
        self.handle_failure(stored).await
    }

    // ─── Resend ────────────────────────────────────────────

    /// Validate, claim the in-flight slot, then re-deliver on the pool.
    pub fn resend(self: &Arc<Self>, transmission: Transmission) -> Result<TaskHandle<Transmission>> {
        let deliverer = self.check_resend(&transmission)?;
        let guard = self.claim(&transmission.id)?;
        let name = format!(
            "resend {} (#{})",
            transmission.id,
            transmission.resend_count + 1
        );
        let this = self.clone();
        Ok(self.pool.spawn(name, async move {
            this.attempt_again(guard, deliverer, transmission).await
        }))
    }

    pub async fn resend_now(self: &Arc<Self>, transmission: Transmission) -> Result<Transmission> {
        let deliverer = self.check_resend(&transmission)?;
        let guard = self.claim(&transmission.id)?;
        self.attempt_again(guard, deliverer, transmission).await
    }

    async fn attempt_again(
        self: &Arc<Self>,
        guard: InFlightGuard,
        deliverer: Arc<dyn Deliverer>,
        mut transmission: Transmission,
    ) -> Result<Transmission> {
        let record = deliverer
            .deliver(&transmission.notification, &transmission.channel)
            .await;
        transmission.append(record);
        let stored = match self.store.save_transmission(transmission.clone()).await {
            Ok(stored) => stored,
            Err(e) => return Err(ledger_gap(&transmission, e)),
        };
        tracing::debug!(
            "🔁 Transmission {} resend #{} ({})",
            stored.id,
            stored.resend_count,
            stored.status
        );
        drop(guard);
        self.handle_failure(stored).await
    }

    // ─── Failure policy ────────────────────────────────────

    async fn handle_failure(self: &Arc<Self>, transmission: Transmission) -> Result<Transmission> {
        if !transmission.is_failed()
            || transmission.notification.status == NotificationStatus::Escalated
        {
            return Ok(transmission);
        }

        match transmission.notification.severity {
            NotificationSeverity::Critical if transmission.resend_count < self.resend_limit => {
                self.schedule_resend(transmission.clone());
                Ok(transmission)
            }
            NotificationSeverity::Critical => self.escalate(transmission).await,
            NotificationSeverity::Normal => {
                self.watermarks.transmission_failed(transmission.modified);
                Ok(transmission)
            }
        }
    }

    /// The in-flight slot is held from arming until the attempt is recorded,
    /// so a sweep resend of the same transmission meets a `Conflict`.
    fn schedule_resend(self: &Arc<Self>, transmission: Transmission) {
        let guard = match self.claim(&transmission.id) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("⚠️ Resend timer for {} not armed: {e}", transmission.id);
                return;
            }
        };
        tracing::info!(
            "⏳ Critical transmission {} failed ({}/{}), resending in {:?}",
            transmission.id,
            transmission.resend_count,
            self.resend_limit,
            self.critical_resend_delay
        );
        let name = format!("critical resend {}", transmission.id);
        let this = self.clone();
        // Observed through the pool's failure channel.
        let _ = self.pool.spawn_after(self.critical_resend_delay, name, async move {
            let deliverer = this.check_resend(&transmission)?;
            this.attempt_again(guard, deliverer, transmission).await
        });
    }

    async fn escalate(&self, mut transmission: Transmission) -> Result<Transmission> {
        tracing::warn!(
            "🚨 Critical transmission {} exhausted {} resends, escalating",
            transmission.id,
            transmission.resend_count
        );
        self.escalation.escalate(&transmission).await?;
        transmission.escalate();
        match self.store.save_transmission(transmission.clone()).await {
            Ok(saved) => Ok(saved),
            Err(e) => Err(ledger_gap(&transmission, e)),
        }
    }
}

/// A delivery happened but its ledger write did not.
fn ledger_gap(transmission: &Transmission, cause: HeraldError) -> HeraldError {
    tracing::error!("❌ Unrecorded transmission ({cause}): {transmission:?}");
    HeraldError::service(format!(
        "transmission for '{}' → {} not recorded: {cause}",
        transmission.notification.slug, transmission.receiver
    ))
}

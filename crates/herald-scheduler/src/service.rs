//! `Herald`: wires the store, strategies, pool, coordinator, handlers and
//! sweeps from one configuration.

use std::sync::Arc;

use herald_core::config::HeraldConfig;
use herald_core::traits::{Deliverer, Store};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::admin::{SubscriptionHandler, TransmissionHandler};
use crate::cleanup::CleanupService;
use crate::coordinator::Coordinator;
use crate::engine::{NormalDistributionSweep, NormalResendSweep, Sweep, spawn_sweep};
use crate::ingest::NotificationHandler;
use crate::pool::{TaskFailure, WorkerPool};
use crate::watermark::Watermarks;

pub struct Herald {
    config: HeraldConfig,
    store: Arc<dyn Store>,
    watermarks: Arc<Watermarks>,
    pool: WorkerPool,
    coordinator: Arc<Coordinator>,
    notifications: NotificationHandler,
    subscriptions: SubscriptionHandler,
    transmissions: TransmissionHandler,
    cleanup: CleanupService,
    shutdown: watch::Sender<bool>,
}

impl Herald {
    pub fn new(config: HeraldConfig, store: Arc<dyn Store>, deliverers: Vec<Arc<dyn Deliverer>>) -> Self {
        let watermarks = Arc::new(Watermarks::new());
        let pool = WorkerPool::new(config.distribution.pool_size);
        let coordinator = Coordinator::new(
            store.clone(),
            deliverers,
            watermarks.clone(),
            pool.clone(),
            &config.distribution,
        );
        let (shutdown, _) = watch::channel(false);

        tracing::info!(
            "🚀 Herald ready: {} channel kind(s), resend limit {}, pool {}",
            coordinator.sender().kinds().len(),
            config.distribution.resend_limit,
            pool.size()
        );

        Self {
            notifications: NotificationHandler::new(store.clone(), coordinator.clone(), watermarks.clone()),
            subscriptions: SubscriptionHandler::new(store.clone()),
            transmissions: TransmissionHandler::new(store.clone()),
            cleanup: CleanupService::new(store.clone(), config.cleanup.default_age()),
            config,
            store,
            watermarks,
            pool,
            coordinator,
            shutdown,
        }
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn watermarks(&self) -> &Arc<Watermarks> {
        &self.watermarks
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn notifications(&self) -> &NotificationHandler {
        &self.notifications
    }

    pub fn subscriptions(&self) -> &SubscriptionHandler {
        &self.subscriptions
    }

    pub fn transmissions(&self) -> &TransmissionHandler {
        &self.transmissions
    }

    pub fn cleanup(&self) -> &CleanupService {
        &self.cleanup
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<TaskFailure> {
        self.pool.subscribe_failures()
    }

    pub fn distribution_sweep(&self) -> Arc<NormalDistributionSweep> {
        Arc::new(NormalDistributionSweep::new(
            self.store.clone(),
            self.coordinator.clone(),
            self.watermarks.clone(),
            self.config.distribution.normal_sweep_interval(),
        ))
    }

    pub fn resend_sweep(&self) -> Arc<NormalResendSweep> {
        Arc::new(NormalResendSweep::new(
            self.store.clone(),
            self.coordinator.clone(),
            self.watermarks.clone(),
            self.config.distribution.resend_limit,
            self.config.distribution.normal_resend_interval(),
        ))
    }

    /// Start both normal-severity sweep loops.
    pub fn spawn_sweeps(&self) -> Vec<JoinHandle<()>> {
        let sweeps: [Arc<dyn Sweep>; 2] = [self.distribution_sweep(), self.resend_sweep()];
        sweeps
            .into_iter()
            .map(|sweep| spawn_sweep(sweep, self.pool.clone(), self.shutdown.subscribe()))
            .collect()
    }

    /// Stop the sweep loops. In-flight sends and pending one-shot resends run on.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("👋 Herald shutting down");
    }
}

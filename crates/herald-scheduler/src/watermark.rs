//! Sweep watermarks: cheap "dirty" hints that let the normal-severity
//! sweeps skip a tick without touching the store.
//!
//! Values are epoch milliseconds, start at 0 and only ever move forward.
//! They are hints: a sweep that runs still trusts the store query.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct Watermarks {
    notification_created: AtomicI64,
    sweep_processed: AtomicI64,
    transmission_failed: AtomicI64,
    resend_processed: AtomicI64,
}

fn advance(cell: &AtomicI64, at: DateTime<Utc>) {
    cell.fetch_max(at.timestamp_millis(), Ordering::AcqRel);
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A normal notification was accepted.
    pub fn notification_created(&self, at: DateTime<Utc>) {
        advance(&self.notification_created, at);
    }

    /// The distribution sweep finished a pass.
    pub fn sweep_processed(&self, at: DateTime<Utc>) {
        advance(&self.sweep_processed, at);
    }

    /// A normal transmission failed.
    pub fn transmission_failed(&self, at: DateTime<Utc>) {
        advance(&self.transmission_failed, at);
    }

    /// The resend sweep finished a pass.
    pub fn resend_processed(&self, at: DateTime<Utc>) {
        advance(&self.resend_processed, at);
    }

    /// True when no normal notification arrived since the last sweep pass.
    pub fn distribution_is_clean(&self) -> bool {
        self.sweep_processed.load(Ordering::Acquire)
            > self.notification_created.load(Ordering::Acquire)
    }

    /// True when no normal transmission failed since the last resend pass.
    pub fn resend_is_clean(&self) -> bool {
        self.resend_processed.load(Ordering::Acquire)
            > self.transmission_failed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> WatermarkSnapshot {
        WatermarkSnapshot {
            notification_created: self.notification_created.load(Ordering::Acquire),
            sweep_processed: self.sweep_processed.load(Ordering::Acquire),
            transmission_failed: self.transmission_failed.load(Ordering::Acquire),
            resend_processed: self.resend_processed.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time copy, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct WatermarkSnapshot {
    pub notification_created: i64,
    pub sweep_processed: i64,
    pub transmission_failed: i64,
    pub resend_processed: i64,
}

//! # Herald Scheduler
//!
//! Distribution, delivery, retry and escalation.
//!
//! ## Architecture
//! ```text
//! NotificationHandler::receive
//!   ├── CRITICAL → Coordinator::distribute now
//!   └── NORMAL   → watermark, picked up by NormalDistributionSweep
//!
//! Coordinator (subscriptions by category OR label)
//!   └── per channel → ChannelSender::send  ── WorkerPool (semaphore)
//!                        ├── Deliverer[EMAIL | REST]
//!                        ├── Transmission ledger (Store)
//!                        └── on FAILED
//!                              ├── CRITICAL: one-shot delayed resend,
//!                              │             EscalationHandler when exhausted
//!                              └── NORMAL:   watermark → NormalResendSweep
//! ```

pub mod admin;
pub mod cleanup;
pub mod coordinator;
pub mod engine;
pub mod escalation;
pub mod ingest;
pub mod pool;
pub mod sender;
pub mod service;
pub mod watermark;

#[cfg(test)]
mod testing;

pub use admin::{SubscriptionHandler, TransmissionHandler};
pub use cleanup::{CleanupReport, CleanupService};
pub use coordinator::{Coordinator, Dispatch, RejectedChannel};
pub use engine::{NormalDistributionSweep, NormalResendSweep, Sweep, SweepOutcome};
pub use escalation::EscalationHandler;
pub use ingest::{NotificationHandler, Receipt};
pub use pool::{TaskFailure, TaskHandle, WorkerPool};
pub use sender::ChannelSender;
pub use service::Herald;
pub use watermark::{WatermarkSnapshot, Watermarks};

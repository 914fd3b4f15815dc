//! Bounded worker pool: every send, resend, escalation and sweep body runs
//! here. Concurrency is capped by a semaphore; delayed work sleeps without
//! holding a slot and only competes for one when it is due.
//!
//! Failed tasks are logged and published on a broadcast channel so that
//! fire-and-forget work is still observable.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;

const FAILURE_CHANNEL_CAPACITY: usize = 256;

/// A background task that ended in an error.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Result channel of one pooled task.
pub struct TaskHandle<T> {
    name: String,
    inner: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the task. A panicked or aborted task is a `Service` error.
    pub async fn join(self) -> Result<T> {
        match self.inner.await {
            Ok(result) => result,
            Err(e) => Err(HeraldError::service(format!("task '{}' did not complete: {e}", self.name))),
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.inner.is_finished())
            .finish()
    }
}

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    active: Arc<AtomicUsize>,
    failures: broadcast::Sender<TaskFailure>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        tracing::debug!("🧵 Worker pool: {size} slots");
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            active: Arc::new(AtomicUsize::new(0)),
            failures,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks currently holding a slot.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<TaskFailure> {
        self.failures.subscribe()
    }

    /// Run `fut` once a slot is free.
    pub fn spawn<T, F>(&self, name: impl Into<String>, fut: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let name = name.into();
        let permits = self.permits.clone();
        let active = self.active.clone();
        let failures = self.failures.clone();
        let task = name.clone();

        let inner = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| HeraldError::service(format!("worker pool closed: {e}")))?;
            active.fetch_add(1, Ordering::AcqRel);
            let result = fut.await;
            active.fetch_sub(1, Ordering::AcqRel);

            if let Err(e) = &result {
                tracing::error!("❌ Task '{task}' failed: {e}");
                // No subscribers is fine.
                let _ = failures.send(TaskFailure {
                    task,
                    error: e.to_string(),
                    at: Utc::now(),
                });
            }
            result
        });

        TaskHandle { name, inner }
    }

    /// Run `fut` on the pool after `delay`. Single-shot, not cancellable.
    pub fn spawn_after<T, F>(&self, delay: Duration, name: impl Into<String>, fut: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let name = name.into();
        let pool = self.clone();
        let task = name.clone();
        let inner = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pool.spawn(task, fut).join().await
        });
        TaskHandle { name, inner }
    }
}

//! Bounded-concurrency admission control for backend calls.
//!
//! # Responsibilities
//! - Cap simultaneous backend calls at `max_concurrency`
//! - Queue excess callers FIFO, each for at most its wait bound
//! - Release slots on every exit path (return, error, panic, cancellation)
//!
//! # Design Decisions
//! - Tokio's semaphore is fair: released permits go to the oldest waiter,
//!   and `try_acquire` cannot barge past queued callers
//! - Slots are RAII guards; dropping one is the release
//! - A dropped (cancelled) acquire future leaves the wait list immediately
//! - Closing the queue rejects queued and future callers

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;

use crate::config::QueueConfig;
use crate::error::OrchestratorError;
use crate::observability::MetricsRecorder;

struct Shared {
    slots: Arc<Semaphore>,
    max_concurrency: usize,
    waiting: AtomicUsize,
    metrics: Arc<dyn MetricsRecorder>,
}

impl Shared {
    fn in_flight(&self) -> usize {
        self.max_concurrency.saturating_sub(self.slots.available_permits())
    }

    fn publish_depth(&self) {
        self.metrics
            .record_queue_depth(self.waiting.load(Ordering::Relaxed), self.in_flight());
    }
}

/// Current occupancy of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub max_concurrency: usize,
    pub in_flight: usize,
    pub waiting: usize,
}

pub struct RequestQueue {
    shared: Arc<Shared>,
    wait_timeout: Duration,
}

impl RequestQueue {
    pub fn new(config: &QueueConfig, metrics: Arc<dyn MetricsRecorder>) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            shared: Arc::new(Shared {
                slots: Arc::new(Semaphore::new(max_concurrency)),
                max_concurrency,
                waiting: AtomicUsize::new(0),
                metrics,
            }),
            wait_timeout: config.queue_wait_timeout(),
        }
    }

    /// Acquire a slot, waiting at most `min(queue_wait_timeout, limit)`.
    pub async fn acquire(&self, limit: Duration) -> Result<QueueSlot, OrchestratorError> {
        let started = Instant::now();

        match self.shared.slots.clone().try_acquire_owned() {
            Ok(permit) => return Ok(self.slot(permit, started)),
            Err(TryAcquireError::Closed) => return Err(OrchestratorError::ShuttingDown),
            Err(TryAcquireError::NoPermits) => {}
        }

        let bound = self.wait_timeout.min(limit);
        let _waiter = WaiterGuard::enter(&self.shared);

        tracing::debug!(
            waiting = self.shared.waiting.load(Ordering::Relaxed),
            in_flight = self.shared.in_flight(),
            bound_ms = bound.as_millis() as u64,
            "All inference slots busy, queueing"
        );

        match tokio::time::timeout(bound, self.shared.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(self.slot(permit, started)),
            Ok(Err(_closed)) => Err(OrchestratorError::ShuttingDown),
            Err(_elapsed) => {
                let waited = started.elapsed();
                tracing::warn!(waited_ms = waited.as_millis() as u64, "Timed out waiting for inference slot");
                self.shared.metrics.record_queue_wait(waited);
                Err(OrchestratorError::QueueTimeout { waited })
            }
        }
    }

    /// Return a slot early. Dropping the slot has the same effect.
    pub fn release(&self, slot: QueueSlot) {
        drop(slot);
    }

    /// Stop admitting callers; queued callers fail with `ShuttingDown`.
    pub fn close(&self) {
        self.shared.slots.close();
        tracing::info!(in_flight = self.shared.in_flight(), "Request queue closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slots.is_closed()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            max_concurrency: self.shared.max_concurrency,
            in_flight: self.shared.in_flight(),
            waiting: self.shared.waiting.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, permit: OwnedSemaphorePermit, started: Instant) -> QueueSlot {
        self.shared.metrics.record_queue_wait(started.elapsed());
        self.shared.publish_depth();
        QueueSlot {
            permit: Some(permit),
            shared: self.shared.clone(),
        }
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("stats", &self.stats())
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

/// A held concurrency slot. Released when dropped.
pub struct QueueSlot {
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<Shared>,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        // Release first so the published depth reflects the freed slot.
        drop(self.permit.take());
        self.shared.publish_depth();
    }
}

impl std::fmt::Debug for QueueSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSlot").finish_non_exhaustive()
    }
}

/// Counts a caller on the wait list for as long as its acquire future lives.
struct WaiterGuard<'a> {
    shared: &'a Shared,
}

impl<'a> WaiterGuard<'a> {
    fn enter(shared: &'a Shared) -> Self {
        shared.waiting.fetch_add(1, Ordering::Relaxed);
        shared.publish_depth();
        Self { shared }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.shared.waiting.fetch_sub(1, Ordering::Relaxed);
        self.shared.publish_depth();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopMetrics;
    use std::sync::Mutex;

    fn queue(max: usize, wait_ms: u64) -> Arc<RequestQueue> {
        let config = QueueConfig {
            max_concurrency: max,
            queue_wait_timeout_ms: wait_ms,
        };
        Arc::new(RequestQueue::new(&config, Arc::new(NoopMetrics)))
    }

    async fn wait_for_waiters(q: &RequestQueue, n: usize) {
        while q.stats().waiting < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_concurrency() {
        let q = queue(3, 60_000);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let (q, active, peak) = (q.clone(), active.clone(), peak.clone());
            tasks.push(tokio::spawn(async move {
                let _slot = q.acquire(Duration::from_secs(60)).await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(q.stats().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_full() {
        let q = queue(1, 100);
        let _held = q.acquire(Duration::from_secs(10)).await.unwrap();

        let err = q.acquire(Duration::from_secs(10)).await.unwrap_err();
        match err {
            OrchestratorError::QueueTimeout { waited } => {
                assert!(waited >= Duration::from_millis(100) && waited < Duration::from_millis(105));
            }
            other => panic!("expected QueueTimeout, got {other:?}"),
        }
        assert_eq!(q.stats().waiting, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_shorter_than_wait_timeout() {
        let q = queue(1, 5_000);
        let _held = q.acquire(Duration::from_secs(10)).await.unwrap();

        let started = Instant::now();
        assert!(q.acquire(Duration::from_millis(30)).await.is_err());
        assert!(started.elapsed() < Duration::from_millis(35));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_wake_order() {
        let q = queue(1, 60_000);
        let held = q.acquire(Duration::from_secs(60)).await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for id in 0..4 {
            let (q2, order) = (q.clone(), order.clone());
            tasks.push(tokio::spawn(async move {
                let _slot = q2.acquire(Duration::from_secs(60)).await.unwrap();
                order.lock().unwrap().push(id);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }));
            wait_for_waiters(&q, id + 1).await;
        }

        q.release(held);
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_leaves_queue() {
        let q = queue(1, 60_000);
        let held = q.acquire(Duration::from_secs(60)).await.unwrap();

        let cancelled = tokio::time::timeout(Duration::from_millis(5), q.acquire(Duration::from_secs(60))).await;
        assert!(cancelled.is_err());
        assert_eq!(q.stats().waiting, 0);

        let q2 = q.clone();
        let next = tokio::spawn(async move { q2.acquire(Duration::from_secs(60)).await.is_ok() });
        wait_for_waiters(&q, 1).await;
        drop(held);
        assert!(next.await.unwrap());
    }

    #[tokio::test]
    async fn test_slot_released_on_panic() {
        let q = queue(1, 50);
        let q2 = q.clone();
        let result = tokio::spawn(async move {
            let _slot = q2.acquire(Duration::from_secs(1)).await.unwrap();
            panic!("backend call blew up");
        })
        .await;
        assert!(result.is_err());
        assert_eq!(q.stats().in_flight, 0);
        assert!(q.acquire(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_waiters() {
        let q = queue(1, 60_000);
        let _held = q.acquire(Duration::from_secs(60)).await.unwrap();

        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.acquire(Duration::from_secs(60)).await });
        wait_for_waiters(&q, 1).await;

        q.close();
        assert!(matches!(waiter.await.unwrap(), Err(OrchestratorError::ShuttingDown)));
        assert!(matches!(q.acquire(Duration::from_secs(1)).await, Err(OrchestratorError::ShuttingDown)));
    }
}

//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::orchestrator::AiBrainOrchestrator;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks hold a [`ShutdownSignal`]; triggering closes the
/// orchestrator and wakes every signal.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
    orchestrator: Arc<AiBrainOrchestrator>,
}

impl Shutdown {
    pub fn new(orchestrator: Arc<AiBrainOrchestrator>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
            orchestrator,
        }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
            triggered: self.triggered.clone(),
        }
    }

    /// Idempotent.
    pub fn trigger(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutdown triggered, no longer admitting inference requests");
        self.orchestrator.shutdown();
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

/// Resolves once shutdown has been triggered, including before subscription.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub async fn recv(mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        // Err(Closed) means the coordinator is gone; treat as shutdown too.
        let _ = self.rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrainConfig;
    use crate::transport::{model_fn, ModelOutput, Transport};
    use std::time::Duration;

    fn orchestrator() -> Arc<AiBrainOrchestrator> {
        let transport = Transport::direct(model_fn(|_, _| Ok(ModelOutput::text("ok", 1.0))));
        Arc::new(AiBrainOrchestrator::new(&BrainConfig::default(), transport))
    }

    #[tokio::test]
    async fn test_trigger_wakes_subscribers_and_closes_orchestrator() {
        let orch = orchestrator();
        let shutdown = Shutdown::new(orch.clone());
        let signal = shutdown.subscribe();

        let waiter = tokio::spawn(signal.recv());
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();

        assert!(shutdown.is_triggered());
        assert!(orch.snapshot().shutting_down);
    }

    #[tokio::test]
    async fn test_late_subscriber_resolves_immediately() {
        let shutdown = Shutdown::new(orchestrator());
        shutdown.trigger();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.subscribe().recv())
            .await
            .unwrap();
    }
}

//! Intake routing.
//!
//! The ingestor moves work items from the intake queue into their host's
//! queue and records one dispatch entry per item. It runs as a single
//! sequential loop: routing order is intake order, which is what keeps
//! per-host execution FIFO.

use super::runner::RunnerCore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Routes submitted work to per-host queues.
pub(crate) struct Ingestor {
    core: Arc<RunnerCore>,
}

impl Ingestor {
    pub(crate) fn new(core: Arc<RunnerCore>) -> Self {
        Self { core }
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Items still in the intake queue at shutdown are left there.
    pub(crate) async fn run(self, shutdown: CancellationToken) {
        debug!("Ingestor started");

        loop {
            let item = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                item = self.core.intake.recv() => item,
            };

            let host = item.host.clone();
            trace!(task_id = %item.id, host = %host, "Routing task to host queue");

            self.core.host_queue_or_create(&host).enqueue(item);
            self.core.dispatch.enqueue(host);
            self.core.metrics.record_ingested();
        }

        debug!("Ingestor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use crate::taskrunner::config::RunnerConfig;
    use crate::taskrunner::task::{Action, HostKey, TaskId, WorkItem};
    use crate::taskrunner::telemetry::NullTelemetrySink;
    use std::time::Duration;

    fn core() -> Arc<RunnerCore> {
        Arc::new(RunnerCore::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(NullTelemetrySink),
            RunnerConfig::default(),
        ))
    }

    fn item(id: &str, host: &str) -> WorkItem {
        WorkItem::new(
            TaskId::new(id),
            HostKey::new(host),
            "",
            Action::new(|_| async { Ok(String::new()) }),
        )
    }

    async fn wait_for_ingested(core: &RunnerCore, count: u64) {
        for _ in 0..100 {
            if core.metrics.ingested() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} ingested items", count);
    }

    #[tokio::test]
    async fn test_routes_items_by_host() {
        let core = core();
        let shutdown = CancellationToken::new();
        tokio::spawn(Ingestor::new(Arc::clone(&core)).run(shutdown.clone()));

        core.intake.enqueue(item("1", "a"));
        core.intake.enqueue(item("2", "b"));
        core.intake.enqueue(item("3", "a"));
        wait_for_ingested(&core, 3).await;
        shutdown.cancel();

        let a = core.host_queue(&HostKey::new("a")).unwrap();
        assert_eq!(a.dequeue().unwrap().id, TaskId::new("1"));
        assert_eq!(a.dequeue().unwrap().id, TaskId::new("3"));
        assert_eq!(core.host_queue(&HostKey::new("b")).unwrap().len(), 1);
        assert!(core.intake.is_empty());
    }

    #[tokio::test]
    async fn test_one_dispatch_entry_per_item() {
        let core = core();
        let shutdown = CancellationToken::new();
        tokio::spawn(Ingestor::new(Arc::clone(&core)).run(shutdown.clone()));

        core.intake.enqueue(item("1", "a"));
        core.intake.enqueue(item("2", "a"));
        core.intake.enqueue(item("3", "b"));
        wait_for_ingested(&core, 3).await;
        shutdown.cancel();

        assert_eq!(core.dispatch.dequeue(), Ok(HostKey::new("a")));
        assert_eq!(core.dispatch.dequeue(), Ok(HostKey::new("a")));
        assert_eq!(core.dispatch.dequeue(), Ok(HostKey::new("b")));
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let core = core();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Ingestor::new(Arc::clone(&core)).run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ingestor should stop")
            .unwrap();

        core.intake.enqueue(item("late", "a"));
        assert_eq!(core.intake.len(), 1);
    }
}

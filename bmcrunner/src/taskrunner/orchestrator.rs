//! Worker admission.
//!
//! The orchestrator is the only owner of the worker registry: the set of
//! hosts that currently have a live worker. It consumes dispatch entries in
//! order and, for each host with pending work and no worker, waits for a
//! gate slot and spawns one. Workers never touch the registry themselves;
//! they report their exit over a channel and the orchestrator removes the
//! entry.
//!
//! An exiting worker may race with new work for its host: the item lands
//! in the host queue while the worker is already leaving, and its dispatch
//! entry is skipped because the host still looks active. The exit handler
//! closes that gap by admitting a fresh worker whenever the host's queue is
//! non-empty when the exit is processed.

use super::gate::GateError;
use super::runner::RunnerCore;
use super::task::HostKey;
use super::worker::{ExitNotice, Worker};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Admits per-host workers under the global concurrency ceiling.
pub(crate) struct Orchestrator {
    core: Arc<RunnerCore>,
    active: HashSet<HostKey>,
    exits_tx: mpsc::UnboundedSender<HostKey>,
    exits_rx: mpsc::UnboundedReceiver<HostKey>,
}

impl Orchestrator {
    pub(crate) fn new(core: Arc<RunnerCore>) -> Self {
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        Self {
            core,
            active: HashSet::new(),
            exits_tx,
            exits_rx,
        }
    }

    /// Runs until `shutdown` is cancelled.
    pub(crate) async fn run(mut self, shutdown: CancellationToken) {
        debug!("Orchestrator started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(host) = self.exits_rx.recv() => {
                    self.worker_exited(host, &shutdown).await;
                }

                host = self.core.dispatch.recv() => {
                    self.dispatch(host, &shutdown).await;
                }
            }
        }

        debug!(registered = self.active.len(), "Orchestrator stopped");
    }

    /// Handles one dispatch entry.
    async fn dispatch(&mut self, host: HostKey, shutdown: &CancellationToken) {
        if !self.has_pending_work(&host) {
            trace!(host = %host, "Skipping stale dispatch entry");
            return;
        }
        if self.active.contains(&host) {
            trace!(host = %host, "Worker already active");
            return;
        }
        self.admit(host, shutdown).await;
    }

    /// Handles a worker exit notice.
    async fn worker_exited(&mut self, host: HostKey, shutdown: &CancellationToken) {
        self.active.remove(&host);
        self.core.metrics.set_registered_workers(self.active.len());

        if !shutdown.is_cancelled() && self.has_pending_work(&host) {
            debug!(host = %host, "Work arrived while worker was exiting, readmitting");
            self.admit(host, shutdown).await;
        }
    }

    fn has_pending_work(&self, host: &HostKey) -> bool {
        self.core
            .host_queue(host)
            .is_some_and(|queue| !queue.is_empty())
    }

    /// Waits for a gate slot, registers `host` and spawns its worker.
    async fn admit(&mut self, host: HostKey, shutdown: &CancellationToken) {
        let permit = tokio::select! {
            biased;

            _ = shutdown.cancelled() => return,
            permit = self.core.gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(GateError::Closed) => return,
            },
        };

        let queue = self.core.host_queue_or_create(&host);
        self.active.insert(host.clone());
        self.core.metrics.set_registered_workers(self.active.len());

        let exit = ExitNotice::new(host.clone(), self.exits_tx.clone());
        let worker = Worker::new(Arc::clone(&self.core), host, queue, permit, exit);
        tokio::spawn(worker.run(shutdown.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, StatusRepository};
    use crate::taskrunner::config::RunnerConfig;
    use crate::taskrunner::task::{Action, TaskId, WorkItem};
    use crate::taskrunner::telemetry::{TelemetryEvent, TelemetrySink};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct WorkerLog(Mutex<Vec<(String, HostKey)>>);

    impl WorkerLog {
        fn count(&self, kind: &str) -> usize {
            self.0.lock().iter().filter(|(k, _)| k == kind).count()
        }
    }

    impl TelemetrySink for WorkerLog {
        fn emit(&self, event: TelemetryEvent) {
            match event {
                TelemetryEvent::WorkerStarted { host } => {
                    self.0.lock().push(("started".to_string(), host))
                }
                TelemetryEvent::WorkerStopped { host, .. } => {
                    self.0.lock().push(("stopped".to_string(), host))
                }
                _ => {}
            }
        }
    }

    fn core(max_workers: usize, log: Arc<WorkerLog>) -> Arc<RunnerCore> {
        Arc::new(RunnerCore::new(
            Arc::new(MemoryRepository::new()),
            log,
            RunnerConfig::default()
                .with_max_workers(max_workers)
                .with_worker_idle_timeout(Duration::from_millis(50)),
        ))
    }

    /// Routes an item the way the ingestor does.
    fn submit(core: &RunnerCore, id: &str, host: &str, action: Action) {
        let host = HostKey::new(host);
        core.host_queue_or_create(&host)
            .enqueue(WorkItem::new(TaskId::new(id), host.clone(), "", action));
        core.dispatch.enqueue(host);
    }

    fn noop() -> Action {
        Action::new(|_| async { Ok(String::new()) })
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_duplicate_entries_admit_one_worker() {
        let log = Arc::new(WorkerLog::default());
        let core = core(4, log.clone());
        let shutdown = CancellationToken::new();

        submit(&core, "1", "a", noop());
        submit(&core, "2", "a", noop());
        submit(&core, "3", "a", noop());
        tokio::spawn(Orchestrator::new(Arc::clone(&core)).run(shutdown.clone()));

        wait_until(|| core.metrics.completed() == 3).await;
        assert_eq!(log.count("started"), 1);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_stale_entry_is_skipped() {
        let log = Arc::new(WorkerLog::default());
        let core = core(4, log.clone());
        let shutdown = CancellationToken::new();

        core.host_queue_or_create(&HostKey::new("idle"));
        core.dispatch.enqueue(HostKey::new("idle"));
        core.dispatch.enqueue(HostKey::new("unknown"));
        tokio::spawn(Orchestrator::new(Arc::clone(&core)).run(shutdown.clone()));

        wait_until(|| core.dispatch.is_empty()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.count("started"), 0);
        assert_eq!(core.gate.running_count(), 0);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_gate_bounds_admission() {
        let log = Arc::new(WorkerLog::default());
        let core = core(1, log.clone());
        let shutdown = CancellationToken::new();
        let release = Arc::new(Semaphore::new(0));

        for host in ["a", "b"] {
            let release = Arc::clone(&release);
            submit(
                &core,
                host,
                host,
                Action::new(move |_| async move {
                    let _ = release.acquire().await;
                    Ok(String::new())
                }),
            );
        }
        tokio::spawn(Orchestrator::new(Arc::clone(&core)).run(shutdown.clone()));

        wait_until(|| core.metrics.active() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.count("started"), 1);
        assert_eq!(core.metrics.active(), 1);

        release.add_permits(2);
        wait_until(|| core.metrics.completed() == 2).await;
        assert_eq!(core.gate.peak_running(), 1);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_idle_worker_is_replaced() {
        let log = Arc::new(WorkerLog::default());
        let core = core(4, log.clone());
        let shutdown = CancellationToken::new();
        tokio::spawn(Orchestrator::new(Arc::clone(&core)).run(shutdown.clone()));

        submit(&core, "1", "a", noop());
        wait_until(|| log.count("stopped") == 1).await;
        wait_until(|| core.metrics.registered_workers() == 0).await;

        submit(&core, "2", "a", noop());
        wait_until(|| core.metrics.completed() == 2).await;
        assert_eq!(log.count("started"), 2);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_panicking_action_releases_registration() {
        let log = Arc::new(WorkerLog::default());
        let core = core(1, log.clone());
        let shutdown = CancellationToken::new();
        tokio::spawn(Orchestrator::new(Arc::clone(&core)).run(shutdown.clone()));

        submit(
            &core,
            "1",
            "a",
            Action::new(|_| async { panic!("driver bug") }),
        );
        wait_until(|| log.count("started") == 1).await;
        wait_until(|| core.gate.running_count() == 0 && core.metrics.registered_workers() == 0)
            .await;

        submit(&core, "2", "a", noop());
        wait_until(|| core.metrics.completed() == 1).await;
        shutdown.cancel();
    }

    /// Queues an item for `host` without a dispatch entry, as when the entry
    /// was already skipped because the host looked active.
    fn enqueue_undispatched(core: &RunnerCore, id: &str, host: &HostKey) {
        core.host_queue_or_create(host)
            .enqueue(WorkItem::new(TaskId::new(id), host.clone(), "", noop()));
    }

    #[tokio::test]
    async fn test_exit_with_pending_work_readmits() {
        let log = Arc::new(WorkerLog::default());
        let core = core(2, log.clone());
        let shutdown = CancellationToken::new();
        let host = HostKey::new("a");

        let mut orchestrator = Orchestrator::new(Arc::clone(&core));
        orchestrator.active.insert(host.clone());
        enqueue_undispatched(&core, "late", &host);
        assert!(core.dispatch.is_empty());

        orchestrator.worker_exited(host.clone(), &shutdown).await;

        assert!(orchestrator.active.contains(&host));
        assert_eq!(core.metrics.registered_workers(), 1);
        wait_until(|| {
            core.repository
                .get("late")
                .is_ok_and(|record| record.complete)
        })
        .await;
        assert_eq!(log.count("started"), 1);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_exit_without_pending_work_deregisters() {
        let log = Arc::new(WorkerLog::default());
        let core = core(2, log.clone());
        let shutdown = CancellationToken::new();
        let host = HostKey::new("a");

        let mut orchestrator = Orchestrator::new(Arc::clone(&core));
        orchestrator.active.insert(host.clone());
        core.host_queue_or_create(&host);

        orchestrator.worker_exited(host.clone(), &shutdown).await;

        assert!(orchestrator.active.is_empty());
        assert_eq!(core.metrics.registered_workers(), 0);
        assert_eq!(log.count("started"), 0);
    }

    #[tokio::test]
    async fn test_exit_during_shutdown_does_not_readmit() {
        let log = Arc::new(WorkerLog::default());
        let core = core(2, log.clone());
        let shutdown = CancellationToken::new();
        let host = HostKey::new("a");

        let mut orchestrator = Orchestrator::new(Arc::clone(&core));
        orchestrator.active.insert(host.clone());
        enqueue_undispatched(&core, "late", &host);
        shutdown.cancel();

        orchestrator.worker_exited(host.clone(), &shutdown).await;

        assert!(orchestrator.active.is_empty());
        assert_eq!(core.gate.running_count(), 0);
        assert_eq!(core.host_queue(&host).unwrap().len(), 1);
    }
}

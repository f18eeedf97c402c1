//! Per-host workers.
//!
//! A worker owns one host's queue for as long as it lives. It pulls items
//! one at a time and runs each to completion before looking at the next,
//! so no two actions for the same host ever overlap. It exits after the
//! idle timeout passes with an empty queue, or when the runner shuts down.
//! An action already running is never interrupted.

use super::gate::GatePermit;
use super::process::process;
use super::queue::FifoQueue;
use super::runner::RunnerCore;
use super::task::{HostKey, WorkItem};
use super::telemetry::{TelemetryEvent, WorkerExit};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Tells the orchestrator that a worker has exited.
///
/// Sent on drop, so the host is deregistered even if an action panics and
/// unwinds the worker task.
pub(crate) struct ExitNotice {
    host: HostKey,
    tx: mpsc::UnboundedSender<HostKey>,
}

impl ExitNotice {
    pub(crate) fn new(host: HostKey, tx: mpsc::UnboundedSender<HostKey>) -> Self {
        Self { host, tx }
    }
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(self.host.clone());
    }
}

/// Serialized executor for one host.
pub(crate) struct Worker {
    core: Arc<RunnerCore>,
    host: HostKey,
    queue: Arc<FifoQueue<WorkItem>>,
    // Field order matters: the gate slot is released before the exit notice
    // is sent.
    _permit: GatePermit,
    _exit: ExitNotice,
}

impl Worker {
    pub(crate) fn new(
        core: Arc<RunnerCore>,
        host: HostKey,
        queue: Arc<FifoQueue<WorkItem>>,
        permit: GatePermit,
        exit: ExitNotice,
    ) -> Self {
        Self {
            core,
            host,
            queue,
            _permit: permit,
            _exit: exit,
        }
    }

    /// Drains the host queue until idle or cancelled.
    pub(crate) async fn run(self, shutdown: CancellationToken) {
        let idle_timeout = self.core.config.worker_idle_timeout;
        let mut processed = 0usize;

        debug!(host = %self.host, "Worker started");
        self.core.telemetry.emit(TelemetryEvent::WorkerStarted {
            host: self.host.clone(),
        });

        let reason = loop {
            let item = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break WorkerExit::Cancelled,
                item = self.queue.recv() => item,
                _ = tokio::time::sleep(idle_timeout) => break WorkerExit::Idle,
            };

            process(&self.core, item).await;
            processed += 1;
        };

        debug!(
            host = %self.host,
            reason = %reason,
            tasks_processed = processed,
            "Worker stopped"
        );
        self.core.telemetry.emit(TelemetryEvent::WorkerStopped {
            host: self.host.clone(),
            reason,
            tasks_processed: processed,
        });
    }
}

//! Runner counters and the periodic status reporter.
//!
//! [`RunnerMetrics`] holds lock-free counters updated by the ingestor,
//! orchestrator and workers. [`MetricsSnapshot`] combines them with live
//! queue depths and gate occupancy. The reporter logs a snapshot on a fixed
//! interval until shutdown.

use super::runner::RunnerCore;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lock-free task and worker counters.
#[derive(Debug, Default)]
pub struct RunnerMetrics {
    ingested: AtomicU64,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    registered_workers: AtomicUsize,
}

impl RunnerMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ingested(&self) {
        self.ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_started(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self, failed: bool) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn set_registered_workers(&self, count: usize) {
        self.registered_workers.store(count, Ordering::Relaxed);
    }

    /// Tasks moved from the intake queue into a per-host queue.
    pub fn ingested(&self) -> u64 {
        self.ingested.load(Ordering::Relaxed)
    }

    /// Tasks whose action is currently executing.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Tasks whose action has returned.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Completed tasks whose action returned an error.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Hosts currently marked as having a live worker.
    pub fn registered_workers(&self) -> usize {
        self.registered_workers.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the runner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Tasks ingested since start.
    pub tasks_ingested: u64,
    /// Tasks currently executing.
    pub tasks_active: usize,
    /// Tasks finished since start.
    pub tasks_completed: u64,
    /// Finished tasks that failed.
    pub tasks_failed: u64,
    /// Tasks waiting in the intake queue.
    pub intake_queue_depth: usize,
    /// Entries waiting in the dispatch queue.
    pub dispatch_queue_depth: usize,
    /// Gate slots currently held by workers.
    pub workers_running: usize,
    /// Hosts with a registered worker.
    pub workers_registered: usize,
    /// Highest number of workers that ran at once.
    pub peak_workers: usize,
}

/// Periodically logs runner state.
pub(crate) struct MetricsReporter {
    core: Arc<RunnerCore>,
    interval: Duration,
}

impl MetricsReporter {
    pub(crate) fn new(core: Arc<RunnerCore>, interval: Duration) -> Self {
        Self { core, interval }
    }

    /// Runs the reporter until cancelled.
    pub(crate) async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let snapshot = self.core.snapshot();
                    debug!(
                        workers_running = snapshot.workers_running,
                        workers_registered = snapshot.workers_registered,
                        intake_queue = snapshot.intake_queue_depth,
                        dispatch_queue = snapshot.dispatch_queue_depth,
                        tasks_active = snapshot.tasks_active,
                        tasks_completed = snapshot.tasks_completed,
                        "Task runner status"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = RunnerMetrics::new();
        metrics.record_ingested();
        metrics.record_ingested();
        metrics.task_started();
        metrics.task_started();
        assert_eq!(metrics.ingested(), 2);
        assert_eq!(metrics.active(), 2);

        metrics.task_finished(false);
        metrics.task_finished(true);
        assert_eq!(metrics.active(), 0);
        assert_eq!(metrics.completed(), 2);
        assert_eq!(metrics.failed(), 1);
    }

    #[test]
    fn test_registered_workers() {
        let metrics = RunnerMetrics::new();
        metrics.set_registered_workers(3);
        assert_eq!(metrics.registered_workers(), 3);
    }
}

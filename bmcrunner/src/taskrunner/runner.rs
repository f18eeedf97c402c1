//! Task runner facade.
//!
//! [`TaskRunner`] is the entry point used by the RPC layer. It owns the
//! shared [`RunnerCore`] and starts the background loops:
//!
//! ```text
//! execute ──► intake ──► Ingestor ──► host queue[h] ─────────┐
//!                            │                               ▼
//!                            └──► dispatch ──► Orchestrator ──► Worker(h) ──► process
//! ```
//!
//! `status` is an unrelated read path straight to the status repository.

use super::config::RunnerConfig;
use super::gate::ConcurrencyGate;
use super::ingest::Ingestor;
use super::metrics::{MetricsReporter, MetricsSnapshot, RunnerMetrics};
use super::orchestrator::Orchestrator;
use super::queue::FifoQueue;
use super::task::{Action, HostKey, TaskId, WorkItem};
use super::telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetrySink};
use crate::repository::{RepositoryError, StatusRecord, StatusRepository};
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors returned by [`TaskRunner`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// No status record exists for the task.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The status repository could not be read.
    #[error("{0}")]
    Persistence(String),

    /// `start` was called more than once.
    #[error("task runner already started")]
    AlreadyStarted,

    /// The runner has been shut down.
    #[error("task runner is shutting down")]
    ShuttingDown,
}

impl RunnerError {
    /// Returns true if the task ID is unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Translates a repository read failure into a caller-facing error.
fn status_error(task_id: &TaskId, err: RepositoryError) -> RunnerError {
    match err {
        RepositoryError::NotFound(_) => RunnerError::NotFound(task_id.clone()),
        RepositoryError::Unavailable(reason) => {
            let reason = reason.to_ascii_lowercase();
            if reason.contains("no such host") || reason.contains("unknown host") {
                RunnerError::Persistence("persistence error: unknown host".to_string())
            } else {
                RunnerError::Persistence("persistence error: connection refused".to_string())
            }
        }
        other => RunnerError::Persistence(format!("persistence error: {}", other)),
    }
}

// =============================================================================
// Shared State
// =============================================================================

/// State shared by the facade, the ingestor, the orchestrator and workers.
pub(crate) struct RunnerCore {
    pub(crate) repository: Arc<dyn StatusRepository>,
    pub(crate) telemetry: Arc<dyn TelemetrySink>,
    pub(crate) config: RunnerConfig,
    /// Work submitted by `execute`, not yet routed to a host queue.
    pub(crate) intake: FifoQueue<WorkItem>,
    /// One entry per ingested item, naming the host that became eligible.
    pub(crate) dispatch: FifoQueue<HostKey>,
    /// Per-host queues. Created on first use and never removed.
    pub(crate) host_queues: DashMap<HostKey, Arc<FifoQueue<WorkItem>>>,
    pub(crate) gate: ConcurrencyGate,
    pub(crate) metrics: RunnerMetrics,
}

impl RunnerCore {
    /// Must be called from within a Tokio runtime (the gate spawns its
    /// controller).
    pub(crate) fn new(
        repository: Arc<dyn StatusRepository>,
        telemetry: Arc<dyn TelemetrySink>,
        config: RunnerConfig,
    ) -> Self {
        let gate = ConcurrencyGate::new(config.effective_max_workers());
        Self {
            repository,
            telemetry,
            config,
            intake: FifoQueue::new(),
            dispatch: FifoQueue::new(),
            host_queues: DashMap::new(),
            gate,
            metrics: RunnerMetrics::new(),
        }
    }

    /// Returns the queue for `host`, if one has been created.
    pub(crate) fn host_queue(&self, host: &HostKey) -> Option<Arc<FifoQueue<WorkItem>>> {
        self.host_queues.get(host).map(|queue| Arc::clone(queue.value()))
    }

    /// Returns the queue for `host`, creating it on first use.
    pub(crate) fn host_queue_or_create(&self, host: &HostKey) -> Arc<FifoQueue<WorkItem>> {
        if let Some(queue) = self.host_queue(host) {
            return queue;
        }
        Arc::clone(self.host_queues.entry(host.clone()).or_default().value())
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_ingested: self.metrics.ingested(),
            tasks_active: self.metrics.active(),
            tasks_completed: self.metrics.completed(),
            tasks_failed: self.metrics.failed(),
            intake_queue_depth: self.intake.len(),
            dispatch_queue_depth: self.dispatch.len(),
            workers_running: self.gate.running_count(),
            workers_registered: self.metrics.registered_workers(),
            peak_workers: self.gate.peak_running(),
        }
    }
}

// =============================================================================
// Task Runner
// =============================================================================

/// Asynchronous BMC task runner.
///
/// Guarantees that tasks for the same [`HostKey`] run one at a time in
/// submission order, while tasks for different hosts run in parallel up to
/// `max_workers`.
///
/// # Example
///
/// ```ignore
/// use bmcrunner::repository::MemoryRepository;
/// use bmcrunner::taskrunner::{Action, RunnerConfig, TaskRunner};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let runner = TaskRunner::new(Arc::new(MemoryRepository::new()), RunnerConfig::default());
/// runner.start(CancellationToken::new())?;
///
/// let id = runner.execute("power off", "10.0.0.5", Action::new(|progress| async move {
///     progress.send("sending chassis power off");
///     Ok("off".to_string())
/// }));
///
/// let record = runner.status(&id)?;
/// ```
pub struct TaskRunner {
    core: Arc<RunnerCore>,
    shutdown: OnceLock<CancellationToken>,
}

impl TaskRunner {
    /// Creates a runner that logs telemetry through `tracing`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(repository: Arc<dyn StatusRepository>, config: RunnerConfig) -> Self {
        Self::with_telemetry(repository, config, Arc::new(TracingTelemetrySink))
    }

    /// Creates a runner with a custom telemetry sink.
    pub fn with_telemetry(
        repository: Arc<dyn StatusRepository>,
        config: RunnerConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            core: Arc::new(RunnerCore::new(repository, telemetry, config)),
            shutdown: OnceLock::new(),
        }
    }

    /// Starts the ingestor, orchestrator and status reporter.
    ///
    /// All loops and workers stop when `shutdown` (or [`TaskRunner::shutdown`])
    /// is cancelled. Tasks submitted before `start` wait in the intake queue.
    pub fn start(&self, shutdown: CancellationToken) -> Result<(), RunnerError> {
        if shutdown.is_cancelled() || self.core.gate.is_closed() {
            return Err(RunnerError::ShuttingDown);
        }

        let token = shutdown.child_token();
        self.shutdown
            .set(token.clone())
            .map_err(|_| RunnerError::AlreadyStarted)?;

        tokio::spawn(Ingestor::new(Arc::clone(&self.core)).run(token.clone()));
        tokio::spawn(Orchestrator::new(Arc::clone(&self.core)).run(token.clone()));
        tokio::spawn(
            MetricsReporter::new(
                Arc::clone(&self.core),
                self.core.config.effective_reporter_interval(),
            )
            .run(token),
        );

        info!(
            max_workers = self.core.gate.capacity(),
            worker_idle_timeout_ms = self.core.config.worker_idle_timeout.as_millis(),
            "Task runner started"
        );
        Ok(())
    }

    /// Submits an action against `host` and returns its generated task ID.
    ///
    /// Never waits for execution. Progress and outcome are available through
    /// [`status`](Self::status).
    pub fn execute(
        &self,
        description: impl Into<String>,
        host: impl Into<HostKey>,
        action: Action,
    ) -> TaskId {
        let id = TaskId::generate();
        self.execute_with_id(id.clone(), description, host, action);
        id
    }

    /// Submits an action under a caller-chosen task ID.
    pub fn execute_with_id(
        &self,
        id: TaskId,
        description: impl Into<String>,
        host: impl Into<HostKey>,
        action: Action,
    ) {
        let host = host.into();
        if self.is_shutting_down() {
            warn!(task_id = %id, host = %host, "Task submitted after shutdown will not run");
        }

        debug!(task_id = %id, host = %host, "Task queued");
        self.core.telemetry.emit(TelemetryEvent::TaskQueued {
            task_id: id.clone(),
            host: host.clone(),
        });
        self.core
            .intake
            .enqueue(WorkItem::new(id, host, description, action));
    }

    /// Returns the current status record of a task.
    pub fn status(&self, id: &TaskId) -> Result<StatusRecord, RunnerError> {
        self.core
            .repository
            .get(id.as_str())
            .map_err(|e| status_error(id, e))
    }

    /// Returns a snapshot of runner counters and queue depths.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.snapshot()
    }

    /// Number of tasks whose action is currently executing.
    pub fn active_tasks(&self) -> usize {
        self.core.metrics.active()
    }

    /// Number of tasks that have finished executing.
    pub fn total_tasks(&self) -> u64 {
        self.core.metrics.completed()
    }

    /// Returns the runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.core.config
    }

    fn is_shutting_down(&self) -> bool {
        self.core.gate.is_closed()
            || self
                .shutdown
                .get()
                .is_some_and(CancellationToken::is_cancelled)
    }

    /// Stops accepting work and waits for running actions to finish.
    ///
    /// Workers finish the task they are executing and record its outcome.
    /// Tasks still queued are not started.
    pub async fn shutdown(&self) {
        if let Some(token) = self.shutdown.get() {
            token.cancel();
        }
        self.core.gate.wait_all_done().await;
        info!(
            completed = self.core.metrics.completed(),
            "Task runner stopped"
        );
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("config", &self.core.config)
            .field("started", &self.shutdown.get().is_some())
            .finish()
    }
}

//! Telemetry for task runner observability.
//!
//! The runner emits structured [`TelemetryEvent`]s through a
//! [`TelemetrySink`] and does not care how they are consumed. Sinks decide
//! whether events become log lines, counters or UI updates.
//!
//! # Example
//!
//! ```ignore
//! use bmcrunner::taskrunner::{TaskOutcome, TelemetryEvent, TelemetrySink};
//!
//! struct FailureCounter(std::sync::atomic::AtomicUsize);
//!
//! impl TelemetrySink for FailureCounter {
//!     fn emit(&self, event: TelemetryEvent) {
//!         if let TelemetryEvent::TaskCompleted { outcome: TaskOutcome::Failed, .. } = event {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//! }
//! ```

use super::task::{HostKey, TaskId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Event Types
// =============================================================================

/// How a task's action finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The action returned a result.
    Succeeded,
    /// The action returned an error.
    Failed,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Why a per-host worker stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// No work arrived within the idle timeout.
    Idle,
    /// The runner is shutting down.
    Cancelled,
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Status repository write that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusStage {
    /// Creating the initial `running` record.
    Create,
    /// Appending a progress message.
    Message,
    /// Writing the final outcome.
    Finalize,
}

impl fmt::Display for StatusStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Message => write!(f, "message"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

/// Events emitted while tasks move through the runner.
#[derive(Clone, Debug)]
pub enum TelemetryEvent {
    /// A task was accepted by `execute`.
    TaskQueued { task_id: TaskId, host: HostKey },

    /// A worker was admitted for a host.
    WorkerStarted { host: HostKey },

    /// A worker terminated.
    WorkerStopped {
        host: HostKey,
        reason: WorkerExit,
        tasks_processed: usize,
    },

    /// A worker began executing a task.
    TaskStarted {
        task_id: TaskId,
        host: HostKey,
        description: String,
    },

    /// A task's action returned.
    TaskCompleted {
        task_id: TaskId,
        host: HostKey,
        outcome: TaskOutcome,
        duration: Duration,
    },

    /// A status repository write failed and was dropped.
    StatusWriteFailed {
        task_id: TaskId,
        stage: StatusStage,
        error: String,
    },
}

impl TelemetryEvent {
    /// Returns the host associated with this event, if any.
    pub fn host(&self) -> Option<&HostKey> {
        match self {
            Self::TaskQueued { host, .. }
            | Self::WorkerStarted { host }
            | Self::WorkerStopped { host, .. }
            | Self::TaskStarted { host, .. }
            | Self::TaskCompleted { host, .. } => Some(host),
            Self::StatusWriteFailed { .. } => None,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskQueued { .. } => "task_queued",
            Self::WorkerStarted { .. } => "worker_started",
            Self::WorkerStopped { .. } => "worker_stopped",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::StatusWriteFailed { .. } => "status_write_failed",
        }
    }
}

// =============================================================================
// Telemetry Sink Trait
// =============================================================================

/// Sink for telemetry events.
///
/// Events are emitted from the ingestor, orchestrator and every worker, so
/// implementations must be thread-safe and should not block.
pub trait TelemetrySink: Send + Sync {
    /// Called when a telemetry event occurs.
    fn emit(&self, event: TelemetryEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Sink that mirrors every event to `tracing` at trace level.
///
/// Lifecycle log lines are written where the work happens, so this sink
/// only adds a raw event stream under the `bmcrunner::telemetry` target.
/// Enable it with `RUST_LOG=bmcrunner::telemetry=trace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        tracing::trace!(
            target: "bmcrunner::telemetry",
            event = event.event_type(),
            host = event.host().map(HostKey::as_str),
            detail = ?event,
        );
    }
}

/// Sink that forwards each event to several sinks in order.
pub struct MultiplexTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl MultiplexTelemetrySink {
    /// Creates a multiplex over `sinks`.
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    /// Appends a sink, builder style.
    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TelemetrySink for MultiplexTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

impl fmt::Debug for MultiplexTelemetrySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexTelemetrySink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

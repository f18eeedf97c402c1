//! Asynchronous BMC task orchestration.
//!
//! Every BMC operation is slow, unreliable and must never run twice at once
//! against the same controller, while operations against different
//! controllers should proceed in parallel up to a fleet-wide ceiling. This
//! module provides the scheduler that enforces both.
//!
//! # Architecture
//!
//! ```text
//! TaskRunner::execute
//!        │
//!        ▼
//!   intake queue ──► Ingestor ──► host queue (one per HostKey)
//!                        │
//!                        ▼
//!                  dispatch queue ──► Orchestrator ── ConcurrencyGate ──► Worker(host)
//!                                          ▲                                  │
//!                                          └────────── exit notice ───────────┤
//!                                                                             ▼
//!                                                              process ──► StatusRepository
//! ```
//!
//! - [`ConcurrencyGate`] bounds how many workers run at once.
//! - [`FifoQueue`] connects the stages. Waiting consumers park instead of
//!   polling.
//! - The ingestor routes work into per-host queues in submission order.
//! - The orchestrator owns the worker registry and admits at most one
//!   worker per host.
//! - A worker drains its host's queue strictly in order and exits when idle.
//! - `process` runs one action, relays its progress and records the outcome
//!   under best-effort status reporting.
//!
//! # Example
//!
//! ```ignore
//! use bmcrunner::repository::MemoryRepository;
//! use bmcrunner::taskrunner::{Action, RunnerConfig, TaskRunner};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let runner = TaskRunner::new(Arc::new(MemoryRepository::new()), RunnerConfig::default());
//! runner.start(CancellationToken::new())?;
//!
//! let id = runner.execute("set boot device", "10.0.0.5", Action::new(|progress| async move {
//!     progress.send("setting next boot to PXE");
//!     Ok("pxe".to_string())
//! }));
//!
//! // later
//! let record = runner.status(&id)?;
//! ```

mod config;
mod gate;
mod ingest;
mod metrics;
mod orchestrator;
mod process;
mod queue;
mod runner;
mod task;
mod telemetry;
mod worker;

pub use config::{
    RunnerConfig, DEFAULT_MAX_WORKERS, DEFAULT_REPORTER_INTERVAL, DEFAULT_WORKER_IDLE_TIMEOUT,
};
pub use gate::{ConcurrencyGate, GateError, GatePermit};
pub use metrics::{MetricsSnapshot, RunnerMetrics};
pub use queue::{FifoQueue, QueueError};
pub use runner::{RunnerError, TaskRunner};
pub use task::{
    Action, ActionError, ActionFuture, ActionResult, HostKey, ProgressSender, TaskId, WorkItem,
};
pub use telemetry::{
    MultiplexTelemetrySink, NullTelemetrySink, StatusStage, TaskOutcome, TelemetryEvent,
    TelemetrySink, TracingTelemetrySink, WorkerExit,
};

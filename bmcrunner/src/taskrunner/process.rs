//! Task execution and status bookkeeping.
//!
//! [`process`] runs one work item to completion on the calling worker:
//!
//! 1. Persist a `running` status record. If this fails the task is dropped
//!    without running its action, since there is no record to finalize.
//! 2. Relay progress messages from the action into the record's message
//!    trail while the action runs.
//! 3. Run the action.
//! 4. Wait for the relay to flush, then write the final `complete` record
//!    carrying the result or the action's error.
//!
//! # Best-effort status reporting
//!
//! Status repository failures after step 1 never interrupt the action. A
//! BMC operation that is already underway (a power cycle, a firmware
//! reset) is allowed to finish even if nobody can observe it. Failed
//! writes are logged, reported as [`TelemetryEvent::StatusWriteFailed`] and
//! otherwise dropped. Nothing is retried.
//!
//! The final write is always the last write for a task: the relay is
//! joined before finalization, so a late message append cannot clobber the
//! `complete` record.

use super::runner::RunnerCore;
use super::task::{ProgressSender, TaskId, WorkItem};
use super::telemetry::{StatusStage, TaskOutcome, TelemetryEvent};
use crate::repository::{RepositoryError, StatusRecord, TaskState};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

/// Runs a work item and records its outcome.
///
/// Returns the outcome of the action, or `None` if the task was dropped
/// because its initial status record could not be created.
pub(crate) async fn process(core: &RunnerCore, item: WorkItem) -> Option<TaskOutcome> {
    let span = tracing::info_span!(
        "task",
        task_id = %item.id,
        host = %item.host,
        description = %item.description,
    );
    run(core, item).instrument(span).await
}

async fn run(core: &RunnerCore, item: WorkItem) -> Option<TaskOutcome> {
    let WorkItem {
        id,
        host,
        description,
        action,
    } = item;
    let reporter = StatusReporter { core, task_id: &id };

    let record = StatusRecord::running(id.as_str(), description.as_str());
    if let Err(e) = core.repository.create(id.as_str(), record) {
        reporter.write_failed(StatusStage::Create, &e);
        error!(error = %e, "Failed to create status record, task dropped");
        return None;
    }

    core.telemetry.emit(TelemetryEvent::TaskStarted {
        task_id: id.clone(),
        host: host.clone(),
        description,
    });
    core.metrics.task_started();
    info!("Task started");
    let started = Instant::now();

    let (tx, rx) = mpsc::unbounded_channel();
    let action_done = CancellationToken::new();

    let run_action = async {
        let result = action.run(ProgressSender::new(tx)).await;
        action_done.cancel();
        result
    };
    let (result, ()) = tokio::join!(run_action, reporter.relay(rx, action_done.clone()));

    let duration = started.elapsed();
    let outcome = match &result {
        Ok(_) => TaskOutcome::Succeeded,
        Err(_) => TaskOutcome::Failed,
    };

    match &result {
        Ok(_) => info!(duration_ms = duration.as_millis(), "Task finished"),
        Err(e) => info!(duration_ms = duration.as_millis(), error = %e, "Task failed"),
    }

    reporter.finalize(result);

    core.metrics.task_finished(outcome == TaskOutcome::Failed);
    core.telemetry.emit(TelemetryEvent::TaskCompleted {
        task_id: id,
        host,
        outcome,
        duration,
    });

    Some(outcome)
}

/// Best-effort writer for one task's status record.
struct StatusReporter<'a> {
    core: &'a RunnerCore,
    task_id: &'a TaskId,
}

impl StatusReporter<'_> {
    /// Appends progress messages until the action has finished and every
    /// buffered message has been written.
    async fn relay(&self, mut rx: mpsc::UnboundedReceiver<String>, action_done: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                message = rx.recv() => match message {
                    Some(message) => self.append_message(message),
                    None => break,
                },

                // The action may leak a sender clone into a detached task.
                _ = action_done.cancelled() => {
                    while let Ok(message) = rx.try_recv() {
                        self.append_message(message);
                    }
                    break;
                }
            }
        }
    }

    fn append_message(&self, message: String) {
        let id = self.task_id.as_str();
        let result = self.core.repository.get(id).and_then(|mut record| {
            record.messages.push(message);
            self.core.repository.update(id, record)
        });

        if let Err(e) = result {
            self.write_failed(StatusStage::Message, &e);
            warn!(error = %e, "Dropped progress message");
        }
    }

    fn finalize(&self, result: super::task::ActionResult) {
        let id = self.task_id.as_str();

        let mut record = match self.core.repository.get(id) {
            Ok(record) => record,
            Err(e) => {
                self.write_failed(StatusStage::Finalize, &e);
                error!(error = %e, "Failed to load status record for finalization");
                return;
            }
        };

        record.complete = true;
        record.state = TaskState::Complete;
        match result {
            Ok(output) => record.result = output,
            Err(e) => record.error = e.into_status_error(),
        }

        if let Err(e) = self.core.repository.update(id, record) {
            self.write_failed(StatusStage::Finalize, &e);
            error!(error = %e, "Failed to update record");
        }
    }

    fn write_failed(&self, stage: StatusStage, err: &RepositoryError) {
        self.core.telemetry.emit(TelemetryEvent::StatusWriteFailed {
            task_id: self.task_id.clone(),
            stage,
            error: err.to_string(),
        });
    }
}

//! Status record data model.
//!
//! A [`StatusRecord`] is created in the `running` state when a worker starts
//! executing a task, gains progress messages while the action runs, and is
//! finalized exactly once with `complete = true`. Once complete, the record
//! is never written again by the runner.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Outcome code reported for a task that finished without error.
pub const CODE_OK: i32 = 0;

/// Outcome code reported for a failed task whose error carries no code.
pub const CODE_UNKNOWN: i32 = 2;

// =============================================================================
// Task State
// =============================================================================

/// Lifecycle state of a task as persisted in its status record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// The action is executing (or was, if the process died mid-flight).
    #[default]
    Running,

    /// The action returned and the outcome has been recorded.
    Complete,
}

impl TaskState {
    /// Returns the wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Status Error
// =============================================================================

/// Structured error attached to a status record.
///
/// Actions can fail with this type directly to control the code and details
/// a polling caller sees. Any other error is degraded to a message with a
/// zero code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StatusError {
    /// Caller-facing status code (0 means unset).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, e.g. one entry per failed driver.
    #[serde(default)]
    pub details: Vec<String>,
}

impl StatusError {
    /// Creates an error with a code and message and no details.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Adds details to the error.
    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details = details.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if no error has been recorded.
    pub fn is_empty(&self) -> bool {
        self.code == CODE_OK && self.message.is_empty() && self.details.is_empty()
    }
}

// =============================================================================
// Status Record
// =============================================================================

/// Durable record of a task's progress and outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Task identifier.
    pub id: String,
    /// Human-readable description of the action.
    pub description: String,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Result string returned by the action.
    pub result: String,
    /// True once the final outcome has been persisted.
    pub complete: bool,
    /// Structured error, empty on success.
    pub error: StatusError,
    /// Progress messages in the order the action emitted them.
    pub messages: Vec<String>,
}

impl StatusRecord {
    /// Creates the initial record for a task that is starting to run.
    pub fn running(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Returns true once the task has finished and its outcome is final.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the caller-facing outcome code.
    ///
    /// [`CODE_OK`] when no error message was recorded, the error's own code
    /// when it has one, [`CODE_UNKNOWN`] otherwise.
    pub fn outcome_code(&self) -> i32 {
        if self.error.message.is_empty() {
            CODE_OK
        } else if self.error.code != CODE_OK {
            self.error.code
        } else {
            CODE_UNKNOWN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_record_defaults() {
        let record = StatusRecord::running("task-1", "power on");
        assert_eq!(record.id, "task-1");
        assert_eq!(record.description, "power on");
        assert_eq!(record.state, TaskState::Running);
        assert!(!record.is_complete());
        assert!(record.error.is_empty());
        assert!(record.messages.is_empty());
    }

    #[test]
    fn test_task_state_display() {
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!(TaskState::Complete.to_string(), "complete");
    }

    #[test]
    fn test_task_state_serializes_lowercase() {
        let json = serde_json::to_string(&TaskState::Complete).unwrap();
        assert_eq!(json, "\"complete\"");
    }

    #[test]
    fn test_status_error_display_is_message() {
        let err = StatusError::new(5, "boom").with_details(["ipmitool: timeout"]);
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.details, vec!["ipmitool: timeout".to_string()]);
        assert!(!err.is_empty());
    }

    #[test]
    fn test_outcome_code() {
        let mut record = StatusRecord::running("t", "d");
        assert_eq!(record.outcome_code(), CODE_OK);

        record.error = StatusError::new(0, "could not connect");
        assert_eq!(record.outcome_code(), CODE_UNKNOWN);

        record.error = StatusError::new(5, "not found");
        assert_eq!(record.outcome_code(), 5);
    }

    #[test]
    fn test_record_decodes_without_details() {
        let json = r#"{"id":"a","description":"d","state":"complete","result":"ok",
            "complete":true,"error":{"code":0,"message":""},"messages":["x"]}"#;
        let record: StatusRecord = serde_json::from_str(json).unwrap();
        assert!(record.complete);
        assert_eq!(record.state, TaskState::Complete);
        assert!(record.error.details.is_empty());
        assert_eq!(record.messages, vec!["x".to_string()]);
    }
}

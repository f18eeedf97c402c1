//! Work items and the actions they carry.
//!
//! A [`WorkItem`] is one queued unit of work: a task ID, the [`HostKey`] of
//! the BMC it targets, a description and the [`Action`] to run. Items are
//! created by `execute`, move by value from the intake queue to their
//! host's queue and finally into a worker, and are consumed exactly once.
//!
//! # Example
//!
//! ```ignore
//! use bmcrunner::taskrunner::{Action, ActionError};
//! use bmcrunner::repository::StatusError;
//!
//! let action = Action::new(|progress| async move {
//!     progress.send("connecting to BMC");
//!     // ... talk to the BMC ...
//!     Err(ActionError::from(StatusError::new(5, "user not found")))
//! });
//! ```

use crate::repository::StatusError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a submitted task.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task ID from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, globally unique task ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the string value of this ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of one physical BMC, used to serialize operations against it.
///
/// Typically derived from the BMC address. Two work items with equal host
/// keys never execute concurrently.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct HostKey(String);

impl HostKey {
    /// Creates a host key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the string value of this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostKey({})", self.0)
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HostKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HostKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Action
// =============================================================================

/// Error returned by an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Structured failure, copied verbatim into the status record.
    #[error(transparent)]
    Structured(#[from] StatusError),

    /// Any other failure. Only its message is recorded.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ActionError {
    /// Wraps an arbitrary error.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }

    /// Converts this error into the shape stored in a status record.
    ///
    /// Unstructured errors keep their message and get a zero code.
    pub fn into_status_error(self) -> StatusError {
        match self {
            Self::Structured(err) => err,
            Self::Other(err) => StatusError {
                message: err.to_string(),
                ..StatusError::default()
            },
        }
    }
}

/// Outcome of an action: a result string or an error.
pub type ActionResult = Result<String, ActionError>;

/// Boxed future returned by an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Write-only sink for human-readable progress messages.
///
/// Sends never block and never fail; once the task has finished, further
/// messages are dropped.
#[derive(Clone, Debug)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<String>,
}

impl ProgressSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Creates a sender whose messages go nowhere.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Emits a progress message.
    pub fn send(&self, message: impl Into<String>) {
        let _ = self.tx.send(message.into());
    }
}

/// The caller-supplied unit of work performed against a BMC.
pub struct Action(Box<dyn FnOnce(ProgressSender) -> ActionFuture + Send>);

impl Action {
    /// Wraps an async closure as an action.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(ProgressSender) -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        Self(Box::new(move |progress| Box::pin(f(progress))))
    }

    /// Starts the action, returning its future.
    pub(crate) fn run(self, progress: ProgressSender) -> ActionFuture {
        (self.0)(progress)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

// =============================================================================
// Work Item
// =============================================================================

/// One queued unit of work.
#[derive(Debug)]
pub struct WorkItem {
    /// Task identifier returned to the caller.
    pub id: TaskId,
    /// BMC the action targets.
    pub host: HostKey,
    /// Human-readable description stored in the status record.
    pub description: String,
    /// The work itself.
    pub action: Action,
}

impl WorkItem {
    /// Creates a work item.
    pub fn new(
        id: TaskId,
        host: HostKey,
        description: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            id,
            host,
            description: description.into(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_task_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_id_display_and_debug() {
        let id = TaskId::new("task-1");
        assert_eq!(format!("{}", id), "task-1");
        assert_eq!(format!("{:?}", id), "TaskId(task-1)");

        let host = HostKey::from("10.0.0.1");
        assert_eq!(format!("{}", host), "10.0.0.1");
        assert_eq!(format!("{:?}", host), "HostKey(10.0.0.1)");
    }

    #[test]
    fn test_structured_error_is_kept() {
        let err = ActionError::from(StatusError::new(5, "boom").with_details(["a"]));
        let status = err.into_status_error();
        assert_eq!(status.code, 5);
        assert_eq!(status.message, "boom");
        assert_eq!(status.details, vec!["a".to_string()]);
    }

    #[test]
    fn test_other_error_degrades_to_message() {
        let err = ActionError::other("connection reset by peer");
        assert_eq!(err.to_string(), "connection reset by peer");

        let status = err.into_status_error();
        assert_eq!(status.code, 0);
        assert_eq!(status.message, "connection reset by peer");
        assert!(status.details.is_empty());
    }

    #[tokio::test]
    async fn test_action_receives_progress_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let action = Action::new(|progress| async move {
            progress.send("step 1");
            Ok("done".to_string())
        });

        let result = action.run(ProgressSender::new(tx)).await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(rx.recv().await.as_deref(), Some("step 1"));
    }

    #[test]
    fn test_detached_sender_never_fails() {
        let progress = ProgressSender::detached();
        progress.send("nobody listening");
    }
}

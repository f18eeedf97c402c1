//! Status repository trait definition.

use super::record::StatusRecord;
use thiserror::Error;

/// Errors returned by a [`StatusRepository`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record is stored under the requested id.
    #[error("record id not found: {0}")]
    NotFound(String),

    /// The backing store could not be reached.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// A record could not be encoded or decoded.
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

impl RepositoryError {
    /// Returns true if this error reports an absent record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Durable create/get/update/delete of status records keyed by task ID.
///
/// The task runner relies on single-key atomicity only. Message appends are
/// performed as get-then-update without any cross-call transaction.
///
/// # Contract
///
/// - `get` and `update` must fail with [`RepositoryError::NotFound`] when the
///   id is absent. `status` lookups pattern-match on it.
/// - `create` stores the record, replacing any previous value.
/// - `delete` is only used by retention outside the runner.
///
/// Calls are made from async tasks, so implementations should return
/// promptly.
pub trait StatusRepository: Send + Sync {
    /// Stores a new record under `id`.
    fn create(&self, id: &str, record: StatusRecord) -> Result<(), RepositoryError>;

    /// Fetches the record stored under `id`.
    fn get(&self, id: &str) -> Result<StatusRecord, RepositoryError>;

    /// Replaces the record stored under `id`.
    fn update(&self, id: &str, record: StatusRecord) -> Result<(), RepositoryError>;

    /// Removes the record stored under `id`.
    fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

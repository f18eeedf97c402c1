//! Task status persistence.
//!
//! Every task submitted to the [`TaskRunner`](crate::taskrunner::TaskRunner)
//! is tracked by a [`StatusRecord`] keyed by its task ID. The runner only
//! needs a narrow create/get/update contract from the store, expressed by
//! the [`StatusRepository`] trait, so the backing store can be swapped
//! without touching the scheduler.
//!
//! [`MemoryRepository`] is the in-process implementation used by default.
//! It keeps records JSON-encoded in a concurrent map and can bound the number
//! of retained records, evicting the oldest first.

mod memory;
mod record;
mod r#trait;

pub use memory::MemoryRepository;
pub use r#trait::{RepositoryError, StatusRepository};
pub use record::{StatusError, StatusRecord, TaskState, CODE_OK, CODE_UNKNOWN};

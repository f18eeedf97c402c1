//! In-memory status repository.

use super::r#trait::{RepositoryError, StatusRepository};
use super::record::StatusRecord;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Status repository backed by a concurrent in-process map.
///
/// Records are stored JSON-encoded so readers always receive an owned copy
/// and a record never aliases the value a writer still holds.
///
/// With [`with_capacity`](Self::with_capacity) the repository keeps at most
/// that many records; creating one more evicts the oldest-created record.
/// Evicted tasks report not-found on a later lookup.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: DashMap<String, Vec<u8>>,
    /// Creation order, oldest first. Only maintained when bounded.
    order: Mutex<VecDeque<String>>,
    capacity: Option<usize>,
}

impl MemoryRepository {
    /// Creates an unbounded repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository retaining at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            records: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        }
    }

    /// Returns the retention bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn encode(record: &StatusRecord) -> Result<Vec<u8>, RepositoryError> {
        serde_json::to_vec(record).map_err(|e| RepositoryError::Encoding(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<StatusRecord, RepositoryError> {
        serde_json::from_slice(bytes).map_err(|e| RepositoryError::Encoding(e.to_string()))
    }

    fn evict_overflow(&self, capacity: usize) {
        let mut order = self.order.lock();
        while self.records.len() > capacity {
            match order.pop_front() {
                Some(oldest) => {
                    if self.records.remove(&oldest).is_some() {
                        tracing::debug!(task_id = %oldest, "Evicted status record");
                    }
                }
                None => break,
            }
        }
    }
}

impl StatusRepository for MemoryRepository {
    fn create(&self, id: &str, record: StatusRecord) -> Result<(), RepositoryError> {
        let bytes = Self::encode(&record)?;
        let is_new = self.records.insert(id.to_string(), bytes).is_none();

        if let Some(capacity) = self.capacity {
            if is_new {
                self.order.lock().push_back(id.to_string());
            }
            self.evict_overflow(capacity);
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<StatusRecord, RepositoryError> {
        let entry = self
            .records
            .get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        Self::decode(entry.value())
    }

    fn update(&self, id: &str, record: StatusRecord) -> Result<(), RepositoryError> {
        let bytes = Self::encode(&record)?;
        match self.records.get_mut(id) {
            Some(mut entry) => {
                *entry = bytes;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        if self.records.remove(id).is_some() && self.capacity.is_some() {
            self.order.lock().retain(|key| key != id);
        }
        Ok(())
    }
}

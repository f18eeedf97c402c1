//! FIFO queues connecting the ingestor, orchestrator and workers.
//!
//! A [`FifoQueue`] is a mutex-protected `VecDeque` with strict insertion
//! order: no priority, no de-duplication. `enqueue` never blocks and
//! `dequeue` returns [`QueueError::Empty`] immediately when nothing is
//! present. Consumers that want to wait use [`FifoQueue::recv`], which parks
//! on a [`Notify`] instead of polling so idle loops cost no CPU.

use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Notify;

/// Signal that a queue had nothing to hand out.
///
/// This is the normal "nothing to do yet" condition, not a failure.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue holds no items.
    #[error("queue is empty")]
    Empty,
}

/// Unbounded first-in first-out queue.
#[derive(Debug)]
pub struct FifoQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FifoQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    /// Appends an item to the back of the queue.
    pub fn enqueue(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Removes the oldest item without waiting.
    pub fn dequeue(&self) -> Result<T, QueueError> {
        self.items.lock().pop_front().ok_or(QueueError::Empty)
    }

    /// Waits for an item and removes it.
    ///
    /// Cancel-safe: if the future is dropped before completing, no item is
    /// removed from the queue.
    pub async fn recv(&self) -> T {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Ok(item) = self.dequeue() {
                return item;
            }
            notified.await;
        }
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = FifoQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Ok(2));
        assert_eq!(queue.dequeue(), Ok(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_empty_returns_immediately() {
        let queue: FifoQueue<u32> = FifoQueue::new();
        assert_eq!(queue.dequeue(), Err(QueueError::Empty));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let queue = FifoQueue::new();
        queue.enqueue("host-a");
        queue.enqueue("host-a");
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_recv_returns_queued_item() {
        let queue = FifoQueue::new();
        queue.enqueue("ready");
        assert_eq!(queue.recv().await, "ready");
    }

    #[tokio::test]
    async fn test_recv_waits_for_enqueue() {
        let queue = Arc::new(FifoQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.enqueue(42);
        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .unwrap();
        assert_eq!(item, 42);
    }

    #[tokio::test]
    async fn test_cancelled_recv_does_not_lose_items() {
        let queue = FifoQueue::new();

        let cancelled = tokio::time::timeout(Duration::from_millis(10), queue.recv()).await;
        assert!(cancelled.is_err());

        queue.enqueue(7);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.recv().await, 7);
    }
}

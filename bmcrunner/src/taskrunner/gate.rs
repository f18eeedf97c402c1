//! Bounded concurrency gate.
//!
//! [`ConcurrencyGate`] limits how many per-host workers may run at once
//! across the whole runner. It is a counting semaphore with one twist:
//! released slots are not handed straight back to the token pool. A permit
//! drop reports to a single controller task, which returns the token and
//! watches for shutdown. Keeping refills in one place lets
//! [`wait_all_done`](ConcurrencyGate::wait_all_done) observe "closed and
//! nothing running" exactly once, without racing individual releases.
//!
//! # Example
//!
//! ```ignore
//! use bmcrunner::taskrunner::ConcurrencyGate;
//!
//! let gate = ConcurrencyGate::new(2);
//!
//! let permit = gate.acquire().await?;
//! // ... run one worker ...
//! drop(permit); // slot returned by the controller
//!
//! gate.wait_all_done().await;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;

/// Error returned when acquiring from a gate that has been closed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GateError {
    /// The gate was closed; no further slots will be handed out.
    #[error("concurrency gate is closed")]
    Closed,
}

/// State shared between the gate handle, its permits and the controller.
#[derive(Debug)]
struct GateShared {
    max: usize,
    tokens: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
    peak: AtomicUsize,
    done_tx: mpsc::UnboundedSender<()>,
    closed: CancellationToken,
}

/// Counting admission gate bounding simultaneously running workers.
///
/// Cloning the gate yields another handle to the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    shared: Arc<GateShared>,
    all_done: watch::Receiver<bool>,
}

impl ConcurrencyGate {
    /// Creates a gate with `max` slots and starts its controller.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(max: usize) -> Self {
        assert!(max > 0, "max must be > 0");

        let tokens = Arc::new(Semaphore::new(max));
        let running = Arc::new(AtomicUsize::new(0));
        let closed = CancellationToken::new();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (all_done_tx, all_done_rx) = watch::channel(false);

        tokio::spawn(run_controller(
            Arc::clone(&tokens),
            Arc::clone(&running),
            closed.clone(),
            done_rx,
            all_done_tx,
        ));

        Self {
            shared: Arc::new(GateShared {
                max,
                tokens,
                running,
                peak: AtomicUsize::new(0),
                done_tx,
                closed,
            }),
            all_done: all_done_rx,
        }
    }

    /// Waits until a slot is free, then reserves it.
    ///
    /// The slot is held until the returned permit is dropped.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        if self.shared.closed.is_cancelled() {
            return Err(GateError::Closed);
        }
        let token = self
            .shared
            .tokens
            .acquire()
            .await
            .map_err(|_| GateError::Closed)?;
        token.forget();
        Ok(self.admit())
    }

    /// Reserves a slot if one is free right now.
    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> Option<GatePermit> {
        if self.shared.closed.is_cancelled() {
            return None;
        }
        let token = self.shared.tokens.try_acquire().ok()?;
        token.forget();
        Some(self.admit())
    }

    fn admit(&self) -> GatePermit {
        let current = self.shared.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.update_peak(current);
        GatePermit {
            shared: Arc::clone(&self.shared),
        }
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.shared.peak.load(Ordering::Relaxed);
        while current > peak {
            match self.shared.peak.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Returns the configured ceiling.
    pub fn capacity(&self) -> usize {
        self.shared.max
    }

    /// Returns how many slots are currently held.
    pub fn running_count(&self) -> usize {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Returns the highest number of slots held at the same time.
    pub fn peak_running(&self) -> usize {
        self.shared.peak.load(Ordering::Relaxed)
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Stops handing out slots.
    ///
    /// Pending and future `acquire` calls fail with [`GateError::Closed`].
    /// Permits already held stay valid. Calling this more than once is a no-op.
    pub fn close(&self) {
        self.shared.closed.cancel();
        self.shared.tokens.close();
    }

    /// Closes the gate and waits until every held permit has been released.
    pub async fn wait_all_done(&self) {
        self.close();
        let mut all_done = self.all_done.clone();
        let _ = all_done.wait_for(|done| *done).await;
    }
}

/// A reserved gate slot. Dropping it releases the slot.
pub struct GatePermit {
    shared: Arc<GateShared>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.shared.running.fetch_sub(1, Ordering::AcqRel);
        let _ = self.shared.done_tx.send(());
    }
}

impl std::fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatePermit")
            .field("running", &self.shared.running.load(Ordering::Relaxed))
            .field("max", &self.shared.max)
            .finish()
    }
}

/// Returns released tokens to the pool and signals completion after close.
///
/// Exits once the gate is closed with nothing running, or when every gate
/// handle and permit has been dropped.
async fn run_controller(
    tokens: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
    closed: CancellationToken,
    mut done_rx: mpsc::UnboundedReceiver<()>,
    all_done_tx: watch::Sender<bool>,
) {
    let mut closing = false;

    loop {
        tokio::select! {
            signal = done_rx.recv() => match signal {
                Some(()) => tokens.add_permits(1),
                None => break,
            },
            _ = closed.cancelled(), if !closing => {
                closing = true;
            }
        }

        if closing && running.load(Ordering::Acquire) == 0 {
            let _ = all_done_tx.send(true);
            break;
        }
    }
}

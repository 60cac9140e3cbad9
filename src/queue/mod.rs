//! Shared FIFO of pending promises.
//!
//! [`WorkQueue`] is an unbounded crossbeam channel with an outstanding-work
//! counter on the side. A promise counts as outstanding from [`WorkQueue::send`]
//! until a worker calls [`WorkQueue::task_done`] for it, so
//! [`WorkQueue::wait_drained_for`] observes promises that are queued *or*
//! executing.

use crate::core::PromiseHandle;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Errors that can occur during queue operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Queue is empty (for non-blocking receives)
    #[error("queue is empty")]
    Empty,
    /// Every sender was dropped
    #[error("queue disconnected")]
    Disconnected,
}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Unbounded MPMC queue of promises with drain tracking
pub struct WorkQueue {
    sender: Sender<PromiseHandle>,
    receiver: Receiver<PromiseHandle>,
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("len", &self.len())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            outstanding: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Enqueue a promise and count it as outstanding
    pub fn send(&self, promise: PromiseHandle) {
        *self.outstanding.lock() += 1;
        // The queue owns a receiver, so the channel cannot be disconnected.
        let _ = self.sender.send(promise);
    }

    /// Dequeue without blocking
    pub fn try_recv(&self) -> QueueResult<PromiseHandle> {
        self.receiver.try_recv().map_err(|e| match e {
            TryRecvError::Empty => QueueError::Empty,
            TryRecvError::Disconnected => QueueError::Disconnected,
        })
    }

    /// Dequeue, waiting up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> QueueResult<PromiseHandle> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => QueueError::Empty,
            RecvTimeoutError::Disconnected => QueueError::Disconnected,
        })
    }

    /// Receiving end, for use in `select!`
    pub(crate) fn receiver(&self) -> &Receiver<PromiseHandle> {
        &self.receiver
    }

    /// Acknowledge that a dequeued promise has been fully processed
    pub fn task_done(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Wait until nothing is outstanding, for at most `timeout`.
    ///
    /// Returns whether the queue drained.
    pub fn wait_drained_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            if self.drained.wait_until(&mut outstanding, deadline).timed_out() {
                return *outstanding == 0;
            }
        }
        true
    }

    /// Number of promises enqueued and not yet acknowledged
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock()
    }

    /// Number of promises waiting to be dequeued
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if no promise is waiting to be dequeued
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

//! Worker thread implementation

use crate::core::promise::ExecutionKind;
use crate::core::{KeeperError, PromiseHandle, Result};
use crate::pool::keeper::Shared;
use crate::queue::WorkQueue;
use crossbeam::channel::{self, select, Receiver, Sender};
use log::{debug, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Promises whose task returned a value
    pub promises_kept: AtomicU64,
    /// Promises whose task returned an error
    pub promises_broken: AtomicU64,
    /// Promises whose task panicked
    pub promises_panicked: AtomicU64,
    /// Total time spent running tasks (microseconds)
    pub total_processing_time_us: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WorkerStatSnapshot {
    /// Promises whose task returned a value
    pub promises_kept: u64,
    /// Promises whose task returned an error
    pub promises_broken: u64,
    /// Promises whose task panicked
    pub promises_panicked: u64,
    /// Total time spent running tasks (microseconds)
    pub total_processing_time_us: u64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, kind: ExecutionKind, microseconds: u64) {
        let counter = match kind {
            ExecutionKind::Kept => &self.promises_kept,
            ExecutionKind::Broken => &self.promises_broken,
            ExecutionKind::Panicked => &self.promises_panicked,
            ExecutionKind::Skipped => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get promises kept
    pub fn get_promises_kept(&self) -> u64 {
        self.promises_kept.load(Ordering::Relaxed)
    }

    /// Get promises broken
    pub fn get_promises_broken(&self) -> u64 {
        self.promises_broken.load(Ordering::Relaxed)
    }

    /// Get promises panicked
    pub fn get_promises_panicked(&self) -> u64 {
        self.promises_panicked.load(Ordering::Relaxed)
    }

    /// Get every promise this worker ran to completion
    pub fn get_promises_completed(&self) -> u64 {
        self.get_promises_kept() + self.get_promises_broken() + self.get_promises_panicked()
    }

    /// Get average processing time per promise in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.get_promises_completed();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Copy the counters
    pub fn snapshot(&self) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            promises_kept: self.get_promises_kept(),
            promises_broken: self.get_promises_broken(),
            promises_panicked: self.get_promises_panicked(),
            total_processing_time_us: self.total_processing_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Stop signal shared by the workers and the monitor of one pool run.
///
/// Raising it drops the only sender of a channel nobody sends on, which wakes
/// every thread blocked in `select!` on [`StopSignal::receiver`].
#[derive(Clone)]
pub(crate) struct StopSignal {
    inner: Arc<StopInner>,
}

struct StopInner {
    raised: AtomicBool,
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            inner: Arc::new(StopInner {
                raised: AtomicBool::new(false),
                sender: Mutex::new(Some(sender)),
                receiver,
            }),
        }
    }

    pub(crate) fn raise(&self) {
        self.inner.raised.store(true, Ordering::Release);
        self.inner.sender.lock().take();
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::Acquire)
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.inner.receiver
    }

    /// True if both signals belong to the same run
    pub(crate) fn same_run(&self, other: &StopSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A worker thread that runs promises from the shared queue
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Create and start a new worker
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier of this worker within its run
    /// * `name` - Thread name
    /// * `queue` - Queue shared by every worker of the pool
    /// * `stop` - Stop signal of the current run
    /// * `pool` - Pool that receives resubmitted continuations
    /// * `stats` - Counters of this worker slot, kept across restarts
    pub(crate) fn new(
        id: usize,
        name: String,
        queue: Arc<WorkQueue>,
        stop: StopSignal,
        pool: Weak<Shared>,
        stats: Arc<WorkerStats>,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                Self::run(id, queue, stop, pool, stats);
            })
            .map_err(|e| KeeperError::spawn_with_source(name, "Cannot create worker", e))?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Join the worker thread.
    ///
    /// A worker that stops its own pool from inside a task is not joined;
    /// it exits once the task returns.
    pub(crate) fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return Ok(());
            }
            thread
                .join()
                .map_err(|_| KeeperError::join(self.id, "Worker panicked"))?;
        }
        Ok(())
    }

    /// Main worker loop
    ///
    /// Blocks until either a promise arrives or the stop signal is raised.
    /// A promise already dequeued always runs to completion.
    fn run(
        id: usize,
        queue: Arc<WorkQueue>,
        stop: StopSignal,
        pool: Weak<Shared>,
        stats: Arc<WorkerStats>,
    ) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("worker {} started", id);

        while !stop.is_raised() {
            let next = select! {
                recv(stop.receiver()) -> _ => None,
                recv(queue.receiver()) -> msg => msg.ok(),
            };
            match next {
                Some(promise) => Self::process(id, promise, &queue, &pool, &stats),
                None => break,
            }
        }

        debug!(
            "worker {} exiting: {} kept, {} broken, {} panicked",
            id,
            stats.get_promises_kept(),
            stats.get_promises_broken(),
            stats.get_promises_panicked()
        );
    }

    /// Run one promise, resubmit its continuation, then acknowledge it.
    ///
    /// The continuation is enqueued before the acknowledgement so the
    /// outstanding count never drops to zero while a chain is in progress.
    fn process(
        id: usize,
        promise: PromiseHandle,
        queue: &WorkQueue,
        pool: &Weak<Shared>,
        stats: &WorkerStats,
    ) {
        let promise_id = promise.id();

        #[cfg(feature = "tracing")]
        let promise_span = span!(Level::DEBUG, "promise", id = %promise_id);
        #[cfg(feature = "tracing")]
        let _promise_guard = promise_span.enter();

        let start = Instant::now();
        let execution = promise.execute();
        let elapsed = start.elapsed();

        stats.record(execution.kind, elapsed.as_micros() as u64);
        trace!(
            "worker {} ran promise {} in {}us: {:?}",
            id,
            promise_id,
            elapsed.as_micros(),
            execution.kind
        );

        if let Some(next) = execution.continuation {
            let next_id = next.id();
            match pool.upgrade() {
                Some(shared) => {
                    if let Err(e) = shared.submit_handle(next) {
                        warn!("continuation {} of {} not submitted: {}", next_id, promise_id, e);
                    }
                }
                None => debug!(
                    "pool dropped; continuation {} of {} abandoned",
                    next_id, promise_id
                ),
            }
        }

        queue.task_done();
    }
}

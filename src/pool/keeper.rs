//! Promise keeper: the pool manager

use crate::core::{KeeperError, Promise, PromiseHandle, Result, TaskResult};
use crate::pool::config::KeeperConfig;
use crate::pool::feeder::{self, FeederState};
use crate::pool::monitor::Monitor;
use crate::pool::worker::{StopSignal, Worker, WorkerStats};
use crate::queue::WorkQueue;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Threads and stop signal of one start/stop cycle
struct Run {
    stop: StopSignal,
    workers: Vec<Worker>,
    // Held only to tie the monitor to its run; it exits on the stop signal.
    _monitor: Option<Monitor>,
}

/// State shared by the keeper, its workers, its monitor and its feeder
pub(crate) struct Shared {
    config: KeeperConfig,
    queue: Arc<WorkQueue>,
    run: Mutex<Option<Run>>,
    stats: Vec<Arc<WorkerStats>>,
    total_submitted: AtomicU64,
    pub(crate) feeder: Mutex<FeederState>,
}

impl Shared {
    fn new(config: KeeperConfig) -> Self {
        let stats = (0..config.num_threads)
            .map(|_| Arc::new(WorkerStats::new()))
            .collect();
        Self {
            config,
            queue: Arc::new(WorkQueue::new()),
            run: Mutex::new(None),
            stats,
            total_submitted: AtomicU64::new(0),
            feeder: Mutex::new(FeederState::default()),
        }
    }

    fn pool_name(&self) -> &str {
        &self.config.thread_name_prefix
    }

    /// Enqueue a promise, auto-starting the pool if configured.
    ///
    /// Holds the run lock while enqueuing so the auto-stop monitor either sees
    /// the new promise as outstanding or has already stopped the run, in which
    /// case this call starts a new one.
    pub(crate) fn submit_handle(self: &Arc<Self>, promise: PromiseHandle) -> Result<()> {
        promise.claim()?;

        let mut run = self.run.lock();
        let promise_id = promise.id();
        self.queue.send(promise);
        self.total_submitted.fetch_add(1, Ordering::Relaxed);
        log::trace!("promise {} queued on '{}'", promise_id, self.pool_name());

        if run.is_none() && self.config.auto_start {
            self.start_locked(&mut run)?;
        }
        Ok(())
    }

    fn start(self: &Arc<Self>) -> Result<()> {
        let mut run = self.run.lock();
        if run.is_some() {
            return Err(KeeperError::already_running(
                self.pool_name(),
                self.config.num_threads,
            ));
        }
        self.start_locked(&mut run)
    }

    fn start_locked(self: &Arc<Self>, run: &mut Option<Run>) -> Result<()> {
        let stop = StopSignal::new();

        let mut workers = Vec::with_capacity(self.config.num_threads);
        for (id, stats) in self.stats.iter().enumerate() {
            let name = format!("{}-{}", self.config.thread_name_prefix, id);
            let spawned = Worker::new(
                id,
                name,
                Arc::clone(&self.queue),
                stop.clone(),
                Arc::downgrade(self),
                Arc::clone(stats),
            );
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    stop.raise();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(e);
                }
            }
        }

        let monitor = if self.config.auto_stop {
            let spawned = Monitor::spawn(
                format!("{}-monitor", self.config.thread_name_prefix),
                Arc::downgrade(self),
                Arc::clone(&self.queue),
                stop.clone(),
                self.config.auto_stop_grace,
                self.config.monitor_poll_interval,
            );
            match spawned {
                Ok(monitor) => Some(monitor),
                Err(e) => {
                    stop.raise();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        debug!(
            "promise keeper '{}' started with {} workers (auto_stop: {})",
            self.pool_name(),
            workers.len(),
            self.config.auto_stop
        );

        *run = Some(Run {
            stop,
            workers,
            _monitor: monitor,
        });
        Ok(())
    }

    fn stop(&self, block: bool) -> Result<()> {
        let run = self
            .run
            .lock()
            .take()
            .ok_or_else(|| KeeperError::not_running(self.pool_name()))?;
        self.finish(run, block)
    }

    /// Stop the run `stop` belongs to if nothing is outstanding.
    ///
    /// Returns false when the run has already ended or new work arrived.
    pub(crate) fn stop_run_if_drained(&self, stop: &StopSignal) -> bool {
        let run = {
            let mut current = self.run.lock();
            let same_run = current
                .as_ref()
                .map(|run| run.stop.same_run(stop))
                .unwrap_or(false);
            if !same_run || self.queue.outstanding() > 0 {
                return false;
            }
            current.take()
        };

        if let Some(run) = run {
            debug!("promise keeper '{}' drained; stopping", self.pool_name());
            if let Err(e) = self.finish(run, true) {
                warn!("auto-stop of '{}' failed: {}", self.pool_name(), e);
            }
        }
        true
    }

    /// Raise the run's stop signal and optionally join its workers.
    ///
    /// Must be called without holding the run lock: workers finishing their
    /// last promise may resubmit a continuation.
    fn finish(&self, run: Run, block: bool) -> Result<()> {
        run.stop.raise();

        let mut result = Ok(());
        if block {
            for worker in run.workers {
                if let Err(e) = worker.join() {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }

        debug!(
            "promise keeper '{}' stopped ({} promises still queued)",
            self.pool_name(),
            self.queue.len()
        );
        result
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Detached threads of a run nobody can stop any more
        if let Some(run) = self.run.get_mut().take() {
            run.stop.raise();
        }
    }
}

/// A pool of worker threads that keeps promises.
///
/// Submitting work returns a [`Promise`] right away. With the default
/// configuration the pool starts on the first submission and stops itself
/// once every submitted promise, including chained continuations, is done.
///
/// ```rust
/// use promise_keeper::prelude::*;
///
/// # fn main() -> Result<()> {
/// let keeper = PromiseKeeper::with_threads(3)?;
///
/// let promises: Vec<_> = (0..5)
///     .map(|i| keeper.submit(move || Ok(i + 1000)))
///     .collect::<Result<_>>()?;
///
/// for (i, promise) in promises.iter().enumerate() {
///     promise.wait();
///     assert_eq!(promise.result(), Some(i + 1000));
/// }
/// # Ok(())
/// # }
/// ```
///
/// Only promises can be submitted:
///
/// ```rust,compile_fail
/// use promise_keeper::prelude::*;
///
/// let keeper = PromiseKeeper::new().unwrap();
/// keeper.submit_promise("do it").unwrap();
/// ```
pub struct PromiseKeeper {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PromiseKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseKeeper")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .field("queue", &self.shared.queue)
            .field("total_submitted", &self.total_submitted())
            .finish()
    }
}

impl PromiseKeeper {
    /// Create a promise keeper with default configuration (one worker)
    pub fn new() -> Result<Self> {
        Self::with_config(KeeperConfig::default())
    }

    /// Create a promise keeper with specified number of threads
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_config(KeeperConfig::new(num_threads))
    }

    /// Create a promise keeper with custom configuration
    pub fn with_config(config: KeeperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new(config)),
        })
    }

    /// Create a promise keeper fed by a stream of promises.
    ///
    /// A background thread drains `stream` and submits every item, so with
    /// auto-start enabled the pool starts as soon as the first promise
    /// arrives. The stream may be unbounded; the feeder ends when the stream
    /// does, when the keeper is dropped, or when a submission fails (see
    /// [`PromiseKeeper::feeder_error`]).
    ///
    /// ```rust
    /// use promise_keeper::prelude::*;
    ///
    /// # fn main() -> Result<()> {
    /// let squares: Vec<Promise<u32>> = (0..5).map(|i| Promise::new(move || Ok(i * i))).collect();
    /// let keeper = PromiseKeeper::with_stream(KeeperConfig::new(2), squares.clone())?;
    ///
    /// for (i, promise) in squares.iter().enumerate() {
    ///     promise.wait();
    ///     assert_eq!(promise.result(), Some((i * i) as u32));
    /// }
    /// # drop(keeper);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_stream<I>(config: KeeperConfig, stream: I) -> Result<Self>
    where
        I: IntoIterator + Send + 'static,
        I::Item: Into<PromiseHandle>,
    {
        let keeper = Self::with_config(config)?;
        let name = format!("{}-feeder", keeper.shared.config.thread_name_prefix);
        let handle = feeder::spawn(name, Arc::downgrade(&keeper.shared), stream)?;
        keeper.shared.feeder.lock().handle = Some(handle);
        Ok(keeper)
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Submit a closure and get a promise of its result
    pub fn submit<T, F>(&self, task: F) -> Result<Promise<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> TaskResult<T> + Send + 'static,
    {
        let promise = Promise::new(task);
        self.submit_promise(&promise)?;
        Ok(promise)
    }

    /// Submit a closure with a completion callback
    pub fn submit_with_notify<T, F, N>(&self, task: F, notify: N) -> Result<Promise<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> TaskResult<T> + Send + 'static,
        N: FnOnce(&Promise<T>) + Send + 'static,
    {
        let promise = Promise::new(task).with_notify(notify)?;
        self.submit_promise(&promise)?;
        Ok(promise)
    }

    /// Submit an existing promise.
    ///
    /// Starts the pool when auto-start is enabled and it is not running.
    ///
    /// # Errors
    ///
    /// - [`KeeperError::InvalidPromise`] if the promise was already submitted,
    ///   has started, or is a continuation still waiting for its parent
    /// - errors from [`PromiseKeeper::start`] when auto-starting
    pub fn submit_promise(&self, promise: impl Into<PromiseHandle>) -> Result<()> {
        self.shared.submit_handle(promise.into())
    }

    /// Start the worker threads
    ///
    /// Spawns the auto-stop monitor too when auto-stop is enabled. Promises
    /// queued while the pool was stopped are picked up right away.
    ///
    /// # Errors
    ///
    /// [`KeeperError::AlreadyRunning`] if the pool is running.
    pub fn start(&self) -> Result<()> {
        self.shared.start()
    }

    /// Stop the worker threads
    ///
    /// With `block`, waits for the promises currently executing to finish.
    /// Promises still queued stay queued until the next start.
    ///
    /// # Errors
    ///
    /// [`KeeperError::NotRunning`] if the pool is not running.
    pub fn stop(&self, block: bool) -> Result<()> {
        self.shared.stop(block)
    }

    /// Check if the pool is running
    pub fn is_running(&self) -> bool {
        self.shared.run.lock().is_some()
    }

    /// Get the number of worker threads
    pub fn num_threads(&self) -> usize {
        self.shared.config.num_threads
    }

    /// Get the configuration
    pub fn config(&self) -> &KeeperConfig {
        &self.shared.config
    }

    /// Promises waiting to be picked up by a worker
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Promises queued or executing
    pub fn outstanding(&self) -> usize {
        self.shared.queue.outstanding()
    }

    /// Get total number of promises submitted, continuations included
    pub fn total_submitted(&self) -> u64 {
        self.shared.total_submitted.load(Ordering::Relaxed)
    }

    /// Get statistics for each worker slot.
    ///
    /// Counters accumulate across restarts.
    pub fn stats(&self) -> Vec<Arc<WorkerStats>> {
        self.shared.stats.clone()
    }

    /// Get total promises kept across all workers
    pub fn total_kept(&self) -> u64 {
        self.shared.stats.iter().map(|s| s.get_promises_kept()).sum()
    }

    /// Get total promises broken across all workers
    pub fn total_broken(&self) -> u64 {
        self.shared.stats.iter().map(|s| s.get_promises_broken()).sum()
    }

    /// Get total promises panicked across all workers
    pub fn total_panicked(&self) -> u64 {
        self.shared
            .stats
            .iter()
            .map(|s| s.get_promises_panicked())
            .sum()
    }
}

impl Drop for PromiseKeeper {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop(true) {
                // Another thread may have stopped it in between
                if !matches!(e, KeeperError::NotRunning { .. }) {
                    warn!(
                        "failed to stop promise keeper '{}' during drop: {}",
                        self.shared.pool_name(),
                        e
                    );
                }
            }
        }
    }
}

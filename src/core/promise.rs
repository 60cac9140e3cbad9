//! Promises: handles to the deferred outcome of a task
//!
//! A [`Promise`] wraps a task closure together with everything a worker
//! records while running it. All clones share one state guarded by a single
//! mutex, so a caller can poll [`Promise::is_ready`] while a worker writes the
//! outcome.
//!
//! # Example
//!
//! ```rust
//! use promise_keeper::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let keeper = PromiseKeeper::with_threads(2)?;
//!
//! // Attach continuations before handing the first promise to the pool
//! let first = Promise::new(|| Ok(-5));
//! let last = first
//!     .then_do(|parent| Ok(parent.result().unwrap_or_default() * 5))?
//!     .then_do(|parent| Ok(parent.result().unwrap_or_default() - 5))?;
//! keeper.submit_promise(&first)?;
//!
//! last.wait();
//! assert_eq!(last.result(), Some(-30));
//! # Ok(())
//! # }
//! ```

use crate::core::error::{KeeperError, Result};
use crate::core::failure::{TaskFailure, TaskResult};
use chrono::{DateTime, Local};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

type Task<T> = Box<dyn FnOnce() -> TaskResult<T> + Send>;
type Notify<T> = Box<dyn FnOnce(&Promise<T>) + Send>;
type Continuation<T> = Box<dyn FnOnce(&Promise<T>) -> PromiseHandle + Send>;

/// Phase of a promise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PromiseStatus {
    /// Not picked up by a worker yet
    Waiting,
    /// A worker is running the task
    Running,
    /// Outcome recorded
    Completed,
}

struct State<T> {
    task: Option<Task<T>>,
    outcome: Option<std::result::Result<T, TaskFailure>>,
    started_on: Option<DateTime<Local>>,
    completed_on: Option<DateTime<Local>>,
    notify: Option<Notify<T>>,
    continuation: Option<Continuation<T>>,
    awaiting_parent: bool,
    submitted: bool,
}

impl<T> State<T> {
    fn status(&self) -> PromiseStatus {
        match (self.started_on, self.completed_on) {
            (_, Some(_)) => PromiseStatus::Completed,
            (Some(_), None) => PromiseStatus::Running,
            (None, None) => PromiseStatus::Waiting,
        }
    }
}

struct Inner<T> {
    id: Uuid,
    state: Mutex<State<T>>,
    ready: Condvar,
}

/// A promise of a future result.
///
/// Created with [`Promise::new`], [`Promise::with_args`], by
/// [`PromiseKeeper::submit`](crate::PromiseKeeper::submit) or by
/// [`Promise::then_do`]. Cloning yields another handle to the same promise.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Create a promise for a closure
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce() -> TaskResult<T> + Send + 'static,
    {
        Self::from_state(Some(Box::new(task)), false)
    }

    /// Create a promise that calls `task` with `args` when it runs.
    ///
    /// Tuples cover positional arguments; a struct covers named ones.
    ///
    /// ```rust
    /// use promise_keeper::prelude::*;
    ///
    /// fn add((x, y): (i32, i32)) -> TaskResult<i32> {
    ///     Ok(x + y)
    /// }
    ///
    /// let promise = Promise::with_args(add, (7, 3));
    /// assert!(!promise.has_started());
    /// ```
    pub fn with_args<A, F>(task: F, args: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> TaskResult<T> + Send + 'static,
    {
        Self::new(move || task(args))
    }

    /// Attach a callback invoked with the completed promise.
    ///
    /// The callback runs on the worker thread after the outcome and
    /// `completed_on` are recorded. A panicking callback is ignored.
    ///
    /// # Errors
    ///
    /// [`KeeperError::AlreadyStarted`] if a worker has picked up this promise.
    pub fn with_notify<N>(self, notify: N) -> Result<Self>
    where
        N: FnOnce(&Promise<T>) + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if state.started_on.is_some() {
                return Err(KeeperError::already_started(self.inner.id));
            }
            state.notify = Some(Box::new(notify));
        }
        Ok(self)
    }

    /// Chain a continuation that runs after this promise completes.
    ///
    /// The continuation receives this promise and is submitted to the pool
    /// that executed it. Returns the continuation's promise so calls can be
    /// chained.
    ///
    /// # Errors
    ///
    /// - [`KeeperError::AlreadyStarted`] if this promise has started
    /// - [`KeeperError::ContinuationAttached`] if a continuation is already attached
    pub fn then_do<U, F>(&self, continuation: F) -> Result<Promise<U>>
    where
        U: Send + 'static,
        F: FnOnce(&Promise<T>) -> TaskResult<U> + Send + 'static,
    {
        let child = Promise::<U>::from_state(None, true);

        // Same lock as the transition into Running: a worker cannot start
        // this promise between the check and the attach.
        let mut state = self.inner.state.lock();
        if state.started_on.is_some() {
            return Err(KeeperError::already_started(self.id()));
        }
        if state.continuation.is_some() {
            return Err(KeeperError::continuation_attached(self.id()));
        }

        let bound = child.clone();
        state.continuation = Some(Box::new(move |parent: &Promise<T>| {
            let parent = parent.clone();
            bound.bind(move || continuation(&parent));
            PromiseHandle::from(bound)
        }));

        Ok(child)
    }

    fn from_state(task: Option<Task<T>>, awaiting_parent: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                state: Mutex::new(State {
                    task,
                    outcome: None,
                    started_on: None,
                    completed_on: None,
                    notify: None,
                    continuation: None,
                    awaiting_parent,
                    submitted: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    fn bind<F>(&self, task: F)
    where
        F: FnOnce() -> TaskResult<T> + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        state.task = Some(Box::new(task));
        state.awaiting_parent = false;
    }
}

impl<T> Promise<T> {
    /// Unique identifier of this promise
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// True once the outcome has been recorded
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().completed_on.is_some()
    }

    /// True once a worker has picked up the task
    pub fn has_started(&self) -> bool {
        self.inner.state.lock().started_on.is_some()
    }

    /// Current phase
    pub fn status(&self) -> PromiseStatus {
        self.inner.state.lock().status()
    }

    /// When a worker started the task
    pub fn started_on(&self) -> Option<DateTime<Local>> {
        self.inner.state.lock().started_on
    }

    /// When the outcome was recorded
    pub fn completed_on(&self) -> Option<DateTime<Local>> {
        self.inner.state.lock().completed_on
    }

    /// Time between start and completion, once ready
    pub fn execution_time(&self) -> Option<chrono::Duration> {
        let state = self.inner.state.lock();
        match (state.started_on, state.completed_on) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }

    /// The failure, if the task returned an error or panicked
    pub fn failure(&self) -> Option<TaskFailure> {
        match self.inner.state.lock().outcome.as_ref() {
            Some(Err(failure)) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Block until the promise is ready
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while state.completed_on.is_none() {
            self.inner.ready.wait(&mut state);
        }
    }

    /// Block until the promise is ready or `timeout` elapses.
    ///
    /// Returns whether the promise is ready.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.completed_on.is_none() {
            if self.inner.ready.wait_until(&mut state, deadline).timed_out() {
                return state.completed_on.is_some();
            }
        }
        true
    }
}

impl<T: Clone> Promise<T> {
    /// The value returned by the task, once it succeeded
    pub fn result(&self) -> Option<T> {
        match self.inner.state.lock().outcome.as_ref() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The tagged outcome, once ready
    pub fn outcome(&self) -> Option<std::result::Result<T, TaskFailure>> {
        self.inner.state.lock().outcome.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        let mut debug = f.debug_struct("Promise");
        debug.field("id", &self.inner.id).field("status", &state.status());
        match state.status() {
            PromiseStatus::Completed => debug.field("outcome", &state.outcome),
            PromiseStatus::Running => debug.field("started_on", &state.started_on),
            PromiseStatus::Waiting => debug.field("has_continuation", &state.continuation.is_some()),
        };
        debug.finish()
    }
}

/// How a worker's run of a promise ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionKind {
    /// Task returned a value
    Kept,
    /// Task returned an error
    Broken,
    /// Task panicked
    Panicked,
    /// Nothing to run (already started elsewhere)
    Skipped,
}

/// Result of [`Executable::execute`]
pub(crate) struct Execution {
    pub kind: ExecutionKind,
    pub continuation: Option<PromiseHandle>,
}

/// Type-erased view of a promise used by the queue and the workers
pub(crate) trait Executable: Send + Sync {
    fn id(&self) -> Uuid;

    /// Mark the promise as submitted, rejecting promises that cannot run
    fn claim(&self) -> Result<()>;

    /// Run the task and record its outcome
    fn execute(self: Arc<Self>) -> Execution;
}

impl<T: Send + 'static> Executable for Inner<T> {
    fn id(&self) -> Uuid {
        self.id
    }

    fn claim(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.started_on.is_some() {
            return Err(KeeperError::invalid_promise(self.id, "promise has already started"));
        }
        if state.awaiting_parent {
            return Err(KeeperError::invalid_promise(
                self.id,
                "continuation is submitted when its parent completes",
            ));
        }
        if state.submitted {
            return Err(KeeperError::invalid_promise(self.id, "promise was already submitted"));
        }
        state.submitted = true;
        Ok(())
    }

    fn execute(self: Arc<Self>) -> Execution {
        let promise = Promise { inner: self };

        let task = {
            let mut state = promise.inner.state.lock();
            if state.started_on.is_some() {
                return Execution {
                    kind: ExecutionKind::Skipped,
                    continuation: None,
                };
            }
            let Some(task) = state.task.take() else {
                return Execution {
                    kind: ExecutionKind::Skipped,
                    continuation: None,
                };
            };
            state.started_on = Some(Local::now());
            task
        };

        let (kind, outcome) = match catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(value)) => (ExecutionKind::Kept, Ok(value)),
            Ok(Err(err)) => (ExecutionKind::Broken, Err(TaskFailure::from(err))),
            Err(payload) => (ExecutionKind::Panicked, Err(TaskFailure::from_panic(payload))),
        };

        let (notify, continuation) = {
            let mut state = promise.inner.state.lock();
            state.outcome = Some(outcome);
            state.completed_on = Some(Local::now());
            (state.notify.take(), state.continuation.take())
        };
        promise.inner.ready.notify_all();

        if let Some(notify) = notify {
            let _ = catch_unwind(AssertUnwindSafe(|| notify(&promise)));
        }

        Execution {
            kind,
            continuation: continuation.map(|bind| bind(&promise)),
        }
    }
}

/// A promise with its result type erased.
///
/// Lets promises of different result types share one queue or one stream.
#[derive(Clone)]
pub struct PromiseHandle {
    inner: Arc<dyn Executable>,
}

impl PromiseHandle {
    /// Identifier of the underlying promise
    pub fn id(&self) -> Uuid {
        self.inner.id()
    }

    pub(crate) fn claim(&self) -> Result<()> {
        self.inner.claim()
    }

    pub(crate) fn execute(self) -> Execution {
        self.inner.execute()
    }
}

impl fmt::Debug for PromiseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromiseHandle({})", self.id())
    }
}

impl<T: Send + 'static> From<Promise<T>> for PromiseHandle {
    fn from(promise: Promise<T>) -> Self {
        Self {
            inner: promise.inner,
        }
    }
}

impl<T: Send + 'static> From<&Promise<T>> for PromiseHandle {
    fn from(promise: &Promise<T>) -> Self {
        Self::from(promise.clone())
    }
}

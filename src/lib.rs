//! # Promise Keeper
//!
//! A small thread pool that hands back a [`Promise`] for every unit of work.
//!
//! ## Features
//!
//! - **Promises**: Poll or wait for a task's result, failure and timing
//! - **Notification**: Optional callback invoked once the promise completes
//! - **Chaining**: `then_do` continuations run after their parent, receiving it
//! - **Auto-start / Auto-stop**: The pool starts on submission and stops once drained
//! - **Stream feeding**: Drive the pool from an iterator of promises
//! - **Isolation**: Task errors and panics are captured into the promise
//!
//! ## Quick Start
//!
//! ```rust
//! use promise_keeper::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // Starts on the first submission, stops once everything is done
//! let keeper = PromiseKeeper::with_threads(3)?;
//!
//! let sum = keeper.submit(|| Ok(5 + 2))?;
//! sum.wait();
//!
//! assert_eq!(sum.result(), Some(7));
//! assert!(sum.failure().is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures
//!
//! ```rust
//! use promise_keeper::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let keeper = PromiseKeeper::new()?;
//!
//! let divisor = std::hint::black_box(0);
//! let quotient = keeper.submit(move || Ok(10 / divisor))?;
//! quotient.wait();
//!
//! assert!(quotient.result().is_none());
//! assert!(quotient.failure().map(|f| f.is_panic()).unwrap_or(false));
//! # Ok(())
//! # }
//! ```
//!
//! ## Manual Lifecycle
//!
//! ```rust
//! use promise_keeper::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = KeeperConfig::new(2)
//!     .with_auto_start(false)
//!     .with_auto_stop(false);
//! let keeper = PromiseKeeper::with_config(config)?;
//!
//! let first = keeper.submit(|| Ok(-5))?;
//! let last = first
//!     .then_do(|parent| Ok(parent.result().unwrap_or_default() * 5))?
//!     .then_do(|parent| Ok(parent.result().unwrap_or_default() - 5))?;
//! assert!(!keeper.is_running());
//!
//! keeper.start()?;
//! last.wait();
//! keeper.stop(true)?;
//!
//! assert_eq!(last.result(), Some(-30));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod queue;

pub use core::{
    KeeperError, Promise, PromiseHandle, PromiseStatus, Result, TaskError, TaskFailure,
    TaskResult,
};
pub use pool::{KeeperConfig, PromiseKeeper, WorkerStatSnapshot, WorkerStats};

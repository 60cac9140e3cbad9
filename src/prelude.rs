//! Convenient re-exports for common types and traits

pub use crate::core::{
    KeeperError, Promise, PromiseHandle, PromiseStatus, Result, TaskError, TaskFailure,
    TaskResult,
};
pub use crate::pool::{KeeperConfig, PromiseKeeper, WorkerStats};

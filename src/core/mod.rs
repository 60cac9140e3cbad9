//! Core types: errors, task outcomes and promises

pub mod error;
pub mod failure;
pub mod promise;

pub use error::{KeeperError, Result};
pub use failure::{TaskError, TaskFailure, TaskResult};
pub use promise::{Promise, PromiseHandle, PromiseStatus};

//! Task outcomes

use std::any::Any;
use std::error::Error;
use std::sync::Arc;

/// Error type a task may return
pub type TaskError = Box<dyn Error + Send + Sync + 'static>;

/// Return type of every task closure
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Why a task did not produce a value.
///
/// Cloning is cheap; the error is shared between all clones of the promise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskFailure {
    /// The task returned `Err`
    #[error("task failed: {0}")]
    Error(Arc<dyn Error + Send + Sync + 'static>),
    /// The task panicked; holds the panic message
    #[error("task panicked: {0}")]
    Panic(String),
}

impl TaskFailure {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskFailure::Panic(panic_message(payload.as_ref()))
    }

    /// Returns true if the task panicked
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskFailure::Panic(_))
    }

    /// Downcast the returned error to a concrete type.
    ///
    /// Returns `None` for panics and for errors of another type.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        match self {
            TaskFailure::Error(err) => err.downcast_ref::<E>(),
            TaskFailure::Panic(_) => None,
        }
    }
}

impl From<TaskError> for TaskFailure {
    fn from(err: TaskError) -> Self {
        TaskFailure::Error(Arc::from(err))
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

//! Error types for the promise keeper

use uuid::Uuid;

/// Result type for promise keeper operations
pub type Result<T> = std::result::Result<T, KeeperError>;

/// Errors raised by pool and promise operations.
///
/// Failures of the submitted tasks themselves never show up here; they are
/// captured into the promise as a [`TaskFailure`](crate::core::TaskFailure).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KeeperError {
    /// Pool is already running
    #[error("Promise keeper '{pool_name}' is already running with {worker_count} workers")]
    AlreadyRunning {
        /// Name of the pool
        pool_name: String,
        /// Number of worker threads
        worker_count: usize,
    },

    /// Pool is not running
    #[error("Promise keeper '{pool_name}' is not running")]
    NotRunning {
        /// Name of the pool
        pool_name: String,
    },

    /// Promise has already started executing
    #[error("Promise {promise_id} has already started")]
    AlreadyStarted {
        /// ID of the promise
        promise_id: Uuid,
    },

    /// Promise already carries a continuation
    #[error("Promise {promise_id} already has a continuation attached")]
    ContinuationAttached {
        /// ID of the promise
        promise_id: Uuid,
    },

    /// Promise cannot be submitted in its current state
    #[error("Promise {promise_id} cannot be submitted: {reason}")]
    InvalidPromise {
        /// ID of the promise
        promise_id: Uuid,
        /// Why the promise was rejected
        reason: String,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn thread '{thread_name}': {message}")]
    SpawnError {
        /// Name of the thread that failed to spawn
        thread_name: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// The promise stream panicked while producing an item
    #[error("Promise stream panicked: {message}")]
    FeederPanic {
        /// Panic message
        message: String,
    },
}

impl KeeperError {
    /// Create an already running error
    pub fn already_running(pool_name: impl Into<String>, worker_count: usize) -> Self {
        KeeperError::AlreadyRunning {
            pool_name: pool_name.into(),
            worker_count,
        }
    }

    /// Create a not running error
    pub fn not_running(pool_name: impl Into<String>) -> Self {
        KeeperError::NotRunning {
            pool_name: pool_name.into(),
        }
    }

    /// Create an already started error
    pub fn already_started(promise_id: Uuid) -> Self {
        KeeperError::AlreadyStarted { promise_id }
    }

    /// Create a continuation attached error
    pub fn continuation_attached(promise_id: Uuid) -> Self {
        KeeperError::ContinuationAttached { promise_id }
    }

    /// Create an invalid promise error
    pub fn invalid_promise(promise_id: Uuid, reason: impl Into<String>) -> Self {
        KeeperError::InvalidPromise {
            promise_id,
            reason: reason.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_name: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        KeeperError::SpawnError {
            thread_name: thread_name.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        KeeperError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        KeeperError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a feeder panic error
    pub fn feeder_panic(message: impl Into<String>) -> Self {
        KeeperError::FeederPanic {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by calling an operation in the wrong state.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            KeeperError::AlreadyRunning { .. }
                | KeeperError::NotRunning { .. }
                | KeeperError::AlreadyStarted { .. }
                | KeeperError::ContinuationAttached { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = KeeperError::already_running("main_pool", 8);
        assert!(matches!(err, KeeperError::AlreadyRunning { .. }));
        assert!(err.is_state_error());

        let err = KeeperError::invalid_promise(Uuid::nil(), "already started");
        assert!(matches!(err, KeeperError::InvalidPromise { .. }));
        assert!(!err.is_state_error());
    }

    #[test]
    fn test_error_display() {
        let err = KeeperError::already_running("promise-worker", 4);
        assert_eq!(
            err.to_string(),
            "Promise keeper 'promise-worker' is already running with 4 workers"
        );

        let err = KeeperError::not_running("promise-worker");
        assert_eq!(err.to_string(), "Promise keeper 'promise-worker' is not running");

        let err = KeeperError::already_started(Uuid::nil());
        assert_eq!(
            err.to_string(),
            "Promise 00000000-0000-0000-0000-000000000000 has already started"
        );
    }

    #[test]
    fn test_spawn_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = KeeperError::spawn_with_source("promise-worker-5", "Cannot create thread", io_err);

        assert!(matches!(err, KeeperError::SpawnError { .. }));
        assert!(err.to_string().contains("promise-worker-5"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

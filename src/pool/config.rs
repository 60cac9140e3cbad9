//! Promise keeper configuration

use crate::core::{KeeperError, Result};
use std::time::Duration;

/// Configuration for a [`PromiseKeeper`](crate::PromiseKeeper)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    /// Number of worker threads. Default: 1
    pub num_threads: usize,
    /// Start the pool on submission when it is not running. Default: true
    pub auto_start: bool,
    /// Stop the pool once every submitted promise is done. Default: true
    pub auto_stop: bool,
    /// Thread name prefix, also used as the pool name in errors
    pub thread_name_prefix: String,
    /// Delay before the auto-stop monitor first checks for drain.
    /// Default: 50ms
    pub auto_stop_grace: Duration,
    /// How often the auto-stop monitor re-checks the stop signal while
    /// waiting for drain. Default: 100ms
    pub monitor_poll_interval: Duration,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            auto_start: true,
            auto_stop: true,
            thread_name_prefix: "promise-worker".to_string(),
            auto_stop_grace: Duration::from_millis(50),
            monitor_poll_interval: Duration::from_millis(100),
        }
    }
}

impl KeeperConfig {
    /// Create a new configuration with specified number of threads
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Enable or disable auto-start
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Enable or disable auto-stop
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_auto_stop(mut self, auto_stop: bool) -> Self {
        self.auto_stop = auto_stop;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the grace delay before the auto-stop monitor looks for drain.
    ///
    /// Covers the window between starting a pool and the first submission
    /// reaching the queue.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_auto_stop_grace(mut self, grace: Duration) -> Self {
        self.auto_stop_grace = grace;
        self
    }

    /// Set the monitor poll interval.
    ///
    /// Shorter intervals let an explicitly stopped pool release its monitor
    /// thread sooner.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_monitor_poll_interval(mut self, interval: Duration) -> Self {
        self.monitor_poll_interval = interval;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(KeeperError::invalid_config(
                "num_threads",
                "Number of threads must be greater than 0",
            ));
        }
        if self.monitor_poll_interval.is_zero() {
            return Err(KeeperError::invalid_config(
                "monitor_poll_interval",
                "Monitor poll interval must be non-zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KeeperConfig::default();
        assert_eq!(config.num_threads, 1);
        assert!(config.auto_start);
        assert!(config.auto_stop);
        assert_eq!(config.thread_name_prefix, "promise-worker");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = KeeperConfig::new(3)
            .with_auto_start(false)
            .with_auto_stop(false)
            .with_thread_name_prefix("batch")
            .with_auto_stop_grace(Duration::from_millis(5))
            .with_monitor_poll_interval(Duration::from_millis(10));

        assert_eq!(config.num_threads, 3);
        assert!(!config.auto_start);
        assert!(!config.auto_stop);
        assert_eq!(config.thread_name_prefix, "batch");
        assert_eq!(config.auto_stop_grace, Duration::from_millis(5));
        assert_eq!(config.monitor_poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = KeeperConfig::new(0).validate().unwrap_err();
        assert!(matches!(
            err,
            KeeperError::InvalidConfig { ref parameter, .. } if parameter == "num_threads"
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = KeeperConfig::new(1).with_monitor_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}

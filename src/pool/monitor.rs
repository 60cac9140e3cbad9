//! Auto-stop monitor

use crate::core::{KeeperError, Result};
use crate::pool::keeper::Shared;
use crate::pool::worker::StopSignal;
use crate::queue::WorkQueue;
use crossbeam::channel::RecvTimeoutError;
use log::debug;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// Background thread that stops its run once the queue drains.
///
/// Never joined: it may be the thread that stops the pool, and it exits on its
/// own once the run's stop signal is raised.
pub(crate) struct Monitor {
    _thread: thread::JoinHandle<()>,
}

impl Monitor {
    pub(crate) fn spawn(
        name: String,
        pool: Weak<Shared>,
        queue: Arc<WorkQueue>,
        stop: StopSignal,
        grace: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(pool, queue, stop, grace, poll_interval))
            .map_err(|e| KeeperError::spawn_with_source(name, "Cannot create monitor", e))?;
        Ok(Self { _thread: thread })
    }

    fn run(
        pool: Weak<Shared>,
        queue: Arc<WorkQueue>,
        stop: StopSignal,
        grace: Duration,
        poll_interval: Duration,
    ) {
        // Grace period, cut short by an explicit stop
        if let Err(RecvTimeoutError::Disconnected) = stop.receiver().recv_timeout(grace) {
            return;
        }

        while !stop.is_raised() {
            if !queue.wait_drained_for(poll_interval) {
                continue;
            }
            let Some(shared) = pool.upgrade() else {
                return;
            };
            if shared.stop_run_if_drained(&stop) {
                debug!("auto-stop monitor finished");
                return;
            }
        }
    }
}

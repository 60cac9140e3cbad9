//! Stream feeder: submits promises produced by an iterator

use crate::core::failure::panic_message;
use crate::core::{KeeperError, PromiseHandle, Result};
use crate::pool::keeper::{PromiseKeeper, Shared};
use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Weak;
use std::thread;

/// Feeder thread and the error that ended it, if any
#[derive(Debug, Default)]
pub(crate) struct FeederState {
    pub(crate) handle: Option<thread::JoinHandle<()>>,
    pub(crate) error: Option<KeeperError>,
}

pub(crate) fn spawn<I>(name: String, pool: Weak<Shared>, stream: I) -> Result<thread::JoinHandle<()>>
where
    I: IntoIterator + Send + 'static,
    I::Item: Into<PromiseHandle>,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || feed(pool, stream))
        .map_err(|e| KeeperError::spawn_with_source(name, "Cannot create feeder", e))
}

fn feed<I>(pool: Weak<Shared>, stream: I)
where
    I: IntoIterator,
    I::Item: Into<PromiseHandle>,
{
    let mut items = stream.into_iter();
    let mut fed = 0usize;

    loop {
        let item = match catch_unwind(AssertUnwindSafe(|| items.next())) {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(payload) => {
                let error = KeeperError::feeder_panic(panic_message(payload.as_ref()));
                warn!("feeder stopped after {} promises: {}", fed, error);
                if let Some(shared) = pool.upgrade() {
                    shared.feeder.lock().error = Some(error);
                }
                return;
            }
        };

        let Some(shared) = pool.upgrade() else {
            debug!("feeder stopped after {} promises: pool dropped", fed);
            return;
        };
        if let Err(error) = shared.submit_handle(item.into()) {
            warn!("feeder stopped after {} promises: {}", fed, error);
            shared.feeder.lock().error = Some(error);
            return;
        }
        fed += 1;
    }

    debug!("feeder finished after {} promises", fed);
}

impl PromiseKeeper {
    /// True while the stream feeder thread is running
    pub fn is_feeding(&self) -> bool {
        self.shared()
            .feeder
            .lock()
            .handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Describe the error that stopped the stream feeder, if any
    pub fn feeder_error(&self) -> Option<String> {
        self.shared()
            .feeder
            .lock()
            .error
            .as_ref()
            .map(|e| e.to_string())
    }

    /// Take the error that stopped the stream feeder, if any
    pub fn take_feeder_error(&self) -> Option<KeeperError> {
        self.shared().feeder.lock().error.take()
    }
}

//! Pool manager, workers, auto-stop monitor and stream feeder

pub mod config;
mod feeder;
pub mod keeper;
mod monitor;
pub mod worker;

pub use config::KeeperConfig;
pub use keeper::PromiseKeeper;
pub use worker::{WorkerStatSnapshot, WorkerStats};

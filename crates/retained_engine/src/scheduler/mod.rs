//! # Schedulers
//!
//! The frame scheduler renders on the device's thread; the update scheduler
//! ticks the simulation on a small worker pool. Each is guarded by its own
//! flag, so a render never waits for an update and vice versa: overlapping
//! requests are dropped, not queued.

pub mod frame;
pub mod metrics;
pub mod pool;
pub mod repaint;
pub mod update;

#[cfg(test)]
mod tests;

pub use frame::FrameScheduler;
pub use metrics::{FrameMetrics, FrameStatistics, UpdateMetrics};
pub use pool::ThreadPool;
pub use repaint::{expand_repaint_mask, RepaintMask};
pub use update::{UpdateOutcome, UpdateScheduler};

use thiserror::Error;

/// Scheduler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The worker pool no longer accepts jobs
    #[error("Worker pool is closed")]
    PoolClosed,

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

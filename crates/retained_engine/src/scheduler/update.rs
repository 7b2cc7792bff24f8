//! Update scheduler
//!
//! Advances simulation state off the render thread. After each displayed
//! frame the host calls [`UpdateScheduler::frame_displayed`], which hands one
//! tick to the worker pool unless the previous tick is still running; the
//! simulation therefore runs one frame behind rendering and never queues up.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::config::UpdateConfig;
use crate::foundation::time::{SystemClock, TimeSource};
use crate::scene::ObjectRegistry;
use crate::scheduler::frame::panic_message;
use crate::scheduler::metrics::UpdateMetrics;
use crate::scheduler::pool::ThreadPool;
use crate::scheduler::SchedulerError;

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First tick: the clock baseline was recorded, nothing updated
    Baseline,
    /// No time elapsed since the previous tick
    Idle,
    /// Every updatable was advanced
    Updated(UpdateMetrics),
    /// Another tick was still running
    Skipped,
    /// An updatable panicked; the tick was abandoned
    Failed,
}

struct UpdateTask {
    registry: ObjectRegistry,
    clock: Arc<dyn TimeSource>,
    updating: AtomicBool,
    last_tick: Mutex<Option<Duration>>,
    last_metrics: Mutex<Option<UpdateMetrics>>,
    ticks: AtomicU64,
}

impl UpdateTask {
    fn try_begin(&self) -> bool {
        self.updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Run a tick; the caller must have won `try_begin`
    fn run(&self) -> UpdateOutcome {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.step()));
        let outcome = outcome.unwrap_or_else(|payload| {
            log::error!("Update tick abandoned: updatable panicked: {}", panic_message(&*payload));
            UpdateOutcome::Failed
        });
        self.updating.store(false, Ordering::Release);
        outcome
    }

    fn step(&self) -> UpdateOutcome {
        let now = self.clock.now();
        let delta = {
            let mut last_tick = self.last_tick.lock();
            let Some(previous) = *last_tick else {
                *last_tick = Some(now);
                return UpdateOutcome::Baseline;
            };
            let delta = now.saturating_sub(previous);
            if delta.is_zero() {
                return UpdateOutcome::Idle;
            }
            *last_tick = Some(now);
            delta
        };

        let started = Instant::now();
        let updatables = self.registry.updatables();
        for updatable in &updatables {
            updatable.capability.update(delta);
        }
        let purged = self.registry.housekeeping(delta);

        let metrics = UpdateMetrics {
            delta,
            invoked: updatables.len(),
            purged,
            elapsed: started.elapsed(),
        };
        self.ticks.fetch_add(1, Ordering::AcqRel);
        *self.last_metrics.lock() = Some(metrics.clone());
        UpdateOutcome::Updated(metrics)
    }
}

/// Background simulation tick driver
pub struct UpdateScheduler {
    task: Arc<UpdateTask>,
    pool: ThreadPool,
}

impl UpdateScheduler {
    /// Scheduler reading the system clock
    pub fn new(registry: ObjectRegistry, config: &UpdateConfig) -> Result<Self, SchedulerError> {
        Self::with_clock(registry, config, Arc::new(SystemClock::new()))
    }

    /// Scheduler reading an injected clock
    pub fn with_clock(
        registry: ObjectRegistry,
        config: &UpdateConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, SchedulerError> {
        let pool = ThreadPool::new("update", config.workers)?;
        Ok(Self {
            task: Arc::new(UpdateTask {
                registry,
                clock,
                updating: AtomicBool::new(false),
                last_tick: Mutex::new(None),
                last_metrics: Mutex::new(None),
                ticks: AtomicU64::new(0),
            }),
            pool,
        })
    }

    /// Notify that a frame was displayed
    ///
    /// Submits a tick to the pool unless one is still in flight, in which
    /// case the notification is coalesced. Returns whether a tick was
    /// submitted.
    pub fn frame_displayed(&self) -> bool {
        if !self.task.try_begin() {
            log::trace!("Update still running, frame notification coalesced");
            return false;
        }

        let task = Arc::clone(&self.task);
        match self.pool.execute(move || {
            task.run();
        }) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to submit update tick: {}", err);
                self.task.updating.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Run a tick on the calling thread
    pub fn tick(&self) -> UpdateOutcome {
        if !self.task.try_begin() {
            return UpdateOutcome::Skipped;
        }
        self.task.run()
    }

    /// Whether a tick is in flight
    pub fn is_updating(&self) -> bool {
        self.task.updating.load(Ordering::Acquire)
    }

    /// Block until no tick is in flight
    pub fn wait_idle(&self) {
        while self.is_updating() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Ticks that advanced the simulation
    pub fn ticks(&self) -> u64 {
        self.task.ticks.load(Ordering::Acquire)
    }

    /// Counters of the last tick that advanced the simulation
    pub fn last_metrics(&self) -> Option<UpdateMetrics> {
        self.task.last_metrics.lock().clone()
    }
}

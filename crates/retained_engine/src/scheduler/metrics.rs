//! Performance counters

use std::time::Duration;

use crate::render::pass::DrawingPass;

/// Counters collected while rendering one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameMetrics {
    /// Wall time spent in the frame
    pub elapsed: Duration,
    /// Vertices submitted by renderables
    pub vertices: u64,
    /// Actors skipped because their culling volume missed the frustum
    pub culled: u64,
    /// Resources uploaded
    pub resources_initialized: u32,
    /// Resources released
    pub resources_released: u32,
    /// Slow resources left pending for a later frame
    pub resources_deferred: u32,
    /// Pick requests resolved by either pick pass
    pub pick_events: u32,
    /// Renderer-state stack depth when the frame started
    pub stack_depth_start: usize,
    /// Renderer-state stack depth when the frame ended
    pub stack_depth_end: usize,
    /// Checkpoints that found the stack unbalanced
    pub stack_leaks: u32,
    /// Device errors raised during the frame
    pub device_errors: u32,
    /// Layers actually repainted
    pub repainted: DrawingPass,
}

/// Counters collected by one update tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMetrics {
    /// Simulation time advanced
    pub delta: Duration,
    /// Updatables invoked
    pub invoked: usize,
    /// Disposal records purged by housekeeping
    pub purged: usize,
    /// Wall time spent in the tick
    pub elapsed: Duration,
}

/// Running totals over every rendered frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStatistics {
    /// Frames rendered to completion
    pub frames: u64,
    /// Frames abandoned after a failure
    pub failed_frames: u64,
    /// Total time spent in completed frames
    pub total_time: Duration,
    /// Slowest completed frame
    pub max_frame_time: Duration,
    /// Vertices over all frames
    pub vertices: u64,
    /// Culled actors over all frames
    pub culled: u64,
    /// Stack leaks over all frames
    pub stack_leaks: u64,
}

impl FrameStatistics {
    /// Fold a completed frame into the totals
    pub fn record(&mut self, frame: &FrameMetrics) {
        self.frames += 1;
        self.total_time += frame.elapsed;
        self.max_frame_time = self.max_frame_time.max(frame.elapsed);
        self.vertices += frame.vertices;
        self.culled += frame.culled;
        self.stack_leaks += u64::from(frame.stack_leaks);
    }

    /// Count an abandoned frame
    pub fn record_failure(&mut self, frame: &FrameMetrics) {
        self.failed_frames += 1;
        self.stack_leaks += u64::from(frame.stack_leaks);
    }

    /// Mean time of a completed frame
    pub fn average_frame_time(&self) -> Duration {
        match u32::try_from(self.frames) {
            Ok(0) => Duration::ZERO,
            Ok(frames) => self.total_time / frames,
            Err(_) => self.total_time.div_f64(self.frames as f64),
        }
    }
}

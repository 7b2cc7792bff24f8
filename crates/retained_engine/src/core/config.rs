//! # Unified Configuration System
//!
//! Immutable configuration handed to the schedulers at construction. It
//! covers the frame loop (target rate, sub-pass counts, upload budget,
//! pick buffer selection, device capability hints) and the decoupled
//! update loop (worker count, housekeeping interval).
//!
//! ## Example
//!
//! ```rust
//! use retained_engine::core::config::{FrameConfig, ToolkitConfig};
//!
//! let config = ToolkitConfig::default()
//!     .with_frame(FrameConfig::default().with_scene_passes(2).with_slow_upload_budget(4));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::render::device::DeviceCapabilities;
use crate::render::picking::PickBufferMode;

/// # Capability Hints
///
/// Lets a host switch off device features that discovery reported as
/// available, e.g. to work around a driver whose auxiliary buffers are
/// unreliable. Hints can only remove capabilities, never add them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityHints {
    /// Treat the device as having no auxiliary buffers
    pub disable_aux_buffers: bool,
    /// Treat the device as single buffered
    pub disable_double_buffer: bool,
    /// Ignore stereo support
    pub disable_stereo: bool,
    /// Ignore multisample support
    pub disable_multisample: bool,
}

impl CapabilityHints {
    /// Apply the hints to discovered capabilities
    pub fn apply(&self, mut caps: DeviceCapabilities) -> DeviceCapabilities {
        if self.disable_aux_buffers {
            caps.aux_buffers = 0;
        }
        if self.disable_double_buffer {
            caps.double_buffered = false;
        }
        if self.disable_stereo {
            caps.stereo = false;
        }
        if self.disable_multisample {
            caps.multisample = false;
        }
        caps
    }
}

/// # Frame Configuration
///
/// Settings for the render-thread frame scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target frame rate for the host loop
    pub target_fps: u32,
    /// Number of scene sub-passes (drawn back to front)
    pub scene_passes: u32,
    /// Number of interface sub-passes (drawn front to back)
    pub interface_passes: u32,
    /// Maximum number of slow resources uploaded per frame
    pub max_slow_initializations_per_frame: usize,
    /// Where the colour-identification pick pass renders
    pub pick_buffer: PickBufferMode,
    /// Device capability overrides
    pub hints: CapabilityHints,
    /// Whether the renderer-state stack is checked at every checkpoint
    pub check_state_stack: bool,
}

impl FrameConfig {
    /// Create the default frame configuration
    pub fn new() -> Self {
        Self {
            target_fps: 60,
            scene_passes: 1,
            interface_passes: 1,
            max_slow_initializations_per_frame: 1,
            pick_buffer: PickBufferMode::Auto,
            hints: CapabilityHints::default(),
            check_state_stack: true,
        }
    }

    /// Set the target frame rate
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Set the number of scene sub-passes
    pub fn with_scene_passes(mut self, passes: u32) -> Self {
        self.scene_passes = passes;
        self
    }

    /// Set the number of interface sub-passes
    pub fn with_interface_passes(mut self, passes: u32) -> Self {
        self.interface_passes = passes;
        self
    }

    /// Set the per-frame budget for slow resource uploads
    pub fn with_slow_upload_budget(mut self, budget: usize) -> Self {
        self.max_slow_initializations_per_frame = budget;
        self
    }

    /// Set the pick buffer mode
    pub fn with_pick_buffer(mut self, mode: PickBufferMode) -> Self {
        self.pick_buffer = mode;
        self
    }

    /// Set device capability hints
    pub fn with_hints(mut self, hints: CapabilityHints) -> Self {
        self.hints = hints;
        self
    }

    /// Frame period derived from the target frame rate
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target_fps must be at least 1".to_string()));
        }
        if self.scene_passes == 0 {
            return Err(ConfigError::Invalid("scene_passes must be at least 1".to_string()));
        }
        if self.interface_passes == 0 {
            return Err(ConfigError::Invalid("interface_passes must be at least 1".to_string()));
        }
        if self.max_slow_initializations_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "max_slow_initializations_per_frame must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Update Configuration
///
/// Settings for the decoupled simulation tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Size of the update worker pool
    pub workers: usize,
    /// Interval between registry housekeeping sweeps, in milliseconds of simulation time
    pub housekeeping_interval_ms: u64,
}

impl UpdateConfig {
    /// Create the default update configuration
    pub fn new() -> Self {
        Self {
            workers: 2,
            housekeeping_interval_ms: 1000,
        }
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Housekeeping interval as a [`Duration`]
    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.housekeeping_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("update workers must be at least 1".to_string()));
        }
        if self.housekeeping_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "housekeeping_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Toolkit Configuration
///
/// Top-level configuration that encompasses all scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Log level for the toolkit
    pub log_level: String,
    /// Frame scheduler configuration
    pub frame: FrameConfig,
    /// Update scheduler configuration
    pub update: UpdateConfig,
}

impl ToolkitConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            frame: FrameConfig::default(),
            update: UpdateConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the frame configuration
    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Set the update configuration
    pub fn with_update(mut self, update: UpdateConfig) -> Self {
        self.update = update;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.frame.validate()?;
        self.update.validate()?;
        Ok(())
    }
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for ToolkitConfig {}

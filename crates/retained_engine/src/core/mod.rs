//! # Core Module
//!
//! Shared configuration consumed by the schedulers and the stage.

pub mod config;

pub use config::{CapabilityHints, FrameConfig, ToolkitConfig, UpdateConfig};

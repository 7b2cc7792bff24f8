//! # Retained Engine
//!
//! Core of a retained-mode scene toolkit: the host builds a tree of actors
//! once and the toolkit redraws only what changed.
//!
//! ## Features
//!
//! - **Drawing passes**: scene, interface, overlay and picking layers as a
//!   bitmask, each with ordered sub-passes
//! - **Frame scheduling**: resource upload with a slow-upload budget,
//!   dirty-layer repaint, culling and renderer-state stack checks
//! - **Picking**: colour-identification and geometric picking per camera
//! - **Update scheduling**: simulation ticks decoupled from rendering
//! - **Object registry**: capability-indexed store with disposal leak
//!   tracking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retained_engine::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut stage = Stage::new(ToolkitConfig::default())?;
//!     let mut device = HeadlessDevice::new(640, 480);
//!
//!     stage.handle_input(&InputEvent::Resized { width: 640, height: 480 });
//!     stage.scene().add(Arc::new(BasicCamera::new("main", DrawingPass::VISUAL)))?;
//!     let shape = Arc::new(VertexShape::point(Point3::origin()));
//!     let ship = Actor::new("ship").with_renderable(shape);
//!     stage.scene().add_actor(&Arc::new(ship))?;
//!
//!     let mut frames = 0;
//!     stage.run(&mut device, || {
//!         frames += 1;
//!         frames <= 60
//!     });
//!     stage.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared settings
pub mod config;
pub mod core;

// Toolkit modules
pub mod foundation;
pub mod events;
pub mod render;
pub mod scene;
pub mod scheduler;

mod stage;

pub use stage::{Stage, StageError};

/// Common imports for toolkit users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{FrameConfig, ToolkitConfig, UpdateConfig},
        events::{EventSource, InputDispatcher, InputEvent, InputListener, PickEvent},
        foundation::{
            math::{Mat4, Point3, Transform, Vec3},
            time::{ManualClock, TimeSource},
        },
        render::{
            BasicCamera, BoundingSphere, Camera, Color, ColorPickCamera, DrawingPass,
            GraphicsDevice, HeadlessDevice, RayPickCamera, RenderContext, RenderError,
            RenderResult, Viewport,
        },
        scene::{
            Actor, Capability, Disposable, Initializable, ObjectRegistry, PickBehavior,
            Renderable, Scene, SceneObject, TransformNode, TransformSupport, Uninitializable,
            Updatable, VertexPick, VertexShape,
        },
        scheduler::{FrameScheduler, UpdateOutcome, UpdateScheduler},
        Stage, StageError,
    };
}

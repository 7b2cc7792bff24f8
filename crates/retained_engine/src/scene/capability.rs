//! Capabilities
//!
//! Every object the registry stores describes itself as a list of
//! [`Capability`] values. The registry indexes objects by
//! [`CapabilityKind`], so the schedulers can ask for "every initializable"
//! or "every visible camera" without knowing the concrete types involved.

use std::sync::Arc;
use std::time::Duration;

use crate::events::{InputListener, PickEvent};
use crate::render::camera::{Camera, ColorPickingCamera, PickingCamera};
use crate::render::context::RenderContext;
use crate::render::device::GraphicsDevice;
use crate::render::frustum::Frustum;
use crate::render::RenderResult;
use crate::scene::actor::Actor;

/// An object that can be stored in the registry
pub trait SceneObject: Send + Sync {
    /// Decompose the object into the capabilities it supports
    fn capabilities(self: Arc<Self>) -> Vec<Capability>;

    /// The object as an actor, if it is one
    fn as_actor(self: Arc<Self>) -> Option<Arc<Actor>> {
        None
    }

    /// Human readable name used in diagnostics
    fn label(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Something drawn in a geometry pass
pub trait Renderable: Send + Sync {
    /// Issue the draw calls
    fn draw(&self, ctx: &mut RenderContext<'_>) -> RenderResult;

    /// Called after `draw`, before the actor's children are visited
    fn end_draw(&self, _ctx: &mut RenderContext<'_>) -> RenderResult {
        Ok(())
    }

    /// Draw as wireframe
    fn is_wire(&self) -> bool {
        false
    }

    /// Line thickness in pixels
    fn thickness(&self) -> f32 {
        1.0
    }
}

/// Modelview transform applied around an actor and its children
pub trait TransformSupport: Send + Sync {
    /// Save device state and apply the transform
    fn push(&self, device: &mut dyn GraphicsDevice);

    /// Restore the state saved by `push`
    fn pop(&self, device: &mut dyn GraphicsDevice);
}

/// A device resource uploaded while its owner is visible
pub trait Initializable: Send + Sync {
    /// Whether the resource currently lives on the device
    fn is_initialized(&self) -> bool;

    /// Upload the resource
    fn initialize(&self, device: &mut dyn GraphicsDevice) -> RenderResult;

    /// Release the resource
    fn uninitialize(&self, device: &mut dyn GraphicsDevice) -> RenderResult;

    /// Slow uploads are rate limited per frame
    fn is_slow(&self) -> bool {
        false
    }
}

/// A device resource waiting to be released
pub trait Uninitializable: Send + Sync {
    /// Whether the resource still lives on the device
    fn is_initialized(&self) -> bool;

    /// Release the resource
    fn uninitialize(&self, device: &mut dyn GraphicsDevice) -> RenderResult;
}

/// Something that must be disposed explicitly once it leaves the scene
pub trait Disposable: Send + Sync {
    /// Whether `dispose` has run
    fn is_disposed(&self) -> bool;

    /// Free the underlying resources
    fn dispose(&self);
}

/// Simulation state advanced by the update scheduler
pub trait Updatable: Send + Sync {
    /// Advance by `delta` of elapsed time
    fn update(&self, delta: Duration);
}

/// How an actor answers pick requests
pub trait PickBehavior: Send + Sync {
    /// Distance to the hit if the actor lies inside `volume`
    fn pick(&self, event: &PickEvent, volume: &Frustum) -> Option<f32>;

    /// Notification that a colour pick selected this actor
    fn picked(&self, _event: &PickEvent) {}
}

/// Index key of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// [`Renderable`]
    Renderable,
    /// [`TransformSupport`]
    Transform,
    /// [`Initializable`]
    Initializable,
    /// [`Uninitializable`]
    Uninitializable,
    /// [`Disposable`]
    Disposable,
    /// [`Updatable`]
    Updatable,
    /// [`PickBehavior`]
    Pickable,
    /// [`Camera`]
    Camera,
    /// [`PickingCamera`]
    PickingCamera,
    /// [`ColorPickingCamera`]
    ColorPickingCamera,
    /// [`InputListener`]
    InputListener,
}

/// One facet of a scene object
#[derive(Clone)]
pub enum Capability {
    /// Drawn in geometry passes
    Renderable(Arc<dyn Renderable>),
    /// Applies a transform
    Transform(Arc<dyn TransformSupport>),
    /// Uploaded while visible
    Initializable(Arc<dyn Initializable>),
    /// Released on the next frame
    Uninitializable(Arc<dyn Uninitializable>),
    /// Tracked for leaks
    Disposable(Arc<dyn Disposable>),
    /// Ticked by the update scheduler
    Updatable(Arc<dyn Updatable>),
    /// Answers pick requests
    Pickable(Arc<dyn PickBehavior>),
    /// Renders layers
    Camera(Arc<dyn Camera>),
    /// Resolves geometric picks
    PickingCamera(Arc<dyn PickingCamera>),
    /// Resolves colour picks
    ColorPickingCamera(Arc<dyn ColorPickingCamera>),
    /// Receives input
    InputListener(Arc<dyn InputListener>),
}

impl Capability {
    /// Index key of this capability
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Renderable(_) => CapabilityKind::Renderable,
            Self::Transform(_) => CapabilityKind::Transform,
            Self::Initializable(_) => CapabilityKind::Initializable,
            Self::Uninitializable(_) => CapabilityKind::Uninitializable,
            Self::Disposable(_) => CapabilityKind::Disposable,
            Self::Updatable(_) => CapabilityKind::Updatable,
            Self::Pickable(_) => CapabilityKind::Pickable,
            Self::Camera(_) => CapabilityKind::Camera,
            Self::PickingCamera(_) => CapabilityKind::PickingCamera,
            Self::ColorPickingCamera(_) => CapabilityKind::ColorPickingCamera,
            Self::InputListener(_) => CapabilityKind::InputListener,
        }
    }

    /// Address of the object implementing the capability
    pub fn address(&self) -> usize {
        let pointer = match self {
            Self::Renderable(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Transform(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Initializable(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Uninitializable(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Disposable(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Updatable(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Pickable(c) => Arc::as_ptr(c).cast::<()>(),
            Self::Camera(c) => Arc::as_ptr(c).cast::<()>(),
            Self::PickingCamera(c) => Arc::as_ptr(c).cast::<()>(),
            Self::ColorPickingCamera(c) => Arc::as_ptr(c).cast::<()>(),
            Self::InputListener(c) => Arc::as_ptr(c).cast::<()>(),
        };
        pointer as usize
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@{:#x}", self.kind(), self.address())
    }
}

//! Actors
//!
//! An [`Actor`] is one item of the scene tree. It carries the attributes the
//! frame scheduler filters on (visibility, drawing pass, sub-pass number,
//! camera affinity, culling volume), optional behaviour (renderable,
//! transform, pick behaviour) and the support objects it owns exclusively,
//! such as device resources.
//!
//! A parent owns its children through its [`ChildList`]; each child keeps a
//! weak back-reference to its parent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::render::frustum::BoundingSphere;
use crate::render::pass::DrawingPass;
use crate::scene::capability::{Capability, PickBehavior, Renderable, SceneObject, TransformSupport};
use crate::scene::registry::RegistryError;

/// Observer of a child collection
///
/// The registry subscribes to the child list of every actor it holds so
/// that children added or removed later are registered or unregistered too.
pub trait ChildListener: Send + Sync {
    /// A child was appended; an error rolls the insertion back
    fn child_added(&self, parent: &Arc<Actor>, child: &Arc<Actor>) -> Result<(), RegistryError>;

    /// A child was detached
    fn child_removed(&self, parent: &Arc<Actor>, child: &Arc<Actor>);
}

/// Ordered children of an actor
#[derive(Default)]
pub struct ChildList {
    inherit: bool,
    children: Mutex<Vec<Arc<Actor>>>,
    listener: Mutex<Option<Weak<dyn ChildListener>>>,
}

impl ChildList {
    fn new(inherit: bool) -> Self {
        Self {
            inherit,
            ..Self::default()
        }
    }

    fn snapshot(&self) -> Vec<Arc<Actor>> {
        self.children.lock().clone()
    }

    fn listener(&self) -> Option<Arc<dyn ChildListener>> {
        self.listener.lock().as_ref().and_then(Weak::upgrade)
    }
}

/// One item of the scene tree
pub struct Actor {
    id: String,
    visible: AtomicBool,
    pass: DrawingPass,
    pass_number: u32,
    camera: Option<String>,
    culling: Mutex<Option<BoundingSphere>>,
    children: Option<ChildList>,
    parent: Mutex<Weak<Actor>>,
    renderable: Option<Arc<dyn Renderable>>,
    transform: Option<Arc<dyn TransformSupport>>,
    pick: Option<Arc<dyn PickBehavior>>,
    supports: Vec<Arc<dyn SceneObject>>,
}

impl Actor {
    /// Visible scene-layer actor without behaviour
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            visible: AtomicBool::new(true),
            pass: DrawingPass::SCENE,
            pass_number: 0,
            camera: None,
            culling: Mutex::new(None),
            children: None,
            parent: Mutex::new(Weak::new()),
            renderable: None,
            transform: None,
            pick: None,
            supports: Vec::new(),
        }
    }

    /// Set the drawing pass (builder pattern)
    pub fn with_pass(mut self, pass: DrawingPass) -> Self {
        self.pass = pass;
        self
    }

    /// Set the 0-based sub-pass index (builder pattern)
    pub fn with_pass_number(mut self, pass_number: u32) -> Self {
        self.pass_number = pass_number;
        self
    }

    /// Restrict the actor to the camera with this name (builder pattern)
    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    /// Set the initial visibility (builder pattern)
    pub fn with_visible(self, visible: bool) -> Self {
        self.visible.store(visible, Ordering::Relaxed);
        self
    }

    /// Set the world-space culling volume (builder pattern)
    pub fn with_culling(self, sphere: BoundingSphere) -> Self {
        *self.culling.lock() = Some(sphere);
        self
    }

    /// Give the actor a child collection (builder pattern)
    ///
    /// With `inherit` set, children are drawn in this actor's layer and
    /// sub-pass whatever their own assignment says.
    pub fn with_children(mut self, inherit: bool) -> Self {
        self.children = Some(ChildList::new(inherit));
        self
    }

    /// Attach a renderable (builder pattern)
    pub fn with_renderable(mut self, renderable: Arc<dyn Renderable>) -> Self {
        self.renderable = Some(renderable);
        self
    }

    /// Attach a transform (builder pattern)
    pub fn with_transform(mut self, transform: Arc<dyn TransformSupport>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Attach a pick behaviour (builder pattern)
    pub fn with_pick(mut self, pick: Arc<dyn PickBehavior>) -> Self {
        self.pick = Some(pick);
        self
    }

    /// Attach an exclusively owned support object (builder pattern)
    pub fn with_support(mut self, support: Arc<dyn SceneObject>) -> Self {
        self.supports.push(support);
        self
    }

    /// Unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the actor is drawn
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Change visibility; returns the previous value
    pub(crate) fn set_visible(&self, visible: bool) -> bool {
        self.visible.swap(visible, Ordering::AcqRel)
    }

    /// Layer(s) the actor is drawn in
    pub fn drawing_pass(&self) -> DrawingPass {
        self.pass
    }

    /// Sub-pass index within the layer
    pub fn pass_number(&self) -> u32 {
        self.pass_number
    }

    /// Name of the only camera allowed to draw this actor
    pub fn camera(&self) -> Option<&str> {
        self.camera.as_deref()
    }

    /// Whether a camera may draw or pick this actor
    pub fn accepts_camera(&self, camera: &str) -> bool {
        self.camera.as_deref().map_or(true, |name| name == camera)
    }

    /// World-space culling volume
    pub fn culling(&self) -> Option<BoundingSphere> {
        *self.culling.lock()
    }

    /// Replace the culling volume
    pub fn set_culling(&self, sphere: Option<BoundingSphere>) {
        *self.culling.lock() = sphere;
    }

    /// Renderable behaviour
    pub fn renderable(&self) -> Option<&Arc<dyn Renderable>> {
        self.renderable.as_ref()
    }

    /// Transform behaviour
    pub fn transform(&self) -> Option<&Arc<dyn TransformSupport>> {
        self.transform.as_ref()
    }

    /// Pick behaviour
    pub fn pick_behavior(&self) -> Option<&Arc<dyn PickBehavior>> {
        self.pick.as_ref()
    }

    /// Support objects owned by this actor
    pub fn supports(&self) -> &[Arc<dyn SceneObject>] {
        &self.supports
    }

    /// Whether the actor has a child collection
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    /// Whether children draw in this actor's layer and sub-pass
    pub fn inherits(&self) -> bool {
        self.children.as_ref().map_or(false, |children| children.inherit)
    }

    /// Current children in order
    pub fn children(&self) -> Vec<Arc<Actor>> {
        self.children.as_ref().map(ChildList::snapshot).unwrap_or_default()
    }

    /// Parent actor, while it is alive
    pub fn parent(&self) -> Option<Arc<Actor>> {
        self.parent.lock().upgrade()
    }

    pub(crate) fn set_child_listener(&self, listener: Option<Weak<dyn ChildListener>>) {
        if let Some(children) = &self.children {
            *children.listener.lock() = listener;
        }
    }

    /// Append a child
    ///
    /// Adding a child that is already present is a no-op. If the listening
    /// registry rejects the child, the insertion is rolled back.
    pub fn add_child(self: &Arc<Self>, child: Arc<Actor>) -> Result<(), RegistryError> {
        let children = self
            .children
            .as_ref()
            .ok_or_else(|| RegistryError::NoChildCollection(self.id.clone()))?;

        {
            let mut list = children.children.lock();
            if list.iter().any(|existing| Arc::ptr_eq(existing, &child)) {
                return Ok(());
            }
            list.push(Arc::clone(&child));
        }
        *child.parent.lock() = Arc::downgrade(self);

        if let Some(listener) = children.listener() {
            if let Err(err) = listener.child_added(self, &child) {
                children.children.lock().retain(|existing| !Arc::ptr_eq(existing, &child));
                *child.parent.lock() = Weak::new();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Detach a child; returns false if it was not a child of this actor
    pub fn remove_child(self: &Arc<Self>, child: &Arc<Actor>) -> bool {
        let Some(children) = &self.children else {
            return false;
        };

        {
            let mut list = children.children.lock();
            let before = list.len();
            list.retain(|existing| !Arc::ptr_eq(existing, child));
            if list.len() == before {
                return false;
            }
        }
        *child.parent.lock() = Weak::new();

        if let Some(listener) = children.listener() {
            listener.child_removed(self, child);
        }
        true
    }
}

impl SceneObject for Actor {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        let mut capabilities = Vec::new();
        if let Some(renderable) = &self.renderable {
            capabilities.push(Capability::Renderable(Arc::clone(renderable)));
        }
        if let Some(transform) = &self.transform {
            capabilities.push(Capability::Transform(Arc::clone(transform)));
        }
        if let Some(pick) = &self.pick {
            capabilities.push(Capability::Pickable(Arc::clone(pick)));
        }
        capabilities
    }

    fn as_actor(self: Arc<Self>) -> Option<Arc<Actor>> {
        Some(self)
    }

    fn label(&self) -> String {
        format!("actor '{}'", self.id)
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("visible", &self.is_visible())
            .field("pass", &self.pass)
            .field("pass_number", &self.pass_number)
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}

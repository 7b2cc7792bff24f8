//! Scene
//!
//! The scene ties the registry to the per-scene state the frame scheduler
//! reads: the accumulated repaint mask, the viewport every camera shares,
//! the background colour and an optional world boundary.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::render::camera::Viewport;
use crate::render::frustum::BoundingSphere;
use crate::render::pass::DrawingPass;
use crate::render::Color;
use crate::scene::actor::Actor;
use crate::scene::capability::{Capability, SceneObject};
use crate::scene::registry::{ObjectRegistry, RegistryError, RegistryListener};
use crate::scheduler::repaint::RepaintMask;

/// Pushes the scene viewport to every camera as it is registered
struct CameraViewportSync {
    viewport: Arc<Mutex<Viewport>>,
}

impl RegistryListener for CameraViewportSync {
    fn object_added(&self, _object: &Arc<dyn SceneObject>, capabilities: &[Capability]) {
        let viewport = *self.viewport.lock();
        for capability in capabilities {
            if let Capability::Camera(camera) = capability {
                camera.set_viewport(viewport);
            }
        }
    }
}

/// Marks the layers touched by every membership change, including children
/// attached or detached after their parent was registered
struct RepaintOnMembership {
    repaint: Arc<RepaintMask>,
}

impl RepaintOnMembership {
    fn affected_layers(object: &Arc<dyn SceneObject>, capabilities: &[Capability]) -> DrawingPass {
        if let Some(actor) = Arc::clone(object).as_actor() {
            return if actor.is_visible() { actor.drawing_pass() } else { DrawingPass::empty() };
        }
        capabilities
            .iter()
            .filter_map(|capability| match capability {
                Capability::Camera(camera) => Some(camera.drawing_pass()),
                _ => None,
            })
            .fold(DrawingPass::empty(), |mask, pass| mask | pass)
    }
}

impl RegistryListener for RepaintOnMembership {
    fn object_added(&self, object: &Arc<dyn SceneObject>, capabilities: &[Capability]) {
        self.repaint.request(Self::affected_layers(object, capabilities));
    }

    fn object_removed(&self, object: &Arc<dyn SceneObject>) {
        let capabilities = Arc::clone(object).capabilities();
        self.repaint.request(Self::affected_layers(object, &capabilities));
    }
}

/// A registry plus the state shared by everything drawn in it
pub struct Scene {
    registry: ObjectRegistry,
    repaint: Arc<RepaintMask>,
    viewport: Arc<Mutex<Viewport>>,
    background: Mutex<Color>,
    boundary: Mutex<Option<BoundingSphere>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(ObjectRegistry::new())
    }
}

impl Scene {
    /// Scene over an existing registry
    pub fn new(registry: ObjectRegistry) -> Self {
        let viewport = Arc::new(Mutex::new(Viewport::default()));
        let repaint = Arc::new(RepaintMask::new());
        registry.subscribe(Arc::new(CameraViewportSync {
            viewport: Arc::clone(&viewport),
        }));
        registry.subscribe(Arc::new(RepaintOnMembership {
            repaint: Arc::clone(&repaint),
        }));

        Self {
            registry,
            repaint,
            viewport,
            background: Mutex::new(Color::BLACK),
            boundary: Mutex::new(None),
        }
    }

    /// The scene's registry
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Register an object; its layers are marked for repaint
    pub fn add(&self, object: Arc<dyn SceneObject>) -> Result<bool, RegistryError> {
        self.registry.add(object)
    }

    /// Register an actor and its supports and children
    pub fn add_actor(&self, actor: &Arc<Actor>) -> Result<bool, RegistryError> {
        self.registry.add_actor(actor)
    }

    /// Unregister an object; the layers it covered are marked for repaint
    pub fn remove(&self, object: &Arc<dyn SceneObject>) -> bool {
        self.registry.remove(object)
    }

    /// Unregister an actor together with its supports and children
    pub fn remove_actor(&self, actor: &Arc<Actor>) -> bool {
        self.registry.remove_actor(actor)
    }

    /// Show or hide an actor, repainting its layer on change
    pub fn set_visible(&self, actor: &Arc<Actor>, visible: bool) {
        if self.registry.set_visible(actor, visible) != visible {
            self.request_repaint(actor.drawing_pass());
        }
    }

    /// Current viewport
    pub fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    /// Resize: every camera gets the new viewport and everything repaints
    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock() = viewport;
        for camera in self.registry.cameras() {
            camera.capability.set_viewport(viewport);
        }
        self.request_repaint(DrawingPass::all());
    }

    /// Background colour
    pub fn background(&self) -> Color {
        *self.background.lock()
    }

    /// Change the background colour
    pub fn set_background(&self, color: Color) {
        *self.background.lock() = color;
        self.request_repaint(DrawingPass::SCENE);
    }

    /// World boundary, if any
    pub fn boundary(&self) -> Option<BoundingSphere> {
        *self.boundary.lock()
    }

    /// Change the world boundary
    pub fn set_boundary(&self, boundary: Option<BoundingSphere>) {
        *self.boundary.lock() = boundary;
    }

    /// Mark layers for repaint on the next frame
    pub fn request_repaint(&self, pass: DrawingPass) {
        self.repaint.request(pass);
    }

    /// Layers marked for repaint so far
    pub fn pending_repaint(&self) -> DrawingPass {
        self.repaint.peek()
    }

    /// Read and clear the repaint mask
    pub(crate) fn take_repaint(&self) -> DrawingPass {
        self.repaint.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::{BasicCamera, Camera};

    #[test]
    fn test_camera_viewport_follows_scene() {
        let scene = Scene::default();
        scene.set_viewport(Viewport::sized(640, 480));

        let camera = Arc::new(BasicCamera::new("main", DrawingPass::SCENE));
        scene.add(camera.clone()).unwrap();
        assert_eq!(camera.viewport(), Viewport::sized(640, 480));

        scene.set_viewport(Viewport::sized(800, 600));
        assert_eq!(camera.viewport(), Viewport::sized(800, 600));
        assert_eq!(scene.pending_repaint(), DrawingPass::all());
    }

    #[test]
    fn test_membership_changes_request_repaint() {
        let scene = Scene::default();
        let actor = Arc::new(Actor::new("hud").with_pass(DrawingPass::INTERFACE));

        scene.add_actor(&actor).unwrap();
        assert_eq!(scene.take_repaint(), DrawingPass::INTERFACE);

        scene.set_visible(&actor, true);
        assert!(scene.take_repaint().is_empty());

        scene.set_visible(&actor, false);
        assert_eq!(scene.take_repaint(), DrawingPass::INTERFACE);

        scene.remove_actor(&actor);
        assert!(scene.take_repaint().is_empty());
    }

    #[test]
    fn test_runtime_children_request_repaint() {
        let scene = Scene::default();
        let panel =
            Arc::new(Actor::new("panel").with_pass(DrawingPass::SCENE).with_children(false));
        scene.add_actor(&panel).unwrap();
        scene.take_repaint();

        let label = Arc::new(Actor::new("label").with_pass(DrawingPass::OVERLAY));
        panel.add_child(label.clone()).unwrap();
        assert_eq!(scene.take_repaint(), DrawingPass::OVERLAY);

        assert!(panel.remove_child(&label));
        assert_eq!(scene.take_repaint(), DrawingPass::OVERLAY);
    }
}

//! Cameras
//!
//! A camera is a view onto the scene for one or more drawing passes. The
//! frame scheduler asks each visible camera to set up its projection, then
//! draws the actors of the matching layer through it. Picking cameras also
//! carry a queue of pick requests that the scheduler resolves each frame.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::PickEvent;
use crate::foundation::math::Mat4;
use crate::render::device::GraphicsDevice;
use crate::render::frustum::Frustum;
use crate::render::pass::DrawingPass;
use crate::render::picking::{ColorPickResult, PickHit};
use crate::render::RenderResult;
use crate::scene::{Capability, SceneObject};

/// Viewport rectangle in device pixels (origin bottom-left)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport anchored at the origin
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Width over height (1.0 for a degenerate viewport)
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Whether a pixel lies inside the viewport
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let (left, bottom) = (i64::from(self.x), i64::from(self.y));
        x >= left
            && y >= bottom
            && x < left + i64::from(self.width)
            && y < bottom + i64::from(self.height)
    }
}

/// A view used to render one or more drawing passes
pub trait Camera: Send + Sync {
    /// Name actors use to declare an affinity to this camera
    fn name(&self) -> &str;

    /// Current viewport
    fn viewport(&self) -> Viewport;

    /// Replace the viewport (pushed by the scene)
    fn set_viewport(&self, viewport: Viewport);

    /// Whether the camera takes part in rendering
    fn is_visible(&self) -> bool;

    /// Layers this camera renders
    fn drawing_pass(&self) -> DrawingPass;

    /// World-space volume the camera can see
    fn frustum(&self) -> Frustum;

    /// Set viewport and projection on the device
    fn begin_projection(&self, device: &mut dyn GraphicsDevice) -> RenderResult;

    /// Undo anything `begin_projection` left on the device
    fn end_projection(&self, _device: &mut dyn GraphicsDevice) -> RenderResult {
        Ok(())
    }
}

/// Camera resolving picks geometrically, by testing actors against a volume
pub trait PickingCamera: Camera {
    /// Take every pending pick request
    fn drain_events(&self) -> Vec<PickEvent>;

    /// World-space volume covered by a pick request
    fn pick_volume(&self, event: &PickEvent) -> Frustum;

    /// Receive the hits for a request, nearest first
    fn deliver(&self, event: &PickEvent, hits: &[PickHit]);
}

/// Camera resolving picks by colour identification
pub trait ColorPickingCamera: Camera {
    /// Whether any pick request is waiting
    fn has_pending_events(&self) -> bool;

    /// Take every pending pick request
    fn drain_events(&self) -> Vec<PickEvent>;

    /// Receive the resolution of one request
    fn deliver(&self, result: ColorPickResult);
}

/// Thread-safe FIFO of pick requests
#[derive(Debug, Default)]
pub struct PickQueue {
    events: Mutex<VecDeque<PickEvent>>,
}

impl PickQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a request
    pub fn push(&self, event: PickEvent) {
        self.events.lock().push_back(event);
    }

    /// Take every pending request in arrival order
    pub fn drain(&self) -> Vec<PickEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Whether no request is waiting
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Number of waiting requests
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

/// Matrix narrowing a projection to a pick rectangle
///
/// Maps the rectangle centred on the event to the whole clip volume, so
/// `pick_matrix * projection * view` yields the pick frustum.
pub fn pick_matrix(event: &PickEvent, viewport: Viewport) -> Mat4 {
    let width = viewport.width.max(1) as f32;
    let height = viewport.height.max(1) as f32;
    let scale_x = width / event.width;
    let scale_y = height / event.height;
    let offset_x = (width - 2.0 * (event.x - viewport.x as f32)) / event.width;
    let offset_y = (height - 2.0 * (event.y - viewport.y as f32)) / event.height;

    #[rustfmt::skip]
    let matrix = Mat4::new(
        scale_x, 0.0,     0.0, offset_x,
        0.0,     scale_y, 0.0, offset_y,
        0.0,     0.0,     1.0, 0.0,
        0.0,     0.0,     0.0, 1.0,
    );
    matrix
}

/// Camera with explicit projection and view matrices
pub struct BasicCamera {
    name: String,
    pass: DrawingPass,
    visible: AtomicBool,
    viewport: Mutex<Viewport>,
    projection: Mutex<Mat4>,
    view: Mutex<Mat4>,
}

impl BasicCamera {
    /// Camera with identity projection and view
    pub fn new(name: impl Into<String>, pass: DrawingPass) -> Self {
        Self {
            name: name.into(),
            pass,
            visible: AtomicBool::new(true),
            viewport: Mutex::new(Viewport::default()),
            projection: Mutex::new(Mat4::identity()),
            view: Mutex::new(Mat4::identity()),
        }
    }

    /// Set the projection matrix (builder pattern)
    pub fn with_projection(self, projection: Mat4) -> Self {
        *self.projection.lock() = projection;
        self
    }

    /// Set the view matrix (builder pattern)
    pub fn with_view(self, view: Mat4) -> Self {
        *self.view.lock() = view;
        self
    }

    /// Replace the projection matrix
    pub fn set_projection(&self, projection: Mat4) {
        *self.projection.lock() = projection;
    }

    /// Replace the view matrix
    pub fn set_view(&self, view: Mat4) {
        *self.view.lock() = view;
    }

    /// Show or hide the camera
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Combined projection and view
    pub fn view_projection(&self) -> Mat4 {
        *self.projection.lock() * *self.view.lock()
    }
}

impl Camera for BasicCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock() = viewport;
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn drawing_pass(&self) -> DrawingPass {
        self.pass
    }

    fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.view_projection())
    }

    fn begin_projection(&self, device: &mut dyn GraphicsDevice) -> RenderResult {
        device.set_viewport(self.viewport());
        device.set_projection(&self.projection.lock());
        device.multiply_matrix(&self.view.lock());
        Ok(())
    }
}

impl SceneObject for BasicCamera {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Camera(self)]
    }

    fn label(&self) -> String {
        format!("camera '{}'", self.name)
    }
}

macro_rules! delegate_camera {
    ($camera:ty) => {
        impl Camera for $camera {
            fn name(&self) -> &str {
                self.camera.name()
            }

            fn viewport(&self) -> Viewport {
                self.camera.viewport()
            }

            fn set_viewport(&self, viewport: Viewport) {
                self.camera.set_viewport(viewport);
            }

            fn is_visible(&self) -> bool {
                self.camera.is_visible()
            }

            fn drawing_pass(&self) -> DrawingPass {
                self.camera.drawing_pass()
            }

            fn frustum(&self) -> Frustum {
                self.camera.frustum()
            }

            fn begin_projection(&self, device: &mut dyn GraphicsDevice) -> RenderResult {
                self.camera.begin_projection(device)
            }
        }
    };
}

/// Camera that resolves pick requests against a narrowed frustum
pub struct RayPickCamera {
    camera: BasicCamera,
    queue: PickQueue,
    results: Mutex<Vec<(PickEvent, Vec<PickHit>)>>,
}

impl RayPickCamera {
    /// Wrap a camera
    pub fn new(camera: BasicCamera) -> Self {
        Self {
            camera,
            queue: PickQueue::new(),
            results: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped camera
    pub fn camera(&self) -> &BasicCamera {
        &self.camera
    }

    /// Queue a pick request for the next frame
    pub fn post(&self, event: PickEvent) {
        self.queue.push(event);
    }

    /// Take the results delivered so far
    pub fn take_results(&self) -> Vec<(PickEvent, Vec<PickHit>)> {
        std::mem::take(&mut *self.results.lock())
    }
}

delegate_camera!(RayPickCamera);

impl PickingCamera for RayPickCamera {
    fn drain_events(&self) -> Vec<PickEvent> {
        self.queue.drain()
    }

    fn pick_volume(&self, event: &PickEvent) -> Frustum {
        let narrowed = pick_matrix(event, self.viewport()) * self.camera.view_projection();
        Frustum::from_matrix(&narrowed)
    }

    fn deliver(&self, event: &PickEvent, hits: &[PickHit]) {
        log::debug!("Camera '{}' picked {} actor(s)", self.name(), hits.len());
        self.results.lock().push((*event, hits.to_vec()));
    }
}

impl SceneObject for RayPickCamera {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Camera(self.clone()), Capability::PickingCamera(self)]
    }

    fn label(&self) -> String {
        format!("ray pick camera '{}'", self.name())
    }
}

/// Camera that resolves pick requests by colour identification
pub struct ColorPickCamera {
    camera: BasicCamera,
    queue: PickQueue,
    results: Mutex<Vec<ColorPickResult>>,
}

impl ColorPickCamera {
    /// Wrap a camera
    pub fn new(camera: BasicCamera) -> Self {
        Self {
            camera,
            queue: PickQueue::new(),
            results: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped camera
    pub fn camera(&self) -> &BasicCamera {
        &self.camera
    }

    /// Queue a pick request for the next frame
    pub fn post(&self, event: PickEvent) {
        self.queue.push(event);
    }

    /// Take the results delivered so far
    pub fn take_results(&self) -> Vec<ColorPickResult> {
        std::mem::take(&mut *self.results.lock())
    }
}

delegate_camera!(ColorPickCamera);

impl ColorPickingCamera for ColorPickCamera {
    fn has_pending_events(&self) -> bool {
        !self.queue.is_empty()
    }

    fn drain_events(&self) -> Vec<PickEvent> {
        self.queue.drain()
    }

    fn deliver(&self, result: ColorPickResult) {
        self.results.lock().push(result);
    }
}

impl SceneObject for ColorPickCamera {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Camera(self.clone()), Capability::ColorPickingCamera(self)]
    }

    fn label(&self) -> String {
        format!("colour pick camera '{}'", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_pick_matrix_centres_event() {
        let viewport = Viewport::sized(100, 100);
        let event = PickEvent::area(75.0, 25.0, 10.0, 10.0);
        let camera = RayPickCamera::new(BasicCamera::new("main", DrawingPass::SCENE));
        camera.set_viewport(viewport);

        let volume = camera.pick_volume(&event);

        // NDC point under (75, 25) in a 100x100 viewport is (0.5, -0.5)
        assert!(volume.contains_point(Vec3::new(0.5, -0.5, 0.0)));
        assert!(volume.contains_point(Vec3::new(0.54, -0.46, 0.0)));
        assert!(!volume.contains_point(Vec3::new(0.0, 0.0, 0.0)));
        assert!(!volume.contains_point(Vec3::new(0.5, -0.35, 0.0)));
    }

    #[test]
    fn test_queue_drains_in_order() {
        let camera = ColorPickCamera::new(BasicCamera::new("picker", DrawingPass::SCENE_PICKING));
        camera.post(PickEvent::point(1.0, 1.0));
        camera.post(PickEvent::point(2.0, 2.0));

        assert!(camera.has_pending_events());
        let events = ColorPickingCamera::drain_events(&camera);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].x, 1.0);
        assert!(!camera.has_pending_events());
    }

    #[test]
    fn test_viewport_contains() {
        let viewport = Viewport::new(10, 10, 5, 5);
        assert!(viewport.contains(10, 14));
        assert!(!viewport.contains(15, 10));
        assert!(!viewport.contains(9, 12));
    }
}

//! Ready-made supports
//!
//! Small building blocks most scenes need: a transform node and a shape
//! drawn from a fixed vertex list.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::foundation::math::{Point3, Transform};
use crate::render::context::RenderContext;
use crate::render::device::{GraphicsDevice, Primitive};
use crate::render::frustum::Frustum;
use crate::render::{Color, RenderResult};
use crate::events::PickEvent;
use crate::scene::capability::{Capability, PickBehavior, Renderable, SceneObject, TransformSupport};

/// Transform applied around an actor and its children
#[derive(Debug, Default)]
pub struct TransformNode {
    transform: Mutex<Transform>,
}

impl TransformNode {
    /// Node applying `transform`
    pub fn new(transform: Transform) -> Self {
        Self {
            transform: Mutex::new(transform),
        }
    }

    /// Current transform
    pub fn transform(&self) -> Transform {
        *self.transform.lock()
    }

    /// Replace the transform
    pub fn set_transform(&self, transform: Transform) {
        *self.transform.lock() = transform;
    }
}

impl TransformSupport for TransformNode {
    fn push(&self, device: &mut dyn GraphicsDevice) {
        device.push_state();
        device.multiply_matrix(&self.transform().to_matrix());
    }

    fn pop(&self, device: &mut dyn GraphicsDevice) {
        device.pop_state();
    }
}

impl SceneObject for TransformNode {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Transform(self)]
    }
}

/// Shape drawn from a fixed list of vertices in one colour
#[derive(Debug, Clone)]
pub struct VertexShape {
    primitive: Primitive,
    vertices: Vec<Point3>,
    color: Color,
    wire: bool,
    thickness: f32,
}

impl VertexShape {
    /// Shape from a primitive topology and its vertices
    pub fn new(primitive: Primitive, vertices: Vec<Point3>) -> Self {
        Self {
            primitive,
            vertices,
            color: Color::WHITE,
            wire: false,
            thickness: 1.0,
        }
    }

    /// A single point
    pub fn point(position: Point3) -> Self {
        Self::new(Primitive::Points, vec![position])
    }

    /// Set the colour (builder pattern)
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Draw as wireframe with the given line thickness (builder pattern)
    pub fn with_wire(mut self, thickness: f32) -> Self {
        self.wire = true;
        self.thickness = thickness;
        self
    }

    /// Vertices in model space
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }
}

impl Renderable for VertexShape {
    fn draw(&self, ctx: &mut RenderContext<'_>) -> RenderResult {
        ctx.set_color(self.color);
        ctx.draw(self.primitive, &self.vertices);
        Ok(())
    }

    fn is_wire(&self) -> bool {
        self.wire
    }

    fn thickness(&self) -> f32 {
        self.thickness
    }
}

/// Pick behaviour hitting when any vertex of a shape lies in the pick volume
///
/// Vertices are tested in world space; the reported distance is the
/// smallest distance of a hit vertex from the volume's near plane.
#[derive(Debug, Clone)]
pub struct VertexPick {
    vertices: Vec<Point3>,
}

impl VertexPick {
    /// Pick behaviour for these world-space vertices
    pub fn new(vertices: Vec<Point3>) -> Self {
        Self { vertices }
    }

    /// Pick behaviour matching a shape placed at the origin
    pub fn for_shape(shape: &VertexShape) -> Self {
        Self::new(shape.vertices().to_vec())
    }
}

impl PickBehavior for VertexPick {
    fn pick(&self, _event: &PickEvent, volume: &Frustum) -> Option<f32> {
        // Plane order is left, right, bottom, top, near, far
        let near = volume.planes[4];
        self.vertices
            .iter()
            .map(|vertex| vertex.coords)
            .filter(|vertex| volume.contains_point(*vertex))
            .map(|vertex| near.distance_to_point(vertex))
            .min_by(f32::total_cmp)
    }
}

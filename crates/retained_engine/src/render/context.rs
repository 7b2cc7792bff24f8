//! Render context handed to renderables

use crate::foundation::math::Point3;
use crate::render::device::{GraphicsDevice, Primitive};
use crate::render::pass::DrawingPass;
use crate::render::Color;

/// What a renderable sees while it draws
///
/// Wraps the device for the duration of one pass. During the
/// colour-identification pass the context pins the drawing colour to the
/// actor's id colour, so renderables draw their usual geometry and
/// [`set_color`](RenderContext::set_color) calls are ignored.
pub struct RenderContext<'a> {
    device: &'a mut dyn GraphicsDevice,
    layer: DrawingPass,
    sub_pass: u32,
    pick_color: Option<Color>,
    vertices: u64,
}

impl<'a> RenderContext<'a> {
    /// Context for a geometry pass
    pub fn new(device: &'a mut dyn GraphicsDevice, layer: DrawingPass, sub_pass: u32) -> Self {
        Self {
            device,
            layer,
            sub_pass,
            pick_color: None,
            vertices: 0,
        }
    }

    /// Context for the colour-identification pass
    pub fn for_picking(device: &'a mut dyn GraphicsDevice) -> Self {
        Self {
            device,
            layer: DrawingPass::PICKING,
            sub_pass: 0,
            pick_color: None,
            vertices: 0,
        }
    }

    /// The underlying device
    pub fn device(&mut self) -> &mut (dyn GraphicsDevice + 'a) {
        &mut *self.device
    }

    /// Layer being drawn
    pub fn layer(&self) -> DrawingPass {
        self.layer
    }

    /// Sub-pass index being drawn
    pub fn sub_pass(&self) -> u32 {
        self.sub_pass
    }

    /// Whether this is the colour-identification pass
    pub fn is_picking(&self) -> bool {
        self.layer == DrawingPass::PICKING
    }

    /// Pin the drawing colour to an identification colour
    pub(crate) fn pin_pick_color(&mut self, color: Color) {
        self.pick_color = Some(color);
        self.device.set_color(color);
    }

    /// Set the drawing colour (ignored while picking)
    pub fn set_color(&mut self, color: Color) {
        if self.pick_color.is_none() {
            self.device.set_color(color);
        }
    }

    /// Submit geometry and count its vertices
    pub fn draw(&mut self, primitive: Primitive, vertices: &[Point3]) {
        self.vertices += vertices.len() as u64;
        self.device.draw(primitive, vertices);
    }

    /// Vertices submitted through this context
    pub fn vertices(&self) -> u64 {
        self.vertices
    }
}

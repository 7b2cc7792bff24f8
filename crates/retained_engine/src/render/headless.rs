//! Headless graphics device
//!
//! A [`GraphicsDevice`] without a GPU. Vertices are transformed by the
//! current projection and modelview and plotted as single pixels into
//! per-target buffers, which is enough for colour-identification picking
//! and for asserting what was drawn where. Used by the test suite and by
//! hosts that run the scene without a window.

use std::collections::HashMap;

use crate::foundation::math::{Mat4, Point3};
use crate::render::camera::Viewport;
use crate::render::device::{DeviceCapabilities, DrawTarget, GraphicsDevice, Primitive};
use crate::render::Color;

#[derive(Debug, Clone, Copy)]
struct SavedState {
    modelview: Mat4,
    color: Color,
    wire: bool,
    thickness: f32,
}

#[derive(Debug, Default)]
struct PixelBuffer {
    clear: [u8; 3],
    pixels: HashMap<(u32, u32), [u8; 3]>,
}

/// Software device recording what the scheduler asks of it
#[derive(Debug)]
pub struct HeadlessDevice {
    capabilities: DeviceCapabilities,
    width: u32,
    height: u32,
    stack: Vec<SavedState>,
    modelview: Mat4,
    projection: Mat4,
    viewport: Viewport,
    target: DrawTarget,
    color: Color,
    wire: bool,
    thickness: f32,
    buffers: HashMap<DrawTarget, PixelBuffer>,
    vertices: u64,
    draw_calls: u64,
    swaps: u64,
    pending_errors: u32,
    targets_used: Vec<DrawTarget>,
}

impl HeadlessDevice {
    /// Double-buffered device with a surface of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_capabilities(width, height, DeviceCapabilities::default())
    }

    /// Device reporting the given capabilities
    pub fn with_capabilities(width: u32, height: u32, capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            width,
            height,
            stack: Vec::new(),
            modelview: Mat4::identity(),
            projection: Mat4::identity(),
            viewport: Viewport::sized(width, height),
            target: capabilities.default_draw_target(),
            color: Color::WHITE,
            wire: false,
            thickness: 1.0,
            buffers: HashMap::new(),
            vertices: 0,
            draw_calls: 0,
            swaps: 0,
            pending_errors: 0,
            targets_used: Vec::new(),
        }
    }

    /// Surface size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Vertices submitted over the device's lifetime
    pub fn submitted_vertices(&self) -> u64 {
        self.vertices
    }

    /// Draw calls over the device's lifetime
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Number of presented frames
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Every target drawing was directed to, in order, without repeats
    pub fn targets_used(&self) -> &[DrawTarget] {
        &self.targets_used
    }

    /// Current wireframe flag and line thickness
    pub fn line_style(&self) -> (bool, f32) {
        (self.wire, self.thickness)
    }

    /// Raise a device error, reported by the next `take_error_count`
    pub fn inject_error(&mut self) {
        self.pending_errors += 1;
    }

    /// Pixel of any target without changing the current one
    pub fn pixel(&self, target: DrawTarget, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let rgb = self
            .buffers
            .get(&target)
            .map_or([0, 0, 0], |buffer| {
                buffer.pixels.get(&(x, y)).copied().unwrap_or(buffer.clear)
            });
        Some(Color::from_rgb8(rgb))
    }

    fn plot(&mut self, point: &Point3) {
        let clip = self.projection * self.modelview * point.to_homogeneous();
        if clip.w.abs() <= f32::EPSILON {
            return;
        }
        let ndc = clip.xyz() / clip.w;
        if ndc.iter().any(|component| component.abs() > 1.0) {
            return;
        }

        let x = self.viewport.x as f32 + (ndc.x + 1.0) * 0.5 * self.viewport.width as f32;
        let y = self.viewport.y as f32 + (ndc.y + 1.0) * 0.5 * self.viewport.height as f32;
        if x < 0.0 || y < 0.0 {
            return;
        }
        if self.width == 0 || self.height == 0 {
            return;
        }
        // An NDC coordinate of exactly 1.0 lands on the last pixel
        let px = (x.floor() as u32).min(self.width - 1);
        let py = (y.floor() as u32).min(self.height - 1);

        let rgb = self.color.to_rgb8();
        self.buffers.entry(self.target).or_default().pixels.insert((px, py), rgb);
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn state_depth(&self) -> usize {
        self.stack.len()
    }

    fn push_state(&mut self) {
        self.stack.push(SavedState {
            modelview: self.modelview,
            color: self.color,
            wire: self.wire,
            thickness: self.thickness,
        });
    }

    fn pop_state(&mut self) -> bool {
        match self.stack.pop() {
            Some(state) => {
                self.modelview = state.modelview;
                self.color = state.color;
                self.wire = state.wire;
                self.thickness = state.thickness;
                true
            }
            None => {
                self.pending_errors += 1;
                false
            }
        }
    }

    fn load_identity(&mut self) {
        self.modelview = Mat4::identity();
    }

    fn multiply_matrix(&mut self, matrix: &Mat4) {
        self.modelview *= matrix;
    }

    fn set_projection(&mut self, matrix: &Mat4) {
        self.projection = *matrix;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn set_draw_target(&mut self, target: DrawTarget) {
        let available = match target {
            DrawTarget::Front | DrawTarget::Texture => true,
            DrawTarget::Back => self.capabilities.double_buffered,
            DrawTarget::Auxiliary(index) => index < self.capabilities.aux_buffers,
        };
        if !available {
            log::warn!("Headless device has no {:?} buffer", target);
            self.pending_errors += 1;
            return;
        }
        self.target = target;
    }

    fn draw_target(&self) -> DrawTarget {
        self.target
    }

    fn clear(&mut self, color: Color) {
        let buffer = self.buffers.entry(self.target).or_default();
        buffer.clear = color.to_rgb8();
        buffer.pixels.clear();
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    fn set_line_style(&mut self, wire: bool, thickness: f32) {
        self.wire = wire;
        self.thickness = thickness;
    }

    fn draw(&mut self, _primitive: Primitive, vertices: &[Point3]) {
        self.draw_calls += 1;
        self.vertices += vertices.len() as u64;
        if !self.targets_used.contains(&self.target) {
            self.targets_used.push(self.target);
        }
        for vertex in vertices {
            self.plot(vertex);
        }
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> Option<Color> {
        self.pixel(self.target, x, y)
    }

    fn take_error_count(&mut self) -> u32 {
        std::mem::take(&mut self.pending_errors)
    }

    fn swap_buffers(&mut self) {
        self.swaps += 1;
        if self.capabilities.double_buffered {
            if let Some(back) = self.buffers.remove(&DrawTarget::Back) {
                self.buffers.insert(DrawTarget::Front, back);
            }
        }
    }
}

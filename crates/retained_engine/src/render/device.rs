//! Graphics device abstraction
//!
//! The scheduler never talks to a graphics API directly. It drives a
//! [`GraphicsDevice`], which owns the context, its renderer-state stack and
//! its buffers. A device is bound to the thread that created its context;
//! every call below must be issued from that thread.

use crate::foundation::math::{Mat4, Point3};
use crate::render::camera::Viewport;
use crate::render::Color;

/// Device features discovered at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Whether a back buffer is available
    pub double_buffered: bool,
    /// Number of auxiliary colour buffers
    pub aux_buffers: u32,
    /// Whether stereo (quad-buffer) rendering is available
    pub stereo: bool,
    /// Whether multisampling is available
    pub multisample: bool,
}

impl DeviceCapabilities {
    /// Capabilities of a bare single-buffered context
    pub const MINIMAL: Self = Self {
        double_buffered: false,
        aux_buffers: 0,
        stereo: false,
        multisample: false,
    };

    /// Whether at least one auxiliary buffer exists
    pub const fn has_aux_buffers(&self) -> bool {
        self.aux_buffers > 0
    }

    /// Buffer ordinary drawing goes to
    pub const fn default_draw_target(&self) -> DrawTarget {
        if self.double_buffered {
            DrawTarget::Back
        } else {
            DrawTarget::Front
        }
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            double_buffered: true,
            aux_buffers: 0,
            stereo: false,
            multisample: false,
        }
    }
}

/// Buffer the device currently renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawTarget {
    /// The visible (front) buffer
    Front,
    /// The back buffer of a double-buffered context
    Back,
    /// An auxiliary colour buffer
    Auxiliary(u32),
    /// An offscreen texture target
    Texture,
}

/// Primitive topology for [`GraphicsDevice::draw`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Independent points
    Points,
    /// Independent line segments
    Lines,
    /// Independent triangles
    Triangles,
}

/// Stateful graphics context driven by the frame scheduler
///
/// The renderer-state stack is the device's matrix/attribute stack:
/// [`push_state`](GraphicsDevice::push_state) saves the current modelview
/// and attributes, [`pop_state`](GraphicsDevice::pop_state) restores them.
pub trait GraphicsDevice {
    /// Discover what the device supports
    fn capabilities(&self) -> DeviceCapabilities;

    /// Current depth of the renderer-state stack
    fn state_depth(&self) -> usize;

    /// Save the current state
    fn push_state(&mut self);

    /// Restore the last saved state; returns false on underflow
    fn pop_state(&mut self) -> bool;

    /// Reset the modelview matrix to identity
    fn load_identity(&mut self);

    /// Post-multiply the modelview matrix
    fn multiply_matrix(&mut self, matrix: &Mat4);

    /// Replace the projection matrix
    fn set_projection(&mut self, matrix: &Mat4);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, viewport: Viewport);

    /// Select the buffer subsequent drawing goes to
    fn set_draw_target(&mut self, target: DrawTarget);

    /// Buffer currently drawn into
    fn draw_target(&self) -> DrawTarget;

    /// Clear the current target
    fn clear(&mut self, color: Color);

    /// Set the current drawing colour
    fn set_color(&mut self, color: Color);

    /// Set wireframe mode and line thickness
    fn set_line_style(&mut self, wire: bool, thickness: f32);

    /// Submit geometry
    fn draw(&mut self, primitive: Primitive, vertices: &[Point3]);

    /// Read back one pixel of the current target (origin bottom-left)
    fn read_pixel(&mut self, x: u32, y: u32) -> Option<Color>;

    /// Number of device errors raised since the last call
    fn take_error_count(&mut self) -> u32;

    /// Present the back buffer
    fn swap_buffers(&mut self) {}
}

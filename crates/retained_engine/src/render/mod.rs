//! # Rendering System
//!
//! Render-side building blocks consumed by the frame scheduler.
//!
//! ## Architecture
//!
//! - **Drawing passes**: bitmask naming the render layers
//! - **Device**: the stateful graphics context abstraction, plus a headless
//!   implementation for tests and GPU-less hosts
//! - **Cameras**: views used to render and to pick, with their frustums
//! - **Picking**: pick-target selection and the identification colour codec
//! - **Context**: what a renderable sees while it draws

pub mod pass;
pub mod device;
pub mod headless;
pub mod frustum;
pub mod camera;
pub mod context;
pub mod picking;

pub use camera::{
    BasicCamera, Camera, ColorPickCamera, ColorPickingCamera, PickQueue, PickingCamera,
    RayPickCamera, Viewport,
};
pub use context::RenderContext;
pub use device::{DeviceCapabilities, DrawTarget, GraphicsDevice, Primitive};
pub use frustum::{BoundingSphere, Frustum, Plane};
pub use headless::HeadlessDevice;
pub use pass::DrawingPass;
pub use picking::{ColorPickResult, PickBufferMode, PickHit};

use thiserror::Error;

/// RGBA colour with floating-point channels in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel
    pub a: f32,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque white
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Create a colour from RGBA channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque colour
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Create an opaque colour from 8-bit channels
    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        Self::rgb(
            f32::from(rgb[0]) / 255.0,
            f32::from(rgb[1]) / 255.0,
            f32::from(rgb[2]) / 255.0,
        )
    }

    /// Quantize the colour channels to 8 bits
    pub fn to_rgb8(self) -> [u8; 3] {
        let quantize = |channel: f32| (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
        [quantize(self.r), quantize(self.g), quantize(self.b)]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Errors raised by renderables, cameras and resources during a frame
///
/// The frame scheduler never propagates these: a failing hook abandons the
/// frame, which is logged and reported as "nothing rendered".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A device operation failed
    #[error("Device error: {0}")]
    Device(String),

    /// Uploading or releasing a resource failed
    #[error("Resource error: {0}")]
    Resource(String),

    /// Drawing an item failed
    #[error("Draw failed: {0}")]
    Draw(String),

    /// Camera projection setup failed
    #[error("Camera error: {0}")]
    Camera(String),
}

/// Result type for rendering hooks
pub type RenderResult<T = ()> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb8_round_trip_is_exact() {
        for value in [0u8, 1, 127, 128, 254, 255] {
            let color = Color::from_rgb8([value, 255 - value, value / 2]);
            assert_eq!(color.to_rgb8(), [value, 255 - value, value / 2]);
        }
    }
}

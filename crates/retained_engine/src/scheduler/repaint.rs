//! Repaint bookkeeping
//!
//! Layers needing a repaint accumulate in a [`RepaintMask`] from any thread.
//! The frame scheduler takes the mask once per frame and widens it with
//! [`expand_repaint_mask`] according to what the device can preserve
//! between frames.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::render::device::DeviceCapabilities;
use crate::render::pass::DrawingPass;

/// Accumulated set of layers to repaint on the next frame
#[derive(Debug, Default)]
pub struct RepaintMask {
    bits: AtomicU8,
}

impl RepaintMask {
    /// Empty mask
    pub fn new() -> Self {
        Self::default()
    }

    /// Add layers to the mask
    pub fn request(&self, pass: DrawingPass) {
        self.bits.fetch_or(pass.bits(), Ordering::AcqRel);
    }

    /// Read and clear the mask
    pub fn take(&self) -> DrawingPass {
        DrawingPass::from_bits_truncate(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Read the mask without clearing it
    pub fn peek(&self) -> DrawingPass {
        DrawingPass::from_bits_truncate(self.bits.load(Ordering::Acquire))
    }
}

/// Widen a dirty mask to what must actually be redrawn
///
/// - With auxiliary buffers the pick image never touches visible pixels,
///   so the mask is used as is.
/// - Double buffered without auxiliary buffers: the back buffer is not
///   preserved across swaps, so touching any visual layer repaints all of
///   them.
/// - Single buffered without auxiliary buffers: anything dirty repaints
///   every layer.
pub fn expand_repaint_mask(dirty: DrawingPass, caps: &DeviceCapabilities) -> DrawingPass {
    if caps.has_aux_buffers() {
        dirty
    } else if caps.double_buffered {
        if dirty.touches_visual() {
            dirty | DrawingPass::VISUAL
        } else {
            dirty
        }
    } else if dirty.is_empty() {
        dirty
    } else {
        DrawingPass::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOUBLE: DeviceCapabilities = DeviceCapabilities {
        double_buffered: true,
        aux_buffers: 0,
        stereo: false,
        multisample: false,
    };

    #[test]
    fn test_double_buffer_widens_to_visual() {
        assert_eq!(expand_repaint_mask(DrawingPass::SCENE, &DOUBLE), DrawingPass::VISUAL);
        assert_eq!(
            expand_repaint_mask(DrawingPass::OVERLAY_PICKING, &DOUBLE),
            DrawingPass::VISUAL | DrawingPass::PICKING
        );
        assert_eq!(expand_repaint_mask(DrawingPass::PICKING, &DOUBLE), DrawingPass::PICKING);
    }

    #[test]
    fn test_aux_buffers_keep_mask() {
        let caps = DeviceCapabilities { aux_buffers: 1, ..DOUBLE };
        assert_eq!(expand_repaint_mask(DrawingPass::OVERLAY, &caps), DrawingPass::OVERLAY);
    }

    #[test]
    fn test_single_buffer_repaints_everything() {
        let caps = DeviceCapabilities::MINIMAL;
        assert_eq!(expand_repaint_mask(DrawingPass::PICKING, &caps), DrawingPass::all());
        assert_eq!(expand_repaint_mask(DrawingPass::empty(), &caps), DrawingPass::empty());
    }

    #[test]
    fn test_mask_accumulates_until_taken() {
        let mask = RepaintMask::new();
        mask.request(DrawingPass::SCENE);
        mask.request(DrawingPass::OVERLAY);

        assert_eq!(mask.peek(), DrawingPass::SCENE | DrawingPass::OVERLAY);
        assert_eq!(mask.take(), DrawingPass::SCENE | DrawingPass::OVERLAY);
        assert!(mask.take().is_empty());
    }
}

//! Drawing-pass bitmask algebra
//!
//! A [`DrawingPass`] names one render layer or any union of them. The four
//! base layers are independent: the scene, the interface drawn over it, a
//! single overlay, and the off-screen picking layer.

use bitflags::bitflags;

bitflags! {
    /// Combination of render layers
    ///
    /// Union (`|` or [`DrawingPass::union`]) is commutative, associative and
    /// idempotent; `a.contains(b)` tests `(a & b) == b`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawingPass: u8 {
        /// World geometry
        const SCENE = 1;
        /// Interface elements drawn over the scene
        const INTERFACE = 1 << 1;
        /// Single overlay layer drawn last
        const OVERLAY = 1 << 2;
        /// Off-screen picking layer
        const PICKING = 1 << 3;

        /// Scene geometry that is also pickable
        const SCENE_PICKING = Self::SCENE.bits() | Self::PICKING.bits();
        /// Interface elements that are also pickable
        const INTERFACE_PICKING = Self::INTERFACE.bits() | Self::PICKING.bits();
        /// Overlay elements that are also pickable
        const OVERLAY_PICKING = Self::OVERLAY.bits() | Self::PICKING.bits();
        /// Every layer that produces visible pixels
        const VISUAL = Self::SCENE.bits() | Self::INTERFACE.bits() | Self::OVERLAY.bits();
    }
}

impl DrawingPass {
    /// Whether the scene layer is included
    pub const fn is_scene(self) -> bool {
        self.contains(Self::SCENE)
    }

    /// Whether the interface layer is included
    pub const fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    /// Whether the overlay layer is included
    pub const fn is_overlay(self) -> bool {
        self.contains(Self::OVERLAY)
    }

    /// Whether the picking layer is included
    pub const fn is_picking(self) -> bool {
        self.contains(Self::PICKING)
    }

    /// Whether any visible layer is included
    pub const fn touches_visual(self) -> bool {
        self.intersects(Self::VISUAL)
    }

    /// Iterate the single-layer values contained in this pass, lowest bit first
    pub fn layers(self) -> impl Iterator<Item = DrawingPass> {
        [Self::SCENE, Self::INTERFACE, Self::OVERLAY, Self::PICKING]
            .into_iter()
            .filter(move |layer| self.contains(*layer))
    }
}

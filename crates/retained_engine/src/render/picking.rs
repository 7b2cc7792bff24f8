//! Picking support
//!
//! Colour-identification picking draws every pickable actor in a unique
//! solid colour and reads back the pixel under the pointer. This module
//! owns the two pieces of policy behind it: where the pick image is drawn
//! ([`pick_target`]) and how an actor index maps to a colour
//! ([`encode_pick_id`] / [`decode_pick_color`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::events::PickEvent;
use crate::render::device::{DeviceCapabilities, DrawTarget};
use crate::render::Color;
use crate::scene::Actor;

/// Where the colour-identification pass renders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickBufferMode {
    /// Pick the best buffer the device offers
    #[default]
    Auto,
    /// Render the pick image into the visible buffer (debugging aid)
    Debug,
    /// Always render into an offscreen texture
    Texture,
}

/// Choose the pick target for a mode and a set of device capabilities
///
/// Priority: debug mode, explicit texture mode, auxiliary buffer, back
/// buffer, and finally a forced texture target when the device offers no
/// safe alternative. Capability logging at device initialization uses the
/// same function so the two never disagree.
pub fn pick_target(mode: PickBufferMode, caps: &DeviceCapabilities) -> DrawTarget {
    match mode {
        PickBufferMode::Debug => DrawTarget::Front,
        PickBufferMode::Texture => DrawTarget::Texture,
        PickBufferMode::Auto if caps.has_aux_buffers() => DrawTarget::Auxiliary(0),
        PickBufferMode::Auto if caps.double_buffered => DrawTarget::Back,
        PickBufferMode::Auto => DrawTarget::Texture,
    }
}

/// Whether drawing the pick image into `target` destroys visible pixels
pub const fn pick_target_shares_frame(target: DrawTarget) -> bool {
    matches!(target, DrawTarget::Front | DrawTarget::Back)
}

/// Largest actor index representable in a 24-bit colour (zero means "no hit")
pub const MAX_PICK_INDEX: u32 = 0x00FF_FFFE;

/// Identification colour for the actor at `index` in this frame's pick table
///
/// Returns `None` once the 24-bit id space is exhausted.
pub fn encode_pick_id(index: u32) -> Option<Color> {
    if index > MAX_PICK_INDEX {
        return None;
    }
    let id = index + 1;
    let [_, r, g, b] = id.to_be_bytes();
    Some(Color::from_rgb8([r, g, b]))
}

/// Pick-table index encoded in a pixel colour; `None` for the background
pub fn decode_pick_color(color: Color) -> Option<u32> {
    let [r, g, b] = color.to_rgb8();
    let id = u32::from_be_bytes([0, r, g, b]);
    id.checked_sub(1)
}

/// One actor hit by a ray/area pick
#[derive(Clone)]
pub struct PickHit {
    /// The actor that was hit
    pub actor: Arc<Actor>,
    /// Distance reported by the actor's pick behavior (nearest first)
    pub distance: f32,
}

impl std::fmt::Debug for PickHit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickHit")
            .field("actor", &self.actor.id())
            .field("distance", &self.distance)
            .finish()
    }
}

/// Outcome of resolving one event in the colour-identification pass
#[derive(Clone)]
pub struct ColorPickResult {
    /// The event that was resolved
    pub event: PickEvent,
    /// The actor under the pointer, if any
    pub actor: Option<Arc<Actor>>,
}

impl std::fmt::Debug for ColorPickResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorPickResult")
            .field("event", &self.event)
            .field("actor", &self.actor.as_ref().map(|actor| actor.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUX_AND_DOUBLE: DeviceCapabilities = DeviceCapabilities {
        double_buffered: true,
        aux_buffers: 1,
        stereo: false,
        multisample: false,
    };

    #[test]
    fn test_pick_target_priority() {
        assert_eq!(pick_target(PickBufferMode::Debug, &AUX_AND_DOUBLE), DrawTarget::Front);
        assert_eq!(pick_target(PickBufferMode::Texture, &AUX_AND_DOUBLE), DrawTarget::Texture);
        assert_eq!(pick_target(PickBufferMode::Auto, &AUX_AND_DOUBLE), DrawTarget::Auxiliary(0));

        let double_only = DeviceCapabilities { aux_buffers: 0, ..AUX_AND_DOUBLE };
        assert_eq!(pick_target(PickBufferMode::Auto, &double_only), DrawTarget::Back);

        assert_eq!(
            pick_target(PickBufferMode::Auto, &DeviceCapabilities::MINIMAL),
            DrawTarget::Texture
        );
    }

    #[test]
    fn test_pick_ids_decode_to_their_index() {
        for index in [0, 1, 255, 256, 65_535, 70_000, MAX_PICK_INDEX] {
            let color = encode_pick_id(index).unwrap();
            assert_eq!(decode_pick_color(color), Some(index));
        }
    }

    #[test]
    fn test_background_decodes_to_no_hit() {
        assert_eq!(decode_pick_color(Color::BLACK), None);
        assert!(encode_pick_id(MAX_PICK_INDEX + 1).is_none());
    }
}

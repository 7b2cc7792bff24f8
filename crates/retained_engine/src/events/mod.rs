//! Input and pick events
//!
//! Event handling follows a chain of responsibility: listeners are asked in
//! registration order and the first one that returns `true` consumes the
//! event. Scene objects opt in by reporting the
//! [`InputListener`](crate::scene::Capability::InputListener) capability;
//! the registry binds them to every registered [`EventSource`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::scene::{Capability, SceneObject};

/// Raw input delivered by the host's window system
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer moved to a position (device pixels, origin bottom-left)
    PointerMoved {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Pointer button pressed
    PointerPressed {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
        /// Button index
        button: u32,
    },
    /// Pointer button released
    PointerReleased {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
        /// Button index
        button: u32,
    },
    /// Key pressed (host key code)
    KeyPressed(u32),
    /// Key released (host key code)
    KeyReleased(u32),
    /// Drawing surface resized
    Resized {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
}

/// A request to find what lies under a point or area of the viewport
///
/// Coordinates are device pixels with the origin at the bottom-left corner,
/// the same convention as
/// [`GraphicsDevice::read_pixel`](crate::render::GraphicsDevice::read_pixel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickEvent {
    /// Horizontal centre of the pick area
    pub x: f32,
    /// Vertical centre of the pick area
    pub y: f32,
    /// Width of the pick area
    pub width: f32,
    /// Height of the pick area
    pub height: f32,
    /// Pointer button that triggered the pick, if any
    pub button: Option<u32>,
}

impl PickEvent {
    /// Pick a single pixel
    pub fn point(x: f32, y: f32) -> Self {
        Self::area(x, y, 1.0, 1.0)
    }

    /// Pick a rectangular area centred on `(x, y)`
    pub fn area(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(1.0),
            height: height.max(1.0),
            button: None,
        }
    }

    /// Attach the triggering button (builder pattern)
    pub fn with_button(mut self, button: u32) -> Self {
        self.button = Some(button);
        self
    }

    /// Pick event for a pointer press, `None` for any other input
    pub fn from_input(event: &InputEvent) -> Option<Self> {
        match *event {
            InputEvent::PointerPressed { x, y, button } => {
                Some(Self::point(x, y).with_button(button))
            }
            _ => None,
        }
    }

    /// Pixel under the centre of the event, if it lies on the surface
    pub fn pixel(&self) -> Option<(u32, u32)> {
        if self.x < 0.0 || self.y < 0.0 || !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }
        Some((self.x.floor() as u32, self.y.floor() as u32))
    }
}

/// Input handler
/// Returns true if the event was consumed (stops forwarding)
pub trait InputListener: Send + Sync {
    /// Handle an event, return true if consumed
    fn on_input(&self, event: &InputEvent) -> bool;
}

/// A producer of events that scene objects can be attached to
///
/// The registry binds every registered source to each object it adds and
/// unbinds it on removal. A source decides by itself which objects it cares
/// about, typically by looking at their capabilities.
pub trait EventSource: Send + Sync {
    /// Attach an object; returns true if the source took an interest in it
    fn bind(&self, object: &Arc<dyn SceneObject>) -> bool;

    /// Detach an object (no-op if it was never bound)
    fn unbind(&self, object: &Arc<dyn SceneObject>);
}

/// Address identifying an object instance
pub(crate) fn object_address(object: &Arc<dyn SceneObject>) -> usize {
    Arc::as_ptr(object).cast::<()>() as usize
}

/// Event source forwarding host input to bound [`InputListener`]s
#[derive(Default)]
pub struct InputDispatcher {
    listeners: RwLock<Vec<(usize, Arc<dyn InputListener>)>>,
}

impl InputDispatcher {
    /// Create a dispatcher with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event; returns true if a listener consumed it
    pub fn dispatch(&self, event: &InputEvent) -> bool {
        // Snapshot so listeners may bind/unbind while handling
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if listener.on_input(event) {
                log::trace!("Input {:?} consumed", event);
                return true;
            }
        }
        false
    }
}

impl EventSource for InputDispatcher {
    fn bind(&self, object: &Arc<dyn SceneObject>) -> bool {
        let listener = Arc::clone(object).capabilities().into_iter().find_map(|capability| {
            if let Capability::InputListener(listener) = capability {
                Some(listener)
            } else {
                None
            }
        });

        let Some(listener) = listener else {
            return false;
        };

        let address = object_address(object);
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|(bound, _)| *bound == address) {
            listeners.push((address, listener));
        }
        true
    }

    fn unbind(&self, object: &Arc<dyn SceneObject>) {
        let address = object_address(object);
        self.listeners.write().retain(|(bound, _)| *bound != address);
    }
}

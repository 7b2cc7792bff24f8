//! # Scene
//!
//! Scene tree, capabilities and the object registry.
//!
//! ## Architecture
//!
//! - **Actors**: scene items with visibility, layer, sub-pass, camera
//!   affinity, culling volume, optional behaviour and owned supports
//! - **Capabilities**: the facets objects are indexed by
//! - **Registry**: capability-indexed store with leak tracking
//! - **Scene**: registry plus repaint mask, viewport and background

pub mod actor;
pub mod capability;
pub mod disposal;
pub mod registry;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod support;

pub use actor::{Actor, ChildList, ChildListener};
pub use capability::{
    Capability, CapabilityKind, Disposable, Initializable, PickBehavior, Renderable, SceneObject,
    TransformSupport, Uninitializable, Updatable,
};
pub use disposal::{DisposableRecord, DisposalLedger};
pub use registry::{Indexed, ObjectKey, ObjectRegistry, RegistryError, RegistryListener};
pub use scene::Scene;
pub use support::{TransformNode, VertexPick, VertexShape};

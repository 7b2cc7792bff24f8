//! Object registry
//!
//! Capability-indexed store of everything in the scene. Adding an actor
//! decomposes it (and, recursively, its supports and children) into
//! capabilities and indexes each one under its [`CapabilityKind`]; the
//! schedulers then query by kind and receive snapshots, so no registry lock
//! is ever held while user code runs.
//!
//! The registry also keeps the disposal leak table and binds registered
//! [`EventSource`]s to every object it holds.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::events::{object_address, EventSource, InputListener};
use crate::render::camera::{Camera, ColorPickingCamera, PickingCamera};
use crate::scene::actor::{Actor, ChildListener};
use crate::scene::capability::{
    Capability, CapabilityKind, Disposable, Initializable, PickBehavior, Renderable, SceneObject,
    TransformSupport, Uninitializable, Updatable,
};
use crate::scene::disposal::DisposalLedger;

new_key_type! {
    /// Handle of a registry entry
    pub struct ObjectKey;
}

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A different actor with the same id is already registered
    #[error("Duplicate actor id '{0}'")]
    DuplicateId(String),

    /// Children were added to an actor without a child collection
    #[error("Actor '{0}' cannot hold children")]
    NoChildCollection(String),
}

/// A capability together with the actor that owns it
pub struct Indexed<T: ?Sized> {
    /// The capability
    pub capability: Arc<T>,
    /// Owning actor; `None` for standalone objects such as cameras
    pub owner: Option<Arc<Actor>>,
}

impl<T: ?Sized> Clone for Indexed<T> {
    fn clone(&self) -> Self {
        Self {
            capability: Arc::clone(&self.capability),
            owner: self.owner.clone(),
        }
    }
}

impl<T: ?Sized> Indexed<T> {
    /// Whether the owner is visible (owner-less capabilities always are)
    pub fn owner_visible(&self) -> bool {
        self.owner.as_ref().map_or(true, |owner| owner.is_visible())
    }
}

/// Observer of registry membership
pub trait RegistryListener: Send + Sync {
    /// An object and its capabilities were registered
    fn object_added(&self, _object: &Arc<dyn SceneObject>, _capabilities: &[Capability]) {}

    /// An object was unregistered
    fn object_removed(&self, _object: &Arc<dyn SceneObject>) {}
}

fn actor_address(actor: &Arc<Actor>) -> usize {
    Arc::as_ptr(actor).cast::<()>() as usize
}

struct Entry {
    object: Arc<dyn SceneObject>,
    actor: Option<Arc<Actor>>,
    owner: Option<Arc<Actor>>,
    capabilities: Vec<Capability>,
}

impl Entry {
    fn effective_owner(&self) -> Option<Arc<Actor>> {
        self.owner.clone().or_else(|| self.actor.clone())
    }
}

#[derive(Default)]
struct Tables {
    entries: SlotMap<ObjectKey, Entry>,
    by_address: HashMap<usize, ObjectKey>,
    ids: HashMap<String, ObjectKey>,
    index: HashMap<CapabilityKind, Vec<ObjectKey>>,
    actors: Vec<ObjectKey>,
    roots: Vec<ObjectKey>,
}

impl Tables {
    fn actors_in(&self, keys: &[ObjectKey], visible_only: bool) -> Vec<Arc<Actor>> {
        keys.iter()
            .filter_map(|key| self.entries.get(*key))
            .filter_map(|entry| entry.actor.clone())
            .filter(|actor| !visible_only || actor.is_visible())
            .collect()
    }
}

struct RegistryState {
    this: Weak<RegistryState>,
    tables: RwLock<Tables>,
    ledger: Mutex<DisposalLedger>,
    sources: RwLock<Vec<Arc<dyn EventSource>>>,
    listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
    housekeeping_elapsed: Mutex<Duration>,
    housekeeping_interval: Duration,
}

impl RegistryState {
    fn new(housekeeping_interval: Duration) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            tables: RwLock::new(Tables::default()),
            ledger: Mutex::new(DisposalLedger::new()),
            sources: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            housekeeping_elapsed: Mutex::new(Duration::ZERO),
            housekeeping_interval,
        })
    }

    fn contains_address(&self, address: usize) -> bool {
        self.tables.read().by_address.contains_key(&address)
    }

    fn insert(
        &self,
        object: Arc<dyn SceneObject>,
        owner: Option<Arc<Actor>>,
    ) -> Result<bool, RegistryError> {
        let address = object_address(&object);
        let actor = Arc::clone(&object).as_actor();
        let capabilities = Arc::clone(&object).capabilities();

        {
            let mut tables = self.tables.write();
            if tables.by_address.contains_key(&address) {
                return Ok(false);
            }
            if let Some(actor) = &actor {
                if tables.ids.contains_key(actor.id()) {
                    return Err(RegistryError::DuplicateId(actor.id().to_string()));
                }
            }

            let is_root = actor.as_ref().map_or(false, |actor| {
                actor
                    .parent()
                    .map_or(true, |parent| !tables.by_address.contains_key(&actor_address(&parent)))
            });

            let key = tables.entries.insert(Entry {
                object: Arc::clone(&object),
                actor: actor.clone(),
                owner,
                capabilities: capabilities.clone(),
            });
            tables.by_address.insert(address, key);
            for capability in &capabilities {
                let keys = tables.index.entry(capability.kind()).or_default();
                if keys.last() != Some(&key) {
                    keys.push(key);
                }
            }
            if let Some(actor) = &actor {
                tables.ids.insert(actor.id().to_string(), key);
                tables.actors.push(key);
                if is_root {
                    tables.roots.push(key);
                }
            }
        }

        let label = object.label();
        {
            let mut ledger = self.ledger.lock();
            for capability in &capabilities {
                if let Capability::Disposable(disposable) = capability {
                    ledger.track(capability.address(), label.clone(), Arc::clone(disposable));
                }
            }
        }

        let sources = self.sources.read().clone();
        for source in &sources {
            source.bind(&object);
        }

        if let Some(actor) = &actor {
            if let Err(err) = self.insert_members(actor) {
                log::debug!("Rolling back registration of {}: {}", label, err);
                self.remove(&object, None, false);
                return Err(err);
            }
        }

        log::trace!("Registered {} with {} capabilities", label, capabilities.len());
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.object_added(&object, &capabilities);
        }
        Ok(true)
    }

    fn insert_members(&self, actor: &Arc<Actor>) -> Result<(), RegistryError> {
        for support in actor.supports() {
            self.insert(Arc::clone(support), Some(Arc::clone(actor)))?;
        }

        let listener: Weak<dyn ChildListener> = self.this.clone();
        actor.set_child_listener(Some(listener));

        for child in actor.children() {
            if !self.insert(Arc::clone(&child) as Arc<dyn SceneObject>, None)? {
                self.demote_root(&child);
            }
        }
        Ok(())
    }

    /// Take an already registered actor out of the root set
    fn demote_root(&self, actor: &Arc<Actor>) {
        let mut tables = self.tables.write();
        if let Some(&key) = tables.by_address.get(&actor_address(actor)) {
            tables.roots.retain(|indexed| *indexed != key);
        }
    }

    /// Unregister an object
    ///
    /// With `owner` set, only an entry owned by that actor is removed. With
    /// `detach` set, an actor is also taken out of its registered parent's
    /// child list.
    fn remove(
        &self,
        object: &Arc<dyn SceneObject>,
        owner: Option<&Arc<Actor>>,
        detach: bool,
    ) -> bool {
        let address = object_address(object);
        let entry = {
            let mut tables = self.tables.write();
            let Some(&key) = tables.by_address.get(&address) else {
                return false;
            };
            if let Some(owner) = owner {
                let owned = tables
                    .entries
                    .get(key)
                    .and_then(|entry| entry.owner.as_ref())
                    .map_or(false, |entry_owner| Arc::ptr_eq(entry_owner, owner));
                if !owned {
                    return false;
                }
            }

            tables.by_address.remove(&address);
            let Some(entry) = tables.entries.remove(key) else {
                return false;
            };
            for keys in tables.index.values_mut() {
                keys.retain(|indexed| *indexed != key);
            }
            if let Some(actor) = &entry.actor {
                tables.ids.remove(actor.id());
                tables.actors.retain(|indexed| *indexed != key);
                tables.roots.retain(|indexed| *indexed != key);
            }
            entry
        };

        {
            let mut ledger = self.ledger.lock();
            for capability in &entry.capabilities {
                if matches!(capability, Capability::Disposable(_)) {
                    ledger.mark_removed(capability.address());
                }
            }
        }

        let sources = self.sources.read().clone();
        for source in &sources {
            source.unbind(object);
        }

        if let Some(actor) = &entry.actor {
            actor.set_child_listener(None);
            for support in actor.supports() {
                self.remove(support, Some(actor), false);
            }
            // Children stay in their parent's list
            for child in actor.children() {
                self.remove(&(child as Arc<dyn SceneObject>), None, false);
            }
            if detach {
                if let Some(parent) = actor.parent() {
                    if self.contains_address(actor_address(&parent)) {
                        parent.remove_child(actor);
                    }
                }
            }
        }

        log::trace!("Unregistered {}", entry.object.label());
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.object_removed(object);
        }
        true
    }

    fn query<T: ?Sized>(
        &self,
        kind: CapabilityKind,
        extract: impl Fn(&Capability) -> Option<Arc<T>>,
    ) -> Vec<Indexed<T>> {
        let tables = self.tables.read();
        let Some(keys) = tables.index.get(&kind) else {
            return Vec::new();
        };

        let mut found = Vec::with_capacity(keys.len());
        for entry in keys.iter().filter_map(|key| tables.entries.get(*key)) {
            let owner = entry.effective_owner();
            for capability in entry.capabilities.iter().filter_map(&extract) {
                found.push(Indexed {
                    capability,
                    owner: owner.clone(),
                });
            }
        }
        found
    }

    fn purge_disposed(&self) -> usize {
        let purged = self.ledger.lock().purge();
        if purged > 0 {
            log::debug!("Purged {} disposed resource record(s)", purged);
        }
        purged
    }
}

impl ChildListener for RegistryState {
    fn child_added(&self, parent: &Arc<Actor>, child: &Arc<Actor>) -> Result<(), RegistryError> {
        if !self.contains_address(actor_address(parent)) {
            return Ok(());
        }

        if !self.insert(Arc::clone(child) as Arc<dyn SceneObject>, None)? {
            self.demote_root(child);
        }
        Ok(())
    }

    fn child_removed(&self, parent: &Arc<Actor>, child: &Arc<Actor>) {
        if self.contains_address(actor_address(parent)) {
            self.remove(&(Arc::clone(child) as Arc<dyn SceneObject>), None, false);
        }
    }
}

impl Drop for RegistryState {
    fn drop(&mut self) {
        self.ledger.get_mut().report_leaks();
    }
}

/// Capability-indexed store of scene objects
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct ObjectRegistry {
    state: Arc<RegistryState>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    /// Registry purging disposed resources once per second
    pub fn new() -> Self {
        Self::with_housekeeping_interval(Duration::from_secs(1))
    }

    /// Registry with a custom housekeeping period
    pub fn with_housekeeping_interval(interval: Duration) -> Self {
        Self {
            state: RegistryState::new(interval),
        }
    }

    /// Register an object and everything it owns
    ///
    /// Returns `Ok(false)` when this very instance is already registered.
    pub fn add(&self, object: Arc<dyn SceneObject>) -> Result<bool, RegistryError> {
        self.state.insert(object, None)
    }

    /// Register an actor, its supports and its children
    pub fn add_actor(&self, actor: &Arc<Actor>) -> Result<bool, RegistryError> {
        self.add(Arc::clone(actor) as Arc<dyn SceneObject>)
    }

    /// Unregister an object and everything it owns
    ///
    /// An actor is also detached from its parent's child list if the parent
    /// is still registered. Returns false if the object was not registered.
    pub fn remove(&self, object: &Arc<dyn SceneObject>) -> bool {
        self.state.remove(object, None, true)
    }

    /// Unregister an actor
    pub fn remove_actor(&self, actor: &Arc<Actor>) -> bool {
        self.remove(&(Arc::clone(actor) as Arc<dyn SceneObject>))
    }

    /// Show or hide an actor; returns the previous visibility
    pub fn set_visible(&self, actor: &Arc<Actor>, visible: bool) -> bool {
        let previous = actor.set_visible(visible);
        if previous != visible {
            log::trace!("Actor '{}' visible: {}", actor.id(), visible);
        }
        previous
    }

    /// Whether this instance is registered
    pub fn contains(&self, object: &Arc<dyn SceneObject>) -> bool {
        self.state.contains_address(object_address(object))
    }

    /// Whether this actor instance is registered
    pub fn contains_actor(&self, actor: &Arc<Actor>) -> bool {
        self.state.contains_address(actor_address(actor))
    }

    /// Registered actor with an id
    pub fn actor(&self, id: &str) -> Option<Arc<Actor>> {
        let tables = self.state.tables.read();
        let key = tables.ids.get(id)?;
        tables.entries.get(*key).and_then(|entry| entry.actor.clone())
    }

    /// Number of registered objects (actors, supports and standalone objects)
    pub fn len(&self) -> usize {
        self.state.tables.read().entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered objects reporting a capability kind
    pub fn count(&self, kind: CapabilityKind) -> usize {
        self.state.tables.read().index.get(&kind).map_or(0, Vec::len)
    }

    /// Registered actors without a registered parent, in insertion order
    pub fn root_actors(&self) -> Vec<Arc<Actor>> {
        let tables = self.state.tables.read();
        tables.actors_in(&tables.roots, false)
    }

    /// Visible root actors in insertion order
    pub fn visible_root_actors(&self) -> Vec<Arc<Actor>> {
        let tables = self.state.tables.read();
        tables.actors_in(&tables.roots, true)
    }

    /// Every visible registered actor in insertion order
    pub fn visible_actors(&self) -> Vec<Arc<Actor>> {
        let tables = self.state.tables.read();
        tables.actors_in(&tables.actors, true)
    }

    /// Registered renderables
    pub fn renderables(&self) -> Vec<Indexed<dyn Renderable>> {
        self.state.query(CapabilityKind::Renderable, |capability| match capability {
            Capability::Renderable(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered transforms
    pub fn transforms(&self) -> Vec<Indexed<dyn TransformSupport>> {
        self.state.query(CapabilityKind::Transform, |capability| match capability {
            Capability::Transform(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered initializable resources
    pub fn initializables(&self) -> Vec<Indexed<dyn Initializable>> {
        self.state.query(CapabilityKind::Initializable, |capability| match capability {
            Capability::Initializable(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered resources waiting for release
    pub fn uninitializables(&self) -> Vec<Indexed<dyn Uninitializable>> {
        self.state.query(CapabilityKind::Uninitializable, |capability| match capability {
            Capability::Uninitializable(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered disposables
    pub fn disposables(&self) -> Vec<Indexed<dyn Disposable>> {
        self.state.query(CapabilityKind::Disposable, |capability| match capability {
            Capability::Disposable(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered updatables
    pub fn updatables(&self) -> Vec<Indexed<dyn Updatable>> {
        self.state.query(CapabilityKind::Updatable, |capability| match capability {
            Capability::Updatable(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered pick behaviours
    pub fn pickables(&self) -> Vec<Indexed<dyn PickBehavior>> {
        self.state.query(CapabilityKind::Pickable, |capability| match capability {
            Capability::Pickable(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered cameras
    pub fn cameras(&self) -> Vec<Indexed<dyn Camera>> {
        self.state.query(CapabilityKind::Camera, |capability| match capability {
            Capability::Camera(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered geometric picking cameras
    pub fn picking_cameras(&self) -> Vec<Indexed<dyn PickingCamera>> {
        self.state.query(CapabilityKind::PickingCamera, |capability| match capability {
            Capability::PickingCamera(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered colour picking cameras
    pub fn color_picking_cameras(&self) -> Vec<Indexed<dyn ColorPickingCamera>> {
        self.state.query(CapabilityKind::ColorPickingCamera, |capability| match capability {
            Capability::ColorPickingCamera(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Registered input listeners
    pub fn input_listeners(&self) -> Vec<Indexed<dyn InputListener>> {
        self.state.query(CapabilityKind::InputListener, |capability| match capability {
            Capability::InputListener(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Advance the housekeeping clock; purges once per elapsed interval
    ///
    /// Returns the number of purged records.
    pub fn housekeeping(&self, delta: Duration) -> usize {
        let due = {
            let mut elapsed = self.state.housekeeping_elapsed.lock();
            *elapsed += delta;
            if *elapsed >= self.state.housekeeping_interval {
                *elapsed = Duration::ZERO;
                true
            } else {
                false
            }
        };
        if due {
            self.state.purge_disposed()
        } else {
            0
        }
    }

    /// Purge removed and disposed records now
    pub fn purge_disposed(&self) -> usize {
        self.state.purge_disposed()
    }

    /// Labels of disposables removed from the scene but not disposed
    pub fn leaks(&self) -> Vec<String> {
        self.state.ledger.lock().leaks()
    }

    /// Number of disposables in the leak table
    pub fn tracked_disposables(&self) -> usize {
        self.state.ledger.lock().len()
    }

    /// Log every leak; returns how many were found
    pub fn report_leaks(&self) -> usize {
        self.state.ledger.lock().report_leaks()
    }

    /// Bind an event source to every current and future object
    pub fn register_event_source(&self, source: Arc<dyn EventSource>) {
        let objects: Vec<_> = {
            let tables = self.state.tables.read();
            tables.entries.values().map(|entry| Arc::clone(&entry.object)).collect()
        };
        for object in &objects {
            source.bind(object);
        }
        self.state.sources.write().push(source);
    }

    /// Unbind an event source from everything and forget it
    pub fn unregister_event_source(&self, source: &Arc<dyn EventSource>) {
        let removed = {
            let mut sources = self.state.sources.write();
            let before = sources.len();
            sources.retain(|existing| !Arc::ptr_eq(existing, source));
            before != sources.len()
        };
        if !removed {
            return;
        }
        let objects: Vec<_> = {
            let tables = self.state.tables.read();
            tables.entries.values().map(|entry| Arc::clone(&entry.object)).collect()
        };
        for object in &objects {
            source.unbind(object);
        }
    }

    /// Observe registrations and removals
    pub fn subscribe(&self, listener: Arc<dyn RegistryListener>) {
        self.state.listeners.write().push(listener);
    }
}

//! Entity identifiers, entities and the entity store.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. The generation is bumped
//! every time an index is recycled, so a handle kept by a system or a
//! component after its entity was removed is detected as stale.
//!
//! An [`Entity`] is an id plus at most one component per
//! [`ComponentKind`]. The [`EntityManager`] owns every registered entity.
//! Lifecycle notification is not done here: the game context wraps these
//! mutations and emits the corresponding events.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::{Component, ComponentBundle, ComponentKind};
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`]s with generational tracking.
///
/// Free indices are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`EntityId`], reusing a recycled index when one is
    /// available.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on release.
            self.alive[index as usize] = true;
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            EntityId::new(index, 0)
        }
    }

    /// Release an id, bumping the generation of its index.
    ///
    /// Returns `false` if the id was already released or is stale.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    /// Returns `true` if `id` is allocated and its generation is current.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Number of currently allocated ids.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An identity plus a bag of components, at most one per kind.
pub struct Entity<K: ComponentKind> {
    id: EntityId,
    components: BTreeMap<K, Box<dyn Any>>,
    is_added: bool,
}

impl<K: ComponentKind> Entity<K> {
    /// Create a detached entity with the given id and no components.
    ///
    /// Most callers should use [`EntityManager::create_entity`] so the id is
    /// allocated.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            components: BTreeMap::new(),
            is_added: false,
        }
    }

    /// This entity's id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the entity is currently registered with an [`EntityManager`].
    pub fn is_added(&self) -> bool {
        self.is_added
    }

    /// Borrow the component of type `T`, if present.
    pub fn get_component<T: Component<Kind = K>>(&self) -> Option<&T> {
        self.components.get(&T::KIND)?.downcast_ref::<T>()
    }

    /// Mutably borrow the component of type `T`, if present.
    pub fn get_component_mut<T: Component<Kind = K>>(&mut self) -> Option<&mut T> {
        self.components.get_mut(&T::KIND)?.downcast_mut::<T>()
    }

    /// Whether a component of type `T` is attached.
    pub fn has_component<T: Component<Kind = K>>(&self) -> bool {
        self.components.contains_key(&T::KIND)
    }

    /// Whether a component with the given tag is attached.
    pub fn has_kind(&self, kind: K) -> bool {
        self.components.contains_key(&kind)
    }

    /// Whether every listed tag is attached. An empty list always matches.
    pub fn has_all(&self, kinds: &[K]) -> bool {
        kinds.iter().all(|kind| self.components.contains_key(kind))
    }

    /// Attached tags in ascending order.
    pub fn kinds(&self) -> impl Iterator<Item = K> + '_ {
        self.components.keys().copied()
    }

    /// Number of attached components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Attach a component.
    ///
    /// A component of the same kind already present wins: the new instance is
    /// dropped, a warning is logged and `false` is returned.
    pub fn add_component<T: Component<Kind = K>>(&mut self, component: T) -> bool {
        self.insert_boxed(T::KIND, Box::new(component))
    }

    /// Attach every component of `bundle`, skipping duplicates.
    ///
    /// Returns the number of components actually attached.
    pub fn add_components(&mut self, bundle: ComponentBundle<K>) -> usize {
        bundle
            .components
            .into_iter()
            .map(|(kind, component)| self.insert_boxed(kind, component))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Detach and return the component of type `T`.
    pub fn remove_component<T: Component<Kind = K>>(&mut self) -> Option<T> {
        let boxed = self.components.remove(&T::KIND)?;
        boxed.downcast::<T>().ok().map(|component| *component)
    }

    fn insert_boxed(&mut self, kind: K, component: Box<dyn Any>) -> bool {
        if self.components.contains_key(&kind) {
            warn!(entity = %self.id, ?kind, "component already attached, keeping the existing instance");
            return false;
        }
        self.components.insert(kind, component);
        true
    }
}

impl<K: ComponentKind> fmt::Debug for Entity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("is_added", &self.is_added)
            .field("kinds", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityManager
// ---------------------------------------------------------------------------

/// Owns the authoritative set of registered entities.
///
/// Iteration is in id order, which keeps every consumer deterministic.
pub struct EntityManager<K: ComponentKind> {
    allocator: EntityAllocator,
    entities: BTreeMap<EntityId, Entity<K>>,
}

impl<K: ComponentKind> EntityManager<K> {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            entities: BTreeMap::new(),
        }
    }

    /// Allocate an id and return a detached entity that is not registered
    /// yet.
    pub fn create_entity(&mut self) -> Entity<K> {
        Entity::new(self.allocator.allocate())
    }

    /// Register an entity and flip its `is_added` flag.
    pub fn insert(&mut self, mut entity: Entity<K>) -> Result<EntityId, EcsError> {
        let id = entity.id;
        if !self.allocator.is_alive(id) {
            return Err(EcsError::StaleEntity { entity: id });
        }
        if self.entities.contains_key(&id) {
            return Err(EcsError::AlreadyAdded { entity: id });
        }
        entity.is_added = true;
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Unregister an entity, release its id and hand back the detached
    /// entity.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity<K>, EcsError> {
        let mut entity = self
            .entities
            .remove(&id)
            .ok_or(EcsError::StaleEntity { entity: id })?;
        entity.is_added = false;
        self.allocator.deallocate(id);
        Ok(entity)
    }

    /// Borrow a registered entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity<K>> {
        self.entities.get(&id)
    }

    /// Mutably borrow a registered entity.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity<K>> {
        self.entities.get_mut(&id)
    }

    /// Borrow a component of a registered entity.
    pub fn component<T: Component<Kind = K>>(&self, id: EntityId) -> Option<&T> {
        self.get(id)?.get_component::<T>()
    }

    /// Mutably borrow a component of a registered entity.
    pub fn component_mut<T: Component<Kind = K>>(&mut self, id: EntityId) -> Option<&mut T> {
        self.get_mut(id)?.get_component_mut::<T>()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Registered entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity<K>> {
        self.entities.values()
    }

    /// Ids of every registered entity carrying all `kinds`.
    pub fn ids_with(&self, kinds: &[K]) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|entity| entity.has_all(kinds))
            .map(Entity::id)
            .collect()
    }

    /// The first registered entity (in id order) carrying `kind`.
    pub fn first_with(&self, kind: K) -> Option<EntityId> {
        self.entities
            .values()
            .find(|entity| entity.has_kind(kind))
            .map(Entity::id)
    }
}

impl<K: ComponentKind> Default for EntityManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ComponentKind> fmt::Debug for EntityManager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.entities.len())
            .field("allocated", &self.allocator.alive_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

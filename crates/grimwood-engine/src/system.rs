//! Systems and their registry.
//!
//! A [`System`] declares which entities it cares about through
//! [`System::applies_to`]. The [`SystemManager`] keeps, for each registered
//! system, the set of entity ids that currently satisfy that predicate. The
//! set is kept in sync by the context's membership listener, which
//! re-evaluates every system on `EntityAdded`, `EntityUpdated` and
//! `EntityRemoved`.
//!
//! Systems run in registration order; there is no priority or dependency
//! sort.
//!
//! While a system runs (an update, a hook or an event handler) it is taken
//! out of its slot. Anything addressed to it in the meantime is queued in
//! the slot and handed over, in arrival order, as soon as it returns.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::time::Duration;

use grimwood_ecs::entity::EntityId;

use crate::components::Entity;
use crate::context::GameContext;
use crate::error::SystemError;
use crate::events::{EventKind, GameEvent};

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A unit of per-tick game logic.
///
/// All hooks have no-op defaults so a system only implements what it uses.
pub trait System {
    /// Unique name, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `entity` belongs in this system's subset.
    fn applies_to(&self, _entity: &Entity) -> bool {
        false
    }

    /// Event kinds delivered to [`on_event`](Self::on_event).
    fn subscriptions(&self) -> &'static [EventKind] {
        &[]
    }

    /// Called after `id` joined the subset. Returning `false` refuses the
    /// entity and takes it out of the subset again.
    fn add_entity(&mut self, _id: EntityId, _ctx: &mut GameContext) -> bool {
        true
    }

    /// Called after `id` left the subset. The entity may already be gone
    /// from the context, and the id may belong to an entity this system
    /// refused.
    fn remove_entity(&mut self, _id: EntityId, _ctx: &mut GameContext) {}

    /// Handle an event of one of the [`subscriptions`](Self::subscriptions).
    fn on_event(&mut self, _event: &GameEvent, _ctx: &mut GameContext) {}

    /// Per-tick work over a snapshot of the subset.
    fn update(
        &mut self,
        _elapsed: f64,
        _entities: &[EntityId],
        _ctx: &mut GameContext,
    ) -> Result<(), SystemError> {
        Ok(())
    }
}

/// Index of a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub(crate) usize);

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system (in order of execution).
    pub system_times: Vec<(String, Duration)>,
    /// Total time spent in `update_systems`.
    pub total_time: Duration,
    /// Systems whose update returned an error or panicked.
    pub failures: Vec<String>,
}

// ---------------------------------------------------------------------------
// SystemManager
// ---------------------------------------------------------------------------

/// Work addressed to a system while it was busy.
#[derive(Debug, Clone)]
pub(crate) enum Deferred {
    Event(GameEvent),
    /// Re-evaluate `applies_to` for an entity.
    Refresh(EntityId),
    /// The entity already left the subset; only the hook is owed.
    Removed(EntityId),
}

struct SystemSlot {
    name: &'static str,
    enabled: bool,
    entities: BTreeSet<EntityId>,
    system: Option<Box<dyn System>>,
    deferred: VecDeque<Deferred>,
}

/// Ordered registry of systems and their entity subsets.
#[derive(Default)]
pub struct SystemManager {
    slots: Vec<SystemSlot>,
    last_diagnostics: TickDiagnostics,
}

impl SystemManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system. Use [`GameContext::add_system`] so its events and
    /// initial subset are wired up.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub(crate) fn push(&mut self, system: Box<dyn System>) -> SystemId {
        let name = system.name();
        assert!(
            !self.slots.iter().any(|slot| slot.name == name),
            "duplicate system name: {name:?}"
        );
        self.slots.push(SystemSlot {
            name,
            enabled: true,
            entities: BTreeSet::new(),
            system: Some(system),
            deferred: VecDeque::new(),
        });
        SystemId(self.slots.len() - 1)
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<SystemId> {
        (0..self.slots.len()).map(SystemId).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Id of the system called `name`.
    pub fn id_of(&self, name: &str) -> Option<SystemId> {
        self.slots
            .iter()
            .position(|slot| slot.name == name)
            .map(SystemId)
    }

    pub fn name(&self, id: SystemId) -> Option<&'static str> {
        self.slots.get(id.0).map(|slot| slot.name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|slot| slot.name).collect()
    }

    /// The subset tracked for `id`.
    pub fn entities(&self, id: SystemId) -> Option<&BTreeSet<EntityId>> {
        self.slots.get(id.0).map(|slot| &slot.entities)
    }

    /// The subset tracked for the system called `name`.
    pub fn entities_of(&self, name: &str) -> Option<&BTreeSet<EntityId>> {
        self.entities(self.id_of(name)?)
    }

    pub fn is_enabled(&self, id: SystemId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.enabled)
    }

    /// Enable or disable a system's update. Disabled systems still track
    /// membership and receive events.
    pub fn set_enabled(&mut self, id: SystemId, enabled: bool) -> bool {
        match self.slots.get_mut(id.0) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Whether the system is currently running.
    pub fn is_busy(&self, id: SystemId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.system.is_none())
    }

    /// Diagnostics of the most recent `update_systems` call.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    // -- crate-internal plumbing used by the context -------------------------

    pub(crate) fn system(&self, id: SystemId) -> Option<&dyn System> {
        self.slots.get(id.0)?.system.as_deref()
    }

    pub(crate) fn take(&mut self, id: SystemId) -> Option<Box<dyn System>> {
        self.slots.get_mut(id.0)?.system.take()
    }

    pub(crate) fn restore(&mut self, id: SystemId, system: Box<dyn System>) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.system = Some(system);
        }
    }

    pub(crate) fn defer(&mut self, id: SystemId, work: Deferred) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.deferred.push_back(work);
        }
    }

    pub(crate) fn pop_deferred(&mut self, id: SystemId) -> Option<Deferred> {
        self.slots.get_mut(id.0)?.deferred.pop_front()
    }

    pub(crate) fn track(&mut self, id: SystemId, entity: EntityId) -> bool {
        self.slots
            .get_mut(id.0)
            .is_some_and(|slot| slot.entities.insert(entity))
    }

    pub(crate) fn untrack(&mut self, id: SystemId, entity: EntityId) -> bool {
        self.slots
            .get_mut(id.0)
            .is_some_and(|slot| slot.entities.remove(&entity))
    }

    pub(crate) fn is_tracked(&self, id: SystemId, entity: EntityId) -> bool {
        self.slots
            .get(id.0)
            .is_some_and(|slot| slot.entities.contains(&entity))
    }

    pub(crate) fn snapshot(&self, id: SystemId) -> Vec<EntityId> {
        self.slots
            .get(id.0)
            .map(|slot| slot.entities.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: TickDiagnostics) {
        self.last_diagnostics = diagnostics;
    }
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for slot in &self.slots {
            list.entry(&format_args!(
                "{} (enabled: {}, entities: {})",
                slot.name,
                slot.enabled,
                slot.entities.len()
            ));
        }
        list.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

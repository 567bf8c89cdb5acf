//! The per-session game context.
//!
//! [`GameContext`] owns everything one game session needs: the entity
//! store, the event bus, the clock, the physics world, the collision
//! manager and the systems. It is passed by `&mut` to every system hook, so
//! there is no global state.
//!
//! The context is also the bus's [`Dispatcher`]. Listeners are addressed by
//! [`Listener`]:
//!
//! - `Membership` keeps every system's subset in sync with entity lifecycle
//!   events. It is subscribed first, so subsets are up to date before any
//!   other listener hears about an entity.
//! - `Tick` runs [`GameContext::update_systems`] on every `TimeTick`.
//! - `System(id)` forwards to [`System::on_event`](crate::system::System::on_event).
//! - `Handler(id)` calls a closure registered with [`GameContext::on`].

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use grimwood_ecs::component::Component;
use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::{Dispatcher, EventBus, SubscriptionId};
use grimwood_ecs::time::TimeManager;
use grimwood_ecs::EcsError;
use tracing::{debug, error, info, trace, warn};

use crate::assets::{AssetCache, AssetKind, Request};
use crate::collision::CollisionManager;
use crate::components::{ComponentBundle, ComponentKind, Entity, EntityManager, Mesh, PhysicsBody, VisualHandle};
use crate::config::GameConfig;
use crate::events::{EventKind, GameEvent};
use crate::physics::PhysicsWorld;
use crate::system::{Deferred, System, SystemId, SystemManager, TickDiagnostics};

/// Closure listener registered with [`GameContext::on`].
pub type EventHandler = Box<dyn FnMut(&GameEvent, &mut GameContext)>;

/// Index of a closure listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

/// Address of a bus listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    Membership,
    Tick,
    System(SystemId),
    Handler(HandlerId),
}

struct HandlerSlot {
    subscription: SubscriptionId,
    handler: Option<EventHandler>,
    pending: VecDeque<GameEvent>,
    removed: bool,
}

/// Everything one game session owns.
pub struct GameContext {
    pub entities: EntityManager,
    pub time: TimeManager,
    pub physics: PhysicsWorld,
    pub collisions: CollisionManager,
    pub assets: AssetCache,
    pub config: GameConfig,
    bus: EventBus<EventKind, Listener>,
    systems: SystemManager,
    handlers: Vec<HandlerSlot>,
}

impl GameContext {
    /// Create a context with no systems and no entities.
    pub fn new(config: GameConfig) -> Self {
        let mut bus = EventBus::new();
        bus.on(EventKind::EntityAdded, Listener::Membership);
        bus.on(EventKind::EntityUpdated, Listener::Membership);
        bus.on(EventKind::EntityRemoved, Listener::Membership);
        bus.on(EventKind::TimeTick, Listener::Tick);

        Self {
            entities: EntityManager::new(),
            time: TimeManager::new(config.time.clone()),
            physics: PhysicsWorld::new(config.physics.gravity),
            collisions: CollisionManager::with_default_rules(&config.combat),
            assets: AssetCache::new(),
            config,
            bus,
            systems: SystemManager::new(),
            handlers: Vec::new(),
        }
    }

    // -- systems ------------------------------------------------------------

    /// Register a system after every system registered so far.
    ///
    /// The system is subscribed to its declared events and its subset is
    /// seeded from the entities already present.
    pub fn add_system(&mut self, system: Box<dyn System>) -> SystemId {
        let name = system.name();
        let subscriptions = system.subscriptions();
        let id = self.systems.push(system);
        for kind in subscriptions {
            self.bus.on(*kind, Listener::System(id));
        }
        for entity in self.entities.ids() {
            self.refresh_membership(id, entity);
        }
        info!(system = name, "system registered");
        id
    }

    pub fn systems(&self) -> &SystemManager {
        &self.systems
    }

    pub fn systems_mut(&mut self) -> &mut SystemManager {
        &mut self.systems
    }

    /// Diagnostics of the most recent tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        self.systems.last_diagnostics()
    }

    /// Run every enabled system once, in registration order.
    ///
    /// Each system sees a snapshot of its subset taken right before it runs.
    /// A system that returns an error or panics is logged and skipped; the
    /// remaining systems still run.
    pub fn update_systems(&mut self, elapsed: f64) {
        let tick_start = Instant::now();
        let mut system_times = Vec::with_capacity(self.systems.len());
        let mut failures = Vec::new();

        for id in self.systems.ids() {
            if !self.systems.is_enabled(id) {
                continue;
            }
            let name = self.systems.name(id).unwrap_or("<unknown>");
            let entities = self.systems.snapshot(id);
            let start = Instant::now();

            let outcome = self.run_system(id, |system, ctx| {
                panic::catch_unwind(AssertUnwindSafe(|| system.update(elapsed, &entities, ctx)))
            });
            match outcome {
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(err))) => {
                    error!(system = name, error = %err, "system update failed");
                    failures.push(name.to_owned());
                }
                Some(Err(payload)) => {
                    error!(
                        system = name,
                        panic = panic_message(payload.as_ref()),
                        "system panicked during update"
                    );
                    failures.push(name.to_owned());
                }
                None => warn!(system = name, "system is already running, update skipped"),
            }
            system_times.push((name.to_owned(), start.elapsed()));
        }

        self.systems.set_diagnostics(TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            failures,
        });
    }

    /// Feed one display frame to the clock and emit a `TimeTick` per fixed
    /// step. Returns the number of ticks run.
    pub fn advance_frame(&mut self, delta: f64) -> u32 {
        self.time.begin_frame(delta);
        self.drain_ticks()
    }

    /// Like [`advance_frame`](Self::advance_frame) with the delta measured
    /// from the previous call.
    pub fn advance_frame_at(&mut self, now: Instant) -> u32 {
        self.time.frame_at(now);
        self.drain_ticks()
    }

    fn drain_ticks(&mut self) -> u32 {
        let mut ticks = 0;
        while let Some(tick) = self.time.next_tick() {
            self.emit(GameEvent::TimeTick { tick });
            ticks += 1;
        }
        ticks
    }

    // -- entities -----------------------------------------------------------

    /// Allocate a detached entity.
    pub fn create_entity(&mut self) -> Entity {
        self.entities.create_entity()
    }

    /// Register an entity and emit `EntityAdded`.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, EcsError> {
        match self.entities.insert(entity) {
            Ok(id) => {
                debug!(entity = %id, "entity added");
                self.emit(GameEvent::EntityAdded(id));
                Ok(id)
            }
            Err(err) => {
                warn!(error = %err, "entity not added");
                Err(err)
            }
        }
    }

    /// Build, register and return a new entity from a bundle.
    pub fn spawn(&mut self, bundle: ComponentBundle) -> Result<EntityId, EcsError> {
        let mut entity = self.create_entity();
        entity.add_components(bundle);
        self.add_entity(entity)
    }

    /// Unregister an entity and emit `EntityRemoved`. Unknown ids are
    /// ignored.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        match self.entities.remove(id) {
            Ok(entity) => {
                debug!(entity = %id, "entity removed");
                self.emit(GameEvent::EntityRemoved(id));
                Some(entity)
            }
            Err(_) => {
                debug!(entity = %id, "remove of unknown entity ignored");
                None
            }
        }
    }

    /// Attach a component to a registered entity, emitting `EntityUpdated`
    /// if it was attached.
    pub fn add_component<T: Component<Kind = ComponentKind>>(&mut self, id: EntityId, component: T) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            warn!(entity = %id, kind = ?T::KIND, "component added to unknown entity");
            return false;
        };
        let added = entity.add_component(component);
        if added {
            self.emit(GameEvent::EntityUpdated(id));
        }
        added
    }

    /// Attach a bundle to a registered entity. One `EntityUpdated` is
    /// emitted if at least one component was attached.
    pub fn add_components(&mut self, id: EntityId, bundle: ComponentBundle) -> usize {
        let Some(entity) = self.entities.get_mut(id) else {
            warn!(entity = %id, "components added to unknown entity");
            return 0;
        };
        let added = entity.add_components(bundle);
        if added > 0 {
            self.emit(GameEvent::EntityUpdated(id));
        }
        added
    }

    /// Detach a component from a registered entity, emitting
    /// `EntityUpdated` if one was present.
    pub fn remove_component<T: Component<Kind = ComponentKind>>(&mut self, id: EntityId) -> Option<T> {
        let removed = self.entities.get_mut(id)?.remove_component::<T>();
        if removed.is_some() {
            self.emit(GameEvent::EntityUpdated(id));
        }
        removed
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn component<T: Component<Kind = ComponentKind>>(&self, id: EntityId) -> Option<&T> {
        self.entities.component::<T>(id)
    }

    pub fn component_mut<T: Component<Kind = ComponentKind>>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.component_mut::<T>(id)
    }

    pub fn has_component<T: Component<Kind = ComponentKind>>(&self, id: EntityId) -> bool {
        self.entities.get(id).is_some_and(Entity::has_component::<T>)
    }

    /// The player entity, if one is registered.
    pub fn player(&self) -> Option<EntityId> {
        self.entities.first_with(ComponentKind::Player)
    }

    /// Turn the body of a dead character into a kinematic sensor so it stops
    /// pushing or blocking anything. Returns `true` the first time it applies.
    pub fn make_body_inert(&mut self, id: EntityId) -> bool {
        let needs_inert = self.component::<PhysicsBody>(id).is_some_and(|body| !body.inert);
        if !needs_inert || !self.physics.make_inert(id) {
            return false;
        }
        if let Some(body) = self.component_mut::<PhysicsBody>(id) {
            body.inert = true;
        }
        debug!(entity = %id, "body made inert");
        true
    }

    // -- assets -------------------------------------------------------------

    /// Ask for a model for `entity`. A cached result is attached at once;
    /// otherwise the entity waits for [`complete_asset`](Self::complete_asset).
    ///
    /// Returns `true` if the caller should start a load for `path`.
    pub fn request_model(&mut self, entity: EntityId, path: &str) -> bool {
        match self.assets.request(AssetKind::Model, path, entity) {
            Request::Ready(handle) => {
                self.attach_visual(entity, handle);
                false
            }
            Request::Failed | Request::Waiting => false,
            Request::Load => true,
        }
    }

    /// Finish a load started by [`request_model`](Self::request_model).
    ///
    /// A `None` result marks the path as failed; waiting entities keep
    /// working without a visual. Entities removed while waiting are skipped.
    pub fn complete_asset(&mut self, kind: AssetKind, path: &str, result: Option<VisualHandle>) -> usize {
        let waiting = self.assets.complete(kind, path, result);
        let Some(handle) = result else {
            warn!(path, ?kind, waiting = waiting.len(), "asset failed to load");
            return 0;
        };
        waiting
            .into_iter()
            .filter(|entity| self.attach_visual(*entity, handle))
            .count()
    }

    fn attach_visual(&mut self, entity: EntityId, handle: VisualHandle) -> bool {
        match self.entities.component_mut::<Mesh>(entity) {
            Some(mesh) => {
                mesh.visual = Some(handle);
                true
            }
            None => {
                trace!(%entity, "asset completion for a removed entity ignored");
                false
            }
        }
    }

    // -- closure listeners ----------------------------------------------------

    /// Subscribe a closure to events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent, &mut GameContext) + 'static,
    {
        let id = HandlerId(self.handlers.len());
        let subscription = self.bus.on(kind, Listener::Handler(id));
        self.handlers.push(HandlerSlot {
            subscription,
            handler: Some(Box::new(handler)),
            pending: VecDeque::new(),
            removed: false,
        });
        subscription
    }

    /// Remove a subscription made with [`on`](Self::on).
    pub fn off(&mut self, subscription: SubscriptionId) -> bool {
        let removed = self.bus.off(subscription);
        if let Some(slot) = self
            .handlers
            .iter_mut()
            .find(|slot| slot.subscription == subscription)
        {
            slot.removed = true;
            slot.handler = None;
            slot.pending.clear();
        }
        removed
    }

    // -- dispatch internals --------------------------------------------------

    /// Take a system out of its slot, run `f`, put it back and hand it any
    /// work that queued up meanwhile. `None` if the system is already
    /// running.
    fn run_system<R>(
        &mut self,
        id: SystemId,
        f: impl FnOnce(&mut dyn System, &mut GameContext) -> R,
    ) -> Option<R> {
        let mut system = self.systems.take(id)?;
        let result = f(system.as_mut(), self);
        self.systems.restore(id, system);
        self.flush_deferred(id);
        Some(result)
    }

    fn flush_deferred(&mut self, id: SystemId) {
        while let Some(work) = self.systems.pop_deferred(id) {
            match work {
                Deferred::Event(event) => self.deliver_to_system(id, &event),
                Deferred::Refresh(entity) => self.refresh_membership(id, entity),
                Deferred::Removed(entity) => {
                    self.run_system(id, |system, ctx| system.remove_entity(entity, ctx));
                }
            }
        }
    }

    fn deliver_to_system(&mut self, id: SystemId, event: &GameEvent) {
        if self.systems.is_busy(id) {
            self.systems.defer(id, Deferred::Event(event.clone()));
            return;
        }
        self.run_system(id, |system, ctx| system.on_event(event, ctx));
    }

    fn deliver_to_handler(&mut self, id: HandlerId, event: &GameEvent) {
        let Some(slot) = self.handlers.get_mut(id.0) else {
            return;
        };
        if slot.removed {
            return;
        }
        let Some(mut handler) = slot.handler.take() else {
            slot.pending.push_back(event.clone());
            return;
        };

        handler(event, self);
        loop {
            let next = match self.handlers.get_mut(id.0) {
                Some(slot) if !slot.removed => slot.pending.pop_front(),
                _ => return,
            };
            match next {
                Some(event) => handler(&event, self),
                None => break,
            }
        }
        if let Some(slot) = self.handlers.get_mut(id.0) {
            slot.handler = Some(handler);
        }
    }

    fn handle_membership(&mut self, event: &GameEvent) {
        match *event {
            GameEvent::EntityAdded(entity) | GameEvent::EntityUpdated(entity) => {
                for id in self.systems.ids() {
                    self.refresh_membership(id, entity);
                }
            }
            GameEvent::EntityRemoved(entity) => {
                for id in self.systems.ids() {
                    self.drop_membership(id, entity);
                }
            }
            _ => {}
        }
    }

    /// Bring `entity`'s membership in system `id` in line with
    /// `applies_to`.
    fn refresh_membership(&mut self, id: SystemId, entity: EntityId) {
        let Some(system) = self.systems.system(id) else {
            self.systems.defer(id, Deferred::Refresh(entity));
            return;
        };
        let applies = self
            .entities
            .get(entity)
            .is_some_and(|e| system.applies_to(e));
        let tracked = self.systems.is_tracked(id, entity);

        if applies && !tracked {
            // Tracked before the hook so anything the hook triggers already
            // sees the entity as a member.
            self.systems.track(id, entity);
            let accepted = self
                .run_system(id, |system, ctx| system.add_entity(entity, ctx))
                .unwrap_or(false);
            if !accepted {
                self.systems.untrack(id, entity);
                trace!(system = ?self.systems.name(id), %entity, "entity refused");
            }
        } else if !applies && tracked {
            self.systems.untrack(id, entity);
            self.run_system(id, |system, ctx| system.remove_entity(entity, ctx));
        }
    }

    fn drop_membership(&mut self, id: SystemId, entity: EntityId) {
        if !self.systems.untrack(id, entity) {
            return;
        }
        if self.systems.is_busy(id) {
            self.systems.defer(id, Deferred::Removed(entity));
        } else {
            self.run_system(id, |system, ctx| system.remove_entity(entity, ctx));
        }
    }
}

/// `emit` is depth-first for every listener except one that is already on
/// the stack: a system or closure that emits an event it listens to gets that
/// event queued and handled right after it returns, in arrival order.
impl Dispatcher for GameContext {
    type Event = GameEvent;
    type Listener = Listener;

    fn event_bus(&self) -> &EventBus<EventKind, Listener> {
        &self.bus
    }

    fn deliver(&mut self, listener: Listener, event: &GameEvent) {
        match listener {
            Listener::Membership => self.handle_membership(event),
            Listener::Tick => {
                if let GameEvent::TimeTick { tick } = event {
                    trace!(tick, "tick");
                    self.update_systems(self.time.time_step());
                }
            }
            Listener::System(id) => self.deliver_to_system(id, event),
            Listener::Handler(id) => self.deliver_to_handler(id, event),
        }
    }
}

impl fmt::Debug for GameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameContext")
            .field("entities", &self.entities)
            .field("systems", &self.systems)
            .field("physics", &self.physics)
            .field("tick", &self.time.tick_count())
            .field("listeners", &self.bus.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

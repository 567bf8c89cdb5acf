//! Routing of physics contacts to gameplay handlers.
//!
//! The [`CollisionManager`] maps collider handles back to entities and holds
//! two declarative rule tables. A rule names the components each side must
//! carry; when a contact involves two entities that satisfy the rule in
//! either order, its handler runs once with the entities in the rule's
//! order.
//!
//! [`dispatch`] is called by the physics system once per step with the
//! drained [`PhysicsEvents`]. Contact-force events are handled before
//! collision events, and only collision *starts* are considered.

use std::collections::HashMap;
use std::fmt;

use grimwood_ecs::entity::EntityId;
use rapier3d::prelude::ColliderHandle;
use tracing::{debug, trace};

use crate::components::{
    Bullet, ComponentKind, Entity, Health, Lifetime, MakeDamage, Owner, Player, Weapon,
};
use crate::config::CombatConfig;
use crate::context::GameContext;
use crate::physics::PhysicsEvents;
use crate::state::{EnemyState, EnemyStateComponent};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Handler of a [`CollisionRule`], called with the entities in rule order.
pub type CollisionHandler = fn(&mut GameContext, EntityId, EntityId);

/// Handler of a [`ContactForceRule`], called with the entities in rule order
/// and the contact force.
pub type ContactForceHandler = fn(&mut GameContext, EntityId, EntityId, f64);

/// Runs `handler` when a collision starts between an entity carrying every
/// kind in `first` and one carrying every kind in `second`.
#[derive(Clone, Copy)]
pub struct CollisionRule {
    pub name: &'static str,
    pub first: &'static [ComponentKind],
    pub second: &'static [ComponentKind],
    pub handler: CollisionHandler,
}

/// Runs `handler` when a contact between matching entities reports a force
/// of at least `minimum_force`.
#[derive(Clone, Copy)]
pub struct ContactForceRule {
    pub name: &'static str,
    pub first: &'static [ComponentKind],
    pub second: &'static [ComponentKind],
    pub minimum_force: f64,
    pub handler: ContactForceHandler,
}

impl fmt::Debug for CollisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionRule")
            .field("name", &self.name)
            .field("first", &self.first)
            .field("second", &self.second)
            .finish()
    }
}

impl fmt::Debug for ContactForceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactForceRule")
            .field("name", &self.name)
            .field("first", &self.first)
            .field("second", &self.second)
            .field("minimum_force", &self.minimum_force)
            .finish()
    }
}

/// Order `(a, b)` to satisfy `first`/`second`, trying `(a, b)` before
/// `(b, a)`. `None` if neither order matches.
pub fn match_pair(
    first: &[ComponentKind],
    second: &[ComponentKind],
    a: &Entity,
    b: &Entity,
) -> Option<(EntityId, EntityId)> {
    if a.has_all(first) && b.has_all(second) {
        Some((a.id(), b.id()))
    } else if b.has_all(first) && a.has_all(second) {
        Some((b.id(), a.id()))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// CollisionManager
// ---------------------------------------------------------------------------

/// Collider → entity map plus the rule tables.
#[derive(Debug, Default)]
pub struct CollisionManager {
    colliders: HashMap<ColliderHandle, EntityId>,
    collision_rules: Vec<CollisionRule>,
    contact_force_rules: Vec<ContactForceRule>,
}

impl CollisionManager {
    /// An empty manager with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager loaded with the game's rules, tuned by `combat`.
    pub fn with_default_rules(combat: &CombatConfig) -> Self {
        let mut manager = Self::new();
        manager.add_collision_rule(CollisionRule {
            name: "bullet_hit",
            first: &[ComponentKind::Health],
            second: &[ComponentKind::Bullet],
            handler: bullet_hit,
        });
        manager.add_collision_rule(CollisionRule {
            name: "enemy_attack",
            first: &[ComponentKind::Enemy, ComponentKind::EnemyState],
            second: &[ComponentKind::Player, ComponentKind::Health],
            handler: enemy_attack,
        });
        manager.add_contact_force_rule(ContactForceRule {
            name: "melee_hit",
            first: &[ComponentKind::Enemy, ComponentKind::Health],
            second: &[ComponentKind::Weapon, ComponentKind::Owner],
            minimum_force: combat.force_threshold,
            handler: melee_hit,
        });
        manager
    }

    pub fn add_collision_rule(&mut self, rule: CollisionRule) {
        self.collision_rules.push(rule);
    }

    pub fn add_contact_force_rule(&mut self, rule: ContactForceRule) {
        self.contact_force_rules.push(rule);
    }

    pub fn collision_rules(&self) -> &[CollisionRule] {
        &self.collision_rules
    }

    pub fn contact_force_rules(&self) -> &[ContactForceRule] {
        &self.contact_force_rules
    }

    /// Associate a collider with its entity.
    pub fn register_collider(&mut self, collider: ColliderHandle, entity: EntityId) {
        if let Some(previous) = self.colliders.insert(collider, entity) {
            if previous != entity {
                debug!(?collider, %previous, %entity, "collider re-registered to another entity");
            }
        }
    }

    pub fn unregister_collider(&mut self, collider: ColliderHandle) -> Option<EntityId> {
        self.colliders.remove(&collider)
    }

    /// Drop every collider of `entity`, returning how many were mapped.
    pub fn unregister_entity(&mut self, entity: EntityId) -> usize {
        let before = self.colliders.len();
        self.colliders.retain(|_, owner| *owner != entity);
        before - self.colliders.len()
    }

    pub fn entity_for(&self, collider: ColliderHandle) -> Option<EntityId> {
        self.colliders.get(&collider).copied()
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the rule tables against one step's worth of physics events.
///
/// Handles that do not resolve to a live entity are skipped. Both entities
/// are re-checked before every handler call, since an earlier handler may
/// have removed one of them.
pub fn dispatch(ctx: &mut GameContext, events: &PhysicsEvents) {
    let force_rules = ctx.collisions.contact_force_rules.clone();
    let collision_rules = ctx.collisions.collision_rules.clone();

    for record in &events.contact_forces {
        for rule in &force_rules {
            if record.force < rule.minimum_force {
                continue;
            }
            if let Some((first, second)) =
                resolve(ctx, record.collider1, record.collider2, rule.first, rule.second)
            {
                trace!(rule = rule.name, %first, %second, force = record.force, "contact force rule");
                (rule.handler)(ctx, first, second, record.force);
            }
        }
    }

    for record in events.collisions.iter().filter(|record| record.started) {
        for rule in &collision_rules {
            if let Some((first, second)) =
                resolve(ctx, record.collider1, record.collider2, rule.first, rule.second)
            {
                trace!(rule = rule.name, %first, %second, "collision rule");
                (rule.handler)(ctx, first, second);
            }
        }
    }
}

fn resolve(
    ctx: &GameContext,
    collider1: ColliderHandle,
    collider2: ColliderHandle,
    first: &[ComponentKind],
    second: &[ComponentKind],
) -> Option<(EntityId, EntityId)> {
    let a = ctx.entity(ctx.collisions.entity_for(collider1)?)?;
    let b = ctx.entity(ctx.collisions.entity_for(collider2)?)?;
    match_pair(first, second, a, b)
}

// ---------------------------------------------------------------------------
// Default handlers
// ---------------------------------------------------------------------------

/// Add `amount` to the target's pending damage, creating it if needed.
pub fn apply_damage(ctx: &mut GameContext, target: EntityId, amount: f64) {
    if let Some(pending) = ctx.component_mut::<MakeDamage>(target) {
        pending.amount += amount;
        return;
    }
    ctx.add_component(target, MakeDamage { amount });
}

fn bullet_hit(ctx: &mut GameContext, target: EntityId, bullet: EntityId) {
    let Some(damage) = ctx.component::<Bullet>(bullet).map(|b| b.damage) else {
        return;
    };
    debug!(%target, %bullet, damage, "bullet hit");
    apply_damage(ctx, target, damage);
    if let Some(lifetime) = ctx.component_mut::<Lifetime>(bullet) {
        lifetime.remaining = 0.0;
    } else {
        ctx.add_component(bullet, Lifetime::new(0.0));
    }
}

fn enemy_attack(ctx: &mut GameContext, enemy: EntityId, player: EntityId) {
    let attacking = ctx
        .component::<EnemyStateComponent>(enemy)
        .is_some_and(|state| state.current() == EnemyState::Attack);
    if attacking && ctx.has_component::<Health>(player) {
        let damage = ctx.config.combat.attack_damage;
        debug!(%enemy, %player, damage, "enemy attack landed");
        apply_damage(ctx, player, damage);
    }
}

fn melee_hit(ctx: &mut GameContext, enemy: EntityId, weapon: EntityId, force: f64) {
    let Some(owner) = ctx.component::<Owner>(weapon).map(|o| o.entity) else {
        return;
    };
    if !ctx.has_component::<Player>(owner) {
        return;
    }
    let Some(base) = ctx.component::<Weapon>(weapon).map(|w| w.damage) else {
        return;
    };
    let damage = base * force / ctx.config.combat.force_damage_divisor;
    debug!(%enemy, %weapon, force, damage, "melee hit");
    apply_damage(ctx, enemy, damage);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::components::{ComponentBundle, Enemy};
    use crate::config::GameConfig;
    use crate::physics::{CollisionRecord, ContactForceRecord};

    thread_local! {
        static CALLS: RefCell<Vec<(EntityId, EntityId)>> = const { RefCell::new(Vec::new()) };
    }

    fn record_call(_: &mut GameContext, a: EntityId, b: EntityId) {
        CALLS.with(|calls| calls.borrow_mut().push((a, b)));
    }

    fn record_force(_: &mut GameContext, a: EntityId, b: EntityId, _: f64) {
        CALLS.with(|calls| calls.borrow_mut().push((a, b)));
    }

    fn take_calls() -> Vec<(EntityId, EntityId)> {
        CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
    }

    fn handle(n: u32) -> ColliderHandle {
        ColliderHandle::from_raw_parts(n, 0)
    }

    fn started(a: u32, b: u32) -> PhysicsEvents {
        PhysicsEvents {
            collisions: vec![CollisionRecord {
                collider1: handle(a),
                collider2: handle(b),
                started: true,
            }],
            contact_forces: Vec::new(),
        }
    }

    /// Context with a health entity on collider 1 and a bullet on collider 2.
    fn health_and_bullet() -> (GameContext, EntityId, EntityId) {
        let mut ctx = GameContext::new(GameConfig::default());
        let target = ctx.spawn(ComponentBundle::new().with(Health::new(30.0))).unwrap();
        let bullet = ctx
            .spawn(ComponentBundle::new().with(Bullet { damage: 12.0 }).with(Lifetime::new(3.0)))
            .unwrap();
        ctx.collisions.register_collider(handle(1), target);
        ctx.collisions.register_collider(handle(2), bullet);
        (ctx, target, bullet)
    }

    #[test]
    fn rule_fires_once_in_rule_order_for_either_handle_order() {
        for (a, b) in [(1, 2), (2, 1)] {
            let (mut ctx, target, bullet) = health_and_bullet();
            ctx.collisions = CollisionManager::new();
            ctx.collisions.register_collider(handle(1), target);
            ctx.collisions.register_collider(handle(2), bullet);
            ctx.collisions.add_collision_rule(CollisionRule {
                name: "probe",
                first: &[ComponentKind::Health],
                second: &[ComponentKind::Bullet],
                handler: record_call,
            });
            take_calls();

            dispatch(&mut ctx, &started(a, b));

            assert_eq!(take_calls(), vec![(target, bullet)]);
        }
    }

    #[test]
    fn bullet_hit_accumulates_damage_and_expires_bullet() {
        let (mut ctx, target, bullet) = health_and_bullet();
        ctx.add_component(target, MakeDamage { amount: 3.0 });

        dispatch(&mut ctx, &started(2, 1));

        assert_eq!(ctx.component::<MakeDamage>(target).unwrap().amount, 15.0);
        assert!(ctx.component::<Lifetime>(bullet).unwrap().expired());
    }

    #[test]
    fn collision_stop_is_ignored() {
        let (mut ctx, target, _) = health_and_bullet();
        let mut events = started(1, 2);
        events.collisions[0].started = false;
        dispatch(&mut ctx, &events);
        assert!(ctx.component::<MakeDamage>(target).is_none());
    }

    #[test]
    fn unknown_handles_are_skipped() {
        let (mut ctx, target, _) = health_and_bullet();
        dispatch(&mut ctx, &started(1, 99));
        assert!(ctx.component::<MakeDamage>(target).is_none());
    }

    #[test]
    fn removed_entity_is_skipped() {
        let (mut ctx, target, bullet) = health_and_bullet();
        ctx.remove_entity(bullet);
        dispatch(&mut ctx, &started(1, 2));
        assert!(ctx.component::<MakeDamage>(target).is_none());
    }

    #[test]
    fn force_threshold_is_inclusive() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.collisions = CollisionManager::new();
        let enemy = ctx.spawn(ComponentBundle::new().with(Enemy).with(Health::new(30.0))).unwrap();
        let owner = ctx.spawn(ComponentBundle::new().with(Player)).unwrap();
        let weapon = ctx
            .spawn(ComponentBundle::new().with(Weapon { damage: 100.0 }).with(Owner { entity: owner }))
            .unwrap();
        ctx.collisions.register_collider(handle(1), enemy);
        ctx.collisions.register_collider(handle(2), weapon);
        ctx.collisions.add_contact_force_rule(ContactForceRule {
            name: "probe",
            first: &[ComponentKind::Enemy, ComponentKind::Health],
            second: &[ComponentKind::Weapon, ComponentKind::Owner],
            minimum_force: 500.0,
            handler: record_force,
        });
        take_calls();

        let at = |force| PhysicsEvents {
            collisions: Vec::new(),
            contact_forces: vec![ContactForceRecord {
                collider1: handle(2),
                collider2: handle(1),
                force,
            }],
        };
        dispatch(&mut ctx, &at(499.0));
        assert!(take_calls().is_empty());
        dispatch(&mut ctx, &at(500.0));
        assert_eq!(take_calls(), vec![(enemy, weapon)]);
    }

    #[test]
    fn melee_damage_scales_with_force_for_player_weapons() {
        let mut ctx = GameContext::new(GameConfig::default());
        let enemy = ctx.spawn(ComponentBundle::new().with(Enemy).with(Health::new(30.0))).unwrap();
        let player = ctx.spawn(ComponentBundle::new().with(Player)).unwrap();
        let stranger = ctx.spawn(ComponentBundle::new()).unwrap();
        let axe = ctx
            .spawn(ComponentBundle::new().with(Weapon { damage: 50.0 }).with(Owner { entity: player }))
            .unwrap();
        let club = ctx
            .spawn(ComponentBundle::new().with(Weapon { damage: 50.0 }).with(Owner { entity: stranger }))
            .unwrap();
        ctx.collisions.register_collider(handle(1), enemy);
        ctx.collisions.register_collider(handle(2), axe);
        ctx.collisions.register_collider(handle(3), club);

        let hit = |weapon: u32| PhysicsEvents {
            collisions: Vec::new(),
            contact_forces: vec![ContactForceRecord {
                collider1: handle(1),
                collider2: handle(weapon),
                force: 2000.0,
            }],
        };
        dispatch(&mut ctx, &hit(3));
        assert!(ctx.component::<MakeDamage>(enemy).is_none());
        dispatch(&mut ctx, &hit(2));
        assert_eq!(ctx.component::<MakeDamage>(enemy).unwrap().amount, 1.0);
    }

    #[test]
    fn enemy_contact_hurts_only_when_attacking() {
        let mut ctx = GameContext::new(GameConfig::default());
        let enemy = ctx
            .spawn(
                ComponentBundle::new()
                    .with(Enemy)
                    .with(EnemyStateComponent::new(EnemyState::ChaseWalk)),
            )
            .unwrap();
        let player = ctx.spawn(ComponentBundle::new().with(Player).with(Health::new(100.0))).unwrap();
        ctx.collisions.register_collider(handle(1), enemy);
        ctx.collisions.register_collider(handle(2), player);

        dispatch(&mut ctx, &started(2, 1));
        assert!(ctx.component::<MakeDamage>(player).is_none());

        ctx.component_mut::<EnemyStateComponent>(enemy)
            .unwrap()
            .machine
            .transition(crate::state::EnemyEvent::StartAttack);
        dispatch(&mut ctx, &started(2, 1));
        assert_eq!(ctx.component::<MakeDamage>(player).unwrap().amount, 1.0);
    }

    #[test]
    fn unregister_entity_drops_all_its_colliders() {
        let mut manager = CollisionManager::new();
        let e = EntityId::new(1, 0);
        manager.register_collider(handle(1), e);
        manager.register_collider(handle(2), e);
        manager.register_collider(handle(3), EntityId::new(2, 0));
        assert_eq!(manager.unregister_entity(e), 2);
        assert_eq!(manager.entity_for(handle(1)), None);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.unregister_collider(handle(3)), Some(EntityId::new(2, 0)));
        assert!(manager.is_empty());
    }
}

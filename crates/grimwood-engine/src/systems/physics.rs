//! Keeps the physics world in step with the entities.
//!
//! Entities with a [`PhysicsBody`] and a [`Position`] get a rigid body when
//! they join the subset and lose it when they leave. Each tick the system
//! copies body poses back into the components, publishes the player's
//! position, steps the world and hands the collected events to the
//! collision rules.

use grimwood_ecs::component::Component;
use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Dispatcher;
use tracing::{debug, error, trace};

use crate::collision;
use crate::components::{Entity, PhysicsBody, Player, Position, Rotation};
use crate::context::GameContext;
use crate::error::{GameError, SystemError};
use crate::events::GameEvent;
use crate::system::System;

#[derive(Debug, Default)]
pub struct PhysicsSystem {
    steps: u64,
}

impl PhysicsSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, id: EntityId, ctx: &mut GameContext) -> Result<(), GameError> {
        let position = ctx.component::<Position>(id).copied().unwrap_or_default();
        let rotation = ctx.component::<Rotation>(id).copied().unwrap_or_default();
        let desc = ctx
            .component::<PhysicsBody>(id)
            .map(|body| body.desc.clone())
            .ok_or_else(|| GameError::missing(id, PhysicsBody::KIND))?;

        let (body, collider) = ctx
            .physics
            .register_entity(id, &position, &rotation, &desc)
            .ok_or(GameError::PhysicsRegistration { entity: id })?;
        ctx.collisions.register_collider(collider, id);
        if let Some(component) = ctx.component_mut::<PhysicsBody>(id) {
            component.body = Some(body);
            component.collider = Some(collider);
        }
        Ok(())
    }
}

impl System for PhysicsSystem {
    fn name(&self) -> &'static str {
        "PhysicsSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<PhysicsBody>() && entity.has_component::<Position>()
    }

    fn add_entity(&mut self, id: EntityId, ctx: &mut GameContext) -> bool {
        match self.register(id, ctx) {
            Ok(()) => {
                debug!(entity = %id, "physics body registered");
                true
            }
            Err(err) => {
                error!(entity = %id, error = %err, "physics body not created");
                false
            }
        }
    }

    fn remove_entity(&mut self, id: EntityId, ctx: &mut GameContext) {
        for collider in ctx.physics.unregister_entity(id) {
            ctx.collisions.unregister_collider(collider);
        }
        if let Some(component) = ctx.component_mut::<PhysicsBody>(id) {
            component.body = None;
            component.collider = None;
        }
    }

    fn update(&mut self, elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            let Some((position, rotation)) = ctx.physics.body_pose(id) else {
                continue;
            };
            if let Some(p) = ctx.component_mut::<Position>(id) {
                *p = position;
            }
            if let Some(r) = ctx.component_mut::<Rotation>(id) {
                *r = rotation;
            }
            if ctx.has_component::<Player>(id) {
                ctx.emit(GameEvent::PlayerPositionUpdated { position });
            }
        }

        let events = ctx.physics.step(elapsed);
        self.steps += 1;
        trace!(
            step = self.steps,
            collisions = events.collisions.len(),
            contact_forces = events.contact_forces.len(),
            "physics stepped"
        );
        collision::dispatch(ctx, &events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentBundle;
    use crate::config::GameConfig;
    use crate::physics::{BodyDesc, BodyType, ColliderShape};

    fn ball() -> PhysicsBody {
        PhysicsBody::new(BodyDesc::new(BodyType::Dynamic, ColliderShape::Sphere { radius: 0.5 }))
    }

    fn ctx_with_system() -> GameContext {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(PhysicsSystem::new()));
        ctx
    }

    #[test]
    fn body_follows_membership() {
        let mut ctx = ctx_with_system();
        let id = ctx
            .spawn(ComponentBundle::new().with(ball()).with(Position::new(0.0, 3.0, 0.0)))
            .unwrap();

        let body = ctx.component::<PhysicsBody>(id).unwrap();
        let collider = body.collider.unwrap();
        assert!(body.body.is_some());
        assert_eq!(ctx.collisions.entity_for(collider), Some(id));

        ctx.remove_component::<Position>(id);
        assert!(!ctx.physics.has_entity(id));
        assert_eq!(ctx.collisions.entity_for(collider), None);
        assert_eq!(ctx.component::<PhysicsBody>(id).unwrap().collider, None);
    }

    #[test]
    fn removing_the_entity_removes_the_body() {
        let mut ctx = ctx_with_system();
        let id = ctx
            .spawn(ComponentBundle::new().with(ball()).with(Position::default()))
            .unwrap();
        ctx.remove_entity(id);
        assert_eq!(ctx.physics.body_count(), 0);
        assert!(ctx.collisions.is_empty());
    }

    #[test]
    fn poses_are_copied_back() {
        let mut ctx = ctx_with_system();
        let id = ctx
            .spawn(ComponentBundle::new().with(ball()).with(Position::new(0.0, 10.0, 0.0)))
            .unwrap();
        for _ in 0..30 {
            ctx.update_systems(1.0 / 60.0);
        }
        let y = ctx.component::<Position>(id).unwrap().y;
        assert!(y < 10.0, "ball should fall, y = {y}");
    }

    #[test]
    fn player_position_is_published() {
        let mut ctx = ctx_with_system();
        let seen = std::rc::Rc::new(std::cell::Cell::new(None));
        let sink = seen.clone();
        ctx.on(crate::events::EventKind::PlayerPositionUpdated, move |event, _| {
            if let GameEvent::PlayerPositionUpdated { position } = event {
                sink.set(Some(*position));
            }
        });
        ctx.spawn(
            ComponentBundle::new()
                .with(Player)
                .with(PhysicsBody::new(BodyDesc::new(
                    BodyType::Kinematic,
                    ColliderShape::Sphere { radius: 0.5 },
                )))
                .with(Position::new(4.0, 0.0, 2.0)),
        )
        .unwrap();
        ctx.update_systems(1.0 / 60.0);
        assert_eq!(seen.get(), Some(Position::new(4.0, 0.0, 2.0)));
    }
}

use std::collections::BTreeMap;

use grimwood_ecs::entity::EntityId;
use rapier3d::prelude::ImpulseJointHandle;
use tracing::{debug, warn};

use crate::components::{Entity, Joint, JointKind};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::system::System;

/// Creates physics joints for [`Joint`] entities.
///
/// Only revolute joints are supported; a joint entity of another kind is
/// logged and removed. A joint whose bodies do not exist yet is retried
/// every tick until both are registered.
#[derive(Debug, Default)]
pub struct JointSystem {
    handles: BTreeMap<EntityId, ImpulseJointHandle>,
}

impl JointSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn realise(&mut self, id: EntityId, ctx: &mut GameContext) -> bool {
        if self.handles.contains_key(&id) {
            return true;
        }
        let Some(joint) = ctx.component::<Joint>(id).cloned() else {
            return false;
        };
        let Some(handle) =
            ctx.physics
                .add_revolute_joint(joint.first, joint.second, joint.anchor1, joint.anchor2, joint.axis)
        else {
            return false;
        };
        debug!(entity = %id, first = %joint.first, second = %joint.second, "revolute joint created");
        self.handles.insert(id, handle);
        if let Some(component) = ctx.component_mut::<Joint>(id) {
            component.handle = Some(handle);
        }
        true
    }
}

impl System for JointSystem {
    fn name(&self) -> &'static str {
        "JointSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<Joint>()
    }

    fn add_entity(&mut self, id: EntityId, ctx: &mut GameContext) -> bool {
        let kind = ctx.component::<Joint>(id).map(|joint| joint.kind);
        if kind != Some(JointKind::Revolute) {
            warn!(entity = %id, ?kind, "unsupported joint kind, entity removed");
            ctx.remove_entity(id);
            return false;
        }
        if !self.realise(id, ctx) {
            debug!(entity = %id, "joint bodies not registered yet");
        }
        true
    }

    fn remove_entity(&mut self, id: EntityId, ctx: &mut GameContext) {
        if let Some(handle) = self.handles.remove(&id) {
            ctx.physics.remove_joint(handle);
        }
    }

    fn update(&mut self, _elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            self.realise(id, ctx);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComponentBundle, PhysicsBody, Position};
    use crate::config::GameConfig;
    use crate::physics::{BodyDesc, BodyType, ColliderShape};
    use crate::systems::PhysicsSystem;

    fn door_parts(ctx: &mut GameContext) -> (EntityId, EntityId) {
        let shape = ColliderShape::Box {
            half_extents: [0.5, 1.0, 0.1],
        };
        let post = ctx
            .spawn(
                ComponentBundle::new()
                    .with(Position::default())
                    .with(PhysicsBody::new(BodyDesc::new(BodyType::Fixed, shape.clone()))),
            )
            .unwrap();
        let door = ctx
            .spawn(
                ComponentBundle::new()
                    .with(Position::new(1.0, 0.0, 0.0))
                    .with(PhysicsBody::new(BodyDesc::new(BodyType::Dynamic, shape))),
            )
            .unwrap();
        (post, door)
    }

    fn joint(kind: JointKind, first: EntityId, second: EntityId) -> Joint {
        Joint {
            kind,
            first,
            second,
            anchor1: [0.5, 0.0, 0.0],
            anchor2: [-0.5, 0.0, 0.0],
            axis: [0.0, 1.0, 0.0],
            handle: None,
        }
    }

    fn ctx() -> GameContext {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(PhysicsSystem::new()));
        ctx.add_system(Box::new(JointSystem::new()));
        ctx
    }

    #[test]
    fn revolute_joint_is_created_and_removed() {
        let mut ctx = ctx();
        let (post, door) = door_parts(&mut ctx);
        let id = ctx
            .spawn(ComponentBundle::new().with(joint(JointKind::Revolute, post, door)))
            .unwrap();
        assert!(ctx.component::<Joint>(id).unwrap().handle.is_some());
        assert_eq!(ctx.physics.joint_count(), 1);

        ctx.remove_entity(id);
        assert_eq!(ctx.physics.joint_count(), 0);
    }

    #[test]
    fn unsupported_kind_removes_the_entity() {
        let mut ctx = ctx();
        let (post, door) = door_parts(&mut ctx);
        let id = ctx
            .spawn(ComponentBundle::new().with(joint(JointKind::Prismatic, post, door)))
            .unwrap();
        assert!(ctx.entity(id).is_none());
        assert_eq!(ctx.physics.joint_count(), 0);
        assert!(ctx.systems().entities_of("JointSystem").unwrap().is_empty());
    }

    #[test]
    fn joint_waits_for_its_bodies() {
        let mut ctx = ctx();
        let post = ctx.spawn(ComponentBundle::new().with(Position::default())).unwrap();
        let door = ctx.spawn(ComponentBundle::new().with(Position::default())).unwrap();
        let id = ctx
            .spawn(ComponentBundle::new().with(joint(JointKind::Revolute, post, door)))
            .unwrap();
        assert_eq!(ctx.component::<Joint>(id).unwrap().handle, None);

        let body = || {
            PhysicsBody::new(BodyDesc::new(
                BodyType::Dynamic,
                ColliderShape::Sphere { radius: 0.2 },
            ))
        };
        ctx.add_component(post, body());
        ctx.add_component(door, body());
        ctx.update_systems(1.0 / 60.0);
        assert!(ctx.component::<Joint>(id).unwrap().handle.is_some());
    }
}

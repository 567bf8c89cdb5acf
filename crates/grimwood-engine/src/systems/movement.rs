use grimwood_ecs::entity::EntityId;
use tracing::trace;

use crate::components::{CharacterMovement, Entity, PhysicsBody};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::system::System;

/// Applies each character's pending movement request to its body and
/// clears it.
pub struct CharacterMovementSystem;

impl System for CharacterMovementSystem {
    fn name(&self) -> &'static str {
        "CharacterMovementSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<CharacterMovement>() && entity.has_component::<PhysicsBody>()
    }

    fn update(&mut self, _elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            let Some(movement) = ctx.component_mut::<CharacterMovement>(id) else {
                continue;
            };
            let translation = std::mem::take(&mut movement.translation);
            if translation == [0.0; 3] {
                continue;
            }
            if !ctx.physics.move_body(id, translation) {
                trace!(entity = %id, "no body to move");
            }
        }
        Ok(())
    }
}

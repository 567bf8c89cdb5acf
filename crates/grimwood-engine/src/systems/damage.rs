use grimwood_ecs::entity::EntityId;
use tracing::{debug, info};

use crate::components::{DamagedMarker, DeadMarker, Entity, Health, MakeDamage};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::system::System;

/// Applies pending [`MakeDamage`] to [`Health`].
///
/// Health is clamped at zero. A hit entity gets a [`DamagedMarker`] for the
/// state machines to react to, and a [`DeadMarker`] once its health is
/// gone.
pub struct DamageSystem;

impl System for DamageSystem {
    fn name(&self) -> &'static str {
        "DamageSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<Health>() && entity.has_component::<MakeDamage>()
    }

    fn update(&mut self, _elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            let Some(damage) = ctx.remove_component::<MakeDamage>(id) else {
                continue;
            };
            let Some(health) = ctx.component_mut::<Health>(id) else {
                continue;
            };
            health.current = (health.current - damage.amount).max(0.0);
            let (current, dead) = (health.current, health.is_dead());
            debug!(entity = %id, amount = damage.amount, current, "damage applied");

            if !ctx.has_component::<DamagedMarker>(id) {
                ctx.add_component(id, DamagedMarker);
            }
            if dead && !ctx.has_component::<DeadMarker>(id) {
                info!(entity = %id, "health depleted");
                ctx.add_component(id, DeadMarker);
            }
        }
        Ok(())
    }
}

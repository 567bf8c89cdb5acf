use grimwood_ecs::entity::EntityId;
use tracing::debug;

use crate::components::{Entity, Lifetime};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::system::System;

/// Counts [`Lifetime`]s down and removes expired entities.
pub struct LifetimeSystem;

impl System for LifetimeSystem {
    fn name(&self) -> &'static str {
        "LifetimeSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<Lifetime>()
    }

    fn update(&mut self, elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            let Some(lifetime) = ctx.component_mut::<Lifetime>(id) else {
                continue;
            };
            lifetime.remaining -= elapsed;
            if lifetime.expired() {
                debug!(entity = %id, "lifetime expired");
                ctx.remove_entity(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentBundle;
    use crate::config::GameConfig;

    #[test]
    fn entity_is_removed_when_time_runs_out() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(LifetimeSystem));
        let id = ctx.spawn(ComponentBundle::new().with(Lifetime::new(0.25))).unwrap();

        ctx.update_systems(0.1);
        ctx.update_systems(0.1);
        assert!(ctx.entity(id).is_some());
        ctx.update_systems(0.1);
        assert!(ctx.entity(id).is_none());
        assert!(ctx.systems().entities_of("LifetimeSystem").unwrap().is_empty());
    }

    #[test]
    fn zero_lifetime_goes_on_next_update() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(LifetimeSystem));
        let id = ctx.spawn(ComponentBundle::new().with(Lifetime::new(0.0))).unwrap();
        ctx.update_systems(1.0 / 60.0);
        assert!(ctx.entity(id).is_none());
    }
}

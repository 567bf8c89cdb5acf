use grimwood_ecs::entity::EntityId;
use tracing::debug;

use crate::components::{DeadMarker, Entity, Lifetime, Player};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::system::System;

/// Gives dead characters a [`Lifetime`] so their corpses are removed after
/// a while. The player's body is kept.
///
/// The countdown is attached on the tick after death, leaving the dying
/// animation its first frame.
pub struct CharacterCleanupSystem {
    corpse_lifetime: f64,
}

impl CharacterCleanupSystem {
    pub fn new(corpse_lifetime: f64) -> Self {
        Self { corpse_lifetime }
    }
}

impl System for CharacterCleanupSystem {
    fn name(&self) -> &'static str {
        "CharacterCleanupSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<DeadMarker>()
            && !entity.has_component::<Lifetime>()
            && !entity.has_component::<Player>()
    }

    fn update(&mut self, _elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            debug!(entity = %id, seconds = self.corpse_lifetime, "corpse scheduled for removal");
            ctx.add_component(id, Lifetime::new(self.corpse_lifetime));
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
    fn dead_enemy_gets_a_lifetime_once() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(CharacterCleanupSystem::new(10.0)));
        let id = ctx.spawn(ComponentBundle::new().with(DeadMarker)).unwrap();
        let player = ctx.spawn(ComponentBundle::new().with(DeadMarker).with(Player)).unwrap();

        ctx.update_systems(1.0 / 60.0);
        assert_eq!(ctx.component::<Lifetime>(id), Some(&Lifetime::new(10.0)));
        assert!(!ctx.has_component::<Lifetime>(player));
        assert!(ctx.systems().entities_of("CharacterCleanupSystem").unwrap().is_empty());
    }
}

use grimwood_ecs::entity::EntityId;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::{debug, info};

use crate::components::{ComponentKind, Position};
use crate::config::SpawnConfig;
use crate::context::GameContext;
use crate::error::SystemError;
use crate::prefabs::{enemy_bundle, ENEMY_MODEL};
use crate::system::System;

/// Randomly spawns enemies at the configured spawn points.
///
/// Each tick an enemy appears with probability `chance`, as long as fewer
/// than `max_enemies` are alive. The generator is seeded from the config,
/// so the same seed gives the same spawns.
pub struct EnemySpawnSystem {
    config: SpawnConfig,
    rng: Pcg64,
}

impl EnemySpawnSystem {
    pub fn new(config: SpawnConfig) -> Self {
        let rng = Pcg64::seed_from_u64(config.seed);
        Self { config, rng }
    }

    fn spawn_one(&mut self, ctx: &mut GameContext) -> Result<EntityId, SystemError> {
        let point = self.config.points[self.rng.gen_range(0..self.config.points.len())];
        let id = ctx.spawn(enemy_bundle(Position::from(point), self.config.enemy_health))?;
        ctx.request_model(id, ENEMY_MODEL);
        info!(entity = %id, ?point, "enemy spawned");
        Ok(id)
    }
}

impl System for EnemySpawnSystem {
    fn name(&self) -> &'static str {
        "EnemySpawnSystem"
    }

    fn update(&mut self, _elapsed: f64, _entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        if self.config.points.is_empty() {
            return Ok(());
        }
        let alive = ctx.entities.ids_with(&[ComponentKind::Enemy]).len();
        if alive >= self.config.max_enemies {
            return Ok(());
        }
        if !self.rng.gen_bool(self.config.chance.clamp(0.0, 1.0)) {
            return Ok(());
        }
        debug!(alive, max = self.config.max_enemies, "spawning enemy");
        self.spawn_one(ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Enemy;
    use crate::config::GameConfig;
    use crate::state::{EnemyState, EnemyStateComponent};

    fn spawner(chance: f64, max_enemies: usize) -> EnemySpawnSystem {
        EnemySpawnSystem::new(SpawnConfig {
            chance,
            max_enemies,
            points: vec![[1.0, 9.0, 2.0]],
            ..SpawnConfig::default()
        })
    }

    #[test]
    fn certain_spawn_respects_cap() {
        let mut ctx = GameContext::new(GameConfig::default());
        let mut system = spawner(1.0, 2);
        for _ in 0..5 {
            system.update(1.0 / 60.0, &[], &mut ctx).unwrap();
        }
        let enemies = ctx.entities.ids_with(&[ComponentKind::Enemy]);
        assert_eq!(enemies.len(), 2);

        let enemy = enemies[0];
        assert!(ctx.has_component::<Enemy>(enemy));
        assert_eq!(ctx.component::<Position>(enemy), Some(&Position::new(1.0, 9.0, 2.0)));
        assert_eq!(
            ctx.component::<EnemyStateComponent>(enemy).map(EnemyStateComponent::current),
            Some(EnemyState::StandUp)
        );
    }

    #[test]
    fn zero_chance_never_spawns() {
        let mut ctx = GameContext::new(GameConfig::default());
        let mut system = spawner(0.0, 10);
        for _ in 0..100 {
            system.update(1.0 / 60.0, &[], &mut ctx).unwrap();
        }
        assert!(ctx.entities.is_empty());
    }

    #[test]
    fn same_seed_same_spawn_ticks() {
        fn spawn_ticks() -> Vec<usize> {
            let mut ctx = GameContext::new(GameConfig::default());
            let mut system = spawner(0.1, 100);
            let mut ticks = Vec::new();
            for tick in 0..200 {
                let before = ctx.entities.len();
                system.update(1.0 / 60.0, &[], &mut ctx).unwrap();
                if ctx.entities.len() > before {
                    ticks.push(tick);
                }
            }
            ticks
        }
        let first = spawn_ticks();
        assert!(!first.is_empty());
        assert_eq!(first, spawn_ticks());
    }
}

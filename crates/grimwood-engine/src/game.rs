//! The top-level game object.
//!
//! [`Game`] owns a [`GameContext`] with every system registered in tick
//! order, and offers the few entry points a host needs: load a level,
//! spawn the characters, feed it frames.

use std::path::Path;
use std::time::Instant;

use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Dispatcher;
use tracing::info;

use crate::audio::{AudioBackend, LoggingAudio};
use crate::components::Position;
use crate::config::GameConfig;
use crate::context::GameContext;
use crate::error::GameError;
use crate::events::GameEvent;
use crate::level::{Level, SpawnedLevel};
use crate::prefabs::{bullet_bundle, enemy_bundle, player_bundle, ENEMY_MODEL, PLAYER_MODEL};
use crate::systems::default_systems;

pub struct Game {
    ctx: GameContext,
}

impl Game {
    /// A game whose sounds are only logged.
    pub fn new(config: GameConfig) -> Self {
        Self::with_audio(config, Box::new(LoggingAudio))
    }

    pub fn with_audio(config: GameConfig, audio: Box<dyn AudioBackend>) -> Self {
        let mut ctx = GameContext::new(config);
        for system in default_systems(&ctx.config, audio) {
            ctx.add_system(system);
        }
        info!(systems = ctx.systems().len(), "game created");
        Self { ctx }
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    pub fn config(&self) -> &GameConfig {
        &self.ctx.config
    }

    pub fn load_level(&mut self, level: &Level) -> Result<SpawnedLevel, GameError> {
        level.spawn(&mut self.ctx)
    }

    pub fn load_level_file(&mut self, path: impl AsRef<Path>) -> Result<SpawnedLevel, GameError> {
        let level = Level::from_path(path)?;
        self.load_level(&level)
    }

    /// Spawn the player. A second player is created as an entity but the
    /// player state machine refuses it.
    pub fn spawn_player(&mut self, position: Position) -> Result<EntityId, GameError> {
        let health = self.ctx.config.combat.player_health;
        let id = self.ctx.spawn(player_bundle(position, health))?;
        self.ctx.request_model(id, PLAYER_MODEL);
        Ok(id)
    }

    pub fn spawn_enemy(&mut self, position: Position) -> Result<EntityId, GameError> {
        let health = self.ctx.config.spawn.enemy_health;
        let id = self.ctx.spawn(enemy_bundle(position, health))?;
        self.ctx.request_model(id, ENEMY_MODEL);
        Ok(id)
    }

    /// Fire a bullet from the player and tell its state machine.
    pub fn shoot(&mut self, from: Position, velocity: [f64; 3], damage: f64) -> Result<EntityId, GameError> {
        let owner = self.ctx.player().ok_or(GameError::NoPlayer)?;
        let lifetime = self.ctx.config.combat.bullet_lifetime;
        let id = self.ctx.spawn(bullet_bundle(owner, from, velocity, damage, lifetime))?;
        self.ctx.emit(GameEvent::WeaponShot { entity: owner });
        Ok(id)
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.ctx.emit(event);
    }

    /// Run one display frame of `delta` seconds. Returns the number of
    /// fixed ticks it produced.
    pub fn run_frame(&mut self, delta: f64) -> u32 {
        self.ctx.advance_frame(delta)
    }

    pub fn run_frame_at(&mut self, now: Instant) -> u32 {
        self.ctx.advance_frame_at(now)
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game").field("ctx", &self.ctx).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Bullet, ComponentKind};

    fn quiet_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.spawn.max_enemies = 0;
        config
    }

    #[test]
    fn systems_run_in_tick_order() {
        let game = Game::new(quiet_config());
        assert_eq!(
            game.context().systems().names(),
            vec![
                "EnemySpawnSystem",
                "EnemyControlSystem",
                "CharacterMovementSystem",
                "PhysicsSystem",
                "JointSystem",
                "CharacterCleanupSystem",
                "DamageSystem",
                "EnemyStateMachineSystem",
                "PlayerStateMachineSystem",
                "AnimationSystem",
                "LifetimeSystem",
                "AudioSystem",
            ]
        );
    }

    #[test]
    fn frame_runs_fixed_ticks() {
        let mut game = Game::new(quiet_config());
        let step = game.config().time.fixed_dt;
        assert_eq!(game.run_frame(step * 3.5), 3);
        assert_eq!(game.context().time.tick_count(), 3);
    }

    #[test]
    fn shooting_needs_a_player() {
        let mut game = Game::new(quiet_config());
        assert!(matches!(
            game.shoot(Position::default(), [0.0, 0.0, 10.0], 10.0),
            Err(GameError::NoPlayer)
        ));

        game.spawn_player(Position::default()).unwrap();
        let bullet = game.shoot(Position::new(0.0, 1.5, 1.0), [0.0, 0.0, 10.0], 10.0).unwrap();
        assert_eq!(game.context().component::<Bullet>(bullet), Some(&Bullet { damage: 10.0 }));
        assert_eq!(game.context().entities.ids_with(&[ComponentKind::Bullet]), vec![bullet]);
    }
}

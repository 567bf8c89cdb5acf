//! The game's systems.
//!
//! [`default_systems`] returns them in the order they run each tick.
//! Movement is resolved before the physics step so collisions see this
//! tick's positions, and damage is applied before the state machines poll
//! for it.

mod animation;
mod audio;
mod cleanup;
mod damage;
mod enemy_control;
mod enemy_state;
mod joint;
mod lifetime;
mod movement;
mod physics;
mod player_state;
mod spawn;

pub use animation::AnimationSystem;
pub use audio::AudioSystem;
pub use cleanup::CharacterCleanupSystem;
pub use damage::DamageSystem;
pub use enemy_control::EnemyControlSystem;
pub use enemy_state::{enemy_effects, EnemyStateMachineSystem};
pub use joint::JointSystem;
pub use lifetime::LifetimeSystem;
pub use movement::CharacterMovementSystem;
pub use physics::PhysicsSystem;
pub use player_state::{player_movement_effects, PlayerStateMachineSystem};
pub use spawn::EnemySpawnSystem;

use crate::audio::AudioBackend;
use crate::config::GameConfig;
use crate::system::System;

/// Every system, in tick order.
pub fn default_systems(config: &GameConfig, audio: Box<dyn AudioBackend>) -> Vec<Box<dyn System>> {
    vec![
        Box::new(EnemySpawnSystem::new(config.spawn.clone())),
        Box::new(EnemyControlSystem::new(config.enemy.clone())),
        Box::new(CharacterMovementSystem),
        Box::new(PhysicsSystem::new()),
        Box::new(JointSystem::new()),
        Box::new(CharacterCleanupSystem::new(config.combat.corpse_lifetime)),
        Box::new(DamageSystem),
        Box::new(EnemyStateMachineSystem),
        Box::new(PlayerStateMachineSystem::new(config.combat.low_health_threshold)),
        Box::new(AnimationSystem),
        Box::new(LifetimeSystem),
        Box::new(AudioSystem::new(audio)),
    ]
}

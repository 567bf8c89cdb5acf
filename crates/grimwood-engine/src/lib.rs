//! Grimwood Engine -- the game layer on top of [`grimwood_ecs`].
//!
//! A [`GameContext`](context::GameContext) owns the entities, the event bus,
//! the fixed-step clock, the `rapier3d` physics world, collision routing and
//! the asset cache. Systems register with it and are kept informed of which
//! entities they apply to; every `TimeTick` runs them once, in registration
//! order.
//!
//! [`Game`](game::Game) wires the standard system list together:
//!
//! ```
//! use grimwood_engine::prelude::*;
//!
//! let mut config = GameConfig::default();
//! config.spawn.max_enemies = 0;
//! let mut game = Game::new(config);
//!
//! let player = game.spawn_player(Position::new(0.0, 1.0, 0.0)).unwrap();
//! let enemy = game.spawn_enemy(Position::new(0.0, 1.0, 8.0)).unwrap();
//!
//! let ticks = game.run_frame(1.0 / 60.0);
//! assert_eq!(ticks, 1);
//! assert_eq!(game.context().player(), Some(player));
//! assert!(game.context().component::<Health>(enemy).is_some());
//! ```

#![deny(unsafe_code)]

pub mod animation;
pub mod assets;
pub mod audio;
pub mod collision;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod game;
pub mod level;
pub mod physics;
pub mod prefabs;
pub mod state;
pub mod system;
pub mod systems;

/// Re-export the ECS crate for convenience.
pub use grimwood_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use grimwood_ecs::component::Component;
    pub use grimwood_ecs::entity::EntityId;
    pub use grimwood_ecs::event::{Dispatcher, SubscriptionId};

    pub use crate::animation::{Animation, Clip};
    pub use crate::assets::{AssetCache, AssetKind};
    pub use crate::audio::{AudioBackend, LoggingAudio, Sound};
    pub use crate::collision::{CollisionManager, CollisionRule, ContactForceRule};
    pub use crate::components::{
        Bullet, CharacterMovement, ComponentBundle, ComponentKind, DamagedMarker, DeadMarker, Enemy, Entity, Health,
        Joint, JointKind, Lifetime, MakeDamage, Mesh, Owner, PhysicsBody, Player, Position, Rotation, VisualHandle,
        Weapon,
    };
    pub use crate::config::GameConfig;
    pub use crate::context::GameContext;
    pub use crate::error::{GameError, SystemError};
    pub use crate::events::{EventKind, GameEvent};
    pub use crate::game::Game;
    pub use crate::level::Level;
    pub use crate::physics::{BodyDesc, BodyType, ColliderShape, CollisionGroups};
    pub use crate::state::{
        EnemyEvent, EnemyState, EnemyStateComponent, PlayerActionState, PlayerEvent, PlayerMovementState,
        PlayerStateComponent,
    };
    pub use crate::system::System;
}

//! Component bundles for the game's characters and projectiles.

use grimwood_ecs::entity::EntityId;

use crate::animation::Animation;
use crate::components::{
    Bullet, CharacterMovement, ComponentBundle, Enemy, Health, Lifetime, Mesh, Owner, PhysicsBody, Player, Position,
    Rotation,
};
use crate::physics::{BodyDesc, BodyType, ColliderShape, CollisionGroups};
use crate::state::{EnemyState, EnemyStateComponent, PlayerStateComponent};

pub const ENEMY_MODEL: &str = "models/zombie.glb";
pub const PLAYER_MODEL: &str = "models/remington.glb";
pub const BULLET_MODEL: &str = "models/bullet.glb";

const CHARACTER_SHAPE: ColliderShape = ColliderShape::Capsule {
    half_height: 0.6,
    radius: 0.35,
};

/// An enemy getting up from the ground at `position`.
pub fn enemy_bundle(position: Position, health: f64) -> ComponentBundle {
    let desc = BodyDesc::new(BodyType::Dynamic, CHARACTER_SHAPE)
        .with_locked_rotations()
        .with_groups(CollisionGroups::ENEMY);
    ComponentBundle::new()
        .with(Enemy)
        .with(Health::new(health))
        .with(EnemyStateComponent::new(EnemyState::StandUp))
        .with(Animation::new())
        .with(Mesh::new(ENEMY_MODEL))
        .with(position)
        .with(Rotation::default())
        .with(PhysicsBody::new(desc))
        .with(CharacterMovement::default())
}

pub fn player_bundle(position: Position, health: f64) -> ComponentBundle {
    let desc = BodyDesc::new(BodyType::Kinematic, CHARACTER_SHAPE).with_groups(CollisionGroups::PLAYER);
    ComponentBundle::new()
        .with(Player)
        .with(Health::new(health))
        .with(PlayerStateComponent::new())
        .with(Animation::new())
        .with(Mesh::new(PLAYER_MODEL))
        .with(position)
        .with(Rotation::default())
        .with(PhysicsBody::new(desc))
        .with(CharacterMovement::default())
}

/// A projectile fired by `owner`, removed after `lifetime` seconds if it
/// hits nothing.
pub fn bullet_bundle(owner: EntityId, position: Position, velocity: [f64; 3], damage: f64, lifetime: f64) -> ComponentBundle {
    let desc = BodyDesc::new(BodyType::Dynamic, ColliderShape::Sphere { radius: 0.02 })
        .with_linvel(velocity)
        .with_ccd(true)
        .with_groups(CollisionGroups::PROJECTILE);
    ComponentBundle::new()
        .with(Bullet { damage })
        .with(Owner { entity: owner })
        .with(Lifetime::new(lifetime))
        .with(Mesh::new(BULLET_MODEL))
        .with(position)
        .with(Rotation::default())
        .with(PhysicsBody::new(desc))
}

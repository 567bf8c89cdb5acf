//! Gameplay component types and the component-kind registry.
//!
//! [`ComponentKind`] is the closed list of every component the game knows
//! about. Each component type is bound to exactly one variant through the
//! [`component!`](crate::components::component) macro, so storage keys are
//! fixed at compile time.

use grimwood_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};

use crate::physics::BodyDesc;
use rapier3d::prelude::{ColliderHandle, ImpulseJointHandle, RigidBodyHandle};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tag of every component type in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Position,
    Rotation,
    Mesh,
    Physics,
    Health,
    Enemy,
    Player,
    Bullet,
    Weapon,
    Owner,
    Lifetime,
    MakeDamage,
    DamagedMarker,
    DeadMarker,
    EnemyState,
    PlayerState,
    Animation,
    CharacterMovement,
    Joint,
}

impl grimwood_ecs::component::ComponentKind for ComponentKind {}

/// Bind a component type to its [`ComponentKind`] variant.
macro_rules! component {
    ($ty:ty => $kind:ident) => {
        impl grimwood_ecs::component::Component for $ty {
            type Kind = $crate::components::ComponentKind;
            const KIND: $crate::components::ComponentKind =
                $crate::components::ComponentKind::$kind;
        }
    };
}
pub(crate) use component;

/// An entity of this game.
pub type Entity = grimwood_ecs::entity::Entity<ComponentKind>;
/// The entity store of this game.
pub type EntityManager = grimwood_ecs::entity::EntityManager<ComponentKind>;
/// A batch of components of this game.
pub type ComponentBundle = grimwood_ecs::component::ComponentBundle<ComponentKind>;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// World-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Unit vector from `self` towards `target` in the horizontal plane, or
    /// `None` when the two points coincide horizontally.
    pub fn flat_direction_to(&self, target: &Position) -> Option<[f64; 3]> {
        let (dx, dz) = (target.x - self.x, target.z - self.z);
        let len = (dx * dx + dz * dz).sqrt();
        (len > f64::EPSILON).then(|| [dx / len, 0.0, dz / len])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Position {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// World-space orientation as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl From<[f64; 4]> for Rotation {
    fn from([x, y, z, w]: [f64; 4]) -> Self {
        Self { x, y, z, w }
    }
}

component!(Position => Position);
component!(Rotation => Rotation);

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Opaque handle to a renderer-owned visual object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

/// The model an entity is drawn with.
///
/// `visual` stays `None` until the model load completes, and forever if it
/// fails; systems must not depend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub model: String,
    pub name: Option<String>,
    pub scale: f64,
    pub visual: Option<VisualHandle>,
}

impl Mesh {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            name: None,
            scale: 1.0,
            visual: None,
        }
    }
}

component!(Mesh => Mesh);

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Rigid body description plus the handles it was realised with.
///
/// The handles are filled in by the physics system when the entity is
/// registered and are references into the physics world, not owned objects.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBody {
    pub desc: BodyDesc,
    pub body: Option<RigidBodyHandle>,
    pub collider: Option<ColliderHandle>,
    /// Set once the body was turned into a non-colliding kinematic body.
    pub inert: bool,
}

impl PhysicsBody {
    pub fn new(desc: BodyDesc) -> Self {
        Self {
            desc,
            body: None,
            collider: None,
            inert: false,
        }
    }
}

/// Per-tick movement request consumed by the character movement system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CharacterMovement {
    /// Desired displacement for the next step.
    pub translation: [f64; 3],
}

/// A physics joint between the bodies of two other entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub kind: JointKind,
    pub first: EntityId,
    pub second: EntityId,
    pub anchor1: [f64; 3],
    pub anchor2: [f64; 3],
    pub axis: [f64; 3],
    pub handle: Option<ImpulseJointHandle>,
}

/// Joint types a level may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    Revolute,
    Fixed,
    Spherical,
    Prismatic,
}

component!(PhysicsBody => Physics);
component!(CharacterMovement => CharacterMovement);
component!(Joint => Joint);

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub max: f64,
    pub current: f64,
}

impl Health {
    pub fn new(max: f64) -> Self {
        Self { max, current: max }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    /// Remaining fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }
}

/// Marks an entity as an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Enemy;

/// Marks the player entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Player;

/// A projectile carrying damage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bullet {
    pub damage: f64,
}

/// A melee weapon whose impact force scales its damage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weapon {
    pub damage: f64,
}

/// Weak back-reference to the entity wielding or firing this one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Owner {
    pub entity: EntityId,
}

/// Countdown after which the entity is removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    pub remaining: f64,
}

impl Lifetime {
    pub fn new(seconds: f64) -> Self {
        Self { remaining: seconds }
    }

    pub fn expired(&self) -> bool {
        self.remaining <= 0.0
    }
}

/// Damage waiting to be applied by the damage system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MakeDamage {
    pub amount: f64,
}

/// Present after the entity took damage, until a state machine consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamagedMarker;

/// Present once health reached zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeadMarker;

component!(Health => Health);
component!(Enemy => Enemy);
component!(Player => Player);
component!(Bullet => Bullet);
component!(Weapon => Weapon);
component!(Owner => Owner);
component!(Lifetime => Lifetime);
component!(MakeDamage => MakeDamage);
component!(DamagedMarker => DamagedMarker);
component!(DeadMarker => DeadMarker);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

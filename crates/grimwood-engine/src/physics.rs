//! rapier3d integration.
//!
//! [`PhysicsWorld`] owns the rapier pipeline and sets and is the only place
//! that touches rapier types beyond opaque handles. The rest of the engine
//! talks to it through a small surface:
//!
//! 1. create/remove an entity's rigid body and collider,
//! 2. step the world and drain the collision and contact-force queues into
//!    [`PhysicsEvents`],
//! 3. read poses back, nudge kinematic bodies, cast rays, add joints.
//!
//! rapier3d is compiled with `enhanced-determinism`, so with a fixed step
//! and id-ordered registration a run is reproducible on the same platform.

use std::collections::HashMap;

use grimwood_ecs::entity::EntityId;
use rapier3d::na::{Quaternion, Unit, UnitQuaternion};
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::components::{Position, Rotation};

// ---------------------------------------------------------------------------
// Body description
// ---------------------------------------------------------------------------

/// How the solver treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// Fully simulated.
    Dynamic,
    /// Moved by game code, pushes dynamic bodies.
    Kinematic,
    /// Never moves.
    Fixed,
}

/// Collider geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColliderShape {
    Box { half_extents: [f64; 3] },
    Sphere { radius: f64 },
    Capsule { half_height: f64, radius: f64 },
}

/// Collision group bits. A collider interacts with another when each one's
/// membership intersects the other's filter.
pub mod groups {
    pub const WALL: u32 = 1 << 0;
    pub const GROUND: u32 = 1 << 1;
    pub const ENEMY: u32 = 1 << 2;
    pub const PLAYER: u32 = 1 << 3;
    pub const WEAPON: u32 = 1 << 4;
    pub const DYNAMIC_OBJECT: u32 = 1 << 8;
    pub const PROJECTILE: u32 = 1 << 10;
    pub const ALL: u32 = 0x7fff;
}

/// A membership/filter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionGroups {
    pub membership: u32,
    pub filter: u32,
}

impl CollisionGroups {
    pub const GROUND: Self = Self::new(groups::GROUND, groups::ALL);
    pub const PLAYER: Self = Self::new(
        groups::PLAYER,
        groups::GROUND | groups::WALL | groups::DYNAMIC_OBJECT | groups::ENEMY,
    );
    pub const PLAYER_WEAPON: Self =
        Self::new(groups::WEAPON, groups::ENEMY | groups::DYNAMIC_OBJECT);
    pub const ENEMY: Self = Self::new(
        groups::ENEMY,
        groups::GROUND
            | groups::WALL
            | groups::ENEMY
            | groups::PLAYER
            | groups::WEAPON
            | groups::PROJECTILE
            | groups::DYNAMIC_OBJECT,
    );
    pub const PROJECTILE: Self = Self::new(
        groups::PROJECTILE,
        groups::ENEMY | groups::WALL | groups::GROUND,
    );
    pub const DYNAMIC_OBJECT: Self = Self::new(groups::DYNAMIC_OBJECT, groups::ALL);

    pub const fn new(membership: u32, filter: u32) -> Self {
        Self { membership, filter }
    }

    fn to_rapier(self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.membership),
            Group::from_bits_truncate(self.filter),
        )
    }
}

/// Everything needed to realise an entity's body and collider.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub body_type: BodyType,
    pub shape: ColliderShape,
    pub density: f64,
    pub restitution: f64,
    pub sensor: bool,
    pub ccd: bool,
    pub lock_rotations: bool,
    pub linvel: [f64; 3],
    /// Report contact forces at or above this magnitude. `None` disables
    /// contact-force events for the collider.
    pub contact_force_threshold: Option<f64>,
    pub groups: Option<CollisionGroups>,
}

impl BodyDesc {
    /// A body of the given type and shape with neutral material settings.
    pub fn new(body_type: BodyType, shape: ColliderShape) -> Self {
        Self {
            body_type,
            shape,
            density: 1.0,
            restitution: 0.0,
            sensor: false,
            ccd: false,
            lock_rotations: false,
            linvel: [0.0; 3],
            contact_force_threshold: None,
            groups: None,
        }
    }

    #[must_use]
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    #[must_use]
    pub fn with_linvel(mut self, linvel: [f64; 3]) -> Self {
        self.linvel = linvel;
        self
    }

    #[must_use]
    pub fn with_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    #[must_use]
    pub fn with_ccd(mut self, ccd: bool) -> Self {
        self.ccd = ccd;
        self
    }

    #[must_use]
    pub fn with_locked_rotations(mut self) -> Self {
        self.lock_rotations = true;
        self
    }

    #[must_use]
    pub fn with_contact_force_threshold(mut self, threshold: f64) -> Self {
        self.contact_force_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_groups(mut self, groups: CollisionGroups) -> Self {
        self.groups = Some(groups);
        self
    }
}

// ---------------------------------------------------------------------------
// Drained events
// ---------------------------------------------------------------------------

/// A collision start or stop between two colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionRecord {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
    pub started: bool,
}

/// A contact whose force crossed the collider's reporting threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactForceRecord {
    pub collider1: ColliderHandle,
    pub collider2: ColliderHandle,
    /// Largest force magnitude among the contact points.
    pub force: f64,
}

/// Both event queues drained after one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsEvents {
    pub collisions: Vec<CollisionRecord>,
    pub contact_forces: Vec<ContactForceRecord>,
}

impl PhysicsEvents {
    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty() && self.contact_forces.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

/// Manages rapier3d simulation state.
///
/// The physics world lives outside the entity store because rapier owns its
/// body and collider storage. The entity → body map lets teardown work from
/// an id alone, after the entity itself is gone.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    entity_to_body: HashMap<EntityId, RigidBodyHandle>,
}

impl PhysicsWorld {
    /// Create a world with the given gravity vector.
    pub fn new(gravity: [f64; 3]) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![gravity[0] as Real, gravity[1] as Real, gravity[2] as Real],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            entity_to_body: HashMap::new(),
        }
    }

    /// Create a body and its collider for `entity`.
    ///
    /// Returns `None` if the entity already has a body.
    pub fn register_entity(
        &mut self,
        entity: EntityId,
        position: &Position,
        rotation: &Rotation,
        desc: &BodyDesc,
    ) -> Option<(RigidBodyHandle, ColliderHandle)> {
        if self.entity_to_body.contains_key(&entity) {
            debug!(%entity, "physics body already registered");
            return None;
        }

        let builder = match desc.body_type {
            BodyType::Dynamic => RigidBodyBuilder::dynamic(),
            BodyType::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyType::Fixed => RigidBodyBuilder::fixed(),
        };
        let mut builder = builder
            .position(to_isometry(position, rotation))
            .linvel(to_vector(desc.linvel))
            .ccd_enabled(desc.ccd);
        if desc.lock_rotations {
            builder = builder.lock_rotations();
        }
        let body_handle = self.rigid_body_set.insert(builder.build());

        let shape = match desc.shape {
            ColliderShape::Box { half_extents: [hx, hy, hz] } => {
                SharedShape::cuboid(hx as Real, hy as Real, hz as Real)
            }
            ColliderShape::Sphere { radius } => SharedShape::ball(radius as Real),
            ColliderShape::Capsule {
                half_height,
                radius,
            } => SharedShape::capsule_y(half_height as Real, radius as Real),
        };

        let mut events = ActiveEvents::COLLISION_EVENTS;
        if desc.contact_force_threshold.is_some() {
            events |= ActiveEvents::CONTACT_FORCE_EVENTS;
        }
        let mut collider = ColliderBuilder::new(shape)
            .density(desc.density as Real)
            .restitution(desc.restitution as Real)
            .sensor(desc.sensor)
            .active_events(events)
            .contact_force_event_threshold(desc.contact_force_threshold.unwrap_or(0.0) as Real);
        if let Some(groups) = desc.groups {
            collider = collider.collision_groups(groups.to_rapier());
        }

        let collider_handle = self.collider_set.insert_with_parent(
            collider.build(),
            body_handle,
            &mut self.rigid_body_set,
        );
        self.entity_to_body.insert(entity, body_handle);
        Some((body_handle, collider_handle))
    }

    /// Remove `entity`'s body together with its colliders and joints.
    ///
    /// Returns the handles of the removed colliders so the caller can drop
    /// them from its own maps. Unknown entities yield an empty list.
    pub fn unregister_entity(&mut self, entity: EntityId) -> Vec<ColliderHandle> {
        let Some(body_handle) = self.entity_to_body.remove(&entity) else {
            return Vec::new();
        };
        let colliders = self
            .rigid_body_set
            .get(body_handle)
            .map(|body| body.colliders().to_vec())
            .unwrap_or_default();
        self.rigid_body_set.remove(
            body_handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        colliders
    }

    /// Turn `entity`'s body into a kinematic body whose colliders are all
    /// sensors, so it stops taking part in the simulation.
    pub fn make_inert(&mut self, entity: EntityId) -> bool {
        let Some(body) = self
            .entity_to_body
            .get(&entity)
            .and_then(|handle| self.rigid_body_set.get_mut(*handle))
        else {
            return false;
        };
        body.set_body_type(RigidBodyType::KinematicPositionBased, true);
        for handle in body.colliders().to_vec() {
            if let Some(collider) = self.collider_set.get_mut(handle) {
                collider.set_sensor(true);
            }
        }
        true
    }

    /// Displace `entity`'s body by `delta`. Kinematic bodies get the move as
    /// their next target so they push dynamic bodies on the way.
    pub fn move_body(&mut self, entity: EntityId, delta: [f64; 3]) -> bool {
        let Some(body) = self
            .entity_to_body
            .get(&entity)
            .and_then(|handle| self.rigid_body_set.get_mut(*handle))
        else {
            return false;
        };
        let target = *body.translation() + to_vector(delta);
        if body.is_kinematic() {
            body.set_next_kinematic_translation(target);
        } else {
            body.set_translation(target, true);
        }
        true
    }

    /// Current position and orientation of `entity`'s body.
    pub fn body_pose(&self, entity: EntityId) -> Option<(Position, Rotation)> {
        let body = self.rigid_body_set.get(*self.entity_to_body.get(&entity)?)?;
        let t = body.translation();
        let q = &body.rotation().coords;
        Some((
            Position::new(t.x as f64, t.y as f64, t.z as f64),
            Rotation {
                x: q[0] as f64,
                y: q[1] as f64,
                z: q[2] as f64,
                w: q[3] as f64,
            },
        ))
    }

    /// Body type of `entity`'s body.
    pub fn body_type(&self, entity: EntityId) -> Option<RigidBodyType> {
        let body = self.rigid_body_set.get(*self.entity_to_body.get(&entity)?)?;
        Some(body.body_type())
    }

    /// Whether `collider` is a sensor.
    pub fn is_sensor(&self, collider: ColliderHandle) -> Option<bool> {
        self.collider_set.get(collider).map(Collider::is_sensor)
    }

    /// Join the bodies of two entities with a revolute joint.
    ///
    /// Anchors are in each body's local frame. A zero axis falls back to the
    /// vertical axis.
    pub fn add_revolute_joint(
        &mut self,
        first: EntityId,
        second: EntityId,
        anchor1: [f64; 3],
        anchor2: [f64; 3],
        axis: [f64; 3],
    ) -> Option<ImpulseJointHandle> {
        let body1 = *self.entity_to_body.get(&first)?;
        let body2 = *self.entity_to_body.get(&second)?;
        let axis = if axis.iter().all(|c| *c == 0.0) {
            warn!(%first, %second, "joint axis is zero, using the vertical axis");
            [0.0, 1.0, 0.0]
        } else {
            axis
        };
        let joint = RevoluteJointBuilder::new(Unit::new_normalize(to_vector(axis)))
            .local_anchor1(to_point(anchor1))
            .local_anchor2(to_point(anchor2))
            .build();
        Some(self.impulse_joint_set.insert(body1, body2, joint, true))
    }

    /// Remove a joint. Joints attached to a removed body are already gone.
    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) -> bool {
        self.impulse_joint_set.remove(handle, true).is_some()
    }

    /// Cast a ray against every collider, returning the first hit and its
    /// distance along `direction`.
    pub fn cast_ray(
        &self,
        origin: [f64; 3],
        direction: [f64; 3],
        max_distance: f64,
    ) -> Option<(ColliderHandle, f64)> {
        let ray = Ray::new(to_point(origin), to_vector(direction));
        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance as Real,
                true,
                QueryFilter::default(),
            )
            .map(|(handle, toi)| (handle, toi as f64))
    }

    /// Step the simulation by `dt` seconds and drain both event queues.
    pub fn step(&mut self, dt: f64) -> PhysicsEvents {
        self.integration_params.dt = dt as Real;

        let (collision_send, collision_recv) =
            rapier3d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, force_recv) =
            rapier3d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &event_handler,
        );

        let mut events = PhysicsEvents::default();
        while let Ok(event) = collision_recv.try_recv() {
            events.collisions.push(CollisionRecord {
                collider1: event.collider1(),
                collider2: event.collider2(),
                started: event.started(),
            });
        }
        while let Ok(event) = force_recv.try_recv() {
            events.contact_forces.push(ContactForceRecord {
                collider1: event.collider1,
                collider2: event.collider2,
                force: event.max_force_magnitude as f64,
            });
        }
        events
    }

    // -- accessors ----------------------------------------------------------

    /// Whether `entity` has a body.
    pub fn has_entity(&self, entity: EntityId) -> bool {
        self.entity_to_body.contains_key(&entity)
    }

    /// Body handle of `entity`.
    pub fn body_handle(&self, entity: EntityId) -> Option<RigidBodyHandle> {
        self.entity_to_body.get(&entity).copied()
    }

    /// Number of bodies in the world.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Number of colliders in the world.
    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Number of impulse joints in the world.
    pub fn joint_count(&self) -> usize {
        self.impulse_joint_set.len()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.rigid_body_set.len())
            .field("colliders", &self.collider_set.len())
            .field("joints", &self.impulse_joint_set.len())
            .finish()
    }
}

fn to_vector(v: [f64; 3]) -> Vector<Real> {
    vector![v[0] as Real, v[1] as Real, v[2] as Real]
}

fn to_point(v: [f64; 3]) -> Point<Real> {
    point![v[0] as Real, v[1] as Real, v[2] as Real]
}

fn to_isometry(position: &Position, rotation: &Rotation) -> Isometry<Real> {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w as Real,
        rotation.x as Real,
        rotation.y as Real,
        rotation.z as Real,
    ));
    Isometry::from_parts(
        to_vector([position.x, position.y, position.z]).into(),
        rotation,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Game events carried over the context's [`EventBus`](grimwood_ecs::event::EventBus).
//!
//! Every event is a [`GameEvent`] variant; listeners subscribe to an
//! [`EventKind`]. Payloads are plain data and cheap to clone, because a
//! system that is busy when an event arrives receives a copy later.

use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Event;

use crate::audio::Sound;
use crate::components::Position;
use crate::state::{EnemyEvent, EnemyState, PlayerActionState, PlayerEvent, PlayerMovementState};

/// Everything that can be emitted during a session.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// An entity was registered with the context.
    EntityAdded(EntityId),
    /// A registered entity gained or lost components.
    EntityUpdated(EntityId),
    /// An entity was unregistered.
    EntityRemoved(EntityId),
    /// One fixed step of simulation time elapsed.
    TimeTick { tick: u64 },

    /// Request to feed `event` to an enemy's state machine.
    EnemyStateTransition { entity: EntityId, event: EnemyEvent },
    EnemyStateUpdated {
        entity: EntityId,
        previous: EnemyState,
        current: EnemyState,
    },
    /// Request to feed `event` to the player's movement machine.
    PlayerMovementStateTransition { entity: EntityId, event: PlayerEvent },
    PlayerStateUpdated {
        entity: EntityId,
        movement: PlayerMovementState,
        action: PlayerActionState,
    },
    WeaponShot { entity: EntityId },
    WeaponReload { entity: EntityId },
    /// A non-looping animation clip reached its end.
    AnimationFinished { entity: EntityId, clip: &'static str },
    PlayerPositionUpdated { position: Position },

    PlaySound {
        entity: EntityId,
        sound: Sound,
        looped: bool,
    },
    StopSound { entity: EntityId, sound: Sound },
}

/// Discriminant of [`GameEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    EntityAdded,
    EntityUpdated,
    EntityRemoved,
    TimeTick,
    EnemyStateTransition,
    EnemyStateUpdated,
    PlayerMovementStateTransition,
    PlayerStateUpdated,
    WeaponShot,
    WeaponReload,
    AnimationFinished,
    PlayerPositionUpdated,
    PlaySound,
    StopSound,
}

impl Event for GameEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            GameEvent::EntityAdded(_) => EventKind::EntityAdded,
            GameEvent::EntityUpdated(_) => EventKind::EntityUpdated,
            GameEvent::EntityRemoved(_) => EventKind::EntityRemoved,
            GameEvent::TimeTick { .. } => EventKind::TimeTick,
            GameEvent::EnemyStateTransition { .. } => EventKind::EnemyStateTransition,
            GameEvent::EnemyStateUpdated { .. } => EventKind::EnemyStateUpdated,
            GameEvent::PlayerMovementStateTransition { .. } => {
                EventKind::PlayerMovementStateTransition
            }
            GameEvent::PlayerStateUpdated { .. } => EventKind::PlayerStateUpdated,
            GameEvent::WeaponShot { .. } => EventKind::WeaponShot,
            GameEvent::WeaponReload { .. } => EventKind::WeaponReload,
            GameEvent::AnimationFinished { .. } => EventKind::AnimationFinished,
            GameEvent::PlayerPositionUpdated { .. } => EventKind::PlayerPositionUpdated,
            GameEvent::PlaySound { .. } => EventKind::PlaySound,
            GameEvent::StopSound { .. } => EventKind::StopSound,
        }
    }
}

impl GameEvent {
    /// The entity the event is about, if it names one.
    pub fn entity(&self) -> Option<EntityId> {
        match *self {
            GameEvent::EntityAdded(entity)
            | GameEvent::EntityUpdated(entity)
            | GameEvent::EntityRemoved(entity)
            | GameEvent::EnemyStateTransition { entity, .. }
            | GameEvent::EnemyStateUpdated { entity, .. }
            | GameEvent::PlayerMovementStateTransition { entity, .. }
            | GameEvent::PlayerStateUpdated { entity, .. }
            | GameEvent::WeaponShot { entity }
            | GameEvent::WeaponReload { entity }
            | GameEvent::AnimationFinished { entity, .. }
            | GameEvent::PlaySound { entity, .. }
            | GameEvent::StopSound { entity, .. } => Some(entity),
            GameEvent::TimeTick { .. } | GameEvent::PlayerPositionUpdated { .. } => None,
        }
    }
}

//! Grimwood ECS -- entities, typed components, events and the fixed-step clock.
//!
//! This crate holds the game-agnostic half of the Grimwood core:
//!
//! - [`entity`]: generational [`EntityId`](entity::EntityId)s, the
//!   [`Entity`](entity::Entity) component bag and the
//!   [`EntityManager`](entity::EntityManager) that owns registered entities.
//! - [`component`]: the [`Component`](component::Component) trait and its
//!   compile-time [`ComponentKind`](component::ComponentKind) tag.
//! - [`event`]: the subscription registry and the depth-first
//!   [`Dispatcher`](event::Dispatcher).
//! - [`time`]: the fixed-timestep [`TimeManager`](time::TimeManager).
//!
//! The game crate supplies the concrete component kinds and events, and a
//! context type that ties them together.
//!
//! # Quick Start
//!
//! ```
//! use grimwood_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
//! enum Kind { Position, Velocity }
//! impl ComponentKind for Kind {}
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: f32, y: f32 }
//! impl Component for Position { type Kind = Kind; const KIND: Kind = Kind::Position; }
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//! impl Component for Velocity { type Kind = Kind; const KIND: Kind = Kind::Velocity; }
//!
//! let mut entities = EntityManager::new();
//! let mut entity = entities.create_entity();
//! entity.add_components(
//!     ComponentBundle::new()
//!         .with(Position { x: 0.0, y: 0.0 })
//!         .with(Velocity { dx: 1.0, dy: 0.0 }),
//! );
//! let id = entities.insert(entity).unwrap();
//!
//! assert_eq!(entities.component::<Position>(id), Some(&Position { x: 0.0, y: 0.0 }));
//! assert_eq!(entities.ids_with(&[Kind::Position, Kind::Velocity]), vec![id]);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod event;
pub mod time;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by entity bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// The entity is already registered.
    #[error("entity {entity:?} is already added")]
    AlreadyAdded { entity: entity::EntityId },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentBundle, ComponentKind};
    pub use crate::entity::{Entity, EntityAllocator, EntityId, EntityManager};
    pub use crate::event::{Dispatcher, Event, EventBus, SubscriptionId};
    pub use crate::time::{
        TimeConfig, TimeManager, FIXED_TIMESTEP, MAX_FRAME_DELTA, MAX_UPDATES_PER_FRAME,
    };
    pub use crate::EcsError;
}

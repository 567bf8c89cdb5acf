//! Engine error type.

use std::path::PathBuf;

use grimwood_ecs::entity::EntityId;
use grimwood_ecs::EcsError;

use crate::components::ComponentKind;

/// Errors surfaced by the game layer.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: &'static str },

    #[error("unsupported collider shape {0:?}")]
    UnsupportedShape(String),

    #[error("unsupported joint kind {0:?}")]
    UnsupportedJoint(String),

    #[error("entity {entity} has no {kind:?} component")]
    MissingComponent {
        entity: EntityId,
        kind: ComponentKind,
    },

    #[error("no player entity is registered")]
    NoPlayer,

    #[error("could not create a physics body for entity {entity}")]
    PhysicsRegistration { entity: EntityId },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Error returned by [`System::update`](crate::system::System::update).
pub type SystemError = GameError;

impl GameError {
    /// Shorthand for [`GameError::MissingComponent`].
    pub fn missing(entity: EntityId, kind: ComponentKind) -> Self {
        GameError::MissingComponent { entity, kind }
    }
}

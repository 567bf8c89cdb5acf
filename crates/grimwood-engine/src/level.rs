//! Level definitions.
//!
//! A level file is JSON, either a bare array of items or an object with
//! `items` and `joints`:
//!
//! ```json
//! {
//!   "items": [
//!     { "model": "models/gate.glb", "name": "post", "position": [0, 0, 0],
//!       "collider": { "type": "box", "half_extents": [0.1, 1, 0.1] } },
//!     { "model": "models/gate.glb", "name": "door", "position": [1, 0, 0],
//!       "collider": { "type": "box", "half_extents": [1, 1, 0.05] },
//!       "body": "dynamic" }
//!   ],
//!   "joints": [
//!     { "kind": "revolute", "first": "post", "second": "door",
//!       "anchor1": [0, 0, 0], "anchor2": [-1, 0, 0], "axis": [0, 1, 0] }
//!   ]
//! }
//! ```
//!
//! Items or joints that cannot be used (unknown collider shape, unsupported
//! joint kind, malformed fields) are logged and skipped; the rest of the
//! level still loads.

use std::collections::HashMap;
use std::path::Path;

use grimwood_ecs::entity::EntityId;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::components::{ComponentBundle, Joint, JointKind, Mesh, PhysicsBody, Position, Rotation};
use crate::context::GameContext;
use crate::error::GameError;
use crate::physics::{BodyDesc, BodyType, ColliderShape};

const SUPPORTED_SHAPES: &[&str] = &["box", "sphere", "capsule"];

/// One placed model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelItem {
    pub model: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rotation: Option<[f64; 4]>,
    #[serde(default)]
    pub collider: Option<ColliderShape>,
    /// Body type for the collider. Defaults to fixed.
    #[serde(default)]
    pub body: Option<BodyType>,
}

/// A joint between two named items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointDef {
    pub kind: JointKind,
    pub first: String,
    pub second: String,
    #[serde(default)]
    pub anchor1: [f64; 3],
    #[serde(default)]
    pub anchor2: [f64; 3],
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
}

fn default_axis() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Items(Vec<Value>),
    Sections {
        #[serde(default)]
        items: Vec<Value>,
        #[serde(default)]
        joints: Vec<Value>,
    },
}

/// A parsed level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Level {
    pub items: Vec<LevelItem>,
    pub joints: Vec<JointDef>,
    /// Entries dropped while parsing.
    pub skipped: usize,
}

/// Entities created by [`Level::spawn`].
#[derive(Debug, Clone, Default)]
pub struct SpawnedLevel {
    pub items: Vec<EntityId>,
    pub joints: Vec<EntityId>,
    pub named: HashMap<String, EntityId>,
    /// Model paths whose load the caller has to start.
    pub models_to_load: Vec<String>,
}

impl Level {
    /// Parse a level document.
    ///
    /// Only a document that is not JSON, or whose top level is neither an
    /// array nor an object, is an error.
    pub fn from_json_str(json: &str) -> Result<Self, GameError> {
        let (raw_items, raw_joints) = match serde_json::from_str::<RawLevel>(json)? {
            RawLevel::Items(items) => (items, Vec::new()),
            RawLevel::Sections { items, joints } => (items, joints),
        };

        let mut level = Level::default();
        for (index, value) in raw_items.into_iter().enumerate() {
            match parse_item(value) {
                Ok(item) => level.items.push(item),
                Err(err) => {
                    warn!(index, error = %err, "level item skipped");
                    level.skipped += 1;
                }
            }
        }
        for (index, value) in raw_joints.into_iter().enumerate() {
            match parse_joint(value) {
                Ok(joint) => level.joints.push(joint),
                Err(err) => {
                    warn!(index, error = %err, "level joint skipped");
                    level.skipped += 1;
                }
            }
        }
        Ok(level)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Create the level's entities in `ctx`.
    ///
    /// Items are added first so that joints find their bodies. A joint that
    /// names an unknown item is skipped.
    pub fn spawn(&self, ctx: &mut GameContext) -> Result<SpawnedLevel, GameError> {
        let mut spawned = SpawnedLevel::default();

        for item in &self.items {
            let id = ctx.spawn(item_bundle(item))?;
            if ctx.request_model(id, &item.model) {
                spawned.models_to_load.push(item.model.clone());
            }
            if let Some(name) = &item.name {
                if spawned.named.insert(name.clone(), id).is_some() {
                    warn!(name = name.as_str(), "duplicate item name, joints will use the last one");
                }
            }
            spawned.items.push(id);
        }

        for def in &self.joints {
            let (Some(&first), Some(&second)) = (spawned.named.get(&def.first), spawned.named.get(&def.second)) else {
                warn!(first = %def.first, second = %def.second, "joint references an unknown item, skipped");
                continue;
            };
            let joint = Joint {
                kind: def.kind,
                first,
                second,
                anchor1: def.anchor1,
                anchor2: def.anchor2,
                axis: def.axis,
                handle: None,
            };
            spawned.joints.push(ctx.spawn(ComponentBundle::new().with(joint))?);
        }

        info!(
            items = spawned.items.len(),
            joints = spawned.joints.len(),
            skipped = self.skipped,
            "level spawned"
        );
        Ok(spawned)
    }
}

fn parse_item(value: Value) -> Result<LevelItem, GameError> {
    if let Some(shape) = value.pointer("/collider/type").and_then(Value::as_str) {
        if !SUPPORTED_SHAPES.contains(&shape) {
            return Err(GameError::UnsupportedShape(shape.to_owned()));
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn parse_joint(value: Value) -> Result<JointDef, GameError> {
    if let Some(kind) = value.get("kind").and_then(Value::as_str) {
        if kind != "revolute" {
            return Err(GameError::UnsupportedJoint(kind.to_owned()));
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn item_bundle(item: &LevelItem) -> ComponentBundle {
    let mut mesh = Mesh::new(item.model.clone());
    mesh.name = item.name.clone();
    mesh.scale = item.scale.unwrap_or(1.0);

    let mut bundle = ComponentBundle::new()
        .with(mesh)
        .with(Position::from(item.position))
        .with(item.rotation.map(Rotation::from).unwrap_or_default());
    if let Some(shape) = &item.collider {
        let body_type = item.body.unwrap_or(BodyType::Fixed);
        bundle.add(PhysicsBody::new(BodyDesc::new(body_type, shape.clone())));
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn bare_array_is_accepted() {
        let level = Level::from_json_str(r#"[{ "model": "a.glb", "position": [1, 2, 3], "scale": 2 }]"#).unwrap();
        assert_eq!(level.items.len(), 1);
        assert_eq!(level.items[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(level.items[0].scale, Some(2.0));
        assert!(level.joints.is_empty());
    }

    #[test]
    fn unsupported_entries_are_skipped() {
        let level = Level::from_json_str(
            r#"{
                "items": [
                    { "model": "a.glb", "position": [0, 0, 0], "collider": { "type": "trimesh" } },
                    { "model": "b.glb", "position": [0, 0, 0], "collider": { "type": "sphere", "radius": 1 } },
                    { "position": [0, 0, 0] }
                ],
                "joints": [
                    { "kind": "fixed", "first": "x", "second": "y" },
                    { "kind": "revolute", "first": "x", "second": "y" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(level.items.len(), 1);
        assert_eq!(level.items[0].collider, Some(ColliderShape::Sphere { radius: 1.0 }));
        assert_eq!(level.joints.len(), 1);
        assert_eq!(level.joints[0].axis, [0.0, 1.0, 0.0]);
        assert_eq!(level.skipped, 3);
    }

    #[test]
    fn unsupported_shape_error_names_the_shape() {
        let value = serde_json::json!({ "model": "a", "position": [0, 0, 0], "collider": { "type": "cone" } });
        assert!(matches!(parse_item(value), Err(GameError::UnsupportedShape(shape)) if shape == "cone"));
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(Level::from_json_str("not json").is_err());
        assert!(Level::from_json_str("42").is_err());
    }

    #[test]
    fn spawn_creates_components_and_resolves_joints() {
        let level = Level::from_json_str(
            r#"{
                "items": [
                    { "model": "gate.glb", "name": "post", "position": [0, 0, 0] },
                    { "model": "gate.glb", "name": "door", "position": [1, 0, 0],
                      "rotation": [0, 0, 0, 1], "collider": { "type": "box", "half_extents": [1, 1, 0.1] },
                      "body": "dynamic" }
                ],
                "joints": [
                    { "kind": "revolute", "first": "post", "second": "door" },
                    { "kind": "revolute", "first": "post", "second": "missing" }
                ]
            }"#,
        )
        .unwrap();
        let mut ctx = GameContext::new(GameConfig::default());
        let spawned = level.spawn(&mut ctx).unwrap();

        assert_eq!(spawned.items.len(), 2);
        assert_eq!(spawned.joints.len(), 1);
        // The second item reuses the model already requested by the first.
        assert_eq!(spawned.models_to_load, vec!["gate.glb".to_owned()]);

        let door = spawned.named["door"];
        let body = ctx.component::<PhysicsBody>(door).unwrap();
        assert_eq!(body.desc.body_type, BodyType::Dynamic);
        assert_eq!(ctx.component::<Mesh>(door).unwrap().name.as_deref(), Some("door"));
        assert!(ctx.component::<PhysicsBody>(spawned.named["post"]).is_none());

        let joint = ctx.component::<Joint>(spawned.joints[0]).unwrap();
        assert_eq!((joint.first, joint.second), (spawned.named["post"], door));
    }
}

//! Request deduplication for externally loaded assets.
//!
//! Loading itself happens outside the engine. The cache only remembers what
//! was asked for, who is waiting on it, and how each load ended, so the same
//! path is never loaded twice and late completions find their entities.

use std::collections::HashMap;

use grimwood_ecs::entity::EntityId;
use tracing::trace;

use crate::components::VisualHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Model,
    Texture,
    Audio,
}

/// What a caller should do after [`AssetCache::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Already loaded.
    Ready(VisualHandle),
    /// Loaded before and failed; do not retry.
    Failed,
    /// Someone else started this load; the entity was queued.
    Waiting,
    /// First request for this path: start the load.
    Load,
}

type Key = (AssetKind, String);

#[derive(Debug, Default)]
pub struct AssetCache {
    resolved: HashMap<Key, Option<VisualHandle>>,
    in_flight: HashMap<Key, Vec<EntityId>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `entity` wants `path`.
    pub fn request(&mut self, kind: AssetKind, path: &str, entity: EntityId) -> Request {
        let key = (kind, path.to_owned());
        match self.resolved.get(&key) {
            Some(Some(handle)) => return Request::Ready(*handle),
            Some(None) => return Request::Failed,
            None => {}
        }
        match self.in_flight.get_mut(&key) {
            Some(waiting) => {
                waiting.push(entity);
                Request::Waiting
            }
            None => {
                trace!(?kind, path, "asset load started");
                self.in_flight.insert(key, vec![entity]);
                Request::Load
            }
        }
    }

    /// Store the outcome of a load and return the entities that waited for
    /// it, in request order.
    pub fn complete(&mut self, kind: AssetKind, path: &str, result: Option<VisualHandle>) -> Vec<EntityId> {
        let key = (kind, path.to_owned());
        let waiting = self.in_flight.remove(&key).unwrap_or_default();
        self.resolved.insert(key, result);
        waiting
    }

    /// The stored outcome for `path`, if its load finished.
    pub fn get(&self, kind: AssetKind, path: &str) -> Option<Option<VisualHandle>> {
        self.resolved.get(&(kind, path.to_owned())).copied()
    }

    pub fn is_loading(&self, kind: AssetKind, path: &str) -> bool {
        self.in_flight.contains_key(&(kind, path.to_owned()))
    }

    /// Paths currently loading.
    pub fn pending(&self) -> Vec<(AssetKind, String)> {
        let mut keys: Vec<_> = self.in_flight.keys().cloned().collect();
        keys.sort();
        keys
    }
}

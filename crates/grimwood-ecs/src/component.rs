//! Component typing.
//!
//! Every component type carries a compile-time tag drawn from a game-defined
//! [`ComponentKind`] enum. The tag, not the Rust type name, is the storage key
//! inside an [`Entity`](crate::entity::Entity), so lookups are typed and two
//! structurally identical components of different types never collide.

use std::any::Any;
use std::fmt;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// ComponentKind / Component
// ---------------------------------------------------------------------------

/// The closed set of component tags a game defines.
///
/// Implemented by a plain fieldless enum. Ordering is used for deterministic
/// iteration over an entity's components.
pub trait ComponentKind: Copy + Eq + Ord + Hash + fmt::Debug + 'static {}

/// A plain data record that can be attached to an entity.
///
/// # Example
///
/// ```
/// use grimwood_ecs::prelude::*;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// enum Kind { Health }
/// impl ComponentKind for Kind {}
///
/// #[derive(Debug)]
/// struct Health(u32);
/// impl Component for Health {
///     type Kind = Kind;
///     const KIND: Kind = Kind::Health;
/// }
///
/// let mut entities = EntityManager::<Kind>::new();
/// let mut entity = entities.create_entity();
/// entity.add_component(Health(100));
/// assert_eq!(entity.get_component::<Health>().map(|h| h.0), Some(100));
/// ```
pub trait Component: Any + fmt::Debug {
    /// The tag enum this component belongs to.
    type Kind: ComponentKind;
    /// This component's tag.
    const KIND: Self::Kind;
}

// ---------------------------------------------------------------------------
// ComponentBundle
// ---------------------------------------------------------------------------

/// A heterogeneous batch of components attached in one step.
///
/// Attaching a bundle to a registered entity produces a single update
/// notification no matter how many components it carries.
pub struct ComponentBundle<K: ComponentKind> {
    pub(crate) components: Vec<(K, Box<dyn Any>)>,
}

impl<K: ComponentKind> ComponentBundle<K> {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Append a component (builder style).
    #[must_use]
    pub fn with<T: Component<Kind = K>>(mut self, component: T) -> Self {
        self.add(component);
        self
    }

    /// Append a component.
    pub fn add<T: Component<Kind = K>>(&mut self, component: T) -> &mut Self {
        self.components.push((T::KIND, Box::new(component)));
        self
    }

    /// Number of components in the bundle.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The tags carried by this bundle, in insertion order.
    pub fn kinds(&self) -> Vec<K> {
        self.components.iter().map(|(kind, _)| *kind).collect()
    }
}

impl<K: ComponentKind> Default for ComponentBundle<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ComponentKind> fmt::Debug for ComponentBundle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBundle")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    enum Kind {
        Position,
        Velocity,
    }
    impl ComponentKind for Kind {}

    #[derive(Debug)]
    struct Position(f32);
    impl Component for Position {
        type Kind = Kind;
        const KIND: Kind = Kind::Position;
    }

    #[derive(Debug)]
    struct Velocity(f32);
    impl Component for Velocity {
        type Kind = Kind;
        const KIND: Kind = Kind::Velocity;
    }

    #[test]
    fn bundle_records_kinds_in_insertion_order() {
        let bundle = ComponentBundle::new()
            .with(Velocity(1.0))
            .with(Position(0.0));
        assert_eq!(bundle.kinds(), vec![Kind::Velocity, Kind::Position]);
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn empty_bundle() {
        let bundle: ComponentBundle<Kind> = ComponentBundle::default();
        assert!(bundle.is_empty());
        assert_eq!(format!("{bundle:?}"), "ComponentBundle { kinds: [] }");
    }
}

//! Synchronous publish/subscribe.
//!
//! The [`EventBus`] is only a registry: it records which listener is
//! subscribed to which event kind, in subscription order. Delivery is done by
//! the owner of the bus through [`Dispatcher`], because listeners need mutable
//! access to the whole game context while they run.
//!
//! Delivery is synchronous and depth-first. A listener that emits while it is
//! being called runs the nested dispatch to completion before the outer
//! dispatch moves on to its next listener.

use std::fmt;
use std::hash::Hash;

use tracing::trace;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A message that can travel over an [`EventBus`].
pub trait Event: fmt::Debug {
    /// The discriminant listeners subscribe to.
    type Kind: Copy + Eq + Hash + fmt::Debug;

    /// This event's kind.
    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscription<K, L> {
    id: SubscriptionId,
    kind: K,
    listener: L,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Listener registry keyed by event kind.
///
/// `L` is whatever the owner uses to address a listener (a system index, a
/// closure slot, ...). It must be `Copy` so a dispatch can take a snapshot.
#[derive(Debug)]
pub struct EventBus<K, L> {
    subscriptions: Vec<Subscription<K, L>>,
    next_id: u64,
}

impl<K: Copy + Eq + fmt::Debug, L: Copy> EventBus<K, L> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 0,
        }
    }

    /// Subscribe `listener` to events of `kind`.
    pub fn on(&mut self, kind: K, listener: L) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, kind, listener });
        trace!(?kind, subscription = id.0, "listener subscribed");
        id
    }

    /// Remove a subscription. Returns `false` if it was not present.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Whether `id` is still subscribed.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    /// Snapshot of the listeners for `kind`, in subscription order.
    pub fn listeners(&self, kind: K) -> Vec<(SubscriptionId, L)> {
        self.subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, s.listener))
            .collect()
    }

    /// Number of listeners for `kind`.
    pub fn listener_count(&self, kind: K) -> usize {
        self.subscriptions.iter().filter(|s| s.kind == kind).count()
    }

    /// Total number of subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl<K: Copy + Eq + fmt::Debug, L: Copy> Default for EventBus<K, L> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Owner of an [`EventBus`] that knows how to call its listeners.
pub trait Dispatcher {
    /// Event type carried by the bus.
    type Event: Event;
    /// Listener address stored in the bus.
    type Listener: Copy;

    /// The bus to read subscriptions from.
    fn event_bus(&self) -> &EventBus<<Self::Event as Event>::Kind, Self::Listener>;

    /// Invoke one listener.
    fn deliver(&mut self, listener: Self::Listener, event: &Self::Event);

    /// Deliver `event` to every listener of its kind, in subscription order.
    ///
    /// Listeners are snapshotted when the dispatch starts. A listener removed
    /// by an earlier listener of the same dispatch is skipped; one added
    /// during the dispatch only sees later events.
    fn emit(&mut self, event: Self::Event) {
        let kind = event.kind();
        let listeners = self.event_bus().listeners(kind);
        trace!(?kind, listeners = listeners.len(), "emit");
        for (id, listener) in listeners {
            if self.event_bus().is_subscribed(id) {
                self.deliver(listener, &event);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

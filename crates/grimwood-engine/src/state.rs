//! Data-driven finite state machines.
//!
//! A [`StateMachine`] is the current state plus a [`TransitionTable`] of
//! `(state, event) -> next state` entries. Transitions are pure: they return
//! a [`TransitionResult`] and never fire side effects. The state machine
//! systems inspect the result to decide which sounds or follow-up events to
//! emit.
//!
//! A missing table entry and an entry that points back at the current state
//! are both no-ops (`changed == false`).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::components::component;

// ---------------------------------------------------------------------------
// Generic machinery
// ---------------------------------------------------------------------------

/// Outcome of one transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionResult<S> {
    pub previous: S,
    pub current: S,
    pub changed: bool,
}

impl<S: Copy + PartialEq> TransitionResult<S> {
    /// A result that leaves `state` in place.
    pub fn unchanged(state: S) -> Self {
        Self {
            previous: state,
            current: state,
            changed: false,
        }
    }

    /// Whether this transition moved into `state`.
    pub fn entered(&self, state: S) -> bool {
        self.changed && self.current == state
    }
}

/// `(state, event) -> next state` lookup.
#[derive(Clone)]
pub struct TransitionTable<S, E> {
    entries: HashMap<(S, E), S>,
}

impl<S, E> TransitionTable<S, E>
where
    S: Copy + Eq + Hash,
    E: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add an entry (builder style).
    #[must_use]
    pub fn with(mut self, from: S, event: E, to: S) -> Self {
        self.entries.insert((from, event), to);
        self
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, from: S, event: E, to: S) {
        self.entries.insert((from, event), to);
    }

    /// Destination for `event` in `from`, if any.
    pub fn next(&self, from: S, event: E) -> Option<S> {
        self.entries.get(&(from, event)).copied()
    }

    /// Resolve `event` from `from` without mutating anything.
    pub fn resolve(&self, from: S, event: E) -> TransitionResult<S> {
        match self.next(from, event) {
            Some(to) if to != from => TransitionResult {
                previous: from,
                current: to,
                changed: true,
            },
            _ => TransitionResult::unchanged(from),
        }
    }

    /// Whether any entry leaves `state`.
    pub fn has_outgoing(&self, state: S) -> bool {
        self.entries.keys().any(|(from, _)| *from == state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S, E> Default for TransitionTable<S, E>
where
    S: Copy + Eq + Hash,
    E: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, E> PartialEq for TransitionTable<S, E>
where
    S: Eq + Hash,
    E: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<S: Eq + Hash, E: Eq + Hash> Eq for TransitionTable<S, E> {}

impl<S, E> fmt::Debug for TransitionTable<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Current state plus its transition table.
#[derive(Debug, Clone)]
pub struct StateMachine<S, E> {
    current: S,
    table: TransitionTable<S, E>,
}

impl<S, E> PartialEq for StateMachine<S, E>
where
    S: Eq + Hash,
    E: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current && self.table == other.table
    }
}

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash,
    E: Copy + Eq + Hash,
{
    pub fn new(initial: S, table: TransitionTable<S, E>) -> Self {
        Self {
            current: initial,
            table,
        }
    }

    pub fn current(&self) -> S {
        self.current
    }

    pub fn table(&self) -> &TransitionTable<S, E> {
        &self.table
    }

    /// Apply `event`, updating the current state only when the table says it
    /// changes.
    pub fn transition(&mut self, event: E) -> TransitionResult<S> {
        let result = self.table.resolve(self.current, event);
        if result.changed {
            self.current = result.current;
        }
        result
    }

    /// Whether the current state has no way out.
    pub fn is_terminal(&self) -> bool {
        !self.table.has_outgoing(self.current)
    }
}

// ---------------------------------------------------------------------------
// Enemy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyState {
    Idle,
    ChaseWalk,
    ChaseRun,
    Damaged,
    Dying,
    Dead,
    Scream,
    StandUp,
    Attack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyEvent {
    SeePlayer,
    Die,
    TakeDamage,
    Finished,
    StartAttack,
}

/// The enemy behaviour table.
pub fn enemy_transitions() -> TransitionTable<EnemyState, EnemyEvent> {
    use EnemyEvent as E;
    use EnemyState as S;
    TransitionTable::new()
        .with(S::Idle, E::TakeDamage, S::Damaged)
        .with(S::Idle, E::Die, S::Dying)
        .with(S::Idle, E::Finished, S::ChaseWalk)
        .with(S::Idle, E::StartAttack, S::Attack)
        .with(S::ChaseWalk, E::TakeDamage, S::Damaged)
        .with(S::ChaseWalk, E::Die, S::Dying)
        .with(S::ChaseWalk, E::StartAttack, S::Attack)
        .with(S::ChaseRun, E::TakeDamage, S::Damaged)
        .with(S::ChaseRun, E::Die, S::Dying)
        .with(S::ChaseRun, E::StartAttack, S::Attack)
        .with(S::Attack, E::TakeDamage, S::Damaged)
        .with(S::Attack, E::Die, S::Dying)
        .with(S::Attack, E::Finished, S::ChaseWalk)
        .with(S::Damaged, E::Die, S::Dying)
        .with(S::Damaged, E::Finished, S::Scream)
        .with(S::Scream, E::Die, S::Dying)
        .with(S::Scream, E::Finished, S::ChaseRun)
        .with(S::StandUp, E::Die, S::Dying)
        .with(S::StandUp, E::Finished, S::ChaseWalk)
        .with(S::Dying, E::Finished, S::Dead)
}

/// Behaviour state of an enemy.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyStateComponent {
    pub machine: StateMachine<EnemyState, EnemyEvent>,
}

impl EnemyStateComponent {
    /// An enemy starting in `initial` with the standard table.
    pub fn new(initial: EnemyState) -> Self {
        Self::with_table(initial, enemy_transitions())
    }

    pub fn with_table(initial: EnemyState, table: TransitionTable<EnemyState, EnemyEvent>) -> Self {
        Self {
            machine: StateMachine::new(initial, table),
        }
    }

    pub fn current(&self) -> EnemyState {
        self.machine.current()
    }

    /// Whether the enemy is dying or dead.
    pub fn is_down(&self) -> bool {
        matches!(self.current(), EnemyState::Dying | EnemyState::Dead)
    }
}

component!(EnemyStateComponent => EnemyState);

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerMovementState {
    Idle,
    Walk,
    Run,
    Airborne,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerActionState {
    Ready,
    Shoot,
    Reload,
}

/// Events driving both player machines. Each machine ignores the events its
/// table has no entry for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerEvent {
    Move,
    Run,
    Stop,
    InAir,
    Land,
    Dying,
    Shoot,
    Reload,
    Finished,
}

/// The player locomotion table. `Dead` has no way out.
pub fn player_movement_transitions() -> TransitionTable<PlayerMovementState, PlayerEvent> {
    use PlayerEvent as E;
    use PlayerMovementState as S;
    TransitionTable::new()
        .with(S::Idle, E::Move, S::Walk)
        .with(S::Idle, E::Run, S::Run)
        .with(S::Idle, E::InAir, S::Airborne)
        .with(S::Idle, E::Dying, S::Dead)
        .with(S::Walk, E::Stop, S::Idle)
        .with(S::Walk, E::Run, S::Run)
        .with(S::Walk, E::InAir, S::Airborne)
        .with(S::Walk, E::Dying, S::Dead)
        .with(S::Run, E::Stop, S::Idle)
        .with(S::Run, E::Move, S::Walk)
        .with(S::Run, E::InAir, S::Airborne)
        .with(S::Run, E::Dying, S::Dead)
        .with(S::Airborne, E::Land, S::Idle)
        .with(S::Airborne, E::Dying, S::Dead)
}

/// The player weapon table.
pub fn player_action_transitions() -> TransitionTable<PlayerActionState, PlayerEvent> {
    use PlayerActionState as S;
    use PlayerEvent as E;
    TransitionTable::new()
        .with(S::Ready, E::Shoot, S::Shoot)
        .with(S::Ready, E::Reload, S::Reload)
        .with(S::Shoot, E::Finished, S::Ready)
        .with(S::Reload, E::Finished, S::Ready)
}

/// Locomotion and weapon state of the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStateComponent {
    pub movement: StateMachine<PlayerMovementState, PlayerEvent>,
    pub action: StateMachine<PlayerActionState, PlayerEvent>,
}

impl PlayerStateComponent {
    pub fn new() -> Self {
        Self {
            movement: StateMachine::new(PlayerMovementState::Idle, player_movement_transitions()),
            action: StateMachine::new(PlayerActionState::Ready, player_action_transitions()),
        }
    }
}

impl Default for PlayerStateComponent {
    fn default() -> Self {
        Self::new()
    }
}

component!(PlayerStateComponent => PlayerState);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

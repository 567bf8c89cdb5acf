//! Drives the player's locomotion and weapon machines.
//!
//! Only one player is tracked. Movement changes arrive as
//! `PlayerMovementStateTransition`, weapon actions as `WeaponShot` and
//! `WeaponReload`, and the end of a weapon animation as
//! `AnimationFinished`. Health is polled each tick for death and for the
//! low-health heartbeat.

use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Dispatcher;
use tracing::{debug, error, info};

use crate::audio::Sound;
use crate::components::{DamagedMarker, DeadMarker, Entity, Health};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::events::{EventKind, GameEvent};
use crate::state::{PlayerActionState, PlayerEvent, PlayerMovementState, PlayerStateComponent, TransitionResult};
use crate::system::System;

pub struct PlayerStateMachineSystem {
    player: Option<EntityId>,
    low_health_threshold: f64,
}

fn play(entity: EntityId, sound: Sound, looped: bool) -> GameEvent {
    GameEvent::PlaySound { entity, sound, looped }
}

fn stop(entity: EntityId, sound: Sound) -> GameEvent {
    GameEvent::StopSound { entity, sound }
}

/// Sound events for a locomotion change. Empty if nothing changed.
pub fn player_movement_effects(entity: EntityId, result: &TransitionResult<PlayerMovementState>) -> Vec<GameEvent> {
    if !result.changed {
        return Vec::new();
    }
    match result.current {
        PlayerMovementState::Walk => vec![
            stop(entity, Sound::PlayerRunGravel),
            play(entity, Sound::PlayerWalkGravel, true),
        ],
        PlayerMovementState::Run => vec![
            stop(entity, Sound::PlayerWalkGravel),
            play(entity, Sound::PlayerRunGravel, true),
        ],
        PlayerMovementState::Idle | PlayerMovementState::Airborne => vec![
            stop(entity, Sound::PlayerWalkGravel),
            stop(entity, Sound::PlayerRunGravel),
        ],
        PlayerMovementState::Dead => vec![
            stop(entity, Sound::PlayerWalkGravel),
            stop(entity, Sound::PlayerRunGravel),
            stop(entity, Sound::HeartBeat),
            play(entity, Sound::PlayerDeath, false),
        ],
    }
}

fn player_action_effects(entity: EntityId, result: &TransitionResult<PlayerActionState>) -> Vec<GameEvent> {
    match result.current {
        PlayerActionState::Shoot if result.changed => vec![play(entity, Sound::RemingtonShot, false)],
        PlayerActionState::Reload if result.changed => vec![play(entity, Sound::RemingtonReload, false)],
        _ => Vec::new(),
    }
}

impl PlayerStateMachineSystem {
    pub fn new(low_health_threshold: f64) -> Self {
        Self {
            player: None,
            low_health_threshold,
        }
    }

    /// The tracked player entity.
    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    fn is_player(&self, entity: EntityId) -> bool {
        self.player == Some(entity)
    }

    fn move_player(&self, ctx: &mut GameContext, entity: EntityId, event: PlayerEvent) {
        let Some(state) = ctx.component_mut::<PlayerStateComponent>(entity) else {
            return;
        };
        let result = state.movement.transition(event);
        let action = state.action.current();
        if !result.changed {
            return;
        }
        debug!(%entity, ?event, from = ?result.previous, to = ?result.current, "player movement changed");
        ctx.emit(GameEvent::PlayerStateUpdated {
            entity,
            movement: result.current,
            action,
        });
        for effect in player_movement_effects(entity, &result) {
            ctx.emit(effect);
        }
    }

    fn act(&self, ctx: &mut GameContext, entity: EntityId, event: PlayerEvent) {
        let Some(state) = ctx.component_mut::<PlayerStateComponent>(entity) else {
            return;
        };
        if state.movement.current() == PlayerMovementState::Dead {
            return;
        }
        let result = state.action.transition(event);
        let movement = state.movement.current();
        if !result.changed {
            return;
        }
        debug!(%entity, ?event, from = ?result.previous, to = ?result.current, "player action changed");
        ctx.emit(GameEvent::PlayerStateUpdated {
            entity,
            movement,
            action: result.current,
        });
        for effect in player_action_effects(entity, &result) {
            ctx.emit(effect);
        }
    }
}

impl System for PlayerStateMachineSystem {
    fn name(&self) -> &'static str {
        "PlayerStateMachineSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<PlayerStateComponent>()
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[
            EventKind::PlayerMovementStateTransition,
            EventKind::WeaponShot,
            EventKind::WeaponReload,
            EventKind::AnimationFinished,
        ]
    }

    fn add_entity(&mut self, id: EntityId, ctx: &mut GameContext) -> bool {
        if let Some(existing) = self.player {
            error!(entity = %id, player = %existing, "a player already exists, second player refused");
            return false;
        }
        info!(entity = %id, "player registered");
        self.player = Some(id);
        ctx.emit(play(id, Sound::DangerEnvironment, true));
        true
    }

    fn remove_entity(&mut self, id: EntityId, _ctx: &mut GameContext) {
        if self.is_player(id) {
            self.player = None;
        }
    }

    fn on_event(&mut self, event: &GameEvent, ctx: &mut GameContext) {
        let (entity, player_event) = match *event {
            GameEvent::PlayerMovementStateTransition { entity, event } => {
                if self.is_player(entity) {
                    self.move_player(ctx, entity, event);
                }
                return;
            }
            GameEvent::WeaponShot { entity } => (entity, PlayerEvent::Shoot),
            GameEvent::WeaponReload { entity } => (entity, PlayerEvent::Reload),
            GameEvent::AnimationFinished { entity, .. } => (entity, PlayerEvent::Finished),
            _ => return,
        };
        if self.is_player(entity) {
            self.act(ctx, entity, player_event);
        }
    }

    fn update(&mut self, _elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities.iter().filter(|id| self.is_player(**id)) {
            if ctx.has_component::<DeadMarker>(id) {
                ctx.make_body_inert(id);
                self.move_player(ctx, id, PlayerEvent::Dying);
            }
            if ctx.remove_component::<DamagedMarker>(id).is_none() {
                continue;
            }
            let hp = ctx.component::<Health>(id).map_or(0.0, |health| health.current);
            if hp > 0.0 && hp < self.low_health_threshold {
                debug!(entity = %id, hp, "player health low");
                ctx.emit(play(id, Sound::HeartBeat, true));
            }
        }
        Ok(())
    }
}

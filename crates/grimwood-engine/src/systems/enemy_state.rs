//! Drives enemy state machines.
//!
//! Transitions come from three places: `EnemyStateTransition` requests,
//! `AnimationFinished` (mapped to [`EnemyEvent::Finished`]) and the damage
//! markers polled each tick. Every change is published as
//! `EnemyStateUpdated` together with its sound effects.

use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Dispatcher;
use tracing::debug;

use crate::audio::Sound;
use crate::components::{DamagedMarker, DeadMarker, Entity};
use crate::context::GameContext;
use crate::error::SystemError;
use crate::events::{EventKind, GameEvent};
use crate::state::{EnemyEvent, EnemyState, EnemyStateComponent, TransitionResult};
use crate::system::System;

pub struct EnemyStateMachineSystem;

/// Events announcing an enemy's state change. Empty if nothing changed.
pub fn enemy_effects(entity: EntityId, result: &TransitionResult<EnemyState>) -> Vec<GameEvent> {
    if !result.changed {
        return Vec::new();
    }
    let mut events = vec![GameEvent::EnemyStateUpdated {
        entity,
        previous: result.previous,
        current: result.current,
    }];
    let groan = match result.current {
        EnemyState::ChaseWalk | EnemyState::ChaseRun | EnemyState::Attack => GameEvent::PlaySound {
            entity,
            sound: Sound::ZombieGroan,
            looped: true,
        },
        _ => GameEvent::StopSound {
            entity,
            sound: Sound::ZombieGroan,
        },
    };
    events.push(groan);
    let once = match result.current {
        EnemyState::Scream => Some(Sound::ZombieScream),
        EnemyState::Dying => Some(Sound::ZombieDying),
        _ => None,
    };
    events.extend(once.map(|sound| GameEvent::PlaySound {
        entity,
        sound,
        looped: false,
    }));
    events
}

fn transition(ctx: &mut GameContext, entity: EntityId, event: EnemyEvent) -> Option<TransitionResult<EnemyState>> {
    let result = ctx
        .component_mut::<EnemyStateComponent>(entity)?
        .machine
        .transition(event);
    if result.changed {
        debug!(%entity, ?event, from = ?result.previous, to = ?result.current, "enemy state changed");
    }
    for effect in enemy_effects(entity, &result) {
        ctx.emit(effect);
    }
    Some(result)
}

impl System for EnemyStateMachineSystem {
    fn name(&self) -> &'static str {
        "EnemyStateMachineSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<EnemyStateComponent>()
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::EnemyStateTransition, EventKind::AnimationFinished]
    }

    fn on_event(&mut self, event: &GameEvent, ctx: &mut GameContext) {
        match *event {
            GameEvent::EnemyStateTransition { entity, event } => {
                transition(ctx, entity, event);
            }
            GameEvent::AnimationFinished { entity, .. } => {
                transition(ctx, entity, EnemyEvent::Finished);
            }
            _ => {}
        }
    }

    fn update(&mut self, _elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            if ctx.has_component::<DeadMarker>(id) {
                ctx.make_body_inert(id);
                transition(ctx, id, EnemyEvent::Die);
            }
            if ctx.remove_component::<DamagedMarker>(id).is_some() {
                transition(ctx, id, EnemyEvent::TakeDamage);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentBundle;
    use crate::config::GameConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(ctx: &mut GameContext, kinds: &[EventKind]) -> Rc<RefCell<Vec<GameEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for &kind in kinds {
            let sink = log.clone();
            ctx.on(kind, move |event, _| sink.borrow_mut().push(event.clone()));
        }
        log
    }

    fn enemy(ctx: &mut GameContext, state: EnemyState) -> EntityId {
        ctx.spawn(ComponentBundle::new().with(EnemyStateComponent::new(state)))
            .unwrap()
    }

    fn state(ctx: &GameContext, id: EntityId) -> EnemyState {
        ctx.component::<EnemyStateComponent>(id).unwrap().current()
    }

    #[test]
    fn effects_for_chase_and_death() {
        let id = EntityId::new(3, 0);
        let chase = TransitionResult {
            previous: EnemyState::StandUp,
            current: EnemyState::ChaseWalk,
            changed: true,
        };
        assert_eq!(
            enemy_effects(id, &chase),
            vec![
                GameEvent::EnemyStateUpdated {
                    entity: id,
                    previous: EnemyState::StandUp,
                    current: EnemyState::ChaseWalk,
                },
                GameEvent::PlaySound {
                    entity: id,
                    sound: Sound::ZombieGroan,
                    looped: true,
                },
            ]
        );

        let dying = TransitionResult {
            previous: EnemyState::Attack,
            current: EnemyState::Dying,
            changed: true,
        };
        let effects = enemy_effects(id, &dying);
        assert_eq!(effects.len(), 3);
        assert_eq!(
            effects[1],
            GameEvent::StopSound {
                entity: id,
                sound: Sound::ZombieGroan
            }
        );
        assert_eq!(
            effects[2],
            GameEvent::PlaySound {
                entity: id,
                sound: Sound::ZombieDying,
                looped: false
            }
        );

        assert!(enemy_effects(id, &TransitionResult::unchanged(EnemyState::Idle)).is_empty());
    }

    #[test]
    fn transition_request_is_applied() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(EnemyStateMachineSystem));
        let id = enemy(&mut ctx, EnemyState::ChaseWalk);
        let log = record(&mut ctx, &[EventKind::EnemyStateUpdated]);

        ctx.emit(GameEvent::EnemyStateTransition {
            entity: id,
            event: EnemyEvent::StartAttack,
        });
        assert_eq!(state(&ctx, id), EnemyState::Attack);

        ctx.emit(GameEvent::AnimationFinished { entity: id, clip: "attack" });
        assert_eq!(state(&ctx, id), EnemyState::ChaseWalk);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn undefined_transition_changes_nothing() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(EnemyStateMachineSystem));
        let id = enemy(&mut ctx, EnemyState::Dead);
        let log = record(&mut ctx, &[EventKind::EnemyStateUpdated, EventKind::PlaySound, EventKind::StopSound]);

        ctx.emit(GameEvent::EnemyStateTransition {
            entity: id,
            event: EnemyEvent::TakeDamage,
        });
        assert_eq!(state(&ctx, id), EnemyState::Dead);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn damage_marker_is_consumed() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(EnemyStateMachineSystem));
        let id = enemy(&mut ctx, EnemyState::Idle);
        ctx.add_component(id, DamagedMarker);

        ctx.update_systems(1.0 / 60.0);
        assert_eq!(state(&ctx, id), EnemyState::Damaged);
        assert!(!ctx.has_component::<DamagedMarker>(id));
    }

    #[test]
    fn death_wins_over_damage() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(EnemyStateMachineSystem));
        let id = enemy(&mut ctx, EnemyState::ChaseRun);
        ctx.add_component(id, DamagedMarker);
        ctx.add_component(id, DeadMarker);

        ctx.update_systems(1.0 / 60.0);
        assert_eq!(state(&ctx, id), EnemyState::Dying);
        assert!(!ctx.has_component::<DamagedMarker>(id));

        // Still marked dead on later ticks, but Dying has no Die entry.
        ctx.update_systems(1.0 / 60.0);
        assert_eq!(state(&ctx, id), EnemyState::Dying);
    }
}

use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Dispatcher;
use tracing::trace;

use crate::components::{CharacterMovement, Entity, Enemy, Position};
use crate::config::EnemyConfig;
use crate::context::GameContext;
use crate::error::SystemError;
use crate::events::{EventKind, GameEvent};
use crate::state::{EnemyEvent, EnemyState, EnemyStateComponent};
use crate::system::System;

/// Steers enemies towards the last known player position.
///
/// Walking and running enemies get a horizontal movement request scaled by
/// their speed; every other state stands still. An enemy that is chasing
/// and within attack range is asked to start its attack.
pub struct EnemyControlSystem {
    config: EnemyConfig,
    target: Option<Position>,
}

impl EnemyControlSystem {
    pub fn new(config: EnemyConfig) -> Self {
        Self { config, target: None }
    }

    fn speed(&self, state: EnemyState) -> f64 {
        match state {
            EnemyState::ChaseWalk => self.config.walk_speed,
            EnemyState::ChaseRun => self.config.run_speed,
            _ => 0.0,
        }
    }
}

impl System for EnemyControlSystem {
    fn name(&self) -> &'static str {
        "EnemyControlSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<Enemy>()
            && entity.has_component::<EnemyStateComponent>()
            && entity.has_component::<CharacterMovement>()
            && entity.has_component::<Position>()
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::PlayerPositionUpdated]
    }

    fn on_event(&mut self, event: &GameEvent, _ctx: &mut GameContext) {
        if let GameEvent::PlayerPositionUpdated { position } = event {
            self.target = Some(*position);
        }
    }

    fn update(&mut self, elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            let Some(state) = ctx.component::<EnemyStateComponent>(id).map(EnemyStateComponent::current) else {
                continue;
            };
            let Some(position) = ctx.component::<Position>(id).copied() else {
                continue;
            };

            let speed = self.speed(state);
            let translation = match (self.target, speed > 0.0) {
                (Some(target), true) => position
                    .flat_direction_to(&target)
                    .map(|[x, y, z]| [x * speed * elapsed, y, z * speed * elapsed])
                    .unwrap_or_default(),
                _ => [0.0; 3],
            };
            if let Some(movement) = ctx.component_mut::<CharacterMovement>(id) {
                movement.translation = translation;
            }

            let chasing = matches!(state, EnemyState::ChaseWalk | EnemyState::ChaseRun);
            if let (true, Some(target)) = (chasing, self.target) {
                let distance = position.distance_to(&target);
                if distance <= self.config.attack_range {
                    trace!(entity = %id, distance, "enemy in attack range");
                    ctx.emit(GameEvent::EnemyStateTransition {
                        entity: id,
                        event: EnemyEvent::StartAttack,
                    });
                }
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

    fn enemy(ctx: &mut GameContext, state: EnemyState, at: Position) -> EntityId {
        ctx.spawn(
            ComponentBundle::new()
                .with(Enemy)
                .with(EnemyStateComponent::new(state))
                .with(CharacterMovement::default())
                .with(at),
        )
        .unwrap()
    }

    #[test]
    fn chasing_enemy_moves_towards_player() {
        let mut ctx = GameContext::new(GameConfig::default());
        let walker = enemy(&mut ctx, EnemyState::ChaseWalk, Position::new(0.0, 0.0, 0.0));
        let runner = enemy(&mut ctx, EnemyState::ChaseRun, Position::new(0.0, 0.0, 0.0));
        let idle = enemy(&mut ctx, EnemyState::StandUp, Position::new(0.0, 0.0, 0.0));

        let mut system = EnemyControlSystem::new(EnemyConfig::default());
        system.on_event(
            &GameEvent::PlayerPositionUpdated {
                position: Position::new(10.0, 5.0, 0.0),
            },
            &mut ctx,
        );
        system.update(0.5, &[walker, runner, idle], &mut ctx).unwrap();

        assert_eq!(ctx.component::<CharacterMovement>(walker).unwrap().translation, [1.0, 0.0, 0.0]);
        assert_eq!(ctx.component::<CharacterMovement>(runner).unwrap().translation, [3.5, 0.0, 0.0]);
        assert_eq!(ctx.component::<CharacterMovement>(idle).unwrap().translation, [0.0; 3]);
    }

    #[test]
    fn no_target_means_no_movement() {
        let mut ctx = GameContext::new(GameConfig::default());
        let walker = enemy(&mut ctx, EnemyState::ChaseWalk, Position::default());
        let mut system = EnemyControlSystem::new(EnemyConfig::default());
        system.update(0.5, &[walker], &mut ctx).unwrap();
        assert_eq!(ctx.component::<CharacterMovement>(walker).unwrap().translation, [0.0; 3]);
    }

    #[test]
    fn close_chaser_requests_attack() {
        let mut ctx = GameContext::new(GameConfig::default());
        let near = enemy(&mut ctx, EnemyState::ChaseWalk, Position::new(1.0, 0.0, 0.0));
        let far = enemy(&mut ctx, EnemyState::ChaseWalk, Position::new(5.0, 0.0, 0.0));

        let requested = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = requested.clone();
        ctx.on(EventKind::EnemyStateTransition, move |event, _| {
            if let GameEvent::EnemyStateTransition { entity, event } = event {
                sink.borrow_mut().push((*entity, *event));
            }
        });

        let mut system = EnemyControlSystem::new(EnemyConfig::default());
        system.target = Some(Position::default());
        system.update(1.0 / 60.0, &[near, far], &mut ctx).unwrap();

        assert_eq!(*requested.borrow(), vec![(near, EnemyEvent::StartAttack)]);
    }
}

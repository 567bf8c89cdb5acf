use grimwood_ecs::entity::EntityId;
use grimwood_ecs::event::Dispatcher;
use tracing::trace;

use crate::animation::{enemy_clip, player_clip, Animation, Clip};
use crate::components::Entity;
use crate::context::GameContext;
use crate::error::SystemError;
use crate::events::GameEvent;
use crate::state::{EnemyStateComponent, PlayerStateComponent};
use crate::system::System;

/// Keeps each character's clip in line with its state and reports the end
/// of one-shot clips as `AnimationFinished`.
pub struct AnimationSystem;

fn wanted_clip(ctx: &GameContext, id: EntityId) -> Option<Option<Clip>> {
    if let Some(state) = ctx.component::<EnemyStateComponent>(id) {
        return Some(enemy_clip(state.current()));
    }
    let state = ctx.component::<PlayerStateComponent>(id)?;
    Some(player_clip(state.movement.current(), state.action.current()))
}

impl System for AnimationSystem {
    fn name(&self) -> &'static str {
        "AnimationSystem"
    }

    fn applies_to(&self, entity: &Entity) -> bool {
        entity.has_component::<Animation>()
            && (entity.has_component::<EnemyStateComponent>() || entity.has_component::<PlayerStateComponent>())
    }

    fn update(&mut self, elapsed: f64, entities: &[EntityId], ctx: &mut GameContext) -> Result<(), SystemError> {
        for &id in entities {
            let Some(clip) = wanted_clip(ctx, id) else {
                continue;
            };
            let Some(animation) = ctx.component_mut::<Animation>(id) else {
                continue;
            };
            if animation.play(clip) {
                trace!(entity = %id, clip = ?animation.clip_name(), "clip changed");
            }
            if let Some(clip) = animation.advance(elapsed) {
                ctx.emit(GameEvent::AnimationFinished { entity: id, clip });
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
    use crate::state::EnemyState;
    use crate::systems::EnemyStateMachineSystem;

    #[test]
    fn finished_clip_advances_the_enemy() {
        let mut ctx = GameContext::new(GameConfig::default());
        ctx.add_system(Box::new(EnemyStateMachineSystem));
        ctx.add_system(Box::new(AnimationSystem));
        let id = ctx
            .spawn(
                ComponentBundle::new()
                    .with(EnemyStateComponent::new(EnemyState::Damaged))
                    .with(Animation::new()),
            )
            .unwrap();

        // reaction:hit takes 0.5 s.
        ctx.update_systems(0.25);
        assert_eq!(ctx.component::<Animation>(id).unwrap().clip_name(), Some("reaction:hit"));
        ctx.update_systems(0.25);
        assert_eq!(
            ctx.component::<EnemyStateComponent>(id).unwrap().current(),
            EnemyState::Scream
        );

        // The new clip starts on the next update.
        ctx.update_systems(0.1);
        assert_eq!(ctx.component::<Animation>(id).unwrap().clip_name(), Some("scream"));
    }

    #[test]
    fn dead_enemy_has_no_clip() {
        let mut ctx = GameContext::new(GameConfig::default());
        let id = ctx
            .spawn(
                ComponentBundle::new()
                    .with(EnemyStateComponent::new(EnemyState::Dead))
                    .with(Animation::new()),
            )
            .unwrap();
        AnimationSystem.update(1.0, &[id], &mut ctx).unwrap();
        assert_eq!(ctx.component::<Animation>(id).unwrap().clip, None);
    }
}

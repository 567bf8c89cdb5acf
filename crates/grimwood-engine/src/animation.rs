//! Animation clips and playback state.
//!
//! The engine does not skin meshes. It only tracks which clip a character
//! should be playing and how far into it it is, so the end of a one-shot
//! clip can be reported as `AnimationFinished`.

use crate::components::component;
use crate::state::{EnemyState, PlayerActionState, PlayerMovementState};

/// A named clip and how it plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clip {
    pub name: &'static str,
    /// Length of one repetition in seconds at normal speed.
    pub duration: f64,
    /// `None` loops forever.
    pub repetitions: Option<u32>,
    pub time_scale: f64,
}

impl Clip {
    const fn looping(name: &'static str, duration: f64) -> Self {
        Self {
            name,
            duration,
            repetitions: None,
            time_scale: 1.0,
        }
    }

    const fn once(name: &'static str, duration: f64) -> Self {
        Self {
            name,
            duration,
            repetitions: Some(1),
            time_scale: 1.0,
        }
    }

    const fn scaled(self, time_scale: f64) -> Self {
        Self { time_scale, ..self }
    }

    /// Seconds until a one-shot clip completes, `None` for looping clips.
    pub fn total_time(&self) -> Option<f64> {
        self.repetitions
            .map(|reps| self.duration * f64::from(reps) / self.time_scale)
    }
}

pub mod clips {
    use super::Clip;

    pub const ENEMY_IDLE: Clip = Clip::looping("idle", 2.0);
    pub const ENEMY_WALK: Clip = Clip::looping("walk", 1.2);
    pub const ENEMY_RUN: Clip = Clip::looping("run", 0.8);
    pub const ENEMY_REACTION_HIT: Clip = Clip::once("reaction:hit", 1.0).scaled(2.0);
    pub const ENEMY_SCREAM: Clip = Clip::once("scream", 2.5);
    pub const ENEMY_STAND_UP: Clip = Clip::once("standup", 3.0);
    pub const ENEMY_ATTACK: Clip = Clip::once("attack", 1.4);
    pub const ENEMY_DYING: Clip = Clip::once("dying", 2.0);

    pub const REMINGTON_IDLE: Clip = Clip::looping("remington:idle", 2.0);
    pub const REMINGTON_WALK: Clip = Clip::looping("remington:walk", 1.0);
    pub const REMINGTON_RUN: Clip = Clip::looping("remington:run", 0.7);
    pub const REMINGTON_SHOT: Clip = Clip::once("remington:shot", 0.9);
    pub const REMINGTON_RELOAD: Clip = Clip::once("remington:reload", 2.2);
}

/// Clip for an enemy state. `Dead` keeps no clip.
pub fn enemy_clip(state: EnemyState) -> Option<Clip> {
    match state {
        EnemyState::Idle => Some(clips::ENEMY_IDLE),
        EnemyState::ChaseWalk => Some(clips::ENEMY_WALK),
        EnemyState::ChaseRun => Some(clips::ENEMY_RUN),
        EnemyState::Damaged => Some(clips::ENEMY_REACTION_HIT),
        EnemyState::Scream => Some(clips::ENEMY_SCREAM),
        EnemyState::StandUp => Some(clips::ENEMY_STAND_UP),
        EnemyState::Attack => Some(clips::ENEMY_ATTACK),
        EnemyState::Dying => Some(clips::ENEMY_DYING),
        EnemyState::Dead => None,
    }
}

/// Clip for the player. Weapon actions override locomotion.
pub fn player_clip(movement: PlayerMovementState, action: PlayerActionState) -> Option<Clip> {
    match (movement, action) {
        (PlayerMovementState::Dead, _) => None,
        (_, PlayerActionState::Shoot) => Some(clips::REMINGTON_SHOT),
        (_, PlayerActionState::Reload) => Some(clips::REMINGTON_RELOAD),
        (PlayerMovementState::Walk, PlayerActionState::Ready) => Some(clips::REMINGTON_WALK),
        (PlayerMovementState::Run, PlayerActionState::Ready) => Some(clips::REMINGTON_RUN),
        (PlayerMovementState::Idle | PlayerMovementState::Airborne, PlayerActionState::Ready) => {
            Some(clips::REMINGTON_IDLE)
        }
    }
}

/// Playback state of one character.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub clip: Option<Clip>,
    pub elapsed: f64,
    finished: bool,
}

impl Animation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the current clip.
    pub fn clip_name(&self) -> Option<&'static str> {
        self.clip.map(|clip| clip.name)
    }

    /// Switch to `clip`, restarting playback. Asking for the clip already
    /// playing is a no-op.
    pub fn play(&mut self, clip: Option<Clip>) -> bool {
        if self.clip_name() == clip.map(|c| c.name) {
            return false;
        }
        self.clip = clip;
        self.elapsed = 0.0;
        self.finished = false;
        true
    }

    /// Advance playback by `dt`. Returns the clip name the moment a one-shot
    /// clip completes; later calls keep it on its last frame.
    pub fn advance(&mut self, dt: f64) -> Option<&'static str> {
        let clip = self.clip?;
        if self.finished {
            return None;
        }
        self.elapsed += dt;
        match clip.total_time() {
            Some(total) if self.elapsed >= total => {
                self.elapsed = total;
                self.finished = true;
                Some(clip.name)
            }
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

component!(Animation => Animation);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_finishes_once() {
        let mut anim = Animation::new();
        anim.play(enemy_clip(EnemyState::Damaged));
        // 1.0 s at double speed.
        assert_eq!(anim.advance(0.3), None);
        assert_eq!(anim.advance(0.3), Some("reaction:hit"));
        assert_eq!(anim.advance(0.3), None);
        assert!(anim.is_finished());
    }

    #[test]
    fn looping_clip_never_finishes() {
        let mut anim = Animation::new();
        anim.play(enemy_clip(EnemyState::ChaseWalk));
        for _ in 0..1000 {
            assert_eq!(anim.advance(0.1), None);
        }
    }

    #[test]
    fn replaying_same_clip_keeps_progress() {
        let mut anim = Animation::new();
        anim.play(Some(clips::ENEMY_ATTACK));
        anim.advance(0.5);
        assert!(!anim.play(Some(clips::ENEMY_ATTACK)));
        assert_eq!(anim.elapsed, 0.5);
        assert!(anim.play(Some(clips::ENEMY_WALK)));
        assert_eq!(anim.elapsed, 0.0);
    }

    #[test]
    fn player_action_overrides_movement() {
        assert_eq!(
            player_clip(PlayerMovementState::Run, PlayerActionState::Shoot),
            Some(clips::REMINGTON_SHOT)
        );
        assert_eq!(
            player_clip(PlayerMovementState::Airborne, PlayerActionState::Ready),
            Some(clips::REMINGTON_IDLE)
        );
        assert_eq!(player_clip(PlayerMovementState::Dead, PlayerActionState::Reload), None);
    }
}

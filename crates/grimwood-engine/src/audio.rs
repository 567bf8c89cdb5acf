//! Sound identifiers and the playback boundary.
//!
//! The engine never decodes or mixes audio. It decides *what* should play
//! and hands the request to an [`AudioBackend`].

use std::fmt;

use grimwood_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Every sound the game can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sound {
    RemingtonShot,
    RemingtonReload,
    PlayerWalkGravel,
    PlayerRunGravel,
    DangerEnvironment,
    ZombieGroan,
    ZombieScream,
    ZombieDying,
    HeartBeat,
    PlayerDeath,
}

impl Sound {
    /// Asset path of the sound file.
    pub fn path(self) -> &'static str {
        match self {
            Sound::RemingtonShot => "sounds/remington_shot.ogg",
            Sound::RemingtonReload => "sounds/remington_reload.ogg",
            Sound::PlayerWalkGravel => "sounds/walk_gravel.ogg",
            Sound::PlayerRunGravel => "sounds/run_gravel.ogg",
            Sound::DangerEnvironment => "sounds/danger_environment.ogg",
            Sound::ZombieGroan => "sounds/zombie_groan.ogg",
            Sound::ZombieScream => "sounds/zombie_scream.ogg",
            Sound::ZombieDying => "sounds/zombie_dying.ogg",
            Sound::HeartBeat => "sounds/heartbeat.ogg",
            Sound::PlayerDeath => "sounds/player_death.ogg",
        }
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where playback requests end up.
pub trait AudioBackend {
    /// Start `sound` at `entity`. Looping sounds play until stopped.
    fn play(&mut self, entity: EntityId, sound: Sound, looped: bool);

    /// Stop `sound` at `entity`.
    fn stop(&mut self, entity: EntityId, sound: Sound);
}

/// Backend that only logs requests. Used when no real output is attached.
#[derive(Debug, Default)]
pub struct LoggingAudio;

impl AudioBackend for LoggingAudio {
    fn play(&mut self, entity: EntityId, sound: Sound, looped: bool) {
        debug!(%entity, %sound, looped, path = sound.path(), "play sound");
    }

    fn stop(&mut self, entity: EntityId, sound: Sound) {
        debug!(%entity, %sound, "stop sound");
    }
}

use std::collections::{BTreeMap, BTreeSet};

use grimwood_ecs::entity::EntityId;
use tracing::trace;

use crate::audio::{AudioBackend, Sound};
use crate::context::GameContext;
use crate::events::{EventKind, GameEvent};
use crate::system::System;

/// Forwards sound events to an [`AudioBackend`].
///
/// Looping sounds are tracked per entity: starting a loop that already
/// plays is ignored, and all loops of a removed entity are stopped. One-shot
/// sounds go straight through.
pub struct AudioSystem {
    backend: Box<dyn AudioBackend>,
    loops: BTreeMap<EntityId, BTreeSet<Sound>>,
}

impl AudioSystem {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            loops: BTreeMap::new(),
        }
    }

    /// Loops currently playing for `entity`.
    pub fn active_loops(&self, entity: EntityId) -> Vec<Sound> {
        self.loops
            .get(&entity)
            .map(|sounds| sounds.iter().copied().collect())
            .unwrap_or_default()
    }

    fn play(&mut self, entity: EntityId, sound: Sound, looped: bool) {
        if looped && !self.loops.entry(entity).or_default().insert(sound) {
            trace!(%entity, %sound, "loop already playing");
            return;
        }
        self.backend.play(entity, sound, looped);
    }

    fn stop(&mut self, entity: EntityId, sound: Sound) {
        let Some(sounds) = self.loops.get_mut(&entity) else {
            return;
        };
        if sounds.remove(&sound) {
            self.backend.stop(entity, sound);
        }
        if sounds.is_empty() {
            self.loops.remove(&entity);
        }
    }

    fn stop_all(&mut self, entity: EntityId) {
        for sound in self.loops.remove(&entity).unwrap_or_default() {
            self.backend.stop(entity, sound);
        }
    }
}

impl System for AudioSystem {
    fn name(&self) -> &'static str {
        "AudioSystem"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::PlaySound, EventKind::StopSound, EventKind::EntityRemoved]
    }

    fn on_event(&mut self, event: &GameEvent, _ctx: &mut GameContext) {
        match *event {
            GameEvent::PlaySound { entity, sound, looped } => self.play(entity, sound, looped),
            GameEvent::StopSound { entity, sound } => self.stop(entity, sound),
            GameEvent::EntityRemoved(entity) => self.stop_all(entity),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl AudioBackend for Recorder {
        fn play(&mut self, entity: EntityId, sound: Sound, looped: bool) {
            self.0.borrow_mut().push(format!("play {entity} {sound} {looped}"));
        }

        fn stop(&mut self, entity: EntityId, sound: Sound) {
            self.0.borrow_mut().push(format!("stop {entity} {sound}"));
        }
    }

    fn system() -> (AudioSystem, Recorder) {
        let recorder = Recorder::default();
        (AudioSystem::new(Box::new(recorder.clone())), recorder)
    }

    #[test]
    fn loops_are_deduplicated() {
        let (mut audio, recorder) = system();
        let e = EntityId::new(1, 0);
        audio.play(e, Sound::ZombieGroan, true);
        audio.play(e, Sound::ZombieGroan, true);
        audio.play(e, Sound::ZombieScream, false);
        audio.play(e, Sound::ZombieScream, false);

        assert_eq!(recorder.0.borrow().len(), 3);
        assert_eq!(audio.active_loops(e), vec![Sound::ZombieGroan]);
    }

    #[test]
    fn stopping_an_unknown_loop_is_silent() {
        let (mut audio, recorder) = system();
        let e = EntityId::new(1, 0);
        audio.stop(e, Sound::HeartBeat);
        audio.play(e, Sound::HeartBeat, true);
        audio.stop(e, Sound::HeartBeat);
        audio.stop(e, Sound::HeartBeat);

        assert_eq!(recorder.0.borrow().len(), 2);
        assert!(audio.active_loops(e).is_empty());
    }

    #[test]
    fn removed_entity_stops_its_loops() {
        let (mut audio, recorder) = system();
        let mut ctx = GameContext::new(crate::config::GameConfig::default());
        let e = EntityId::new(4, 0);
        audio.on_event(
            &GameEvent::PlaySound {
                entity: e,
                sound: Sound::PlayerWalkGravel,
                looped: true,
            },
            &mut ctx,
        );
        audio.on_event(&GameEvent::EntityRemoved(e), &mut ctx);

        assert_eq!(recorder.0.borrow().last().map(String::as_str), Some("stop 4v0 PlayerWalkGravel"));
        assert!(audio.active_loops(e).is_empty());
    }
}

//! Loading the bundled level into a running game.

use std::path::PathBuf;

use grimwood_engine::prelude::*;

fn level_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("levels/graveyard.json")
}

fn quiet_game() -> Game {
    let mut config = GameConfig::default();
    config.spawn.max_enemies = 0;
    Game::new(config)
}

#[test]
fn graveyard_loads_and_simulates() {
    let level = Level::from_path(level_path()).unwrap();
    // The mausoleum asks for a trimesh collider.
    assert_eq!(level.skipped, 1);
    assert_eq!(level.items.len(), 6);

    let mut game = quiet_game();
    let spawned = game.load_level(&level).unwrap();
    assert_eq!(spawned.joints.len(), 1);

    let ctx = game.context();
    // Everything with a collider has a body; the tree is decoration.
    assert_eq!(ctx.physics.body_count(), 5);
    assert_eq!(ctx.physics.joint_count(), 1);
    let joint = ctx.component::<Joint>(spawned.joints[0]).unwrap();
    assert!(joint.handle.is_some());
    assert_eq!(joint.first, spawned.named["gate_post"]);

    let step = game.config().time.fixed_dt;
    for _ in 0..120 {
        game.run_frame(step);
    }
    // Hinged to its post, the gate does not fall through the ground.
    let gate = game.context().component::<Position>(spawned.named["gate"]).unwrap();
    assert!(gate.y > 0.0, "gate fell to y = {}", gate.y);
}

#[test]
fn models_are_loaded_once_per_path() {
    let mut game = quiet_game();
    let spawned = game.load_level_file(level_path()).unwrap();

    let mut models = spawned.models_to_load.clone();
    models.sort();
    models.dedup();
    assert_eq!(models.len(), spawned.models_to_load.len());
    assert!(spawned.models_to_load.contains(&"models/tombstone.glb".to_owned()));

    let attached = game
        .context_mut()
        .complete_asset(AssetKind::Model, "models/tombstone.glb", Some(VisualHandle(11)));
    assert_eq!(attached, 2);
}

#[test]
fn missing_level_file_is_an_io_error() {
    let mut game = quiet_game();
    let err = game.load_level_file("does/not/exist.json").unwrap_err();
    assert!(matches!(err, GameError::Io { .. }));
}

//! Headless runner: loads an optional level and simulates a fixed number of
//! frames at 60 Hz, logging through `RUST_LOG`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use grimwood_engine::prelude::*;
use tracing::info;

#[derive(Parser)]
#[command(name = "grimwood-headless", about = "Run the game simulation without a renderer")]
struct Args {
    /// Game configuration JSON; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of 60 Hz display frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u32,

    /// Level definition JSON
    level: Option<PathBuf>,
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => GameConfig::from_path(path).with_context(|| format!("loading config {}", path.display()))?,
        None => GameConfig::default(),
    };

    let mut game = Game::new(config);
    if let Some(path) = &args.level {
        let spawned = game
            .load_level_file(path)
            .with_context(|| format!("loading level {}", path.display()))?;
        // No renderer here: every model load fails and entities stay physics-only.
        for model in &spawned.models_to_load {
            game.context_mut().complete_asset(AssetKind::Model, model, None);
        }
    }
    game.spawn_player(Position::new(0.0, 1.0, 0.0))?;

    let frame = 1.0 / 60.0;
    let mut ticks = 0u64;
    for _ in 0..args.frames {
        ticks += u64::from(game.run_frame(frame));
    }

    let ctx = game.context();
    info!(
        frames = args.frames,
        ticks,
        entities = ctx.entities.len(),
        enemies = ctx.entities.ids_with(&[ComponentKind::Enemy]).len(),
        sim_time = ctx.time.sim_time(),
        "simulation finished"
    );
    for (system, time) in &ctx.last_diagnostics().system_times {
        info!(system = system.as_str(), micros = time.as_micros() as u64, "last tick");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ten_seconds_without_a_level() {
        let args = Args::try_parse_from(["grimwood-headless"]).unwrap();
        assert_eq!(args.frames, 600);
        assert!(args.config.is_none());
        assert!(args.level.is_none());
    }

    #[test]
    fn reads_options_and_level() {
        let args = Args::try_parse_from([
            "grimwood-headless",
            "--config",
            "game.json",
            "-f",
            "120",
            "levels/graveyard.json",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("game.json")));
        assert_eq!(args.frames, 120);
        assert_eq!(args.level, Some(PathBuf::from("levels/graveyard.json")));
    }

    #[test]
    fn rejects_a_bad_frame_count() {
        assert!(Args::try_parse_from(["grimwood-headless", "--frames", "lots"]).is_err());
    }
}

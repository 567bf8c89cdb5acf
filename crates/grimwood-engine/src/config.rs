//! Session configuration.
//!
//! Every section derives serde with `#[serde(default)]`, so a JSON file only
//! has to name the values it changes:
//!
//! ```
//! use grimwood_engine::config::GameConfig;
//!
//! let config = GameConfig::from_json_str(r#"{ "spawn": { "seed": 7 } }"#).unwrap();
//! assert_eq!(config.spawn.seed, 7);
//! assert_eq!(config.combat.force_threshold, 500.0);
//! ```

use std::path::Path;

use grimwood_ecs::time::TimeConfig;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub time: TimeConfig,
    pub physics: PhysicsConfig,
    pub combat: CombatConfig,
    pub spawn: SpawnConfig,
    pub enemy: EnemyConfig,
}

impl GameConfig {
    /// Parse and [`validate`](Self::validate) a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, GameError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values the clock or the damage formulas cannot work with.
    pub fn validate(&self) -> Result<(), GameError> {
        positive("time.fixed_dt", self.time.fixed_dt)?;
        positive("time.max_frame_delta", self.time.max_frame_delta)?;
        if self.time.max_updates_per_frame == 0 {
            return Err(GameError::InvalidConfig {
                field: "time.max_updates_per_frame",
                reason: "must be at least 1",
            });
        }
        positive("combat.force_damage_divisor", self.combat.force_damage_divisor)?;
        non_negative("combat.corpse_lifetime", self.combat.corpse_lifetime)?;
        non_negative("combat.bullet_lifetime", self.combat.bullet_lifetime)?;
        if !(0.0..=1.0).contains(&self.spawn.chance) {
            return Err(GameError::InvalidConfig {
                field: "spawn.chance",
                reason: "must be within 0..=1",
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), GameError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GameError::InvalidConfig {
            field,
            reason: "must be positive and finite",
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), GameError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GameError::InvalidConfig {
            field,
            reason: "must be zero or more and finite",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: [f64; 3],
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
        }
    }
}

/// Damage and death tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Contact force below which a melee hit is ignored.
    pub force_threshold: f64,
    /// Melee damage is `weapon.damage * force / force_damage_divisor`.
    pub force_damage_divisor: f64,
    /// Damage of one enemy attack contact.
    pub attack_damage: f64,
    /// Player health under which the heartbeat loop starts.
    pub low_health_threshold: f64,
    /// Seconds a dead character stays in the world.
    pub corpse_lifetime: f64,
    /// Seconds a bullet lives when nothing is hit.
    pub bullet_lifetime: f64,
    pub player_health: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            force_threshold: 500.0,
            force_damage_divisor: 100_000.0,
            attack_damage: 1.0,
            low_health_threshold: 15.0,
            corpse_lifetime: 10.0,
            bullet_lifetime: 3.0,
            player_health: 100.0,
        }
    }
}

/// Random enemy spawning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub seed: u64,
    /// Probability of a spawn on each tick.
    pub chance: f64,
    /// No spawns while this many enemies are alive. Zero disables spawning.
    pub max_enemies: usize,
    /// Candidate spawn positions. One is picked at random per spawn.
    pub points: Vec<[f64; 3]>,
    pub enemy_health: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            chance: 0.002,
            max_enemies: 8,
            points: vec![[0.0, 9.0, 0.0]],
            enemy_health: 30.0,
        }
    }
}

/// Enemy locomotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    /// Units per second in `ChaseWalk`.
    pub walk_speed: f64,
    /// Units per second in `ChaseRun`.
    pub run_speed: f64,
    /// Distance at which a chasing enemy starts attacking.
    pub attack_range: f64,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            walk_speed: 2.0,
            run_speed: 7.0,
            attack_range: 1.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(GameConfig::from_json_str("{}").unwrap(), GameConfig::default());
    }

    #[test]
    fn nested_override() {
        let config = GameConfig::from_json_str(
            r#"{ "time": { "max_updates_per_frame": 2 }, "enemy": { "run_speed": 9.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.time.max_updates_per_frame, 2);
        assert_eq!(config.enemy.run_speed, 9.0);
        assert_eq!(config.enemy.walk_speed, 2.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            GameConfig::from_json_str("{ nope"),
            Err(GameError::Json(_))
        ));
    }

    #[test]
    fn zero_time_step_is_rejected() {
        let err = GameConfig::from_json_str(r#"{ "time": { "fixed_dt": 0.0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            GameError::InvalidConfig {
                field: "time.fixed_dt",
                ..
            }
        ));
    }

    #[test]
    fn unusable_values_are_rejected() {
        for json in [
            r#"{ "time": { "max_frame_delta": -1.0 } }"#,
            r#"{ "time": { "max_updates_per_frame": 0 } }"#,
            r#"{ "combat": { "force_damage_divisor": 0.0 } }"#,
            r#"{ "combat": { "corpse_lifetime": -5.0 } }"#,
            r#"{ "spawn": { "chance": 1.5 } }"#,
        ] {
            let result = GameConfig::from_json_str(json);
            assert!(matches!(result, Err(GameError::InvalidConfig { .. })), "{json} was accepted");
        }
    }

    #[test]
    fn default_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GameConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, GameError::Io { .. }));
    }
}

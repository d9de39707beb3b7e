//! World configuration.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stratum_utils::noise_router::NoiseShape;

/// Terrain shape and fluid settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    #[serde(flatten)]
    pub shape: NoiseShape,
    pub sea_level: i32,
    /// Open space below this y fills with lava.
    pub lava_level: i32,
    pub aquifers: bool,
    /// Registry name of the fluid filling the sea.
    pub default_fluid: String,
    /// Registry name of the block the density fill places.
    pub default_block: String,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            shape: NoiseShape::OVERWORLD,
            sea_level: 63,
            lava_level: -54,
            aquifers: true,
            default_fluid: "water".to_owned(),
            default_block: "stone".to_owned(),
        }
    }
}

/// Natural spawning limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    /// Passive mobs per 17x17 chunk area.
    pub creature_cap: u32,
    /// Hostile mobs per 17x17 chunk area.
    pub monster_cap: u32,
    pub spawn_monsters: bool,
    pub spawn_creatures: bool,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            creature_cap: 10,
            monster_cap: 70,
            spawn_monsters: true,
            spawn_creatures: true,
        }
    }
}

/// Everything a world needs to be built, loaded from JSON.
///
/// Every field has a default, so a partial (or empty) document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    /// Use the flat generator instead of noise terrain.
    pub flat: bool,
    pub noise: NoiseSettings,
    /// Chunk radius around observers that ticks.
    pub simulation_distance: i32,
    /// Chunk radius around observers that stays loaded.
    pub view_distance: i32,
    /// Random ticks per section per tick.
    pub random_tick_speed: u32,
    pub spawn: SpawnSettings,
    /// Generation worker threads; zero picks the available parallelism.
    pub worker_threads: usize,
    /// Park the thread instead of panicking on an invariant violation.
    pub pause_on_fatal: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            flat: false,
            noise: NoiseSettings::default(),
            simulation_distance: 4,
            view_distance: 8,
            random_tick_speed: 3,
            spawn: SpawnSettings::default(),
            worker_threads: 0,
            pause_on_fatal: false,
        }
    }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid world config")
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize world config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = WorldConfig::from_json("{}").unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = WorldConfig::from_json(
            r#"{ "seed": 42, "noise": { "sea_level": 40, "min_y": 0, "height": 256 } }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.noise.sea_level, 40);
        assert_eq!(config.noise.shape.min_y, 0);
        assert_eq!(config.noise.shape.height, 256);
        assert_eq!(config.noise.shape.cell_height, 8);
        assert!(config.noise.aquifers);
        assert_eq!(config.random_tick_speed, 3);
    }

    #[test]
    fn round_trips_through_json() {
        let config = WorldConfig {
            seed: 7,
            pause_on_fatal: true,
            ..WorldConfig::default()
        };
        let back = WorldConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(WorldConfig::from_json("{ seed: }").is_err());
    }
}

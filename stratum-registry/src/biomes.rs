//! The overworld biome table.
//!
//! Entries are generated from a compact temperature x humidity grid plus a
//! few continentalness and erosion overrides, the same way the full game
//! lays out its overworld, just with far fewer cells.

use stratum_utils::BiomeId;
use stratum_utils::BlockStateId;
use stratum_utils::climate::{Parameter, ParameterList, ParameterPoint, TargetPoint};

use crate::blocks;

/// Which family of surface rules a biome uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCategory {
    /// Grass over dirt.
    Grassy,
    /// Sand over sandstone.
    Sandy,
    /// Snow over dirt.
    Snowy,
    /// Bare stone with gravel patches.
    Stony,
    /// Gravel and clay sea floor.
    Seabed,
}

/// A weighted spawn entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MobSpawn {
    pub entity: &'static str,
    pub weight: u32,
    pub min_count: u32,
    pub max_count: u32,
}

impl MobSpawn {
    const fn new(entity: &'static str, weight: u32, min_count: u32, max_count: u32) -> Self {
        Self {
            entity,
            weight,
            min_count,
            max_count,
        }
    }
}

/// Tree placement for the decoration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStyle {
    pub log: BlockStateId,
    pub leaves: BlockStateId,
    /// Attempts per chunk.
    pub per_chunk: u32,
}

#[derive(Debug, Clone)]
pub struct Biome {
    pub key: &'static str,
    pub temperature: f32,
    pub downfall: f32,
    pub surface: SurfaceCategory,
    /// Passive mobs, used by initial chunk spawning and the creature cap.
    pub creatures: Vec<MobSpawn>,
    /// Hostile mobs, only spawned by the per-tick pass.
    pub monsters: Vec<MobSpawn>,
    pub trees: Option<TreeStyle>,
    /// Ground plant attempts per chunk.
    pub vegetation: u32,
}

impl Biome {
    /// Whether exposed water freezes at this biome's temperature.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.temperature < 0.15
    }
}

pub const OCEAN: BiomeId = BiomeId(0);
pub const DEEP_OCEAN: BiomeId = BiomeId(1);
pub const FROZEN_OCEAN: BiomeId = BiomeId(2);
pub const BEACH: BiomeId = BiomeId(3);
pub const SNOWY_BEACH: BiomeId = BiomeId(4);
pub const PLAINS: BiomeId = BiomeId(5);
pub const FOREST: BiomeId = BiomeId(6);
pub const DESERT: BiomeId = BiomeId(7);
pub const SNOWY_PLAINS: BiomeId = BiomeId(8);
pub const TAIGA: BiomeId = BiomeId(9);
pub const SWAMP: BiomeId = BiomeId(10);
pub const STONY_PEAKS: BiomeId = BiomeId(11);

const TEMPERATURES: [(f32, f32); 5] = [(-1.0, -0.45), (-0.45, -0.15), (-0.15, 0.2), (0.2, 0.55), (0.55, 1.0)];
const HUMIDITIES: [(f32, f32); 5] = [(-1.0, -0.35), (-0.35, -0.1), (-0.1, 0.1), (0.1, 0.3), (0.3, 1.0)];

/// Inland biome by `[temperature][humidity]` band.
const MIDDLE_BIOMES: [[BiomeId; 5]; 5] = [
    [SNOWY_PLAINS, SNOWY_PLAINS, SNOWY_PLAINS, TAIGA, TAIGA],
    [PLAINS, PLAINS, FOREST, TAIGA, TAIGA],
    [PLAINS, PLAINS, FOREST, FOREST, SWAMP],
    [PLAINS, PLAINS, FOREST, FOREST, SWAMP],
    [DESERT, DESERT, DESERT, DESERT, DESERT],
];

const DEEP_OCEAN_CONTINENTALNESS: (f32, f32) = (-1.05, -0.455);
const OCEAN_CONTINENTALNESS: (f32, f32) = (-0.455, -0.19);
const COAST_CONTINENTALNESS: (f32, f32) = (-0.19, -0.11);
const INLAND_CONTINENTALNESS: (f32, f32) = (-0.11, 1.0);
const PEAK_CONTINENTALNESS: (f32, f32) = (0.3, 1.0);
const PEAK_EROSION: (f32, f32) = (-1.0, -0.375);

fn passive() -> Vec<MobSpawn> {
    vec![
        MobSpawn::new("sheep", 12, 4, 4),
        MobSpawn::new("pig", 10, 4, 4),
        MobSpawn::new("chicken", 10, 4, 4),
        MobSpawn::new("cow", 8, 4, 4),
    ]
}

fn hostile() -> Vec<MobSpawn> {
    vec![
        MobSpawn::new("spider", 100, 4, 4),
        MobSpawn::new("zombie", 95, 4, 4),
        MobSpawn::new("skeleton", 100, 4, 4),
        MobSpawn::new("creeper", 100, 4, 4),
    ]
}

fn biome(key: &'static str, temperature: f32, downfall: f32, surface: SurfaceCategory) -> Biome {
    Biome {
        key,
        temperature,
        downfall,
        surface,
        creatures: Vec::new(),
        monsters: hostile(),
        trees: None,
        vegetation: 0,
    }
}

/// Biomes by id, plus the climate lookup table.
#[derive(Debug, Clone)]
pub struct BiomeRegistry {
    biomes: Vec<Biome>,
    parameters: ParameterList<BiomeId>,
}

impl BiomeRegistry {
    #[must_use]
    pub fn overworld() -> Self {
        let oak = TreeStyle {
            log: blocks::OAK_LOG,
            leaves: blocks::OAK_LEAVES,
            per_chunk: 1,
        };
        let spruce = TreeStyle {
            log: blocks::SPRUCE_LOG,
            leaves: blocks::SPRUCE_LEAVES,
            per_chunk: 6,
        };

        let mut biomes = vec![
            biome("ocean", 0.5, 0.5, SurfaceCategory::Seabed),
            biome("deep_ocean", 0.5, 0.5, SurfaceCategory::Seabed),
            biome("frozen_ocean", 0.0, 0.5, SurfaceCategory::Seabed),
            biome("beach", 0.8, 0.4, SurfaceCategory::Sandy),
            biome("snowy_beach", 0.05, 0.3, SurfaceCategory::Sandy),
            Biome {
                creatures: passive(),
                vegetation: 10,
                ..biome("plains", 0.8, 0.4, SurfaceCategory::Grassy)
            },
            Biome {
                creatures: passive(),
                trees: Some(TreeStyle { per_chunk: 10, ..oak }),
                vegetation: 2,
                ..biome("forest", 0.7, 0.8, SurfaceCategory::Grassy)
            },
            Biome {
                creatures: vec![MobSpawn::new("rabbit", 4, 2, 3)],
                trees: Some(TreeStyle {
                    log: blocks::CACTUS,
                    leaves: blocks::AIR,
                    per_chunk: 2,
                }),
                ..biome("desert", 2.0, 0.0, SurfaceCategory::Sandy)
            },
            Biome {
                creatures: vec![MobSpawn::new("rabbit", 10, 2, 3)],
                ..biome("snowy_plains", 0.0, 0.5, SurfaceCategory::Snowy)
            },
            Biome {
                creatures: vec![MobSpawn::new("wolf", 8, 4, 4), MobSpawn::new("rabbit", 4, 2, 3)],
                trees: Some(spruce),
                vegetation: 2,
                ..biome("taiga", 0.25, 0.8, SurfaceCategory::Grassy)
            },
            Biome {
                creatures: passive(),
                trees: Some(TreeStyle { per_chunk: 2, ..oak }),
                vegetation: 5,
                ..biome("swamp", 0.8, 0.9, SurfaceCategory::Grassy)
            },
            Biome {
                creatures: vec![MobSpawn::new("goat", 5, 1, 3)],
                ..biome("stony_peaks", 1.0, 0.3, SurfaceCategory::Stony)
            },
        ];
        biomes.shrink_to_fit();

        Self {
            biomes,
            parameters: ParameterList::new(build_entries()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.biomes.is_empty()
    }

    /// The biome for `id`. Unknown ids fall back to the first entry.
    #[must_use]
    pub fn get(&self, id: BiomeId) -> &Biome {
        self.biomes.get(usize::from(id.0)).unwrap_or(&self.biomes[0])
    }

    #[must_use]
    pub fn id_of(&self, key: &str) -> Option<BiomeId> {
        self.biomes
            .iter()
            .position(|b| b.key == key)
            .map(|i| BiomeId(i as u8))
    }

    /// Nearest biome in climate space.
    #[must_use]
    pub fn lookup(&self, target: &TargetPoint) -> BiomeId {
        *self.parameters.find_value(target)
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterList<BiomeId> {
        &self.parameters
    }
}

fn span((min, max): (f32, f32)) -> Parameter {
    Parameter::span(min, max)
}

fn entry(
    temperature: Parameter,
    humidity: Parameter,
    continentalness: Parameter,
    erosion: Parameter,
    biome: BiomeId,
) -> (ParameterPoint, BiomeId) {
    let point = ParameterPoint {
        temperature,
        humidity,
        continentalness,
        erosion,
        depth: Parameter::point(0.0),
        weirdness: span((-1.0, 1.0)),
        offset: 0,
    };
    (point, biome)
}

/// Earlier entries win ties, so the narrow overrides (oceans, coasts, peaks)
/// come before the broad inland grid.
fn build_entries() -> Vec<(ParameterPoint, BiomeId)> {
    let full = span((-1.0, 1.0));
    let mut entries = Vec::with_capacity(2 * TEMPERATURES.len() + 2 + MIDDLE_BIOMES.len() * HUMIDITIES.len());

    for (i, &temperature) in TEMPERATURES.iter().enumerate() {
        let frozen = i == 0;
        entries.push(entry(
            span(temperature),
            full,
            span(DEEP_OCEAN_CONTINENTALNESS),
            full,
            if frozen { FROZEN_OCEAN } else { DEEP_OCEAN },
        ));
        entries.push(entry(
            span(temperature),
            full,
            span(OCEAN_CONTINENTALNESS),
            full,
            if frozen { FROZEN_OCEAN } else { OCEAN },
        ));
    }

    entries.push(entry(span(TEMPERATURES[0]), full, span(COAST_CONTINENTALNESS), full, SNOWY_BEACH));
    entries.push(entry(
        span((TEMPERATURES[1].0, TEMPERATURES[4].1)),
        full,
        span(COAST_CONTINENTALNESS),
        full,
        BEACH,
    ));

    entries.push(entry(full, full, span(PEAK_CONTINENTALNESS), span(PEAK_EROSION), STONY_PEAKS));

    for (t, row) in MIDDLE_BIOMES.iter().enumerate() {
        for (h, &biome) in row.iter().enumerate() {
            entries.push(entry(
                span(TEMPERATURES[t]),
                span(HUMIDITIES[h]),
                span(INLAND_CONTINENTALNESS),
                full,
                biome,
            ));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(temperature: f64, humidity: f64, continentalness: f64, erosion: f64) -> TargetPoint {
        TargetPoint::from_values(temperature, humidity, continentalness, erosion, 0.0, 0.0)
    }

    #[test]
    fn ids_match_table_order() {
        let registry = BiomeRegistry::overworld();
        assert_eq!(registry.id_of("ocean"), Some(OCEAN));
        assert_eq!(registry.id_of("swamp"), Some(SWAMP));
        assert_eq!(registry.id_of("stony_peaks"), Some(STONY_PEAKS));
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn continentalness_splits_sea_and_land() {
        let registry = BiomeRegistry::overworld();
        assert_eq!(registry.lookup(&at(0.0, 0.0, -0.8, 0.0)), DEEP_OCEAN);
        assert_eq!(registry.lookup(&at(0.0, 0.0, -0.3, 0.0)), OCEAN);
        assert_eq!(registry.lookup(&at(-0.8, 0.0, -0.3, 0.0)), FROZEN_OCEAN);
        assert_eq!(registry.lookup(&at(0.0, 0.0, -0.15, 0.0)), BEACH);
        assert_eq!(registry.lookup(&at(0.0, -0.5, 0.2, 0.0)), PLAINS);
    }

    #[test]
    fn climate_grid_drives_inland_biomes() {
        let registry = BiomeRegistry::overworld();
        assert_eq!(registry.lookup(&at(0.8, 0.0, 0.2, 0.0)), DESERT);
        assert_eq!(registry.lookup(&at(-0.8, -0.5, 0.2, 0.0)), SNOWY_PLAINS);
        assert_eq!(registry.lookup(&at(0.0, 0.5, 0.2, 0.0)), SWAMP);
        assert_eq!(registry.lookup(&at(0.0, 0.0, 0.5, -0.8)), STONY_PEAKS);
    }

    #[test]
    fn frozen_biomes() {
        let registry = BiomeRegistry::overworld();
        assert!(registry.get(SNOWY_PLAINS).is_frozen());
        assert!(!registry.get(DESERT).is_frozen());
    }
}

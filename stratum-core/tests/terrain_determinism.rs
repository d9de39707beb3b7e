//! Terrain determinism.
//!
//! The same seed must produce the same blocks no matter which generator
//! instance or process runs, and the single-column probes must agree with the
//! full chunk fill. Chunks are compared through MD5 hashes of their block and
//! biome data.

use std::env;
use std::fmt::Write;
use std::process::Command;
use std::sync::Arc;

use stratum_core::WorldConfig;
use stratum_core::chunk::chunk_access::{ChunkAccess, LevelHeight};
use stratum_core::chunk::chunk_generator::ChunkGenerator;
use stratum_core::chunk::heightmap::HeightmapType;
use stratum_core::chunk::section::Sections;
use stratum_core::chunk::world_gen::world_gen_type::noise_generator::NoiseGenerator;
use stratum_registry::Registry;
use stratum_utils::ChunkPos;

const MIN_Y: i32 = -64;
const HEIGHT: i32 = 384;

fn generator(seed: u64) -> NoiseGenerator {
    let config = WorldConfig {
        seed,
        ..WorldConfig::default()
    };
    NoiseGenerator::new(&config, Arc::new(Registry::overworld())).unwrap()
}

fn generate(generator: &NoiseGenerator, x: i32, z: i32) -> ChunkAccess {
    let chunk = ChunkAccess::new(ChunkPos::new(x, z), MIN_Y, HEIGHT);
    generator.create_biomes(&chunk);
    generator.fill_from_noise(&chunk);
    chunk
}

fn compute_block_hash(sections: &Sections) -> String {
    let mut bytes = Vec::new();
    for index in 0..sections.len() {
        let section = sections.read(index);
        if section.is_empty() {
            bytes.push(0u8);
        } else {
            for state in section.states() {
                bytes.extend_from_slice(&state.0.to_be_bytes());
            }
        }
    }
    format!("{:x}", md5::compute(&bytes))
}

fn compute_biome_hash(sections: &Sections) -> String {
    let mut bytes = Vec::new();
    for index in 0..sections.len() {
        let section = sections.read(index);
        for y in 0..4 {
            for z in 0..4 {
                for x in 0..4 {
                    bytes.push(section.get_biome(x, y, z).0);
                }
            }
        }
    }
    format!("{:x}", md5::compute(&bytes))
}

/// Chunks hashed when comparing runs across processes.
const HASHED_CHUNKS: [(i32, i32); 3] = [(0, 0), (-4, 2), (9, -7)];

const CHILD_ENV: &str = "STRATUM_TERRAIN_HASH_CHILD";

fn hash_lines(seed: u64) -> Vec<String> {
    let generator = generator(seed);
    HASHED_CHUNKS
        .iter()
        .map(|&(x, z)| {
            let chunk = generate(&generator, x, z);
            format!(
                "terrain-hash {x},{z} {} {}",
                compute_block_hash(chunk.sections()),
                compute_biome_hash(chunk.sections())
            )
        })
        .collect()
}

/// Prints the hashes when run as the child of
/// `hashes_match_a_fresh_process`, otherwise does nothing.
#[test]
fn print_hashes_for_parent() {
    if env::var_os(CHILD_ENV).is_none() {
        return;
    }
    for line in hash_lines(0) {
        println!("{line}");
    }
}

#[test]
fn hashes_match_a_fresh_process() {
    if env::var_os(CHILD_ENV).is_some() {
        return;
    }
    let output = Command::new(env::current_exe().unwrap())
        .args(["--exact", "print_hashes_for_parent", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let child: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.find("terrain-hash").map(|start| &line[start..]))
        .collect();
    let local = hash_lines(0);
    assert_eq!(child, local.iter().map(String::as_str).collect::<Vec<_>>(), "{stdout}");
}

#[test]
fn seed_zero_ocean_floor_at_origin() {
    let view = LevelHeight {
        min_y: MIN_Y,
        height: HEIGHT,
    };
    assert_eq!(generator(0).base_height(0, 0, HeightmapType::OceanFloorWg, &view), 79);
}

#[test]
fn same_seed_same_blocks() {
    let first = generator(13579);
    let second = generator(13579);

    let mut mismatches = Vec::new();
    for (x, z) in [(0, 0), (-1, 3), (7, -12)] {
        let a = compute_block_hash(generate(&first, x, z).sections());
        let b = compute_block_hash(generate(&second, x, z).sections());
        if a != b {
            mismatches.push((x, z, a, b));
        }
    }

    if mismatches.is_empty() {
        return;
    }
    let mut msg = format!("{} chunks differ between runs\n", mismatches.len());
    for (x, z, a, b) in &mismatches {
        let _ = writeln!(msg, "  ({x:3},{z:3}): {a} vs {b}");
    }
    panic!("{msg}");
}

#[test]
fn different_seeds_diverge() {
    let a = compute_block_hash(generate(&generator(1), 0, 0).sections());
    let b = compute_block_hash(generate(&generator(2), 0, 0).sections());
    assert_ne!(a, b);
}

#[test]
fn fill_is_not_empty() {
    let chunk = generate(&generator(13579), 0, 0);
    let empty = ChunkAccess::new(ChunkPos::new(0, 0), MIN_Y, HEIGHT);
    assert_ne!(compute_block_hash(chunk.sections()), compute_block_hash(empty.sections()));
}

#[test]
fn column_probe_matches_chunk_fill() {
    let generator = generator(13579);
    let chunk = generate(&generator, 2, -1);
    let pos = chunk.pos();

    for (lx, lz) in [(0, 0), (5, 11), (15, 15), (8, 3)] {
        let x = pos.min_block_x() + lx;
        let z = pos.min_block_z() + lz;
        let column = generator.base_column(x, z, &chunk);
        for y in MIN_Y..MIN_Y + HEIGHT {
            assert_eq!(
                chunk.get_relative_block(lx, y, lz),
                column.get(y),
                "column ({x}, {z}) differs at y {y}"
            );
        }
    }
}

#[test]
fn base_height_matches_primed_heightmap() {
    let generator = generator(13579);
    let registry = Registry::overworld();
    let chunk = generate(&generator, -3, 4);
    chunk.prime_heightmaps(&HeightmapType::WORLDGEN, &registry.blocks);
    let pos = chunk.pos();

    for (lx, lz) in [(1, 1), (14, 6)] {
        let x = pos.min_block_x() + lx;
        let z = pos.min_block_z() + lz;
        let expected = chunk.get_height(HeightmapType::WorldSurfaceWg, lx, lz);
        let first = generator.base_height(x, z, HeightmapType::WorldSurfaceWg, &chunk);
        let second = generator.base_height(x, z, HeightmapType::WorldSurfaceWg, &chunk);
        assert_eq!(first, second);
        assert_eq!(first, expected, "column ({x}, {z})");
    }
}

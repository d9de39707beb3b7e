//! Cave and ravine carvers.
//!
//! A carver started in one chunk can reach up to eight chunks away, so each
//! target chunk replays the carvers of its whole 17x17 neighbourhood and
//! keeps only the part of every tunnel that lands inside itself. Replays are
//! deterministic because each source chunk reseeds from the world seed, the
//! carver index and its own position.

use std::f64::consts::PI;

use stratum_registry::{BlockRegistry, blocks};
use stratum_utils::random::{Random, WorldgenRandom};
use stratum_utils::{BlockPos, BlockStateId, ChunkPos};

use crate::chunk::generation_region::{GenerationRegion, block_flags};

/// How far, in chunks, a carver may reach from the chunk it starts in.
pub const CARVER_RANGE: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarverKind {
    /// Branching tunnels with the odd round room.
    Cave,
    /// A single tall, narrow tunnel.
    Ravine,
}

#[derive(Debug, Clone, Copy)]
pub struct CarverConfig {
    pub kind: CarverKind,
    /// Chance a given source chunk starts this carver.
    pub probability: f32,
    pub min_y: i32,
    pub max_y: i32,
}

impl CarverConfig {
    pub const CAVE: Self = Self {
        kind: CarverKind::Cave,
        probability: 0.15,
        min_y: -56,
        max_y: 180,
    };
    pub const RAVINE: Self = Self {
        kind: CarverKind::Ravine,
        probability: 0.01,
        min_y: 10,
        max_y: 67,
    };
}

/// Bounds of the chunk being carved, in block coordinates.
struct Target<'a> {
    region: &'a GenerationRegion,
    blocks: &'a BlockRegistry,
    chunk: ChunkPos,
    min_y: i32,
    max_y: i32,
    lava_level: i32,
}

impl Target<'_> {
    fn center_x(&self) -> f64 {
        f64::from(self.chunk.min_block_x() + 8)
    }

    fn center_z(&self) -> f64 {
        f64::from(self.chunk.min_block_z() + 8)
    }

    /// Whether a tunnel at `x, z` with `remaining` steps left can still
    /// reach this chunk.
    fn can_reach(&self, x: f64, z: f64, remaining: i32, thickness: f64) -> bool {
        let dx = x - self.center_x();
        let dz = z - self.center_z();
        let remaining = f64::from(remaining);
        let max = thickness + 2.0 + 16.0;
        dx * dx + dz * dz - remaining * remaining <= max * max
    }

    /// Carves the part of an ellipsoid lying inside this chunk. `floor_cut`
    /// flattens the bottom of the ellipsoid.
    fn carve_ellipsoid(&self, x: f64, y: f64, z: f64, horizontal: f64, vertical: f64, floor_cut: f64) {
        let min_x = self.chunk.min_block_x();
        let min_z = self.chunk.min_block_z();
        if x + horizontal + 1.0 < f64::from(min_x)
            || x - horizontal - 1.0 > f64::from(min_x + 15)
            || z + horizontal + 1.0 < f64::from(min_z)
            || z - horizontal - 1.0 > f64::from(min_z + 15)
        {
            return;
        }

        let from_x = ((x - horizontal).floor() as i32 - 1).max(min_x);
        let to_x = ((x + horizontal).floor() as i32 + 1).min(min_x + 15);
        let from_y = ((y - vertical).floor() as i32 - 1).max(self.min_y + 1);
        let to_y = ((y + vertical).floor() as i32 + 1).min(self.max_y - 8);
        let from_z = ((z - horizontal).floor() as i32 - 1).max(min_z);
        let to_z = ((z + horizontal).floor() as i32 + 1).min(min_z + 15);

        for bx in from_x..=to_x {
            let dx = (f64::from(bx) + 0.5 - x) / horizontal;
            for bz in from_z..=to_z {
                let dz = (f64::from(bz) + 0.5 - z) / horizontal;
                if dx * dx + dz * dz >= 1.0 {
                    continue;
                }
                for by in (from_y..=to_y).rev() {
                    let dy = (f64::from(by) - 0.5 - y) / vertical;
                    if dy <= floor_cut || dx * dx + dy * dy + dz * dz >= 1.0 {
                        continue;
                    }
                    self.carve_block(BlockPos::new(bx, by, bz));
                }
            }
        }
    }

    fn carve_block(&self, pos: BlockPos) {
        let state = self.region.get_block_state(pos);
        if !self.blocks.is_carvable(state) {
            return;
        }
        if self.blocks.is_fluid(self.region.get_block_state(pos.above())) {
            return;
        }
        let replacement: BlockStateId = if pos.y <= self.lava_level {
            blocks::LAVA
        } else {
            BlockStateId::AIR
        };
        self.region
            .set_block(pos, replacement, block_flags::UPDATE_NEIGHBORS, 0);
    }
}

/// The carver pass of one world.
#[derive(Debug, Clone)]
pub struct Carvers {
    seed: u64,
    lava_level: i32,
    carvers: Vec<CarverConfig>,
}

impl Carvers {
    #[must_use]
    pub fn overworld(seed: u64, lava_level: i32) -> Self {
        Self {
            seed,
            lava_level,
            carvers: vec![CarverConfig::CAVE, CarverConfig::RAVINE],
        }
    }

    #[must_use]
    pub fn configs(&self) -> &[CarverConfig] {
        &self.carvers
    }

    /// Carves the region's center chunk.
    pub fn apply(&self, region: &GenerationRegion, blocks: &BlockRegistry) {
        let center = region.center();
        let target = Target {
            region,
            blocks,
            chunk: center,
            min_y: region.min_y(),
            max_y: region.max_y(),
            lava_level: self.lava_level,
        };

        let mut random = WorldgenRandom::new(self.seed);
        for dx in -CARVER_RANGE..=CARVER_RANGE {
            for dz in -CARVER_RANGE..=CARVER_RANGE {
                let source = center.offset(dx, dz);
                for (index, config) in self.carvers.iter().enumerate() {
                    random.set_large_feature_seed(self.seed.wrapping_add(index as u64), source.x, source.z);
                    if random.next_f32() > config.probability {
                        continue;
                    }
                    match config.kind {
                        CarverKind::Cave => carve_caves(&target, config, &mut random, source),
                        CarverKind::Ravine => carve_ravine(&target, config, &mut random, source),
                    }
                }
            }
        }
    }
}

fn max_branches() -> i32 {
    (CARVER_RANGE * 2 - 1) * 16
}

fn sample_y(random: &mut WorldgenRandom, config: &CarverConfig) -> i32 {
    config.min_y + random.next_i32_bounded(config.max_y - config.min_y + 1)
}

fn carve_caves(target: &Target<'_>, config: &CarverConfig, random: &mut WorldgenRandom, source: ChunkPos) {
    let bound = max_branches();
    let outer = random.next_i32_bounded(15) + 1;
    let inner = random.next_i32_bounded(outer) + 1;
    let count = random.next_i32_bounded(inner);

    for _ in 0..count {
        let x = f64::from(source.min_block_x() + random.next_i32_bounded(16));
        let y = f64::from(sample_y(random, config));
        let z = f64::from(source.min_block_z() + random.next_i32_bounded(16));

        let mut tunnels = 1;
        if random.next_i32_bounded(4) == 0 {
            let radius = 1.0 + f64::from(random.next_f32()) * 6.0;
            target.carve_ellipsoid(x + 1.0, y, z, 1.5 + radius, (1.5 + radius) * 0.5, -0.7);
            tunnels += random.next_i32_bounded(4);
        }

        for _ in 0..tunnels {
            let yaw = f64::from(random.next_f32()) * PI * 2.0;
            let pitch = (f64::from(random.next_f32()) - 0.5) / 4.0;
            let mut thickness = f64::from(random.next_f32()) * 2.0 + f64::from(random.next_f32());
            if random.next_i32_bounded(10) == 0 {
                thickness *= f64::from(random.next_f32()) * f64::from(random.next_f32()) * 3.0 + 1.0;
            }
            let branches = bound - random.next_i32_bounded(bound / 4);
            let tunnel = Tunnel {
                x,
                y,
                z,
                yaw,
                pitch,
                thickness,
                y_scale: 1.0,
            };
            carve_tunnel(target, random.next_i64() as u64, tunnel, 0, branches);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tunnel {
    x: f64,
    y: f64,
    z: f64,
    yaw: f64,
    pitch: f64,
    thickness: f64,
    y_scale: f64,
}

fn carve_tunnel(target: &Target<'_>, seed: u64, mut tunnel: Tunnel, start: i32, branches: i32) {
    let mut random = WorldgenRandom::new(seed);
    let split = random.next_i32_bounded((branches / 2).max(1)) + branches / 4;
    let steep = random.next_i32_bounded(6) == 0;
    let mut yaw_change = 0.0f64;
    let mut pitch_change = 0.0f64;

    for step in start..branches {
        let horizontal = 1.5 + (PI * f64::from(step) / f64::from(branches)).sin() * tunnel.thickness;
        let vertical = horizontal * tunnel.y_scale;
        let cos_pitch = tunnel.pitch.cos();
        tunnel.x += tunnel.yaw.cos() * cos_pitch;
        tunnel.y += tunnel.pitch.sin();
        tunnel.z += tunnel.yaw.sin() * cos_pitch;
        tunnel.pitch *= if steep { 0.92 } else { 0.7 };
        tunnel.pitch += pitch_change * 0.1;
        tunnel.yaw += yaw_change * 0.1;
        pitch_change *= 0.9;
        yaw_change *= 0.75;
        pitch_change += f64::from(random.next_f32() - random.next_f32()) * f64::from(random.next_f32()) * 2.0;
        yaw_change += f64::from(random.next_f32() - random.next_f32()) * f64::from(random.next_f32()) * 4.0;

        if step == split && tunnel.thickness > 1.0 {
            for turn in [-PI / 2.0, PI / 2.0] {
                let branch = Tunnel {
                    yaw: tunnel.yaw + turn,
                    pitch: tunnel.pitch / 3.0,
                    thickness: f64::from(random.next_f32()) * 0.5 + 0.5,
                    ..tunnel
                };
                carve_tunnel(target, random.next_i64() as u64, branch, step, branches);
            }
            return;
        }

        if random.next_i32_bounded(4) == 0 {
            continue;
        }
        if !target.can_reach(tunnel.x, tunnel.z, branches - step, tunnel.thickness) {
            return;
        }
        target.carve_ellipsoid(tunnel.x, tunnel.y, tunnel.z, horizontal, vertical, -0.7);
    }
}

fn carve_ravine(target: &Target<'_>, config: &CarverConfig, random: &mut WorldgenRandom, source: ChunkPos) {
    let bound = max_branches();
    let mut x = f64::from(source.min_block_x() + random.next_i32_bounded(16));
    let mut y = f64::from(sample_y(random, config));
    let mut z = f64::from(source.min_block_z() + random.next_i32_bounded(16));
    let mut yaw = f64::from(random.next_f32()) * PI * 2.0;
    let mut pitch = (f64::from(random.next_f32()) - 0.5) * 2.0 / 8.0;
    let thickness = (f64::from(random.next_f32()) * 2.0 + f64::from(random.next_f32())) * 2.0;
    let branches = bound - random.next_i32_bounded(bound / 4);
    let y_scale = 3.0;

    let mut tunnel_random = WorldgenRandom::new(random.next_i64() as u64);
    let mut yaw_change = 0.0f64;
    let mut pitch_change = 0.0f64;

    for step in 0..branches {
        let horizontal = 1.5 + (f64::from(step) * PI / f64::from(branches)).sin() * thickness;
        let vertical = horizontal * y_scale;
        let horizontal = horizontal * (f64::from(tunnel_random.next_f32()) * 0.25 + 0.75);
        let cos_pitch = pitch.cos();
        x += yaw.cos() * cos_pitch;
        y += pitch.sin();
        z += yaw.sin() * cos_pitch;
        pitch *= 0.7;
        pitch += pitch_change * 0.05;
        yaw += yaw_change * 0.05;
        pitch_change *= 0.8;
        yaw_change *= 0.5;
        pitch_change +=
            f64::from(tunnel_random.next_f32() - tunnel_random.next_f32()) * f64::from(tunnel_random.next_f32()) * 2.0;
        yaw_change +=
            f64::from(tunnel_random.next_f32() - tunnel_random.next_f32()) * f64::from(tunnel_random.next_f32()) * 4.0;

        if tunnel_random.next_i32_bounded(4) == 0 {
            continue;
        }
        if !target.can_reach(x, z, branches - step, thickness) {
            return;
        }
        target.carve_ellipsoid(x, y, z, horizontal, vertical, -1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbourhood_reseeding_ignores_history() {
        let carvers = Carvers::overworld(42, -54);
        let mut a = WorldgenRandom::new(0);
        let mut b = WorldgenRandom::new(0);
        for _ in 0..10 {
            let _ = b.next_i64();
        }
        a.set_large_feature_seed(carvers.seed, 3, 4);
        b.set_large_feature_seed(carvers.seed, 3, 4);
        assert_eq!(a.next_f32().to_bits(), b.next_f32().to_bits());
    }

    #[test]
    fn overworld_carvers_cover_caves_and_ravines() {
        let carvers = Carvers::overworld(1, -54);
        let kinds: Vec<_> = carvers.configs().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CarverKind::Cave, CarverKind::Ravine]);
        assert_eq!(max_branches(), 240);
    }
}

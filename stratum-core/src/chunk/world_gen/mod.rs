//! Terrain synthesis: biomes, density fill, surface, carvers and decorations.

pub mod biome_source;
pub mod carvers;
pub mod chunk_noise_generator;
pub mod features;
pub mod surface_rules;
pub mod world_gen_type;

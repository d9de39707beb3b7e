//! Concrete [`ChunkGenerator`](crate::chunk::chunk_generator::ChunkGenerator) implementations.

pub mod flat_generator;
pub mod noise_generator;

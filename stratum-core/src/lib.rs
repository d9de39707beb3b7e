//! Chunk streaming and terrain generation.
//!
//! [`chunk::chunk_cache::ChunkCache`] is the entry point: it turns "chunk X at
//! stage S" requests into generated chunks, keeps them alive through tickets
//! and drives the per-tick world maintenance loop. Generation itself lives in
//! [`chunk::world_gen`].

#![allow(clippy::similar_names, clippy::too_many_lines, clippy::too_many_arguments)]

pub mod chunk;
pub mod config;
pub mod fatal;

pub use config::WorldConfig;

//! This module contains all the chunk related structures and logic.

pub mod chunk_access;
/// Blocking chunk requests and the simulation tick.
pub mod chunk_cache;
pub mod chunk_generator;
pub mod chunk_holder;
/// The chunk map manages chunk loading, generation, and lifecycle.
pub mod chunk_map;
pub mod chunk_pyramid;
pub mod chunk_status_tasks;
/// Tracks chunk levels based on ticket propagation.
pub mod chunk_ticket_manager;
pub mod entity;
pub mod generation_region;
pub mod heightmap;
pub mod light_engine;
pub mod natural_spawner;
pub mod observer;
pub mod section;
pub mod storage;
/// Terrain generation.
pub mod world_gen;
pub mod world_gen_context;

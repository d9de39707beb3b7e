//! The stage ladder: one descriptor per [`ChunkStatus`], in order.

use std::sync::Arc;

use crate::chunk::chunk_access::{ChunkAccess, ChunkStatus};
use crate::chunk::chunk_status_tasks::ChunkStatusTasks;
use crate::chunk::chunk_ticket_manager::FULL_CHUNK_LEVEL;
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::world_gen_context::WorldGenContext;

/// Non-blocking lookup of chunks owned by the simulation thread.
///
/// Stages running inline on that thread get one so they can look at chunks
/// outside their region, including their own in-flight chunk.
pub trait ChunkLookup {
    fn chunk_now(&self, x: i32, z: i32) -> Option<Arc<ChunkAccess>>;
}

/// Everything a stage function sees.
pub struct StageContext<'a> {
    pub world: &'a WorldGenContext,
    pub region: &'a GenerationRegion,
    pub step: &'a StageDescriptor,
    pub lookup: Option<&'a dyn ChunkLookup>,
}

impl StageContext<'_> {
    /// The chunk being generated.
    #[must_use]
    pub fn chunk(&self) -> &Arc<ChunkAccess> {
        self.region.center_chunk()
    }
}

pub type StageTask = fn(&StageContext<'_>) -> anyhow::Result<()>;

#[derive(Clone, Copy)]
pub struct StageDescriptor {
    pub status: ChunkStatus,
    pub name: &'static str,
    /// Chebyshev radius of neighbours that must reach `prior_requirement`.
    pub radius: u32,
    /// Chebyshev radius the stage may write into.
    pub write_radius: u32,
    pub prior_requirement: ChunkStatus,
    pub task: StageTask,
    /// Runs on the worker pool instead of the simulation thread.
    pub parallel: bool,
}

impl std::fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("status", &self.status)
            .field("radius", &self.radius)
            .field("write_radius", &self.write_radius)
            .field("prior_requirement", &self.prior_requirement)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl StageDescriptor {
    const fn new(status: ChunkStatus, radius: u32, task: StageTask) -> Self {
        let prior_requirement = match status.parent() {
            Some(parent) => parent,
            None => status,
        };
        Self {
            status,
            name: status.name(),
            radius,
            write_radius: 0,
            prior_requirement,
            task,
            parallel: false,
        }
    }

    const fn write_radius(mut self, write_radius: u32) -> Self {
        self.write_radius = write_radius;
        self
    }

    const fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }
}

/// Stage table plus the level distances derived from it.
///
/// Built once per world and handed to the chunk map; nothing here is global.
#[derive(Debug, Clone)]
pub struct StageLadder {
    stages: [StageDescriptor; 12],
    distances: [u32; 12],
}

impl Default for StageLadder {
    fn default() -> Self {
        Self::overworld()
    }
}

impl StageLadder {
    #[must_use]
    pub fn overworld() -> Self {
        use ChunkStatus as S;
        Self::new([
            StageDescriptor::new(S::Empty, 0, ChunkStatusTasks::empty),
            StageDescriptor::new(S::StructureStarts, 0, ChunkStatusTasks::generate_structure_starts),
            StageDescriptor::new(S::StructureReferences, 0, ChunkStatusTasks::generate_structure_references),
            StageDescriptor::new(S::Biomes, 0, ChunkStatusTasks::generate_biomes).parallel(),
            StageDescriptor::new(S::Noise, 0, ChunkStatusTasks::generate_noise).parallel(),
            StageDescriptor::new(S::Surface, 0, ChunkStatusTasks::generate_surface),
            StageDescriptor::new(S::Carvers, 0, ChunkStatusTasks::generate_carvers),
            StageDescriptor::new(S::Features, 1, ChunkStatusTasks::generate_features).write_radius(1),
            StageDescriptor::new(S::InitializeLight, 0, ChunkStatusTasks::initialize_light),
            StageDescriptor::new(S::Light, 1, ChunkStatusTasks::light),
            StageDescriptor::new(S::Spawn, 0, ChunkStatusTasks::generate_spawn),
            StageDescriptor::new(S::Full, 0, ChunkStatusTasks::full),
        ])
    }

    /// # Panics
    /// Panics if the descriptors are not in status order.
    #[must_use]
    pub fn new(stages: [StageDescriptor; 12]) -> Self {
        for (index, stage) in stages.iter().enumerate() {
            assert_eq!(stage.status.index(), index, "stage {} out of order", stage.name);
        }

        let mut distances = [0; 12];
        for status in ChunkStatus::ALL.into_iter().rev() {
            let Some(parent) = status.parent() else { break };
            let reach = distances[status.index()] + stages[status.index()].radius;
            distances[parent.index()] = distances[parent.index()].max(reach);
        }
        Self { stages, distances }
    }

    /// Replaces the function of one stage.
    #[must_use]
    pub fn with_task(mut self, status: ChunkStatus, task: StageTask) -> Self {
        self.stages[status.index()].task = task;
        self
    }

    /// Moves one stage between the simulation thread and the worker pool.
    #[must_use]
    pub fn with_parallel(mut self, status: ChunkStatus, parallel: bool) -> Self {
        self.stages[status.index()].parallel = parallel;
        self
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self, status: ChunkStatus) -> &StageDescriptor {
        &self.stages[status.index()]
    }

    /// How far below `Full` a ticket must sit for a chunk to reach `status`.
    #[inline]
    #[must_use]
    pub fn distance_for(&self, status: ChunkStatus) -> u32 {
        self.distances[status.index()]
    }

    #[must_use]
    pub fn max_distance(&self) -> u32 {
        self.distances[ChunkStatus::Empty.index()]
    }

    /// Highest level that still keeps a chunk loaded.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        FULL_CHUNK_LEVEL + self.max_distance()
    }

    /// The stage a chunk at `level` is driven to, if any.
    #[must_use]
    pub fn status_for_level(&self, level: u32) -> Option<ChunkStatus> {
        if level > self.max_level() {
            return None;
        }
        let distance = level.saturating_sub(FULL_CHUNK_LEVEL);
        ChunkStatus::ALL
            .into_iter()
            .rev()
            .find(|status| self.distances[status.index()] >= distance)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter()
    }
}

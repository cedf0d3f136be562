//! Task for building a chunk's mesh on a worker thread.
//!
//! The build only reads the chunk and its neighbors' boundary layers. The
//! finished mesh travels back to the frame thread, which installs it into the
//! chunk; the dispatcher uploads it on the next dispatch.

use std::sync::Arc;

use log::{trace, warn};

use crate::{
    core::MtResource,
    engine_state::{
        rendering::meshing::{Mesh, MeshBuilder},
        task_management::task::{Task, TaskContext, TaskResult},
        voxels::{chunk::Chunk, coordinates::ChunkCoordinate, world::World},
    },
};

/// Builds the mesh of one chunk.
pub struct ChunkMeshGenerationTask {
    /// Resolves neighbor chunks while building
    world: Arc<World>,
    /// The chunk being meshed
    chunk: MtResource<Chunk>,
    coordinate: ChunkCoordinate,
    builder: MeshBuilder,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    ///
    /// The caller records `coordinate` in `InFlightWork::meshing`; the result
    /// removes it again.
    ///
    /// # Arguments
    /// * `world` - World used to look up neighbor boundaries
    /// * `chunk` - The chunk to mesh
    /// * `builder` - Mesh builder carrying the configured strategy
    pub fn new(world: Arc<World>, chunk: MtResource<Chunk>, builder: MeshBuilder) -> Self {
        let coordinate = chunk.get().position();
        ChunkMeshGenerationTask {
            world,
            chunk,
            coordinate,
            builder,
        }
    }

    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }
}

impl Task for ChunkMeshGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        let (mesh, revision) = self.builder.build_chunk(&self.chunk, self.world.as_ref());
        Box::new(ChunkMeshGenerationTaskResult {
            chunk: self.chunk.clone(),
            coordinate: self.coordinate,
            outcome: Some((mesh, revision)),
        })
    }

    fn failure(&self) -> Box<dyn TaskResult + Send> {
        Box::new(ChunkMeshGenerationTaskResult {
            chunk: self.chunk.clone(),
            coordinate: self.coordinate,
            outcome: None,
        })
    }

    fn describe(&self) -> String {
        format!("mesh chunk {}", self.coordinate)
    }
}

/// A built mesh on its way back to the frame thread.
pub struct ChunkMeshGenerationTaskResult {
    chunk: MtResource<Chunk>,
    coordinate: ChunkCoordinate,
    /// The mesh and the revision it was built from; `None` if the build failed.
    outcome: Option<(Mesh, u64)>,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    /// Installs the mesh, unless the chunk left the world while it was built.
    ///
    /// A failed build leaves the chunk dirty, so a later frame schedules it again.
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        context.in_flight.meshing.remove(&self.coordinate);

        let Some((mesh, revision)) = self.outcome else {
            warn!("Mesh build for chunk {} failed, will retry", self.coordinate);
            return Vec::new();
        };

        let still_loaded = context
            .world
            .get_chunk_if_loaded(self.coordinate)
            .is_some_and(|loaded| loaded.ptr_eq(&self.chunk));
        if !still_loaded {
            trace!("Discarding mesh for unloaded chunk {}", self.coordinate);
            return Vec::new();
        }

        if !self.chunk.get_mut().install_mesh(mesh, revision) {
            trace!("Chunk {} changed while meshing, staying dirty", self.coordinate);
        }
        context.stats.record_meshed();
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::{
        core::config::TerrainConfig,
        engine_state::{
            frame_stats::FrameStats,
            task_management::task::InFlightWork,
            voxels::{
                block::block_type::BlockType, coordinates::ChunkDimensions, terrain::TerrainGenerator,
            },
        },
    };

    fn world() -> Arc<World> {
        let dimensions = ChunkDimensions::new(4, 4, 4);
        Arc::new(World::new(
            TerrainGenerator::new(1, TerrainConfig::default(), dimensions),
            None,
        ))
    }

    fn apply(world: &Arc<World>, result: Box<dyn TaskResult + Send>, in_flight: &mut InFlightWork) -> FrameStats {
        let mut stats = FrameStats::default();
        let mut context = TaskContext {
            world,
            mesh_builder: MeshBuilder::default(),
            in_flight,
            stats: &mut stats,
            mesh_budget: 0,
        };
        assert!(result.handle_result(&mut context).is_empty());
        stats
    }

    #[test]
    fn installs_mesh_and_clears_dirty() {
        let world = world();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = world.get_or_create_chunk(coordinate);
        assert!(chunk.get().is_dirty());

        let mut in_flight = InFlightWork::default();
        in_flight.meshing.insert(coordinate);
        let task = ChunkMeshGenerationTask::new(world.clone(), chunk.clone(), MeshBuilder::default());
        let stats = apply(&world, task.process(), &mut in_flight);

        assert_eq!(stats.meshed, 1);
        assert!(in_flight.meshing.is_empty());
        let chunk = chunk.get();
        assert!(!chunk.is_dirty());
        assert!(chunk.mesh().is_some());
        assert!(chunk.gpu_slot().needs_upload);
    }

    #[test]
    fn edit_during_build_keeps_chunk_dirty() {
        let world = world();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = world.get_or_create_chunk(coordinate);

        let task = ChunkMeshGenerationTask::new(world.clone(), chunk.clone(), MeshBuilder::default());
        let result = task.process();
        world.set_block(Point3::new(1, 1, 1), BlockType::AIR).unwrap();

        let mut in_flight = InFlightWork::default();
        let stats = apply(&world, result, &mut in_flight);
        assert_eq!(stats.meshed, 1);
        assert!(chunk.get().is_dirty());
        assert!(world.dirty_chunks().contains(&coordinate));
    }

    #[test]
    fn mesh_for_unloaded_chunk_is_discarded() {
        let world = world();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = world.get_or_create_chunk(coordinate);

        let task = ChunkMeshGenerationTask::new(world.clone(), chunk.clone(), MeshBuilder::default());
        let result = task.process();
        chunk.get_mut().clear_dirty();
        world.unload(coordinate).unwrap();

        let mut in_flight = InFlightWork::default();
        in_flight.meshing.insert(coordinate);
        let stats = apply(&world, result, &mut in_flight);
        assert_eq!(stats.meshed, 0);
        assert!(in_flight.meshing.is_empty());
        assert!(chunk.get().mesh().is_none());
    }

    #[test]
    fn failure_releases_the_claim_and_keeps_chunk_dirty() {
        let world = world();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        let chunk = world.get_or_create_chunk(coordinate);

        let mut in_flight = InFlightWork::default();
        in_flight.meshing.insert(coordinate);
        let task = ChunkMeshGenerationTask::new(world.clone(), chunk.clone(), MeshBuilder::default());
        let stats = apply(&world, task.failure(), &mut in_flight);

        assert_eq!(stats.meshed, 0);
        assert!(in_flight.meshing.is_empty());
        assert!(chunk.get().is_dirty());
    }
}

//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, which produces a requested
//! chunk on a worker thread: loaded from persistence if it was saved, otherwise
//! generated from the world seed.

use std::sync::Arc;

use log::{trace, warn};

use crate::{
    core::MtResource,
    engine_state::{
        rendering::tasks::ChunkMeshGenerationTask,
        task_management::task::{Task, TaskContext, TaskResult},
        voxels::{chunk::Chunk, coordinates::ChunkCoordinate, world::World},
    },
};

/// A task that generates one requested chunk.
///
/// The coordinate must have been requested with [`World::request_chunk`]. If the
/// request is cancelled before the task runs, or before it finishes, the chunk
/// never enters the world.
pub struct ChunkGenerationTask {
    world: Arc<World>,
    coordinate: ChunkCoordinate,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `world` - The world the chunk is inserted into
    /// * `coordinate` - The requested chunk coordinate
    pub fn new(world: Arc<World>, coordinate: ChunkCoordinate) -> Self {
        ChunkGenerationTask { world, coordinate }
    }
}

impl Task for ChunkGenerationTask {
    fn process(&self) -> Box<dyn TaskResult + Send> {
        Box::new(ChunkGenerationTaskResult {
            coordinate: self.coordinate,
            outcome: GenerationOutcome::Finished(self.world.generate_requested(self.coordinate)),
        })
    }

    fn failure(&self) -> Box<dyn TaskResult + Send> {
        Box::new(ChunkGenerationTaskResult {
            coordinate: self.coordinate,
            outcome: GenerationOutcome::Failed,
        })
    }

    fn describe(&self) -> String {
        format!("generate chunk {}", self.coordinate)
    }
}

enum GenerationOutcome {
    /// The inserted chunk, or `None` if the request was withdrawn.
    Finished(Option<MtResource<Chunk>>),
    Failed,
}

/// The result of a chunk generation task.
///
/// Schedules the new chunk's first mesh build when the frame's mesh budget
/// allows; otherwise the chunk waits, dirty, for the frame loop to pick it up.
pub struct ChunkGenerationTaskResult {
    coordinate: ChunkCoordinate,
    outcome: GenerationOutcome,
}

impl TaskResult for ChunkGenerationTaskResult {
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task + Send>> {
        context.in_flight.generation.remove(&self.coordinate);

        let chunk = match self.outcome {
            GenerationOutcome::Failed => {
                warn!("Generating chunk {} failed, dropping the request", self.coordinate);
                context.world.cancel_request(self.coordinate);
                return Vec::new();
            }
            GenerationOutcome::Finished(None) => {
                trace!("Generation of chunk {} was withdrawn", self.coordinate);
                return Vec::new();
            }
            GenerationOutcome::Finished(Some(chunk)) => chunk,
        };
        context.stats.record_generated();

        if context.mesh_budget == 0
            || context.in_flight.meshing.contains(&self.coordinate)
            || !chunk.get().is_dirty()
        {
            return Vec::new();
        }

        context.mesh_budget -= 1;
        context.in_flight.meshing.insert(self.coordinate);
        let mesh_task: Box<dyn Task + Send> = Box::new(ChunkMeshGenerationTask::new(
            context.world.clone(),
            chunk,
            context.mesh_builder,
        ));
        vec![mesh_task]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::config::TerrainConfig,
        engine_state::{
            frame_stats::FrameStats,
            rendering::meshing::MeshBuilder,
            task_management::task::InFlightWork,
            voxels::{coordinates::ChunkDimensions, terrain::TerrainGenerator},
        },
    };

    fn world() -> Arc<World> {
        let dimensions = ChunkDimensions::new(8, 16, 8);
        Arc::new(World::new(
            TerrainGenerator::new(9, TerrainConfig::default(), dimensions),
            None,
        ))
    }

    fn apply(
        world: &Arc<World>,
        result: Box<dyn TaskResult + Send>,
        in_flight: &mut InFlightWork,
        mesh_budget: usize,
    ) -> (FrameStats, Vec<Box<dyn Task + Send>>) {
        let mut stats = FrameStats::default();
        let mut context = TaskContext {
            world,
            mesh_builder: MeshBuilder::default(),
            in_flight,
            stats: &mut stats,
            mesh_budget,
        };
        let follow_ups = result.handle_result(&mut context);
        (stats, follow_ups)
    }

    #[test]
    fn requested_chunk_is_inserted_and_meshed() {
        let world = world();
        let coordinate = ChunkCoordinate::new(2, 0, -1);
        assert!(world.request_chunk(coordinate));

        let mut in_flight = InFlightWork::default();
        in_flight.generation.insert(coordinate);
        let task = ChunkGenerationTask::new(world.clone(), coordinate);
        let (stats, follow_ups) = apply(&world, task.process(), &mut in_flight, 4);

        assert_eq!(stats.generated, 1);
        assert!(world.is_loaded(coordinate));
        assert!(!world.is_requested(coordinate));
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].describe(), format!("mesh chunk {coordinate}"));
        assert!(in_flight.generation.is_empty());
        assert!(in_flight.meshing.contains(&coordinate));
    }

    #[test]
    fn exhausted_mesh_budget_defers_meshing() {
        let world = world();
        let coordinate = ChunkCoordinate::new(0, 0, 0);
        world.request_chunk(coordinate);

        let mut in_flight = InFlightWork::default();
        let task = ChunkGenerationTask::new(world.clone(), coordinate);
        let (stats, follow_ups) = apply(&world, task.process(), &mut in_flight, 0);

        assert_eq!(stats.generated, 1);
        assert!(follow_ups.is_empty());
        assert!(in_flight.meshing.is_empty());
        assert!(world.dirty_chunks().contains(&coordinate));
    }

    #[test]
    fn cancelled_request_inserts_nothing() {
        let world = world();
        let coordinate = ChunkCoordinate::new(5, 0, 5);
        world.request_chunk(coordinate);
        assert!(world.cancel_request(coordinate));

        let mut in_flight = InFlightWork::default();
        in_flight.generation.insert(coordinate);
        let task = ChunkGenerationTask::new(world.clone(), coordinate);
        let (stats, follow_ups) = apply(&world, task.process(), &mut in_flight, 4);

        assert_eq!(stats.generated, 0);
        assert!(follow_ups.is_empty());
        assert!(!world.is_loaded(coordinate));
        assert!(in_flight.generation.is_empty());
    }

    #[test]
    fn failure_withdraws_the_request() {
        let world = world();
        let coordinate = ChunkCoordinate::new(1, 0, 1);
        world.request_chunk(coordinate);

        let mut in_flight = InFlightWork::default();
        in_flight.generation.insert(coordinate);
        let task = ChunkGenerationTask::new(world.clone(), coordinate);
        let (stats, _) = apply(&world, task.failure(), &mut in_flight, 4);

        assert_eq!(stats.generated, 0);
        assert!(!world.is_requested(coordinate));
        assert!(!world.is_loaded(coordinate));
        assert!(in_flight.generation.is_empty());
    }
}

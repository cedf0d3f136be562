//! # Engine State Module
//!
//! The core engine module that drives the voxel world one frame at a time.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container and frame pipeline
//! * `camera_state` - Camera, projection, controller and frustum
//! * `visibility` - Load and draw set selection around the camera
//! * `rendering` - Meshing, the render context seam and the dispatcher
//! * `task_management` - Worker pool for generation and meshing
//! * `voxels` - Blocks, chunks, terrain, persistence and the world store
//!
//! ## Frame Pipeline
//!
//! Everything that touches the render context happens on the thread calling
//! [`EngineState::frame`]. Workers only generate chunks and build meshes; their
//! results are applied at the start of the next frame.
//!
//! 1. Query the camera and select the load and draw sets
//! 2. Apply finished worker results
//! 3. Generate missing chunks inside `sync_generation_radius` on this thread
//! 4. Request the nearest missing chunks from the workers, within budget
//! 5. Unload chunks beyond the retention radius and release their buffers
//! 6. Withdraw generation requests beyond the retention radius
//! 7. Schedule mesh builds for the nearest dirty chunks, within budget
//! 8. Dispatch uploads and draws near-to-far, then present

use std::{collections::HashSet, sync::Arc};

use cgmath::Point3;
use log::{debug, info, trace};
use web_time::Duration;

use crate::core::{
    config::EngineConfig,
    error::{EngineError, WorldError},
};
use frame_stats::FrameStats;
use rendering::{
    dispatcher::RenderDispatcher, meshing::MeshBuilder, tasks::ChunkMeshGenerationTask, RenderContext,
};
use task_management::{
    task::{InFlightWork, TaskContext},
    TaskManager,
};
use visibility::{VisibilityManager, VisibilitySelection};
use voxels::{
    block::block_type::BlockType, coordinates::ChunkCoordinate, persistence::PersistenceSink,
    tasks::ChunkGenerationTask, terrain::TerrainGenerator, world::World,
};

pub mod camera_state;
pub mod frame_stats;
pub mod rendering;
pub mod task_management;
pub mod visibility;
pub mod voxels;

/// The main state container for the voxel engine.
///
/// # Examples
///
/// ```
/// use cgmath::{Deg, Point3};
/// use voxel_world::core::config::EngineConfig;
/// use voxel_world::engine_state::{
///     camera_state::{camera::{Camera, Projection}, CameraState},
///     rendering::headless::RecordingRenderContext,
///     EngineState,
/// };
///
/// let mut config = EngineConfig::default();
/// config.streaming.view_distance = 1;
/// config.streaming.worker_threads = 0;
///
/// let mut engine = EngineState::new(config, None).unwrap();
/// let camera = Camera::new(Point3::new(8.0, 100.0, 8.0), Deg(0.0), Deg(-20.0));
/// let projection = Projection::new(800, 600, Deg(70.0), 0.1, 500.0);
/// let mut render = RecordingRenderContext::new(CameraState::new(camera, projection));
///
/// let stats = engine.frame(&mut render);
/// assert!(stats.generated > 0);
/// ```
pub struct EngineState {
    config: EngineConfig,
    world: Arc<World>,
    visibility: VisibilityManager,
    mesh_builder: MeshBuilder,
    dispatcher: RenderDispatcher,
    task_manager: TaskManager,
    /// Coordinates with a generation or mesh task outstanding
    in_flight: InFlightWork,
    /// Chunk the camera was in last frame
    camera_chunk: Option<ChunkCoordinate>,
    frame_index: u64,
    last_stats: FrameStats,
}

impl EngineState {
    /// Creates an engine with an empty world.
    ///
    /// # Arguments
    /// * `config` - Engine configuration; validated before anything is built
    /// * `persistence` - Optional sink for modified chunks. Without one, edits
    ///   are lost when a chunk unloads and the chunk is regenerated from the seed
    ///
    /// # Returns
    /// `EngineError::Config` if the configuration is invalid.
    pub fn new(config: EngineConfig, persistence: Option<Arc<dyn PersistenceSink>>) -> Result<Self, EngineError> {
        config.validate()?;

        let generator = TerrainGenerator::new(
            config.world.seed,
            config.terrain.clone(),
            config.world.chunk_dimensions,
        );
        let world = Arc::new(World::new(generator, persistence));
        let visibility = VisibilityManager::new(&config.streaming, &config.world);
        let mesh_builder = MeshBuilder::new(&config.mesh);
        let dispatcher = RenderDispatcher::new(&config.render);
        let task_manager = TaskManager::new(config.streaming.worker_threads);

        info!(
            "Engine ready: seed {}, chunks {}, view distance {}, {} workers",
            config.world.seed,
            config.world.chunk_dimensions,
            config.streaming.view_distance,
            task_manager.worker_count()
        );

        Ok(Self {
            config,
            world,
            visibility,
            mesh_builder,
            dispatcher,
            task_manager,
            in_flight: InFlightWork::default(),
            camera_chunk: None,
            frame_index: 0,
            last_stats: FrameStats::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn visibility(&self) -> &VisibilityManager {
        &self.visibility
    }

    pub fn dispatcher(&self) -> &RenderDispatcher {
        &self.dispatcher
    }

    /// Counters of the most recent frame.
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// `true` when no generation or mesh work is requested, queued or running.
    pub fn is_idle(&self) -> bool {
        self.task_manager.is_idle() && self.in_flight.is_empty() && self.world.requested_coordinates().is_empty()
    }

    /// Reads a block by world position; unloaded chunks read as air.
    pub fn get_block(&self, position: Point3<i32>) -> BlockType {
        self.world.get_block(position)
    }

    /// Places or breaks a block. The owning chunk is re-meshed on a later frame.
    pub fn set_block(&self, position: Point3<i32>, block: BlockType) -> Result<(), EngineError> {
        self.world.set_block(position, block).map_err(EngineError::from)
    }

    /// World y of the highest solid block in a column, if its chunks are loaded.
    pub fn surface_y(&self, x: i32, z: i32) -> Option<i32> {
        self.world.find_surface_y(x, z)
    }

    /// Runs one frame of the pipeline against `render`.
    pub fn frame(&mut self, render: &mut dyn RenderContext) -> FrameStats {
        let mut stats = FrameStats::default();
        let mut mesh_budget = self.config.streaming.max_mesh_builds_per_frame;

        let view = render.query_camera();
        let selection = self.visibility.select(&view);
        if self.camera_chunk != Some(selection.center) {
            debug!("Camera entered chunk {}", selection.center);
            self.camera_chunk = Some(selection.center);
        }

        mesh_budget = self.apply_results(&mut stats, mesh_budget);
        self.generate_nearby(&selection, &mut stats);
        self.request_generation(&selection);
        self.evict(&selection, render, &mut stats);
        mesh_budget = self.schedule_meshing(selection.center, mesh_budget);

        self.task_manager.process_queued_tasks();
        self.apply_results(&mut stats, mesh_budget);

        self.dispatcher.dispatch(&self.world, &selection.draw, render, &mut stats);
        stats.frustum_culled = selection.load.len() - selection.draw.len();
        render.present();

        stats.loaded = self.world.len();
        stats.pending = self.world.requested_coordinates().len();
        self.frame_index += 1;
        self.last_stats = stats;
        trace!("Frame {}: {}", self.frame_index, stats);
        stats
    }

    /// Applies every finished task result.
    ///
    /// # Returns
    /// The mesh budget left after results scheduled follow-up builds.
    fn apply_results(&mut self, stats: &mut FrameStats, mesh_budget: usize) -> usize {
        let mut context = TaskContext {
            world: &self.world,
            mesh_builder: self.mesh_builder,
            in_flight: &mut self.in_flight,
            stats,
            mesh_budget,
        };
        self.task_manager.process_completed_tasks(&mut context);
        context.mesh_budget
    }

    /// Generates missing chunks close to the camera on this thread, so the
    /// camera's surroundings exist from the first frame.
    fn generate_nearby(&mut self, selection: &VisibilitySelection, stats: &mut FrameStats) {
        let radius = self.config.streaming.sync_generation_radius;
        let metric = self.visibility.metric();
        for &coordinate in &selection.load {
            if !metric.within(selection.center, coordinate, radius)
                || self.world.is_loaded(coordinate)
                || self.in_flight.generation.contains(&coordinate)
            {
                continue;
            }
            self.world.get_or_create_chunk(coordinate);
            stats.record_generated();
        }
    }

    /// Requests the nearest missing chunks of the load set from the workers.
    fn request_generation(&mut self, selection: &VisibilitySelection) {
        let mut budget = self.config.streaming.max_generation_requests_per_frame;
        for &coordinate in &selection.load {
            if self.world.is_loaded(coordinate) {
                continue;
            }
            if self.in_flight.generation.contains(&coordinate) {
                // A withdrawn request whose task is still running; the result is wanted again.
                self.world.request_chunk(coordinate);
                continue;
            }
            if budget == 0 {
                continue;
            }
            // A request can outlive its task when the result was withdrawn and re-armed too late.
            if !self.world.request_chunk(coordinate) && !self.world.is_requested(coordinate) {
                continue;
            }

            budget -= 1;
            self.in_flight.generation.insert(coordinate);
            self.task_manager
                .publish_task(Box::new(ChunkGenerationTask::new(self.world.clone(), coordinate)));
        }
    }

    /// Unloads chunks and withdraws requests beyond the retention radius, along
    /// with requests left without a task outside the view distance.
    fn evict(&mut self, selection: &VisibilitySelection, render: &mut dyn RenderContext, stats: &mut FrameStats) {
        let report = self.world.unload_outside(
            selection.center,
            self.visibility.retention_radius(),
            self.visibility.metric(),
        );
        for unloaded in &report.unloaded {
            self.dispatcher.release_chunk(unloaded, render, stats);
        }
        stats.record_unloaded(report.unloaded.len());
        if !report.deferred.is_empty() {
            trace!("{} chunks wait for a rebuild before unloading", report.deferred.len());
        }

        for coordinate in self.world.requested_coordinates() {
            let orphaned = !self.in_flight.generation.contains(&coordinate)
                && !self.visibility.within_view(selection.center, coordinate);
            if orphaned || !self.visibility.within_retention(selection.center, coordinate) {
                self.world.cancel_request(coordinate);
            }
        }
    }

    /// Schedules mesh builds for dirty chunks nearest the camera first.
    ///
    /// Dirty chunks outside the retention radius are included last, since they
    /// cannot unload until they are clean.
    ///
    /// # Returns
    /// The mesh budget left.
    fn schedule_meshing(&mut self, center: ChunkCoordinate, mut mesh_budget: usize) -> usize {
        if mesh_budget == 0 {
            return 0;
        }

        let mut dirty: Vec<ChunkCoordinate> = self
            .world
            .dirty_chunks()
            .into_iter()
            .filter(|coordinate| !self.in_flight.meshing.contains(coordinate))
            .collect();
        dirty.sort_by_key(|coordinate| {
            let dx = coordinate.x - center.x;
            let dz = coordinate.z - center.z;
            (dx * dx + dz * dz, *coordinate)
        });

        for coordinate in dirty {
            if mesh_budget == 0 {
                break;
            }
            let Some(chunk) = self.world.get_chunk_if_loaded(coordinate) else {
                continue;
            };
            mesh_budget -= 1;
            self.in_flight.meshing.insert(coordinate);
            self.task_manager.publish_task(Box::new(ChunkMeshGenerationTask::new(
                self.world.clone(),
                chunk,
                self.mesh_builder,
            )));
        }
        mesh_budget
    }

    /// Releases every GPU buffer held for chunks, for example before the render
    /// context is recreated. Meshes are uploaded again when next drawn.
    pub fn release_gpu_resources(&mut self, render: &mut dyn RenderContext) {
        self.dispatcher.release_all(&self.world, render);
    }

    /// Waits for outstanding tasks, stops the workers and saves modified chunks.
    ///
    /// # Returns
    /// The number of chunks saved.
    pub fn shutdown(&mut self) -> usize {
        let mut stats = FrameStats::default();
        let mut context = TaskContext {
            world: &self.world,
            mesh_builder: self.mesh_builder,
            in_flight: &mut self.in_flight,
            stats: &mut stats,
            mesh_budget: 0,
        };
        self.task_manager.finish(&mut context, Duration::from_secs(5));
        self.task_manager.shutdown();

        let saved = self.world.save_all();
        info!("Engine shut down after {} frames, saved {} chunks", self.frame_index, saved);
        saved
    }

    /// Loaded chunk coordinates that are still dirty, for diagnostics.
    pub fn dirty_chunks(&self) -> HashSet<ChunkCoordinate> {
        self.world.dirty_chunks().into_iter().collect()
    }

    /// Unloads a single chunk immediately, releasing its buffers.
    ///
    /// # Returns
    /// `WorldError::RebuildPending` if the chunk still waits for a mesh rebuild.
    pub fn unload_chunk(
        &mut self,
        coordinate: ChunkCoordinate,
        render: &mut dyn RenderContext,
    ) -> Result<bool, WorldError> {
        let Some(unloaded) = self.world.unload(coordinate)? else {
            return Ok(false);
        };
        let mut stats = FrameStats::default();
        self.dispatcher.release_chunk(&unloaded, render, &mut stats);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;
    use crate::{
        core::{
            config::{EngineConfig, TerrainConfig},
            error::ConfigError,
        },
        engine_state::{
            camera_state::{
                camera::{Camera, Projection},
                CameraState,
            },
            rendering::headless::RecordingRenderContext,
            voxels::{coordinates::ChunkDimensions, persistence::MemoryPersistence},
        },
    };

    fn config(worker_threads: usize) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.world.seed = 3;
        config.world.chunk_dimensions = ChunkDimensions::new(8, 32, 8);
        config.streaming.view_distance = 1;
        config.streaming.hysteresis_margin = 1;
        config.streaming.worker_threads = worker_threads;
        config.streaming.max_generation_requests_per_frame = 4;
        config.streaming.max_mesh_builds_per_frame = 4;
        config.terrain = TerrainConfig {
            base_height: 12,
            amplitude: 4.0,
            frequency: 0.05,
            sea_level: 6,
            snow_line: 30,
            tree_chance: 0.0,
            ..TerrainConfig::default()
        };
        config
    }

    fn render_at(x: f32, z: f32) -> RecordingRenderContext {
        let camera = Camera::new(Point3::new(x, 40.0, z), Deg(0.0), Deg(-30.0));
        RecordingRenderContext::new(CameraState::new(camera, Projection::new(800, 600, Deg(70.0), 0.1, 500.0)))
    }

    /// Runs frames until all work is done.
    fn settle(engine: &mut EngineState, render: &mut RecordingRenderContext) -> usize {
        for frame in 1..=2000 {
            engine.frame(render);
            if engine.is_idle() && engine.dirty_chunks().is_empty() {
                return frame;
            }
            if engine.task_manager.worker_count() > 0 {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
        panic!("engine did not settle");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config(0);
        config.streaming.view_distance = 0;
        let result = EngineState::new(config, None);
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn inline_frames_load_mesh_and_draw_the_view() {
        let mut engine = EngineState::new(config(0), None).unwrap();
        let mut render = render_at(4.0, 4.0);

        // The camera's chunk synchronously, then four requests.
        let first = engine.frame(&mut render);
        assert_eq!(first.generated, 5);
        assert_eq!(first.pending, 0);

        settle(&mut engine, &mut render);
        let selection = engine.visibility().select(&render.query_camera());
        assert_eq!(selection.load.len(), 9);
        for coordinate in &selection.load {
            assert!(engine.world().is_loaded(*coordinate));
        }

        let stats = engine.frame(&mut render);
        assert_eq!(stats.loaded, 9);
        assert_eq!(stats.drawn, selection.draw.len());
        assert_eq!(stats.frustum_culled, 9 - selection.draw.len());
        assert_eq!(stats.uploaded, 0);
        assert_eq!(render.invalid_draws, 0);
        assert_eq!(render.last_frame().len(), selection.draw.len());
    }

    #[test]
    fn synchronous_radius_generates_camera_chunk_first_frame() {
        let mut config = config(0);
        config.streaming.sync_generation_radius = 0;
        config.streaming.max_generation_requests_per_frame = 0;
        let mut engine = EngineState::new(config, None).unwrap();
        let mut render = render_at(4.0, 4.0);

        let stats = engine.frame(&mut render);
        assert_eq!(stats.generated, 1);
        assert!(engine.world().is_loaded(ChunkCoordinate::new(0, 0, 0)));
        assert!(!engine.world().is_loaded(ChunkCoordinate::new(1, 0, 0)));
    }

    #[test]
    fn moving_away_unloads_chunks_and_releases_buffers() {
        let mut engine = EngineState::new(config(0), None).unwrap();
        let mut render = render_at(4.0, 4.0);
        settle(&mut engine, &mut render);
        let uploaded = render.uploads.clone();
        assert!(!uploaded.is_empty());

        render.camera_mut().camera.position = Point3::new(4.0 + 8.0 * 20.0, 40.0, 4.0);
        settle(&mut engine, &mut render);

        assert!(!engine.world().is_loaded(ChunkCoordinate::new(0, 0, 0)));
        assert_eq!(engine.world().len(), 9);
        for handle in uploaded {
            assert!(!render.is_resident(handle));
        }
        assert_eq!(render.resident_count(), engine.dispatcher().resident_count());
    }

    #[test]
    fn block_edit_is_remeshed_and_uploaded() {
        let mut engine = EngineState::new(config(0), None).unwrap();
        let mut render = render_at(4.0, 4.0);
        settle(&mut engine, &mut render);

        let surface = engine.surface_y(4, 4).unwrap();
        let above = Point3::new(4, surface + 1, 4);
        engine.set_block(above, BlockType::STONE).unwrap();
        assert!(engine.dirty_chunks().contains(&ChunkCoordinate::new(0, 0, 0)));

        let stats = engine.frame(&mut render);
        assert!(stats.meshed >= 1);
        assert!(engine.dirty_chunks().is_empty());
        assert_eq!(engine.get_block(above), BlockType::STONE);
    }

    #[test]
    fn worker_threads_reach_the_same_world() {
        let mut inline = EngineState::new(config(0), None).unwrap();
        let mut threaded = EngineState::new(config(2), None).unwrap();
        let mut inline_render = render_at(4.0, 4.0);
        let mut threaded_render = render_at(4.0, 4.0);

        settle(&mut inline, &mut inline_render);
        settle(&mut threaded, &mut threaded_render);

        let mut expected = inline.world().loaded_coordinates();
        let mut actual = threaded.world().loaded_coordinates();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual);
        for coordinate in expected {
            let a = inline.world().get_chunk_if_loaded(coordinate).unwrap();
            let b = threaded.world().get_chunk_if_loaded(coordinate).unwrap();
            assert_eq!(a.get().blocks(), b.get().blocks());
        }
        threaded.shutdown();
    }

    #[test]
    fn shutdown_saves_modified_chunks() {
        let persistence = Arc::new(MemoryPersistence::new());
        let mut engine = EngineState::new(config(0), Some(persistence.clone() as Arc<dyn PersistenceSink>)).unwrap();
        let mut render = render_at(4.0, 4.0);
        settle(&mut engine, &mut render);

        engine.set_block(Point3::new(1, 1, 1), BlockType::AIR).unwrap();
        assert_eq!(engine.shutdown(), 1);
        assert!(persistence.contains(ChunkCoordinate::new(0, 0, 0)));
    }
}

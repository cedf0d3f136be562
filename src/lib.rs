#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! A chunked voxel world engine: seeded terrain generation, a sparse chunk store
//! with streaming around the camera, face-culled and greedy meshing, and a render
//! dispatcher that keeps GPU buffers in step with chunk lifetime.
//!
//! ## Key Modules
//!
//! * `core` - Configuration, error types and the shared resource container
//! * `engine_state` - The engine proper: voxels, meshing, visibility, tasks and rendering
//!
//! ## Architecture
//!
//! The engine is driven one frame at a time through
//! [`engine_state::EngineState::frame`]. Rendering goes through the
//! [`engine_state::rendering::RenderContext`] trait, implemented for `wgpu` by
//! `WgpuRenderContext` and for tests and headless runs by
//! `RecordingRenderContext`.
//!
//! ## Usage
//!
//! ```no_run
//! use voxel_world::core::config::EngineConfig;
//!
//! voxel_world::init_logging();
//! let stats = voxel_world::run_headless(EngineConfig::default(), 120).unwrap();
//! println!("{stats}");
//! ```

use std::sync::Arc;

use cgmath::{Deg, Point3};
use log::info;
use web_time::{Duration, Instant};

use crate::{
    core::{config::EngineConfig, error::EngineError},
    engine_state::{
        camera_state::{
            camera::{Camera, MovementInput, Projection},
            CameraState,
        },
        frame_stats::FrameStats,
        rendering::headless::RecordingRenderContext,
        voxels::{persistence::PersistenceSink, terrain::TerrainGenerator},
        EngineState,
    },
};

pub mod core;
pub mod engine_state;

/// Initializes `env_logger` on stdout, filtered by `RUST_LOG`.
///
/// Calling it again after a logger is installed has no effect.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let initialized = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();

    if initialized {
        info!("Logger initialized");
    }
}

/// Runs the engine without a GPU for `frames` frames, flying the camera
/// forward at a fixed height above the spawn column.
///
/// # Arguments
/// * `config` - Engine configuration
/// * `frames` - Number of frames to run
///
/// # Returns
/// The totals over every frame, with `loaded` and `pending` taken from the last one.
pub fn run_headless(config: EngineConfig, frames: usize) -> Result<FrameStats, EngineError> {
    run_headless_with(config, None, frames)
}

/// Like [`run_headless`], saving modified chunks to `persistence`.
pub fn run_headless_with(
    config: EngineConfig,
    persistence: Option<Arc<dyn PersistenceSink>>,
    frames: usize,
) -> Result<FrameStats, EngineError> {
    let spawn = TerrainGenerator::new(
        config.world.seed,
        config.terrain.clone(),
        config.world.chunk_dimensions,
    )
    .surface_height(0, 0);

    let mut engine = EngineState::new(config, persistence)?;
    let camera = Camera::new(Point3::new(0.5, spawn as f32 + 24.0, 0.5), Deg(0.0), Deg(-20.0));
    let projection = Projection::new(1280, 720, Deg(70.0), 0.1, 1000.0);
    let mut render = RecordingRenderContext::new(CameraState::new(camera, projection));

    let forward = MovementInput {
        move_forward: true,
        ..MovementInput::default()
    };
    let frame_time = Duration::from_millis(16);
    let start = Instant::now();
    let mut totals = FrameStats::default();

    for frame in 0..frames {
        render.camera_mut().intake_input(&forward);
        render.camera_mut().update(frame_time);

        let stats = engine.frame(&mut render);
        totals.generated += stats.generated;
        totals.meshed += stats.meshed;
        totals.uploaded += stats.uploaded;
        totals.released += stats.released;
        totals.drawn += stats.drawn;
        totals.frustum_culled += stats.frustum_culled;
        totals.unloaded += stats.unloaded;
        totals.loaded = stats.loaded;
        totals.pending = stats.pending;

        if frame % 60 == 0 {
            info!("Frame {}: {}", frame, stats);
        }
    }

    engine.release_gpu_resources(&mut render);
    engine.shutdown();
    info!("Ran {} frames in {:?}: {}", frames, start.elapsed(), totals);
    Ok(totals)
}

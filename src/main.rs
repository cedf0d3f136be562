//! # Voxel World Demo
//!
//! Runs the engine headless, flying the camera across the terrain and logging
//! per-frame statistics.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json] [frames]
//! ```

use log::error;
use voxel_world::core::config::EngineConfig;

fn main() {
    voxel_world::init_logging();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match EngineConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(err) => {
                error!("Failed to load configuration from {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    let frames = args.next().and_then(|frames| frames.parse().ok()).unwrap_or(600);

    if let Err(err) = voxel_world::run_headless(config, frames) {
        error!("Engine failed: {}", err);
        std::process::exit(1);
    }
}

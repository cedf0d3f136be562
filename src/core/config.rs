//! # Engine Configuration
//!
//! All tunables are passed into the engine explicitly at construction. Nothing is
//! read from environment variables or other process state; the binary decides
//! where a configuration comes from and hands the parsed value over.
//!
//! Every section uses `#[serde(default)]`, so a JSON document only needs to name
//! the fields it wants to change:
//!
//! ```
//! use voxel_world::core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "world": { "seed": 42 } }"#).unwrap();
//! assert_eq!(config.world.seed, 42);
//! assert_eq!(config.world.chunk_dimensions.y, 256);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::engine_state::{
    rendering::meshing::MeshStrategy, visibility::DistanceMetric,
    voxels::coordinates::ChunkDimensions,
};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub world: WorldConfig,
    pub streaming: StreamingConfig,
    pub terrain: TerrainConfig,
    pub mesh: MeshConfig,
    pub render: RenderConfig,
}

/// World shape and seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed shared by the noise field and every feature placement roll.
    pub seed: u64,
    pub chunk_dimensions: ChunkDimensions,
    /// Number of chunk layers stacked vertically, starting at chunk y = 0.
    pub height_in_chunks: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            chunk_dimensions: ChunkDimensions::new(16, 256, 16),
            height_in_chunks: 1,
        }
    }
}

/// Load radius, eviction and per-frame work budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Load radius in chunk units around the camera's chunk.
    pub view_distance: i32,
    /// Extra chunks kept past `view_distance` before eviction.
    pub hysteresis_margin: i32,
    pub distance_metric: DistanceMetric,
    /// Chunks within this radius are generated on the frame thread if missing.
    pub sync_generation_radius: i32,
    pub max_generation_requests_per_frame: usize,
    pub max_mesh_builds_per_frame: usize,
    /// Zero runs every task inline on the frame thread.
    pub worker_threads: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            view_distance: 4,
            hysteresis_margin: 2,
            distance_metric: DistanceMetric::Chebyshev,
            sync_generation_radius: 0,
            max_generation_requests_per_frame: 8,
            max_mesh_builds_per_frame: 8,
            worker_threads: 2,
        }
    }
}

/// Heights, layers and feature frequencies used by the terrain generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub base_height: i32,
    pub amplitude: f64,
    pub frequency: f64,
    pub octaves: usize,
    pub persistence: f64,
    pub dirt_depth: i32,
    pub sea_level: i32,
    pub snow_line: i32,
    pub bedrock: bool,
    pub tree_chance: f64,
    pub trunk_height: i32,
    pub ore_threshold: f64,
    pub coal_chance: f64,
    pub iron_chance: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            base_height: 64,
            amplitude: 24.0,
            frequency: 0.01,
            octaves: 4,
            persistence: 0.5,
            dirt_depth: 3,
            sea_level: 56,
            snow_line: 82,
            bedrock: true,
            tree_chance: 0.01,
            trunk_height: 5,
            ore_threshold: 0.35,
            coal_chance: 0.12,
            iron_chance: 0.05,
        }
    }
}

/// Mesh builder settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub strategy: MeshStrategy,
}

/// GPU residency settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Upper bound on chunk buffers kept resident after they stop being drawn.
    pub max_resident_meshes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_resident_meshes: 256,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_owned()));
        let dims = self.world.chunk_dimensions;

        if dims.x == 0 || dims.y == 0 || dims.z == 0 {
            return invalid("chunk dimensions must be non-zero");
        }
        if dims.checked_volume().map_or(true, |volume| volume > i32::MAX as usize) {
            return invalid("chunk volume is too large");
        }
        if self.world.height_in_chunks < 1 {
            return invalid("height_in_chunks must be at least 1");
        }
        if self.streaming.view_distance < 1 {
            return invalid("view_distance must be at least 1");
        }
        if self.streaming.hysteresis_margin < 0 {
            return invalid("hysteresis_margin must not be negative");
        }
        if self.streaming.sync_generation_radius < 0 {
            return invalid("sync_generation_radius must not be negative");
        }
        if self.streaming.max_mesh_builds_per_frame == 0 {
            return invalid("max_mesh_builds_per_frame must be at least 1");
        }
        if !(self.terrain.frequency > 0.0) {
            return invalid("terrain frequency must be positive");
        }
        if self.terrain.octaves == 0 || self.terrain.octaves > 16 {
            return invalid("terrain octaves must be within 1..=16");
        }
        if self.terrain.dirt_depth < 0 || self.terrain.trunk_height < 0 {
            return invalid("dirt_depth and trunk_height must not be negative");
        }
        for (name, chance) in [
            ("tree_chance", self.terrain.tree_chance),
            ("coal_chance", self.terrain.coal_chance),
            ("iron_chance", self.terrain.iron_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=1")));
            }
        }
        if self.render.max_resident_meshes == 0 {
            return invalid("max_resident_meshes must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "streaming": { "view_distance": 2, "distance_metric": "euclidean" } }"#,
        )
        .unwrap();

        assert_eq!(config.streaming.view_distance, 2);
        assert_eq!(config.streaming.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(config.streaming.hysteresis_margin, 2);
        assert_eq!(config.terrain, TerrainConfig::default());

        let config = EngineConfig::from_json_str(r#"{ "mesh": { "strategy": "smooth" } }"#).unwrap();
        assert_eq!(config.mesh.strategy, MeshStrategy::Smooth);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let result = EngineConfig::from_json_str(r#"{ "streaming": { "view_distance": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = EngineConfig::from_json_str(
            r#"{ "world": { "chunk_dimensions": { "x": 16, "y": 0, "z": 16 } } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let huge = usize::MAX;
        let result = EngineConfig::from_json_str(&format!(
            r#"{{ "world": {{ "chunk_dimensions": {{ "x": {huge}, "y": {huge}, "z": 2 }} }} }}"#
        ));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = EngineConfig::from_json_str(r#"{ "terrain": { "tree_chance": 1.5 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = EngineConfig::from_json_str("{ world: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let mut config = EngineConfig::default();
        config.world.seed = 1234;
        config.mesh.strategy = MeshStrategy::Culled;

        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }
}

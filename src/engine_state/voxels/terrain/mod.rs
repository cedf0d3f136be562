//! # Terrain Generator
//!
//! Fills new chunks from the noise field.
//!
//! ## Passes
//!
//! 1. **Layers** - each world column gets a surface height from the height field.
//!    The surface block is grass, sand at or below sea level, or snow above the
//!    snow line. The next `dirt_depth` blocks are dirt (sand on beaches), and stone
//!    fills the rest down to a bedrock floor at world y = 0.
//! 2. **Ores** - stone inside dense pockets of the 3D density field may become
//!    coal or iron, decided by a per-block seeded roll.
//! 3. **Trees** - columns are picked by a seeded roll keyed on their world `(x, z)`.
//!    Columns within `CANOPY_RADIUS` of the chunk are evaluated as well, so a
//!    canopy that crosses a chunk border is stamped identically from both sides.
//!
//! The same noise also defines a continuous [`DensityField`] for smooth meshing:
//! the height field with a little 3D density detail on top. It only describes the
//! generated terrain, so it ignores trees and edits.
//!
//! Everything is a pure function of the seed and world coordinates, which makes
//! regenerating a chunk bit-identical and lets any number of chunks be generated
//! in parallel from a shared `&TerrainGenerator`.

pub mod features;

use cgmath::Point3;
use log::trace;
use web_time::Instant;

use super::{
    block::block_type::BlockType,
    chunk::Chunk,
    coordinates::{ChunkCoordinate, ChunkDimensions},
    noise_generator::NoiseGenerator,
};
use crate::{
    core::config::TerrainConfig,
    engine_state::rendering::meshing::mesh::DensityField,
};
use features::CANOPY_RADIUS;

/// Blocks of overhang the 3D density adds to the smooth surface.
const SMOOTH_DETAIL: f64 = 2.0;

/// Produces fully initialized chunks for any chunk coordinate.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    noise: NoiseGenerator,
    config: TerrainConfig,
    dimensions: ChunkDimensions,
}

impl TerrainGenerator {
    pub fn new(seed: u64, config: TerrainConfig, dimensions: ChunkDimensions) -> Self {
        Self {
            noise: NoiseGenerator::new(seed, &config),
            config,
            dimensions,
        }
    }

    pub fn noise(&self) -> &NoiseGenerator {
        &self.noise
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dimensions
    }

    /// World y of the topmost terrain block in a column, before trees.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let sample = self.noise.sample(x as f64, z as f64);
        self.config.base_height + (sample * self.config.amplitude).round() as i32
    }

    /// Unrounded surface height, the top face of the column's surface block.
    fn continuous_surface(&self, x: f64, z: f64) -> f64 {
        let sample = self.noise.sample(x, z);
        self.config.base_height as f64 + sample * self.config.amplitude + 1.0
    }

    /// Block type forming the surface at the given height.
    pub fn surface_block(&self, surface: i32) -> BlockType {
        if surface <= self.config.sea_level {
            BlockType::SAND
        } else if surface >= self.config.snow_line {
            BlockType::SNOW
        } else {
            BlockType::GRASS
        }
    }

    /// Generates the chunk at `coordinate`.
    pub fn generate(&self, coordinate: ChunkCoordinate) -> Chunk {
        let started = Instant::now();
        let dimensions = self.dimensions;
        let origin = coordinate.origin(dimensions);
        let mut blocks = vec![BlockType::AIR; dimensions.volume()];

        for lx in 0..dimensions.x {
            for lz in 0..dimensions.z {
                let wx = origin.x + lx as i32;
                let wz = origin.z + lz as i32;
                let surface = self.surface_height(wx, wz);

                let top = (surface - origin.y + 1).clamp(0, dimensions.y as i32) as usize;
                for ly in 0..top {
                    let wy = origin.y + ly as i32;
                    blocks[dimensions.index(lx, ly, lz)] = self.layer_block(wx, wy, wz, surface);
                }
            }
        }

        self.place_trees(coordinate, &mut blocks);

        trace!(
            "Generated chunk {} in {:?}",
            coordinate,
            started.elapsed()
        );
        Chunk::from_generated(coordinate, dimensions, blocks)
    }

    fn layer_block(&self, x: i32, y: i32, z: i32, surface: i32) -> BlockType {
        if y > surface {
            return BlockType::AIR;
        }
        if self.config.bedrock && y == 0 {
            return BlockType::BEDROCK;
        }

        let depth = surface - y;
        if depth == 0 {
            return self.surface_block(surface);
        }
        if depth <= self.config.dirt_depth {
            return if surface <= self.config.sea_level {
                BlockType::SAND
            } else {
                BlockType::DIRT
            };
        }

        let density = self.noise.sample_3d(x as f64, y as f64, z as f64);
        features::ore_at(self.noise.seed(), Point3::new(x, y, z), density, &self.config)
            .unwrap_or(BlockType::STONE)
    }

    fn place_trees(&self, coordinate: ChunkCoordinate, blocks: &mut [BlockType]) {
        if self.config.tree_chance <= 0.0 {
            return;
        }

        let dimensions = self.dimensions;
        let origin = coordinate.origin(dimensions);
        let [sx, _, sz] = dimensions.as_i32();
        let mut canopy = Vec::new();

        let mut stamp = |position: Point3<i32>, block: BlockType, only_into_air: bool| {
            let local = Point3::new(
                position.x - origin.x,
                position.y - origin.y,
                position.z - origin.z,
            );
            if !dimensions.contains(local.x, local.y, local.z) {
                return;
            }
            let index = dimensions.index(local.x as usize, local.y as usize, local.z as usize);
            if !only_into_air || blocks[index] == BlockType::AIR {
                blocks[index] = block;
            }
        };

        for wx in origin.x - CANOPY_RADIUS..origin.x + sx + CANOPY_RADIUS {
            for wz in origin.z - CANOPY_RADIUS..origin.z + sz + CANOPY_RADIUS {
                if !features::has_tree(self.noise.seed(), wx, wz, self.config.tree_chance) {
                    continue;
                }
                let surface = self.surface_height(wx, wz);
                if self.surface_block(surface) != BlockType::GRASS {
                    continue;
                }

                for (position, block) in
                    features::tree_blocks(Point3::new(wx, surface, wz), self.config.trunk_height)
                {
                    if block == BlockType::WOOD {
                        stamp(position, block, false);
                    } else {
                        canopy.push(position);
                    }
                }
            }
        }

        // Leaves go in after every trunk so overlapping trees resolve the same way
        // regardless of which candidate column was visited first.
        for position in canopy {
            stamp(position, BlockType::LEAVES, true);
        }
    }
}

impl DensityField for TerrainGenerator {
    fn density(&self, x: f64, y: f64, z: f64) -> f64 {
        self.continuous_surface(x, z) - y + SMOOTH_DETAIL * self.noise.sample_3d(x, y, z)
    }

    fn surface_block(&self, y: i32) -> BlockType {
        TerrainGenerator::surface_block(self, y)
    }
}

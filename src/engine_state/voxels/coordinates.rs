//! # Chunk Coordinates
//!
//! Translation between world block positions, chunk-grid coordinates and
//! chunk-local offsets. Chunk dimensions are a runtime value so the same code
//! handles the default 16×256×16 layout and the small chunks used in tests.
//!
//! World positions map to `(ChunkCoordinate, LocalPosition)` with Euclidean
//! division, so negative world coordinates land in the chunk below zero with a
//! non-negative local offset, and the mapping is exactly inverted by
//! [`ChunkCoordinate::to_world`].

use std::fmt;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use super::block::block_side::BlockSide;
use crate::engine_state::camera_state::frustum::Aabb;

/// Size of a chunk in blocks along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDimensions {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl ChunkDimensions {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total number of blocks in one chunk.
    ///
    /// Only for validated dimensions; use [`checked_volume`](Self::checked_volume)
    /// on sizes read from outside.
    pub const fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Total number of blocks, or `None` if it does not fit in a `usize`.
    pub fn checked_volume(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    /// Dimensions as signed integers, for world-space arithmetic.
    pub fn as_i32(&self) -> [i32; 3] {
        [self.x as i32, self.y as i32, self.z as i32]
    }

    /// Returns `true` if the local coordinate lies inside the chunk.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.x
            && (y as usize) < self.y
            && (z as usize) < self.z
    }

    /// Flat index of a local coordinate, x-major then y then z.
    ///
    /// The caller guarantees the coordinate is in range.
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.y + y) * self.z + z
    }
}

impl fmt::Display for ChunkDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Block offset inside a chunk, each component in `[0, S)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPosition {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl LocalPosition {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Sides of the chunk this position touches.
    pub fn touching_sides(&self, dimensions: ChunkDimensions) -> Vec<BlockSide> {
        let mut sides = Vec::new();
        if self.x == 0 {
            sides.push(BlockSide::LEFT);
        }
        if self.x + 1 == dimensions.x {
            sides.push(BlockSide::RIGHT);
        }
        if self.y == 0 {
            sides.push(BlockSide::BOTTOM);
        }
        if self.y + 1 == dimensions.y {
            sides.push(BlockSide::TOP);
        }
        if self.z == 0 {
            sides.push(BlockSide::BACK);
        }
        if self.z + 1 == dimensions.z {
            sides.push(BlockSide::FRONT);
        }
        sides
    }
}

/// Position of a chunk in chunk-grid space; one unit is one chunk width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoordinate {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Splits a world block position into its chunk and local offset.
    ///
    /// # Arguments
    /// * `world` - Block position in world space
    /// * `dimensions` - Chunk size used by the world
    ///
    /// # Returns
    /// The owning chunk and the block's offset inside it.
    pub fn from_world(world: Point3<i32>, dimensions: ChunkDimensions) -> (Self, LocalPosition) {
        let [sx, sy, sz] = dimensions.as_i32();
        let coordinate = Self::new(
            world.x.div_euclid(sx),
            world.y.div_euclid(sy),
            world.z.div_euclid(sz),
        );
        let local = LocalPosition::new(
            world.x.rem_euclid(sx) as usize,
            world.y.rem_euclid(sy) as usize,
            world.z.rem_euclid(sz) as usize,
        );
        (coordinate, local)
    }

    /// Chunk containing a continuous world-space point, such as the camera.
    pub fn containing(point: Point3<f32>, dimensions: ChunkDimensions) -> Self {
        let [sx, sy, sz] = dimensions.as_i32();
        Self::new(
            (point.x / sx as f32).floor() as i32,
            (point.y / sy as f32).floor() as i32,
            (point.z / sz as f32).floor() as i32,
        )
    }

    /// World position of a block given its local offset in this chunk.
    pub fn to_world(&self, local: LocalPosition, dimensions: ChunkDimensions) -> Point3<i32> {
        let origin = self.origin(dimensions);
        Point3::new(
            origin.x + local.x as i32,
            origin.y + local.y as i32,
            origin.z + local.z as i32,
        )
    }

    /// World position of the chunk's minimum corner block.
    pub fn origin(&self, dimensions: ChunkDimensions) -> Point3<i32> {
        let [sx, sy, sz] = dimensions.as_i32();
        Point3::new(self.x * sx, self.y * sy, self.z * sz)
    }

    /// World-space bounding box of the chunk.
    pub fn bounds(&self, dimensions: ChunkDimensions) -> Aabb {
        let origin = self.origin(dimensions);
        let [sx, sy, sz] = dimensions.as_i32();
        Aabb::new(
            Point3::new(origin.x as f32, origin.y as f32, origin.z as f32),
            Point3::new(
                (origin.x + sx) as f32,
                (origin.y + sy) as f32,
                (origin.z + sz) as f32,
            ),
        )
    }

    /// World-space centre of the chunk.
    pub fn center(&self, dimensions: ChunkDimensions) -> Point3<f32> {
        let bounds = self.bounds(dimensions);
        Point3::new(
            (bounds.min.x + bounds.max.x) * 0.5,
            (bounds.min.y + bounds.max.y) * 0.5,
            (bounds.min.z + bounds.max.z) * 0.5,
        )
    }

    /// The adjacent chunk across the given side.
    pub fn neighbor(&self, side: BlockSide) -> Self {
        let [dx, dy, dz] = side.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

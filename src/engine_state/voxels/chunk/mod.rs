//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a fixed-size 3D grid of blocks plus the
//! bookkeeping that ties the grid to its mesh and GPU buffer.
//!
//! ## Storage
//!
//! Chunks keep two views of their contents:
//! - `blocks`: one `BlockType` per position, x-major then y then z
//! - `solid`: a bit vector (1 bit per block) mirroring `blocks[i] != AIR`
//!
//! The bit vector is what the mesh builder reads when it culls faces; keeping it
//! next to the block array makes every solidity check O(1) without touching the
//! wider block data.
//!
//! ## Mesh State
//!
//! Every block edit marks the chunk dirty and bumps its `revision`. A mesh built
//! from revision `r` only clears the dirty flag if the chunk is still at `r` when
//! the mesh is installed, so edits made while a worker was meshing are never lost.

use std::sync::Arc;

use bitvec::prelude::BitVec;

use super::block::block_type::BlockType;
use super::coordinates::{ChunkCoordinate, ChunkDimensions, LocalPosition};
use crate::core::error::ChunkError;
use crate::engine_state::rendering::{meshing::mesh::Mesh, MeshHandle};

pub mod chunk_iteration;

/// GPU-side state owned by a chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GpuMeshSlot {
    /// Buffer currently holding this chunk's mesh in the render context.
    pub handle: Option<MeshHandle>,
    /// Set when a new mesh was installed and has not been uploaded yet.
    pub needs_upload: bool,
}

/// A cuboid region of the voxel world: the unit of storage, generation and meshing.
#[derive(Debug)]
pub struct Chunk {
    position: ChunkCoordinate,
    dimensions: ChunkDimensions,
    blocks: Vec<BlockType>,
    solid: BitVec,
    solid_count: usize,
    dirty: bool,
    revision: u64,
    modified: bool,
    mesh: Option<Arc<Mesh>>,
    gpu: GpuMeshSlot,
}

impl Chunk {
    /// Creates a chunk filled with air.
    pub fn empty(position: ChunkCoordinate, dimensions: ChunkDimensions) -> Self {
        Self::filled(position, dimensions, BlockType::AIR)
    }

    /// Creates a chunk filled with a single block type.
    pub fn filled(position: ChunkCoordinate, dimensions: ChunkDimensions, block: BlockType) -> Self {
        let volume = dimensions.volume();
        Self {
            position,
            dimensions,
            blocks: vec![block; volume],
            solid: BitVec::repeat(block.is_solid(), volume),
            solid_count: if block.is_solid() { volume } else { 0 },
            dirty: true,
            revision: 0,
            modified: false,
            mesh: None,
            gpu: GpuMeshSlot::default(),
        }
    }

    /// Builds a chunk from a complete block array in x-major / y / z order.
    ///
    /// This is the only way fully generated or loaded data becomes a `Chunk`, so
    /// no caller ever observes a half-filled grid.
    ///
    /// # Returns
    /// `ChunkError::BlockCountMismatch` if `blocks` does not hold exactly one entry
    /// per position.
    pub fn from_blocks(
        position: ChunkCoordinate,
        dimensions: ChunkDimensions,
        blocks: Vec<BlockType>,
    ) -> Result<Self, ChunkError> {
        if blocks.len() != dimensions.volume() {
            return Err(ChunkError::BlockCountMismatch {
                expected: dimensions.volume(),
                found: blocks.len(),
            });
        }

        Ok(Self::from_generated(position, dimensions, blocks))
    }

    /// Wraps a block array whose length the caller already guarantees.
    pub(crate) fn from_generated(
        position: ChunkCoordinate,
        dimensions: ChunkDimensions,
        blocks: Vec<BlockType>,
    ) -> Self {
        debug_assert_eq!(blocks.len(), dimensions.volume());
        let solid: BitVec = blocks.iter().map(|block| block.is_solid()).collect();
        let solid_count = solid.count_ones();

        Self {
            position,
            dimensions,
            blocks,
            solid,
            solid_count,
            dirty: true,
            revision: 0,
            modified: false,
            mesh: None,
            gpu: GpuMeshSlot::default(),
        }
    }

    pub fn position(&self) -> ChunkCoordinate {
        self.position
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dimensions
    }

    /// Reads the block at a local coordinate.
    ///
    /// # Returns
    /// `ChunkError::OutOfBounds` if any component lies outside `[0, S)`.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<BlockType, ChunkError> {
        let index = self.checked_index(x, y, z)?;
        Ok(self.blocks[index])
    }

    /// Overwrites the block at a local coordinate.
    ///
    /// Marks the chunk dirty and modified when the value actually changes. Writing
    /// the value already stored is a no-op and leaves the mesh valid.
    ///
    /// # Returns
    /// `Ok(true)` if the block changed, `Ok(false)` if it already held `block`.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockType) -> Result<bool, ChunkError> {
        let index = self.checked_index(x, y, z)?;
        let previous = self.blocks[index];
        if previous == block {
            return Ok(false);
        }

        self.blocks[index] = block;
        if previous.is_solid() != block.is_solid() {
            self.solid.set(index, block.is_solid());
            if block.is_solid() {
                self.solid_count += 1;
            } else {
                self.solid_count -= 1;
            }
        }
        self.modified = true;
        self.mark_dirty();
        Ok(true)
    }

    /// Reads a block by local position without bounds checking beyond the slice's own.
    pub fn block_at(&self, local: LocalPosition) -> BlockType {
        self.blocks[self.dimensions.index(local.x, local.y, local.z)]
    }

    /// Solidity at a local coordinate; anything outside the chunk reads as air.
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        if !self.dimensions.contains(x, y, z) {
            return false;
        }
        self.solid[self.dimensions.index(x as usize, y as usize, z as usize)]
    }

    /// Returns `true` if every block is air.
    pub fn is_empty(&self) -> bool {
        self.solid_count == 0
    }

    /// Number of non-air blocks.
    pub fn solid_count(&self) -> usize {
        self.solid_count
    }

    /// All blocks in storage order, for persistence.
    pub fn blocks(&self) -> &[BlockType] {
        &self.blocks
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the mesh as up to date with the current blocks.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Invalidates the current mesh, for example because a neighbor changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Counter bumped on every invalidation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns `true` if blocks changed since the chunk was generated, loaded or saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Latest mesh built for this chunk, if any.
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    /// Installs a mesh built from `built_revision`.
    ///
    /// The mesh always replaces the previous one. The dirty flag is only cleared if
    /// no edit happened after the build started.
    ///
    /// # Returns
    /// `true` if the chunk is clean after installing.
    pub fn install_mesh(&mut self, mesh: Mesh, built_revision: u64) -> bool {
        self.mesh = Some(Arc::new(mesh));
        self.gpu.needs_upload = true;
        if built_revision == self.revision {
            self.clear_dirty();
        }
        !self.dirty
    }

    pub fn gpu_slot(&self) -> GpuMeshSlot {
        self.gpu
    }

    pub fn gpu_slot_mut(&mut self) -> &mut GpuMeshSlot {
        &mut self.gpu
    }

    fn checked_index(&self, x: i32, y: i32, z: i32) -> Result<usize, ChunkError> {
        if !self.dimensions.contains(x, y, z) {
            return Err(ChunkError::OutOfBounds {
                x,
                y,
                z,
                dimensions: self.dimensions,
            });
        }
        Ok(self.dimensions.index(x as usize, y as usize, z as usize))
    }
}

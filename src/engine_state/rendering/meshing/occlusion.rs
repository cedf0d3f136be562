//! # Occlusion
//!
//! Solidity lookups for face culling, including the one-block shell around a
//! chunk that belongs to its six neighbors.
//!
//! Neighbor boundaries are copied out into [`NeighborPlanes`] before the chunk
//! being meshed is locked, so a mesh build never holds two chunk locks at once.
//! A neighbor that is not loaded contributes nothing and its side reads as air;
//! the world re-dirties the chunk when that neighbor arrives.

use bitvec::prelude::BitVec;

use super::mesh::DensityField;

use crate::{
    core::MtResource,
    engine_state::voxels::{
        block::block_side::BlockSide,
        chunk::{chunk_iteration::ChunkBlockIterator, Chunk},
        coordinates::{ChunkCoordinate, ChunkDimensions},
    },
};

/// Read access to loaded chunks, used to find a chunk's neighbors.
pub trait NeighborLookup {
    fn chunk_if_loaded(&self, coordinate: ChunkCoordinate) -> Option<MtResource<Chunk>>;

    /// Terrain density for smooth meshing, if the lookup can provide one.
    fn density_field(&self) -> Option<&dyn DensityField> {
        None
    }
}

/// Axes spanning a boundary plane, in ascending order.
fn plane_axes(normal_axis: usize) -> (usize, usize) {
    match normal_axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Solidity of the layer each neighbor presents to the chunk, one plane per side.
#[derive(Debug, Clone, Default)]
pub struct NeighborPlanes {
    planes: [Option<BitVec>; 6],
}

impl NeighborPlanes {
    /// Planes for a chunk with no loaded neighbors.
    pub fn none() -> Self {
        Self::default()
    }

    /// Copies the touching layer out of every loaded neighbor of `coordinate`.
    ///
    /// Each neighbor is read-locked on its own and released before the next one.
    pub fn gather<L>(coordinate: ChunkCoordinate, dimensions: ChunkDimensions, lookup: &L) -> Self
    where
        L: NeighborLookup + ?Sized,
    {
        let mut planes = Self::none();
        for side in BlockSide::all() {
            let Some(neighbor) = lookup.chunk_if_loaded(coordinate.neighbor(side)) else {
                continue;
            };
            let neighbor = neighbor.get();
            if neighbor.dimensions() != dimensions {
                continue;
            }
            planes.planes[side as usize] = Some(Self::boundary_layer(&neighbor, side.opposite()));
        }
        planes
    }

    /// Solidity of `chunk`'s outermost layer on `face`.
    fn boundary_layer(chunk: &Chunk, face: BlockSide) -> BitVec {
        let dims = chunk.dimensions().as_i32();
        let normal_axis = face.normal_axis();
        let (a_axis, b_axis) = plane_axes(normal_axis);
        let layer = if face.is_positive() { dims[normal_axis] - 1 } else { 0 };

        let mut plane = BitVec::with_capacity((dims[a_axis] * dims[b_axis]) as usize);
        for a in 0..dims[a_axis] {
            for b in 0..dims[b_axis] {
                let mut position = [0; 3];
                position[normal_axis] = layer;
                position[a_axis] = a;
                position[b_axis] = b;
                plane.push(chunk.is_solid(position[0], position[1], position[2]));
            }
        }
        plane
    }

    /// Returns `true` if the neighbor across `side` is loaded.
    pub fn has(&self, side: BlockSide) -> bool {
        self.planes[side as usize].is_some()
    }
}

/// Solidity of a chunk padded by one block on every side.
#[derive(Debug, Clone)]
pub struct OcclusionMask {
    padded: [usize; 3],
    solid: BitVec,
}

impl OcclusionMask {
    /// Combines a chunk's own blocks with its neighbors' boundary planes.
    pub fn new(chunk: &Chunk, neighbors: &NeighborPlanes) -> Self {
        let dims = chunk.dimensions();
        let padded = [dims.x + 2, dims.y + 2, dims.z + 2];
        let mut mask = Self {
            padded,
            solid: BitVec::repeat(false, padded[0] * padded[1] * padded[2]),
        };

        for (local, _) in ChunkBlockIterator::new(chunk) {
            mask.set(local.x as i32, local.y as i32, local.z as i32);
        }

        let sizes = dims.as_i32();
        for side in BlockSide::all() {
            let Some(plane) = &neighbors.planes[side as usize] else {
                continue;
            };
            let normal_axis = side.normal_axis();
            let (a_axis, b_axis) = plane_axes(normal_axis);
            let layer = if side.is_positive() { sizes[normal_axis] } else { -1 };

            for bit in plane.iter_ones() {
                let a = bit as i32 / sizes[b_axis];
                let b = bit as i32 % sizes[b_axis];
                let mut position = [0; 3];
                position[normal_axis] = layer;
                position[a_axis] = a;
                position[b_axis] = b;
                mask.set(position[0], position[1], position[2]);
            }
        }

        mask
    }

    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        let [px, py, pz] = [x + 1, y + 1, z + 1];
        if px < 0 || py < 0 || pz < 0 {
            return None;
        }
        let [px, py, pz] = [px as usize, py as usize, pz as usize];
        if px >= self.padded[0] || py >= self.padded[1] || pz >= self.padded[2] {
            return None;
        }
        Some((px * self.padded[1] + py) * self.padded[2] + pz)
    }

    fn set(&mut self, x: i32, y: i32, z: i32) {
        if let Some(index) = self.index(x, y, z) {
            self.solid.set(index, true);
        }
    }

    /// Solidity at a local coordinate in `[-1, S]`; anything further out is air.
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.index(x, y, z).is_some_and(|index| self.solid[index])
    }

    /// Returns `true` if the face of the block at `local` on `side` borders air.
    pub fn is_exposed(&self, local: [i32; 3], side: BlockSide) -> bool {
        let [dx, dy, dz] = side.offset();
        !self.is_solid(local[0] + dx, local[1] + dy, local[2] + dz)
    }
}

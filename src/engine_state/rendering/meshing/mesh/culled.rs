//! Face-culled meshing: one quad per exposed block face, no merging.

use crate::engine_state::voxels::{
    block::block_side::BlockSide,
    chunk::{chunk_iteration::ChunkBlockIterator, Chunk},
};

use super::{face::Face, mesh::Mesh};
use crate::engine_state::rendering::meshing::occlusion::OcclusionMask;

/// Appends a unit face for every solid block face that borders air.
pub fn culled(chunk: &Chunk, occlusion: &OcclusionMask, mesh: &mut Mesh) {
    let dimensions = chunk.dimensions();
    for (local, block_type) in ChunkBlockIterator::new(chunk) {
        let position = [local.x as i32, local.y as i32, local.z as i32];
        let world = chunk.position().to_world(local, dimensions);
        for side in BlockSide::all() {
            if occlusion.is_exposed(position, side) {
                mesh.push_face(&Face::new(side, block_type, world, 1, 1));
            }
        }
    }
}

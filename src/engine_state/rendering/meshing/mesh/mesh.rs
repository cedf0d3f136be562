//! Mesh data structures for voxel rendering.
//!
//! A `Mesh` is the CPU-side geometry of one chunk: a flat vertex list and a
//! triangle index list ready to be copied into GPU buffers as-is.

use crate::engine_state::{rendering::vertex::Vertex, voxels::block::block_side::BlockSide};

use super::face::Face;

/// Index pattern for one quad, relative to its first vertex.
const QUAD_INDICES: [u32; 6] = [0, 1, 3, 0, 3, 2];

/// Geometry for a single chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Quads emitted per side, indexed by `BlockSide`.
    pub side_counts: [u32; 6],
}

impl Mesh {
    /// Creates a new, empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the mesh has no geometry and needs no GPU buffer.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Quads in a block mesh; meaningless for smooth meshes.
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Appends one face as four vertices and two triangles.
    ///
    /// The vertex color is the block's base color scaled by the face's shade factor.
    pub fn push_face(&mut self, face: &Face) {
        let base = self.vertices.len() as u32;
        let normal: [f32; 3] = face.side.normal().into();
        let texture_index = face.block_type.texture_indices()[face.side as usize];
        let shade = face.side.shade();
        let color = face.block_type.color().map(|channel| channel * shade);

        self.vertices.extend(face.corners().into_iter().map(|corner| Vertex {
            position: corner.position,
            normal,
            tex_coords: corner.tex_coords,
            texture_index,
            color,
        }));
        self.indices.extend(QUAD_INDICES.iter().map(|index| base + index));
        self.side_counts[face.side as usize] += 1;
    }

    /// Quads emitted for one side.
    pub fn side_count(&self, side: BlockSide) -> u32 {
        self.side_counts[side as usize]
    }

    /// Approximate size of the mesh once uploaded.
    pub fn byte_size(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice()) + std::mem::size_of_val(self.indices.as_slice())
    }
}

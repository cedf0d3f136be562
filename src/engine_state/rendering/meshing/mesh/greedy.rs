//! Greedy meshing implementation for voxel rendering.
//!
//! This module implements the greedy meshing algorithm which combines adjacent
//! coplanar faces of the same block type into larger quads, significantly
//! reducing the number of vertices needed to render a chunk.
//!
//! ## Algorithm
//!
//! For each side and each block layer along the side's normal:
//! 1. Build a 2D mask holding the block type of every exposed face in the layer
//! 2. Scan the mask; at each unvisited cell, extend a run along `u` while the
//!    block type matches
//! 3. Extend the run along `v` while every cell of the next row matches
//! 4. Emit the rectangle as one face and mark its cells visited
//!
//! The emitted faces cover exactly the same unit faces as the culled strategy.

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, block_type::BlockType},
    chunk::Chunk,
};

use super::{face::Face, mesh::Mesh};
use crate::engine_state::rendering::meshing::occlusion::OcclusionMask;

/// Exposed faces of one layer, `u`-major.
struct LayerMask {
    width: usize,
    height: usize,
    cells: Vec<Option<BlockType>>,
}

impl LayerMask {
    fn get(&self, u: usize, v: usize) -> Option<BlockType> {
        self.cells[u * self.height + v]
    }

    fn clear(&mut self, u: usize, v: usize) {
        self.cells[u * self.height + v] = None;
    }
}

/// Appends the greedily merged faces of `chunk` to `mesh`.
pub fn greedy(chunk: &Chunk, occlusion: &OcclusionMask, mesh: &mut Mesh) {
    if chunk.is_empty() {
        return;
    }
    for side in BlockSide::all() {
        greedy_side(chunk, occlusion, side, mesh);
    }
}

fn greedy_side(chunk: &Chunk, occlusion: &OcclusionMask, side: BlockSide, mesh: &mut Mesh) {
    let sizes = chunk.dimensions().as_i32();
    let normal_axis = side.normal_axis();
    let (u_axis, v_axis) = side.plane_axes();
    let origin = chunk.position().origin(chunk.dimensions());

    for layer in 0..sizes[normal_axis] {
        let mut mask = build_layer(chunk, occlusion, side, layer);

        for v in 0..mask.height {
            for u in 0..mask.width {
                let Some(block_type) = mask.get(u, v) else {
                    continue;
                };

                let mut width = 1;
                while u + width < mask.width && mask.get(u + width, v) == Some(block_type) {
                    width += 1;
                }

                let mut height = 1;
                'rows: while v + height < mask.height {
                    for offset in 0..width {
                        if mask.get(u + offset, v + height) != Some(block_type) {
                            break 'rows;
                        }
                    }
                    height += 1;
                }

                for du in 0..width {
                    for dv in 0..height {
                        mask.clear(u + du, v + dv);
                    }
                }

                let mut local = [0; 3];
                local[normal_axis] = layer;
                local[u_axis] = u as i32;
                local[v_axis] = v as i32;
                let world = cgmath::Point3::new(
                    origin.x + local[0],
                    origin.y + local[1],
                    origin.z + local[2],
                );
                mesh.push_face(&Face::new(side, block_type, world, width as u32, height as u32));
            }
        }
    }
}

fn build_layer(chunk: &Chunk, occlusion: &OcclusionMask, side: BlockSide, layer: i32) -> LayerMask {
    let sizes = chunk.dimensions().as_i32();
    let normal_axis = side.normal_axis();
    let (u_axis, v_axis) = side.plane_axes();
    let (width, height) = (sizes[u_axis] as usize, sizes[v_axis] as usize);

    let mut cells = vec![None; width * height];
    for u in 0..width {
        for v in 0..height {
            let mut local = [0; 3];
            local[normal_axis] = layer;
            local[u_axis] = u as i32;
            local[v_axis] = v as i32;
            if !occlusion.is_solid(local[0], local[1], local[2]) || !occlusion.is_exposed(local, side) {
                continue;
            }
            let block_type = chunk
                .get_block(local[0], local[1], local[2])
                .unwrap_or(BlockType::AIR);
            if block_type.is_solid() {
                cells[u * height + v] = Some(block_type);
            }
        }
    }

    LayerMask { width, height, cells }
}

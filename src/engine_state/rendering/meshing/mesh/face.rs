//! # Face Module
//!
//! A rectangular run of coplanar block faces, the unit both meshing strategies
//! emit. The culled strategy produces 1×1 faces; the greedy strategy merges
//! neighbors of the same block type into larger ones.
//!
//! ## Orientation
//!
//! Each side has a fixed in-plane basis `(u, v)` with `u × v` equal to the
//! side's normal, so the corner order `ll, lr, ul, ur` combined with the index
//! pattern `[0, 1, 3, 0, 3, 2]` always winds counter-clockwise seen from outside.

use cgmath::Point3;

use crate::engine_state::voxels::block::{block_side::BlockSide, block_type::BlockType};

/// A merged rectangle of exposed faces on one block layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub side: BlockSide,
    pub block_type: BlockType,
    /// World position of the block with the smallest coordinates covered by the face.
    pub origin: Point3<i32>,
    /// Extent in blocks along the side's first plane axis.
    pub width: u32,
    /// Extent in blocks along the side's second plane axis.
    pub height: u32,
}

/// One corner of a face, ready to become a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Face {
    pub fn new(side: BlockSide, block_type: BlockType, origin: Point3<i32>, width: u32, height: u32) -> Self {
        Self {
            side,
            block_type,
            origin,
            width,
            height,
        }
    }

    /// Number of unit block faces covered.
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Corners in `ll, lr, ul, ur` order.
    ///
    /// Texture coordinates span `width × height`, so a repeating sampler tiles
    /// the block texture once per covered block.
    pub fn corners(&self) -> [Corner; 4] {
        let (u_axis, v_axis) = self.side.plane_axes();
        let (u_positive, v_positive) = self.basis_signs();
        let normal_axis = self.side.normal_axis();

        let origin = [self.origin.x, self.origin.y, self.origin.z];
        let mut plane = origin;
        if self.side.is_positive() {
            plane[normal_axis] += 1;
        }

        let extent = |axis: usize, size: u32, positive: bool, far: bool| {
            // "far" is the end reached by walking along the basis vector
            let reaches_max = far == positive;
            if reaches_max {
                origin[axis] + size as i32
            } else {
                origin[axis]
            }
        };

        let (width, height) = (self.width as f32, self.height as f32);
        let corner = |far_u: bool, far_v: bool, tex_coords: [f32; 2]| {
            let mut position = plane;
            position[u_axis] = extent(u_axis, self.width, u_positive, far_u);
            position[v_axis] = extent(v_axis, self.height, v_positive, far_v);
            Corner {
                position: [position[0] as f32, position[1] as f32, position[2] as f32],
                tex_coords,
            }
        };

        [
            corner(false, false, [0.0, height]),
            corner(true, false, [width, height]),
            corner(false, true, [0.0, 0.0]),
            corner(true, true, [width, 0.0]),
        ]
    }

    /// Whether the in-plane basis vectors point along `+u` and `+v`.
    fn basis_signs(&self) -> (bool, bool) {
        match self.side {
            BlockSide::RIGHT => (false, true),
            BlockSide::LEFT => (true, true),
            BlockSide::FRONT => (true, true),
            BlockSide::BACK => (false, true),
            BlockSide::TOP => (true, false),
            BlockSide::BOTTOM => (true, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;

    fn vector(corner: &Corner) -> Vector3<f32> {
        Vector3::from(corner.position)
    }

    #[test]
    fn corners_wind_counter_clockwise_from_outside() {
        for side in BlockSide::all() {
            let face = Face::new(side, BlockType::STONE, Point3::new(2, 3, 4), 3, 2);
            let [ll, lr, _, ur] = face.corners();
            let winding = (vector(&lr) - vector(&ll)).cross(vector(&ur) - vector(&ll));
            let normal = side.normal();
            assert!(winding.normalize().dot(normal) > 0.99, "{side:?}");
        }
    }

    #[test]
    fn corners_lie_on_the_outer_plane() {
        let face = Face::new(BlockSide::TOP, BlockType::GRASS, Point3::new(0, 7, 0), 1, 1);
        for corner in face.corners() {
            assert_eq!(corner.position[1], 8.0);
        }

        let face = Face::new(BlockSide::LEFT, BlockType::GRASS, Point3::new(5, 0, 0), 1, 1);
        for corner in face.corners() {
            assert_eq!(corner.position[0], 5.0);
        }
    }

    #[test]
    fn merged_face_spans_its_extent() {
        let face = Face::new(BlockSide::FRONT, BlockType::DIRT, Point3::new(0, 0, 0), 4, 2);
        let [ll, lr, ul, ur] = face.corners();
        assert_eq!(ll.position, [0.0, 0.0, 1.0]);
        assert_eq!(lr.position, [4.0, 0.0, 1.0]);
        assert_eq!(ul.position, [0.0, 2.0, 1.0]);
        assert_eq!(ur.position, [4.0, 2.0, 1.0]);
        assert_eq!(ur.tex_coords, [4.0, 0.0]);
        assert_eq!(face.area(), 8);
    }
}

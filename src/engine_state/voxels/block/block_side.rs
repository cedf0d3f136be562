//! # Block Side Module
//!
//! The six faces of a voxel block, with the direction each one faces and the
//! constant light factor applied to faces pointing that way.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The discriminants index per-side tables such as
/// [`BlockType::texture_indices`](super::block_type::BlockType::texture_indices).
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in discriminant order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Unit step in block space towards the face's neighbor.
    pub fn offset(&self) -> [i32; 3] {
        match self {
            BlockSide::FRONT => [0, 0, 1],
            BlockSide::BACK => [0, 0, -1],
            BlockSide::BOTTOM => [0, -1, 0],
            BlockSide::TOP => [0, 1, 0],
            BlockSide::LEFT => [-1, 0, 0],
            BlockSide::RIGHT => [1, 0, 0],
        }
    }

    /// Outward facing normal.
    pub fn normal(&self) -> Vector3<f32> {
        let [x, y, z] = self.offset();
        Vector3::new(x as f32, y as f32, z as f32)
    }

    /// The face pointing the other way.
    pub fn opposite(&self) -> BlockSide {
        match self {
            BlockSide::FRONT => BlockSide::BACK,
            BlockSide::BACK => BlockSide::FRONT,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
        }
    }

    /// Axis index (0 = x, 1 = y, 2 = z) the face is perpendicular to.
    pub fn normal_axis(&self) -> usize {
        match self {
            BlockSide::LEFT | BlockSide::RIGHT => 0,
            BlockSide::BOTTOM | BlockSide::TOP => 1,
            BlockSide::FRONT | BlockSide::BACK => 2,
        }
    }

    /// Returns `true` if the face points along the positive direction of its axis.
    pub fn is_positive(&self) -> bool {
        matches!(self, BlockSide::FRONT | BlockSide::TOP | BlockSide::RIGHT)
    }

    /// Axes spanned by the face as `(u, v)`; `v` is vertical on the four walls.
    pub fn plane_axes(&self) -> (usize, usize) {
        match self {
            BlockSide::LEFT | BlockSide::RIGHT => (2, 1),
            BlockSide::BOTTOM | BlockSide::TOP => (0, 2),
            BlockSide::FRONT | BlockSide::BACK => (0, 1),
        }
    }

    /// Directional light factor baked into vertex colors.
    pub fn shade(&self) -> f32 {
        match self {
            BlockSide::TOP => 1.0,
            BlockSide::FRONT => 0.9,
            BlockSide::BACK => 0.8,
            BlockSide::LEFT | BlockSide::RIGHT => 0.7,
            BlockSide::BOTTOM => 0.5,
        }
    }
}

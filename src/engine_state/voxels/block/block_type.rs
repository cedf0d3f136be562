//! # Block Type Module
//!
//! The fixed set of block types in the world and their compact `u8` encoding.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The discriminant is the on-disk and in-memory id; `AIR` is always 0. The
/// `FromPrimitive` derive backs [`BlockType::from_id`], which is how persisted
/// chunk data is decoded.
#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Never meshed, never occludes.
    #[default]
    AIR = 0,
    STONE,
    DIRT,
    /// Grass top over a dirt body.
    GRASS,
    SAND,
    SNOW,
    /// Tree trunk.
    WOOD,
    LEAVES,
    COAL_ORE,
    IRON_ORE,
    /// Unbreakable floor at world y = 0.
    BEDROCK,
}

impl BlockType {
    /// Decodes a block id, returning `None` for ids no variant uses.
    pub fn from_id(id: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(id)
    }

    /// The compact id stored in chunk data.
    pub fn id(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Returns `true` for every block that occupies space.
    pub fn is_solid(self) -> bool {
        self != BlockType::AIR
    }

    /// Texture atlas tile for each face, indexed by `BlockSide`.
    ///
    /// Order: [Front, Back, Bottom, Top, Left, Right]
    pub fn texture_indices(self) -> [u32; 6] {
        match self {
            BlockType::AIR => [0; 6],
            BlockType::STONE => [0; 6],
            BlockType::DIRT => [1; 6],
            BlockType::GRASS => [2, 2, 1, 3, 2, 2],
            BlockType::SAND => [4; 6],
            BlockType::SNOW => [5; 6],
            BlockType::WOOD => [6, 6, 7, 7, 6, 6],
            BlockType::LEAVES => [8; 6],
            BlockType::COAL_ORE => [9; 6],
            BlockType::IRON_ORE => [10; 6],
            BlockType::BEDROCK => [11; 6],
        }
    }

    /// Base albedo used for untextured rendering.
    pub fn color(self) -> [f32; 3] {
        match self {
            BlockType::AIR => [0.0, 0.0, 0.0],
            BlockType::STONE => [0.5, 0.5, 0.5],
            BlockType::DIRT => [0.545, 0.27, 0.075],
            BlockType::GRASS => [0.235, 0.69, 0.26],
            BlockType::SAND => [0.86, 0.8, 0.55],
            BlockType::SNOW => [0.95, 0.96, 0.98],
            BlockType::WOOD => [0.4, 0.26, 0.13],
            BlockType::LEAVES => [0.18, 0.5, 0.16],
            BlockType::COAL_ORE => [0.25, 0.25, 0.25],
            BlockType::IRON_ORE => [0.66, 0.52, 0.45],
            BlockType::BEDROCK => [0.15, 0.15, 0.17],
        }
    }
}

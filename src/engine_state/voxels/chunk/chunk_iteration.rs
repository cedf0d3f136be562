//! # Chunk Iteration Module
//!
//! An iterator over the non-air blocks of a chunk.
//!
//! The iterator walks the chunk's `solid` bit vector with `iter_ones`, so air
//! runs are skipped a machine word at a time instead of block by block. Each
//! set bit is turned back into a local position from the flat x / y / z index.

use bitvec::{order::Lsb0, slice::IterOnes};

use super::Chunk;
use crate::engine_state::voxels::{block::block_type::BlockType, coordinates::LocalPosition};

/// Yields `(position, block)` for every solid block in storage order.
pub struct ChunkBlockIterator<'a> {
    chunk_ref: &'a Chunk,
    ones: IterOnes<'a, usize, Lsb0>,
}

impl<'a> ChunkBlockIterator<'a> {
    pub fn new(chunk_ref: &'a Chunk) -> Self {
        ChunkBlockIterator {
            chunk_ref,
            ones: chunk_ref.solid.iter_ones(),
        }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = (LocalPosition, BlockType);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.ones.next()?;
        let dimensions = self.chunk_ref.dimensions;
        let z = index % dimensions.z;
        let y = (index / dimensions.z) % dimensions.y;
        let x = index / (dimensions.z * dimensions.y);
        Some((LocalPosition::new(x, y, z), self.chunk_ref.blocks[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::coordinates::{ChunkCoordinate, ChunkDimensions};

    #[test]
    fn yields_only_solid_blocks_with_positions() {
        let mut chunk = Chunk::empty(ChunkCoordinate::new(0, 0, 0), ChunkDimensions::new(3, 5, 2));
        chunk.set_block(2, 4, 1, BlockType::STONE).unwrap();
        chunk.set_block(0, 1, 0, BlockType::GRASS).unwrap();

        let blocks: Vec<_> = ChunkBlockIterator::new(&chunk).collect();
        assert_eq!(
            blocks,
            vec![
                (LocalPosition::new(0, 1, 0), BlockType::GRASS),
                (LocalPosition::new(2, 4, 1), BlockType::STONE),
            ]
        );
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let chunk = Chunk::empty(ChunkCoordinate::new(0, 0, 0), ChunkDimensions::new(4, 4, 4));
        assert_eq!(ChunkBlockIterator::new(&chunk).count(), 0);
    }
}

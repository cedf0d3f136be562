//! # Chunk Persistence
//!
//! Modified chunks are written out before they are evicted and read back the next
//! time their coordinate is requested, so edits survive unloading.
//!
//! ## Chunk File Format
//!
//! | Offset | Size        | Contents                                   |
//! |--------|-------------|--------------------------------------------|
//! | 0      | 4           | Magic `VXCK`                               |
//! | 4      | 1           | Format version (currently 1)               |
//! | 5      | 12          | Chunk dimensions as three little-endian u32 |
//! | 17     | x · y · z   | One block id per block, storage order      |
//!
//! A file whose dimensions differ from the world's is rejected rather than
//! resized; the world then regenerates the chunk from the seed.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::debug;

use super::{
    block::block_type::BlockType,
    chunk::Chunk,
    coordinates::{ChunkCoordinate, ChunkDimensions},
};
use crate::core::{error::PersistenceError, mt_resource::lock_recovering};

const MAGIC: &[u8; 4] = b"VXCK";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 12;

/// Block contents of one chunk, detached from any live `Chunk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub dimensions: ChunkDimensions,
    pub blocks: Vec<BlockType>,
}

impl BlockData {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            dimensions: chunk.dimensions(),
            blocks: chunk.blocks().to_vec(),
        }
    }

    /// Serializes the blocks in the chunk file format.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.blocks.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        for axis in [self.dimensions.x, self.dimensions.y, self.dimensions.z] {
            bytes.extend_from_slice(&(axis as u32).to_le_bytes());
        }
        bytes.extend(self.blocks.iter().map(|block| block.id()));
        bytes
    }

    /// Parses bytes written by [`BlockData::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        if bytes.len() < HEADER_LEN {
            return Err(PersistenceError::Corrupt(format!(
                "{} bytes is shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(PersistenceError::Corrupt("bad magic".to_owned()));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(PersistenceError::Corrupt(format!(
                "unsupported format version {}",
                bytes[4]
            )));
        }

        let mut axes = [0usize; 3];
        for (i, axis) in axes.iter_mut().enumerate() {
            let start = 5 + i * 4;
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[start..start + 4]);
            *axis = u32::from_le_bytes(word) as usize;
        }
        let dimensions = ChunkDimensions::new(axes[0], axes[1], axes[2]);

        let volume = dimensions
            .checked_volume()
            .ok_or_else(|| PersistenceError::Corrupt(format!("chunk size {dimensions} overflows")))?;

        let body = &bytes[HEADER_LEN..];
        if body.len() != volume {
            return Err(PersistenceError::Corrupt(format!(
                "expected {} block ids for {}, found {}",
                volume,
                dimensions,
                body.len()
            )));
        }

        let blocks = body
            .iter()
            .map(|&id| BlockType::from_id(id).ok_or(PersistenceError::UnknownBlock(id)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { dimensions, blocks })
    }

    /// Turns the data into a chunk of a world using `dimensions`.
    pub fn into_chunk(
        self,
        coordinate: ChunkCoordinate,
        dimensions: ChunkDimensions,
    ) -> Result<Chunk, PersistenceError> {
        if self.dimensions != dimensions {
            return Err(PersistenceError::DimensionMismatch {
                expected: dimensions,
                found: self.dimensions,
            });
        }
        Ok(Chunk::from_generated(coordinate, dimensions, self.blocks))
    }
}

/// Storage for modified chunks, shared between the frame thread and workers.
pub trait PersistenceSink: Send + Sync {
    fn save(&self, coordinate: ChunkCoordinate, data: &BlockData) -> Result<(), PersistenceError>;

    /// Returns `Ok(None)` when nothing was saved for `coordinate`.
    fn load(&self, coordinate: ChunkCoordinate) -> Result<Option<BlockData>, PersistenceError>;
}

/// Stores one file per chunk, named `{x}_{y}_{z}.chk`, in a directory.
#[derive(Debug)]
pub struct FilePersistence {
    directory: PathBuf,
}

impl FilePersistence {
    /// Opens (and creates if needed) a chunk directory.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn chunk_path(&self, coordinate: ChunkCoordinate) -> PathBuf {
        self.directory
            .join(format!("{}_{}_{}.chk", coordinate.x, coordinate.y, coordinate.z))
    }
}

impl PersistenceSink for FilePersistence {
    fn save(&self, coordinate: ChunkCoordinate, data: &BlockData) -> Result<(), PersistenceError> {
        let path = self.chunk_path(coordinate);
        let staging = path.with_extension("chk.tmp");
        fs::write(&staging, data.encode())?;
        fs::rename(&staging, &path)?;
        debug!("Saved chunk {} to {}", coordinate, path.display());
        Ok(())
    }

    fn load(&self, coordinate: ChunkCoordinate) -> Result<Option<BlockData>, PersistenceError> {
        match fs::read(self.chunk_path(coordinate)) {
            Ok(bytes) => BlockData::decode(&bytes).map(Some),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

/// Keeps encoded chunks in memory; used by tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    chunks: Mutex<HashMap<ChunkCoordinate, Vec<u8>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.chunks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, coordinate: ChunkCoordinate) -> bool {
        lock_recovering(&self.chunks).contains_key(&coordinate)
    }
}

impl PersistenceSink for MemoryPersistence {
    fn save(&self, coordinate: ChunkCoordinate, data: &BlockData) -> Result<(), PersistenceError> {
        lock_recovering(&self.chunks).insert(coordinate, data.encode());
        Ok(())
    }

    fn load(&self, coordinate: ChunkCoordinate) -> Result<Option<BlockData>, PersistenceError> {
        let bytes = lock_recovering(&self.chunks).get(&coordinate).cloned();
        bytes.map(|bytes| BlockData::decode(&bytes)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> BlockData {
        let dimensions = ChunkDimensions::new(2, 3, 2);
        let mut blocks = vec![BlockType::AIR; dimensions.volume()];
        blocks[0] = BlockType::BEDROCK;
        blocks[5] = BlockType::GRASS;
        blocks[11] = BlockType::IRON_ORE;
        BlockData { dimensions, blocks }
    }

    #[test]
    fn header_layout() {
        let bytes = sample_data().encode();
        assert_eq!(&bytes[0..4], b"VXCK");
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(&bytes[5..9], &2u32.to_le_bytes());
        assert_eq!(&bytes[9..13], &3u32.to_le_bytes());
        assert_eq!(bytes.len(), HEADER_LEN + 12);
        assert_eq!(bytes[HEADER_LEN], BlockType::BEDROCK.id());
    }

    #[test]
    fn corrupt_input_is_rejected() {
        let good = sample_data().encode();

        assert!(matches!(
            BlockData::decode(&good[..10]),
            Err(PersistenceError::Corrupt(_))
        ));

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            BlockData::decode(&bad_magic),
            Err(PersistenceError::Corrupt(_))
        ));

        let mut truncated = good.clone();
        truncated.pop();
        assert!(matches!(
            BlockData::decode(&truncated),
            Err(PersistenceError::Corrupt(_))
        ));

        let mut unknown = good;
        unknown[HEADER_LEN + 1] = 200;
        assert!(matches!(
            BlockData::decode(&unknown),
            Err(PersistenceError::UnknownBlock(200))
        ));
    }

    #[test]
    fn oversized_header_dimensions_are_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        for _ in 0..3 {
            bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        }
        bytes.extend_from_slice(&[0; 16]);

        assert!(matches!(
            BlockData::decode(&bytes),
            Err(PersistenceError::Corrupt(_))
        ));
    }

    #[test]
    fn mismatched_dimensions_do_not_become_chunks() {
        let result = sample_data().into_chunk(
            ChunkCoordinate::new(0, 0, 0),
            ChunkDimensions::new(16, 256, 16),
        );
        assert!(matches!(
            result,
            Err(PersistenceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn file_sink_saves_and_loads() {
        let directory = tempfile::tempdir().unwrap();
        let sink = FilePersistence::new(directory.path().join("chunks")).unwrap();
        let coordinate = ChunkCoordinate::new(-2, 0, 7);

        assert_eq!(sink.load(coordinate).unwrap(), None);
        sink.save(coordinate, &sample_data()).unwrap();
        assert!(sink.directory().join("-2_0_7.chk").exists());
        assert_eq!(sink.load(coordinate).unwrap(), Some(sample_data()));
    }

    #[test]
    fn memory_sink_saves_and_loads() {
        let sink = MemoryPersistence::new();
        let coordinate = ChunkCoordinate::new(1, 0, 1);
        assert!(sink.is_empty());

        sink.save(coordinate, &sample_data()).unwrap();
        assert!(sink.contains(coordinate));
        assert_eq!(sink.load(coordinate).unwrap(), Some(sample_data()));
        assert_eq!(sink.load(ChunkCoordinate::new(0, 0, 0)).unwrap(), None);
    }
}

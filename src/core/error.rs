//! Error types for the voxel world engine.
//!
//! Each subsystem has its own error enum so callers can match on exactly the
//! failures that subsystem produces; `EngineError` wraps them all for code that
//! drives the whole pipeline.

use thiserror::Error;

use crate::engine_state::{
    rendering::MeshHandle,
    voxels::coordinates::{ChunkCoordinate, ChunkDimensions},
};

/// Errors raised by direct chunk access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    /// A local coordinate fell outside `[0, S)` on at least one axis.
    #[error("local position ({x}, {y}, {z}) is outside chunk bounds {dimensions}")]
    OutOfBounds {
        x: i32,
        y: i32,
        z: i32,
        dimensions: ChunkDimensions,
    },

    /// A block array did not match the chunk's volume.
    #[error("expected {expected} blocks, found {found}")]
    BlockCountMismatch { expected: usize, found: usize },
}

/// Errors raised by a persistence sink.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt chunk data: {0}")]
    Corrupt(String),

    #[error("saved chunk is {found}, world uses {expected}")]
    DimensionMismatch {
        expected: ChunkDimensions,
        found: ChunkDimensions,
    },

    #[error("unknown block id {0}")]
    UnknownBlock(u8),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reported by a render context.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("upload for {handle} failed: {reason}")]
    Upload { handle: MeshHandle, reason: String },
}

/// Errors raised by world-level operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The chunk still has a mesh rebuild outstanding and cannot be evicted yet.
    #[error("chunk {0} has a pending mesh rebuild")]
    RebuildPending(ChunkCoordinate),

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Umbrella error for code that drives the full engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

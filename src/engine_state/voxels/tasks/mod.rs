//! # Voxel Task System
//!
//! Tasks that generate (or load) chunks off the frame thread, so terrain
//! streaming never stalls a frame.

pub mod chunk_generation_task;

pub use chunk_generation_task::ChunkGenerationTask;

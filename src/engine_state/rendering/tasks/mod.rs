//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: Builds a chunk's mesh off the frame thread

pub mod chunk_mesh_generation_task;

pub use chunk_mesh_generation_task::ChunkMeshGenerationTask;

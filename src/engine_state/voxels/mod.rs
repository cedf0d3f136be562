//! # Voxel World
//!
//! Block data, chunk storage and procedural generation.
//!
//! ## Architecture
//!
//! * **Block**: block types, their ids and the six block sides
//! * **Coordinates**: translation between world, chunk and local positions
//! * **Chunk**: fixed-size 3D arrays of blocks with dirty/revision tracking
//! * **Noise Generator**: seeded height and density fields
//! * **Terrain**: layer, ore and tree placement on top of the noise fields
//! * **World**: the sparse chunk store, coordinating generation, edits and eviction
//! * **Persistence**: saving and loading modified chunks
//! * **Tasks**: background chunk generation
//!
//! ## Data Flow
//!
//! 1. The frame loop asks the world for chunks near the camera
//! 2. The world loads them from persistence or generates them from the seed
//! 3. Edits mark chunks (and touching neighbors) dirty
//! 4. Dirty chunks are picked up by the mesh builder
//! 5. Chunks far from the camera are saved if modified and evicted

pub mod block;
pub mod chunk;
pub mod coordinates;
pub mod noise_generator;
pub mod persistence;
pub mod tasks;
pub mod terrain;
pub mod world;

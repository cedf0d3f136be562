//! Mesh generation for voxel rendering.
//!
//! This module converts a chunk's blocks into GPU-friendly geometry. The two
//! block strategies produce the same visible surface; the smooth strategy
//! instead follows a continuous density field.
//!
//! # Architecture
//! - [`Mesh`]: Vertex and index lists for one chunk
//! - [`Face`]: A rectangle of coplanar block faces and its four corners
//! - [`culled`]: One quad per exposed face
//! - [`greedy`]: Adjacent faces of the same block type merged into larger quads
//! - [`smooth`]: Marching tetrahedra over a [`DensityField`]
//!
//! Both block strategies skip every face whose neighbor is solid, including across
//! chunk borders, using the occlusion mask built by the caller.

mod culled;
mod face;
mod greedy;
mod mesh;
mod smooth;

pub use culled::culled;
pub use face::{Corner, Face};
pub use greedy::greedy;
pub use mesh::*;
pub use smooth::{smooth, DensityField};

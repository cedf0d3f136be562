//! Rendering system for the voxel engine.
//!
//! The engine never talks to a GPU API directly. Everything it needs from the
//! outside world for drawing goes through the [`RenderContext`] trait: buffer
//! uploads keyed by an opaque [`MeshHandle`], draw submissions, the current
//! camera, and a present call at the end of each frame.
//!
//! # Architecture
//! - `meshing/`: Converts chunk blocks into [`Mesh`](meshing::Mesh) geometry
//! - `dispatcher`: Keeps GPU buffers in step with chunk meshes and issues draws
//! - `headless`: A recording render context used by tests and the demo binary
//! - `wgpu_context`: A `wgpu` render context with one buffer pair per chunk
//! - `tasks/`: Background mesh building

use std::fmt;

use super::camera_state::CameraView;
use crate::core::error::RenderError;
use meshing::Mesh;

pub mod dispatcher;
pub mod headless;
pub mod meshing;
pub mod tasks;
mod vertex;
pub mod wgpu_context;

// Re-export commonly used types
pub use vertex::Vertex;

/// Opaque identifier of one chunk's GPU buffers inside a render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(u64);

impl MeshHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// The surface the engine renders through.
///
/// All calls happen on the frame thread, in this order each frame:
/// `query_camera`, any number of `upload`/`release`/`draw`, then `present`.
pub trait RenderContext {
    /// Uploads a mesh's vertex and index data, replacing whatever `handle` held.
    fn upload(&mut self, handle: MeshHandle, mesh: &Mesh) -> Result<(), RenderError>;

    /// Frees the buffers behind `handle`. Unknown handles are ignored.
    fn release(&mut self, handle: MeshHandle);

    /// Queues one draw call for an uploaded handle.
    fn draw(&mut self, handle: MeshHandle);

    /// Camera position and frustum for the frame about to be built.
    fn query_camera(&self) -> CameraView;

    /// Ends the frame.
    fn present(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_display() {
        assert_eq!(MeshHandle::new(7).to_string(), "mesh#7");
        assert_eq!(MeshHandle::new(7).id(), 7);
    }
}

//! # WGPU Render Context
//!
//! A [`RenderContext`] backed by a `wgpu` device. Each mesh handle owns one
//! vertex buffer and one index buffer. Re-uploading into a handle writes in
//! place when the existing buffers are large enough and reallocates otherwise.
//!
//! Pipeline, surface and bind group setup stay with the caller. After the
//! engine's frame has run, the caller opens a render pass with its own pipeline
//! bound and lets [`WgpuRenderContext::encode_draws`] record the frame's draws:
//!
//! ```ignore
//! engine.frame(&mut context);
//! let mut pass = encoder.begin_render_pass(&descriptor);
//! pass.set_pipeline(&pipeline);
//! pass.set_bind_group(0, &camera_bind_group, &[]);
//! context.encode_draws(&mut pass);
//! ```
//!
//! Buffer usage is tracked so the caller can report GPU memory held by chunks.
//! The sizing decisions and byte accounting live in a device-free
//! [`BufferLedger`].

use std::collections::HashMap;

use log::{debug, trace};
use wgpu::util::DeviceExt;

use super::{meshing::Mesh, MeshHandle, RenderContext};
use crate::{
    core::error::RenderError,
    engine_state::camera_state::{camera::CameraUniform, CameraState, CameraView},
};

/// GPU buffers behind one mesh handle.
#[derive(Debug)]
struct ChunkBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

/// Byte sizes of a handle's vertex and index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizes {
    pub vertex: u64,
    pub index: u64,
}

impl BufferSizes {
    pub fn total(&self) -> u64 {
        self.vertex + self.index
    }

    /// Returns `true` if buffers of these sizes can hold `needed`.
    pub fn fits(&self, needed: BufferSizes) -> bool {
        self.vertex >= needed.vertex && self.index >= needed.index
    }
}

/// Where an upload's bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Overwrite the handle's existing buffers.
    InPlace,
    /// Create new buffers, replacing any the handle had.
    Allocate,
}

/// Buffer sizes per handle and the total they add up to.
#[derive(Debug, Default)]
pub struct BufferLedger {
    sizes: HashMap<MeshHandle, BufferSizes>,
    allocated_bytes: u64,
}

impl BufferLedger {
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Decides whether `needed` bytes fit the handle's current buffers.
    pub fn plan(&self, handle: MeshHandle, needed: BufferSizes) -> Placement {
        match self.sizes.get(&handle) {
            Some(current) if current.fits(needed) => Placement::InPlace,
            _ => Placement::Allocate,
        }
    }

    /// Records new buffers for `handle`, replacing the previous ones.
    pub fn record_allocation(&mut self, handle: MeshHandle, sizes: BufferSizes) {
        if let Some(previous) = self.sizes.insert(handle, sizes) {
            self.allocated_bytes -= previous.total();
        }
        self.allocated_bytes += sizes.total();
    }

    /// Forgets the handle's buffers.
    ///
    /// # Returns
    /// `true` if the handle had buffers.
    pub fn record_release(&mut self, handle: MeshHandle) -> bool {
        match self.sizes.remove(&handle) {
            Some(previous) => {
                self.allocated_bytes -= previous.total();
                true
            }
            None => false,
        }
    }
}

pub struct WgpuRenderContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    camera: CameraState,
    camera_buffer: wgpu::Buffer,
    buffers: HashMap<MeshHandle, ChunkBuffers>,
    ledger: BufferLedger,
    /// Draws queued for the frame being built.
    pending_draws: Vec<MeshHandle>,
    /// Draws of the last presented frame, replayed by `encode_draws`.
    frame_draws: Vec<MeshHandle>,
    times_written: u64,
}

impl WgpuRenderContext {
    /// Creates a context on an existing device and queue.
    ///
    /// # Arguments
    /// * `device` - Device used to allocate chunk buffers
    /// * `queue` - Queue used to write buffer contents
    /// * `camera` - Camera the engine will query each frame
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, camera: CameraState) -> Self {
        let uniform = CameraUniform::from_camera(&camera.camera, &camera.projection);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            device,
            queue,
            camera,
            camera_buffer,
            buffers: HashMap::new(),
            ledger: BufferLedger::default(),
            pending_draws: Vec::new(),
            frame_draws: Vec::new(),
            times_written: 0,
        }
    }

    /// Uniform buffer holding the view-projection matrix, for the caller's bind group.
    pub fn camera_buffer(&self) -> &wgpu::Buffer {
        &self.camera_buffer
    }

    pub fn camera_state(&self) -> &CameraState {
        &self.camera
    }

    pub fn camera_state_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    /// Total bytes currently allocated for chunk meshes.
    pub fn allocated_bytes(&self) -> u64 {
        self.ledger.allocated_bytes()
    }

    /// Number of buffer writes and allocations made so far.
    pub fn times_written(&self) -> u64 {
        self.times_written
    }

    pub fn resident_count(&self) -> usize {
        self.buffers.len()
    }

    /// Records one indexed draw per handle drawn in the last presented frame.
    pub fn encode_draws(&self, pass: &mut wgpu::RenderPass<'_>) {
        for handle in &self.frame_draws {
            let Some(buffers) = self.buffers.get(handle) else {
                continue;
            };
            pass.set_vertex_buffer(0, buffers.vertex.slice(..));
            pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..buffers.index_count, 0, 0..1);
        }
    }

    fn write_camera_uniform(&mut self) {
        let uniform = CameraUniform::from_camera(&self.camera.camera, &self.camera.projection);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    fn create_buffer(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        })
    }
}

impl RenderContext for WgpuRenderContext {
    fn upload(&mut self, handle: MeshHandle, mesh: &Mesh) -> Result<(), RenderError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        if index_bytes.is_empty() {
            return Err(RenderError::Upload {
                handle,
                reason: "mesh has no geometry".to_owned(),
            });
        }

        let max_buffer_size = self.device.limits().max_buffer_size;
        if vertex_bytes.len() as u64 > max_buffer_size || index_bytes.len() as u64 > max_buffer_size {
            return Err(RenderError::Upload {
                handle,
                reason: format!("mesh exceeds the device buffer limit of {max_buffer_size} bytes"),
            });
        }

        let index_count = mesh.indices.len() as u32;
        let needed = BufferSizes {
            vertex: vertex_bytes.len() as u64,
            index: index_bytes.len() as u64,
        };
        if self.ledger.plan(handle, needed) == Placement::InPlace {
            if let Some(existing) = self.buffers.get_mut(&handle) {
                self.queue.write_buffer(&existing.vertex, 0, vertex_bytes);
                self.queue.write_buffer(&existing.index, 0, index_bytes);
                existing.index_count = index_count;
                self.times_written += 1;
                trace!("Rewrote {} in place", handle);
                return Ok(());
            }
        }

        let buffers = ChunkBuffers {
            vertex: self.create_buffer("Chunk Vertex Buffer", vertex_bytes, wgpu::BufferUsages::VERTEX),
            index: self.create_buffer("Chunk Index Buffer", index_bytes, wgpu::BufferUsages::INDEX),
            index_count,
        };
        self.ledger.record_allocation(
            handle,
            BufferSizes {
                vertex: buffers.vertex.size(),
                index: buffers.index.size(),
            },
        );
        self.times_written += 1;
        if let Some(previous) = self.buffers.insert(handle, buffers) {
            previous.vertex.destroy();
            previous.index.destroy();
        }
        debug!(
            "Allocated buffers for {} ({} bytes held)",
            handle,
            self.ledger.allocated_bytes()
        );
        Ok(())
    }

    fn release(&mut self, handle: MeshHandle) {
        self.ledger.record_release(handle);
        if let Some(buffers) = self.buffers.remove(&handle) {
            buffers.vertex.destroy();
            buffers.index.destroy();
        }
    }

    fn draw(&mut self, handle: MeshHandle) {
        if self.buffers.contains_key(&handle) {
            self.pending_draws.push(handle);
        }
    }

    fn query_camera(&self) -> CameraView {
        self.camera.view()
    }

    /// Makes the queued draws the frame `encode_draws` records and refreshes
    /// the camera uniform.
    fn present(&mut self) {
        self.frame_draws = std::mem::take(&mut self.pending_draws);
        self.write_camera_uniform();
    }
}

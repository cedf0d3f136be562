//! # Render Dispatcher
//!
//! Keeps each chunk's GPU buffers in step with its latest mesh and issues one
//! draw per visible chunk.
//!
//! ## Buffer Lifetime
//!
//! A chunk owns at most one [`MeshHandle`], recorded in its `GpuMeshSlot`. The
//! handle is allocated on first upload and reused when a rebuilt mesh replaces
//! the old one. It is released when:
//! - the chunk is unloaded ([`RenderDispatcher::release_chunk`])
//! - the chunk's mesh becomes empty
//! - the residency budget is exceeded and the chunk was not drawn this frame
//!
//! Residency is tracked in an `LruCache` ordered by last draw, so the chunks
//! evicted under memory pressure are the ones the camera looked at longest ago.
//! An evicted chunk is uploaded again the next time it is drawn.
//!
//! ## Stale Meshes
//!
//! Rebuilds run on workers and land on a later frame. Until then a dirty chunk
//! keeps drawing the last mesh it installed, so an edit shows up one or more
//! frames late instead of the chunk disappearing. A chunk that never had a mesh
//! is not drawn.

use std::collections::HashSet;

use log::{debug, warn};
use lru::LruCache;

use super::{MeshHandle, RenderContext};
use crate::{
    core::config::RenderConfig,
    engine_state::{
        frame_stats::FrameStats,
        voxels::{
            coordinates::ChunkCoordinate,
            world::{UnloadedChunk, World},
        },
    },
};

pub struct RenderDispatcher {
    next_handle: u64,
    resident: LruCache<ChunkCoordinate, MeshHandle>,
    max_resident: usize,
}

impl RenderDispatcher {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            next_handle: 0,
            resident: LruCache::unbounded(),
            max_resident: config.max_resident_meshes.max(1),
        }
    }

    /// Number of chunks with buffers in the render context.
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn is_resident(&self, coordinate: ChunkCoordinate) -> bool {
        self.resident.contains(&coordinate)
    }

    fn allocate_handle(&mut self) -> MeshHandle {
        let handle = MeshHandle::new(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Uploads stale meshes and draws every chunk in `draw`, in the given order.
    ///
    /// Chunks that are not loaded or have no mesh yet are skipped.
    ///
    /// # Arguments
    /// * `world` - Source of chunks and their meshes
    /// * `draw` - Visible chunks, near-to-far
    /// * `render` - Render context receiving uploads and draws
    /// * `stats` - Frame counters to update
    pub fn dispatch(
        &mut self,
        world: &World,
        draw: &[ChunkCoordinate],
        render: &mut dyn RenderContext,
        stats: &mut FrameStats,
    ) {
        let mut drawn = HashSet::with_capacity(draw.len());

        for &coordinate in draw {
            let Some(chunk) = world.get_chunk_if_loaded(coordinate) else {
                continue;
            };
            let mut chunk = chunk.get_mut();
            let Some(mesh) = chunk.mesh().cloned() else {
                continue;
            };
            let slot = chunk.gpu_slot();

            if mesh.is_empty() {
                if let Some(handle) = slot.handle {
                    render.release(handle);
                    self.resident.pop(&coordinate);
                    stats.record_release();
                }
                let slot = chunk.gpu_slot_mut();
                slot.handle = None;
                slot.needs_upload = false;
                continue;
            }

            let handle = match slot.handle {
                Some(handle) if !slot.needs_upload => handle,
                existing => {
                    let handle = match existing {
                        Some(handle) => handle,
                        None => self.allocate_handle(),
                    };
                    if let Err(error) = render.upload(handle, &mesh) {
                        warn!("Failed to upload chunk {}: {}", coordinate, error);
                        continue;
                    }
                    let slot = chunk.gpu_slot_mut();
                    slot.handle = Some(handle);
                    slot.needs_upload = false;
                    stats.record_upload();
                    handle
                }
            };

            self.resident.put(coordinate, handle);
            render.draw(handle);
            drawn.insert(coordinate);
            stats.record_draw();
        }

        self.enforce_budget(world, &drawn, render, stats);
    }

    /// Releases least-recently-drawn buffers until the budget holds again.
    ///
    /// Chunks drawn this frame are never evicted, so the budget may be exceeded
    /// while more chunks are visible than it allows.
    fn enforce_budget(
        &mut self,
        world: &World,
        drawn: &HashSet<ChunkCoordinate>,
        render: &mut dyn RenderContext,
        stats: &mut FrameStats,
    ) {
        while self.resident.len() > self.max_resident {
            let Some((coordinate, _)) = self.resident.peek_lru() else {
                break;
            };
            if drawn.contains(coordinate) {
                break;
            }
            let Some((coordinate, handle)) = self.resident.pop_lru() else {
                break;
            };

            render.release(handle);
            stats.record_release();
            if let Some(chunk) = world.get_chunk_if_loaded(coordinate) {
                let mut chunk = chunk.get_mut();
                let slot = chunk.gpu_slot_mut();
                slot.handle = None;
                slot.needs_upload = true;
            }
            debug!("Evicted GPU buffers of chunk {} ({})", coordinate, handle);
        }
    }

    /// Releases the buffers of a chunk that left the world.
    pub fn release_chunk(&mut self, unloaded: &UnloadedChunk, render: &mut dyn RenderContext, stats: &mut FrameStats) {
        let tracked = self.resident.pop(&unloaded.coordinate);
        if let Some(handle) = unloaded.gpu_handle.or(tracked) {
            render.release(handle);
            stats.record_release();
        }
    }

    /// Releases every resident buffer.
    pub fn release_all(&mut self, world: &World, render: &mut dyn RenderContext) {
        while let Some((coordinate, handle)) = self.resident.pop_lru() {
            render.release(handle);
            if let Some(chunk) = world.get_chunk_if_loaded(coordinate) {
                let mut chunk = chunk.get_mut();
                let slot = chunk.gpu_slot_mut();
                slot.handle = None;
                slot.needs_upload = true;
            }
        }
    }
}

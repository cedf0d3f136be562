//! # World Module
//!
//! This module provides the `World` struct, the sparse store mapping chunk
//! coordinates to loaded chunks. It is the single owner of chunk lifetime: every
//! chunk is created here (generated or loaded from persistence), and every chunk
//! leaves through [`World::unload`].
//!
//! ## Generation
//!
//! A coordinate present in the map always refers to a fully generated chunk. The
//! terrain generator fills a private block array first and only the finished
//! `Chunk` is inserted. Concurrent requests for one coordinate are coalesced: the
//! first caller claims a `GenerationSlot`, later callers wait on it and then pick
//! up the inserted chunk, so each coordinate is generated exactly once.
//!
//! Requests made through [`World::request_chunk`] are asynchronous. A worker calls
//! [`World::generate_requested`], and the result is inserted only if the request
//! is still wanted; [`World::cancel_request`] withdraws it, which is how chunks
//! the camera moved away from are dropped without ever entering the map.
//!
//! ## Locking
//!
//! Locks are always taken in the order `pending` → chunk map → individual chunk.
//! No code path holds a chunk lock while acquiring the chunk map or a second
//! chunk, which keeps meshing workers (neighbor reads) and block edits (neighbor
//! dirtying) deadlock-free.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, PoisonError,
    },
};

use cgmath::Point3;
use log::{debug, warn};

use super::{
    block::{block_side::BlockSide, block_type::BlockType},
    chunk::Chunk,
    coordinates::{ChunkCoordinate, ChunkDimensions},
    persistence::{BlockData, PersistenceSink},
    terrain::TerrainGenerator,
};
use crate::{
    core::{error::WorldError, mt_resource::lock_recovering, MtResource},
    engine_state::{
        rendering::{
            meshing::{mesh::DensityField, occlusion::NeighborLookup},
            MeshHandle,
        },
        visibility::DistanceMetric,
    },
};

/// Completion signal for one in-progress generation.
#[derive(Default)]
struct GenerationSlot {
    done: Mutex<bool>,
    ready: Condvar,
}

impl GenerationSlot {
    fn wait(&self) {
        let mut done = lock_recovering(&self.done);
        while !*done {
            done = self.ready.wait(done).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self) {
        *lock_recovering(&self.done) = true;
        self.ready.notify_all();
    }
}

#[derive(Default)]
struct PendingGeneration {
    in_flight: HashMap<ChunkCoordinate, Arc<GenerationSlot>>,
    requested: HashSet<ChunkCoordinate>,
}

/// Held by the thread generating a coordinate. Dropping it releases the slot and
/// wakes waiters, including when generation panics.
struct GenerationClaim<'a> {
    world: &'a World,
    coordinate: ChunkCoordinate,
    slot: Arc<GenerationSlot>,
}

impl Drop for GenerationClaim<'_> {
    fn drop(&mut self) {
        let mut pending = lock_recovering(&self.world.pending);
        let owned = pending
            .in_flight
            .get(&self.coordinate)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot));
        if owned {
            pending.in_flight.remove(&self.coordinate);
        }
        drop(pending);
        self.slot.finish();
    }
}

enum Claim<'a> {
    Loaded(MtResource<Chunk>),
    Cancelled,
    Wait(Arc<GenerationSlot>),
    Owner(GenerationClaim<'a>),
}

/// A chunk that left the world, with the GPU buffer its owner must release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnloadedChunk {
    pub coordinate: ChunkCoordinate,
    pub gpu_handle: Option<MeshHandle>,
}

/// Outcome of an eviction sweep.
#[derive(Debug, Default)]
pub struct UnloadReport {
    pub unloaded: Vec<UnloadedChunk>,
    /// Chunks outside the radius that still wait for a mesh rebuild.
    pub deferred: Vec<ChunkCoordinate>,
}

/// Sparse voxel world: chunk coordinate → chunk.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use voxel_world::core::config::TerrainConfig;
/// use voxel_world::engine_state::voxels::{
///     block::block_type::BlockType,
///     coordinates::{ChunkCoordinate, ChunkDimensions},
///     terrain::TerrainGenerator,
///     world::World,
/// };
///
/// let dimensions = ChunkDimensions::new(16, 128, 16);
/// let world = World::new(TerrainGenerator::new(42, TerrainConfig::default(), dimensions), None);
///
/// let chunk = world.get_or_create_chunk(ChunkCoordinate::new(0, 0, 0));
/// assert!(world.get_or_create_chunk(ChunkCoordinate::new(0, 0, 0)).ptr_eq(&chunk));
///
/// world.set_block(Point3::new(3, 120, 3), BlockType::STONE).unwrap();
/// assert_eq!(world.get_block(Point3::new(3, 120, 3)), BlockType::STONE);
/// ```
pub struct World {
    dimensions: ChunkDimensions,
    generator: TerrainGenerator,
    persistence: Option<Arc<dyn PersistenceSink>>,
    chunks: MtResource<HashMap<ChunkCoordinate, MtResource<Chunk>>>,
    pending: Mutex<PendingGeneration>,
    generations: AtomicUsize,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Arguments
    /// * `generator` - Fills chunks on first access; its dimensions become the world's
    /// * `persistence` - Where modified chunks are saved on unload; `None` discards edits
    pub fn new(generator: TerrainGenerator, persistence: Option<Arc<dyn PersistenceSink>>) -> Self {
        Self {
            dimensions: generator.dimensions(),
            generator,
            persistence,
            chunks: MtResource::new(HashMap::new()),
            pending: Mutex::new(PendingGeneration::default()),
            generations: AtomicUsize::new(0),
        }
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dimensions
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// Number of chunks produced by the terrain generator so far.
    pub fn generation_count(&self) -> usize {
        self.generations.load(Ordering::Relaxed)
    }

    /// Returns the loaded chunk at `coordinate` without generating.
    pub fn get_chunk_if_loaded(&self, coordinate: ChunkCoordinate) -> Option<MtResource<Chunk>> {
        self.chunks.get().get(&coordinate).cloned()
    }

    pub fn is_loaded(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.get().contains_key(&coordinate)
    }

    pub fn len(&self) -> usize {
        self.chunks.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn loaded_coordinates(&self) -> Vec<ChunkCoordinate> {
        self.chunks.get().keys().copied().collect()
    }

    /// Loaded chunks whose mesh no longer matches their blocks.
    pub fn dirty_chunks(&self) -> Vec<ChunkCoordinate> {
        self.handles()
            .into_iter()
            .filter(|(_, chunk)| chunk.get().is_dirty())
            .map(|(coordinate, _)| coordinate)
            .collect()
    }

    /// Returns the chunk at `coordinate`, generating it on this thread if needed.
    ///
    /// If another thread is already generating the same coordinate, this call
    /// blocks until that result is inserted and returns it.
    pub fn get_or_create_chunk(&self, coordinate: ChunkCoordinate) -> MtResource<Chunk> {
        loop {
            match self.claim(coordinate, false) {
                Claim::Loaded(chunk) => return chunk,
                Claim::Wait(slot) => slot.wait(),
                Claim::Owner(claim) => {
                    let chunk = self.produce(coordinate);
                    if let Some(inserted) = self.complete(claim, chunk, false) {
                        return inserted;
                    }
                }
                Claim::Cancelled => {}
            }
        }
    }

    /// Registers interest in a chunk that a worker will generate later.
    ///
    /// # Returns
    /// `true` if the coordinate was neither loaded nor already requested.
    pub fn request_chunk(&self, coordinate: ChunkCoordinate) -> bool {
        let mut pending = lock_recovering(&self.pending);
        if self.is_loaded(coordinate) {
            return false;
        }
        pending.requested.insert(coordinate)
    }

    /// Withdraws a request; an in-progress generation then discards its result.
    pub fn cancel_request(&self, coordinate: ChunkCoordinate) -> bool {
        lock_recovering(&self.pending).requested.remove(&coordinate)
    }

    pub fn is_requested(&self, coordinate: ChunkCoordinate) -> bool {
        lock_recovering(&self.pending).requested.contains(&coordinate)
    }

    /// Coordinates requested but not yet inserted.
    pub fn requested_coordinates(&self) -> Vec<ChunkCoordinate> {
        lock_recovering(&self.pending).requested.iter().copied().collect()
    }

    /// Generates a requested chunk. Called from worker threads.
    ///
    /// # Returns
    /// The inserted chunk, or `None` if the request was cancelled or the chunk was
    /// already loaded by someone else.
    pub fn generate_requested(&self, coordinate: ChunkCoordinate) -> Option<MtResource<Chunk>> {
        loop {
            match self.claim(coordinate, true) {
                Claim::Loaded(_) | Claim::Cancelled => return None,
                Claim::Wait(slot) => slot.wait(),
                Claim::Owner(claim) => {
                    let chunk = self.produce(coordinate);
                    return self.complete(claim, chunk, true);
                }
            }
        }
    }

    fn claim(&self, coordinate: ChunkCoordinate, requested_only: bool) -> Claim<'_> {
        let mut pending = lock_recovering(&self.pending);
        if let Some(chunk) = self.get_chunk_if_loaded(coordinate) {
            return Claim::Loaded(chunk);
        }
        if requested_only && !pending.requested.contains(&coordinate) {
            return Claim::Cancelled;
        }
        if let Some(slot) = pending.in_flight.get(&coordinate) {
            return Claim::Wait(slot.clone());
        }

        let slot = Arc::new(GenerationSlot::default());
        pending.in_flight.insert(coordinate, slot.clone());
        Claim::Owner(GenerationClaim {
            world: self,
            coordinate,
            slot,
        })
    }

    fn complete(
        &self,
        claim: GenerationClaim<'_>,
        chunk: Chunk,
        requested_only: bool,
    ) -> Option<MtResource<Chunk>> {
        let coordinate = claim.coordinate;
        let mut pending = lock_recovering(&self.pending);
        let wanted = pending.requested.remove(&coordinate);
        if requested_only && !wanted {
            debug!("Discarding generated chunk {} after its request was cancelled", coordinate);
            drop(pending);
            return None;
        }

        let chunk = MtResource::new(chunk);
        self.chunks.get_mut().insert(coordinate, chunk.clone());
        pending.in_flight.remove(&coordinate);
        drop(pending);
        drop(claim);

        debug!("Loaded chunk {}", coordinate);
        self.mark_neighbors_dirty(coordinate);
        Some(chunk)
    }

    /// Loads a chunk from persistence, or generates it from the seed.
    fn produce(&self, coordinate: ChunkCoordinate) -> Chunk {
        if let Some(persistence) = &self.persistence {
            match persistence.load(coordinate) {
                Ok(Some(data)) => match data.into_chunk(coordinate, self.dimensions) {
                    Ok(chunk) => return chunk,
                    Err(error) => warn!("Ignoring saved chunk {}: {}", coordinate, error),
                },
                Ok(None) => {}
                Err(error) => warn!("Failed to load chunk {}, regenerating: {}", coordinate, error),
            }
        }

        self.generations.fetch_add(1, Ordering::Relaxed);
        self.generator.generate(coordinate)
    }

    /// Seams meshed while this chunk was absent treated it as air.
    fn mark_neighbors_dirty(&self, coordinate: ChunkCoordinate) {
        for side in BlockSide::all() {
            if let Some(neighbor) = self.get_chunk_if_loaded(coordinate.neighbor(side)) {
                neighbor.get_mut().mark_dirty();
            }
        }
    }

    /// Evicts a chunk, saving it first if it was modified.
    ///
    /// # Returns
    /// - `Ok(Some(_))` with the GPU handle to release if the chunk was evicted
    /// - `Ok(None)` if nothing was loaded at `coordinate`
    /// - `Err(WorldError::RebuildPending)` if the chunk is dirty
    pub fn unload(&self, coordinate: ChunkCoordinate) -> Result<Option<UnloadedChunk>, WorldError> {
        let chunk = {
            let mut chunks = self.chunks.get_mut();
            let Some(chunk) = chunks.get(&coordinate) else {
                return Ok(None);
            };
            if chunk.get().is_dirty() {
                return Err(WorldError::RebuildPending(coordinate));
            }
            chunks.remove(&coordinate)
        };
        let Some(chunk) = chunk else {
            return Ok(None);
        };

        let mut chunk = chunk.get_mut();
        if chunk.is_modified() {
            if self.persist(&chunk) {
                chunk.mark_saved();
            } else if self.persistence.is_none() {
                debug!("Dropping edits to chunk {}: no persistence configured", coordinate);
            }
        }
        debug!("Unloaded chunk {}", coordinate);

        Ok(Some(UnloadedChunk {
            coordinate,
            gpu_handle: chunk.gpu_slot().handle,
        }))
    }

    /// Unloads every chunk farther than `radius` from `center` horizontally.
    pub fn unload_outside(
        &self,
        center: ChunkCoordinate,
        radius: i32,
        metric: DistanceMetric,
    ) -> UnloadReport {
        let mut report = UnloadReport::default();
        let mut outside: Vec<ChunkCoordinate> = self
            .loaded_coordinates()
            .into_iter()
            .filter(|&coordinate| !metric.within(center, coordinate, radius))
            .collect();
        outside.sort();

        for coordinate in outside {
            match self.unload(coordinate) {
                Ok(Some(unloaded)) => report.unloaded.push(unloaded),
                Ok(None) => {}
                Err(WorldError::RebuildPending(coordinate)) => report.deferred.push(coordinate),
                Err(error) => warn!("Failed to unload chunk {}: {}", coordinate, error),
            }
        }
        report
    }

    /// Reads a block by world position. Blocks in unloaded chunks read as air.
    pub fn get_block(&self, position: Point3<i32>) -> BlockType {
        let (coordinate, local) = ChunkCoordinate::from_world(position, self.dimensions);
        match self.get_chunk_if_loaded(coordinate) {
            Some(chunk) => chunk.get().block_at(local),
            None => BlockType::AIR,
        }
    }

    /// Writes a block by world position, generating the owning chunk if needed.
    ///
    /// Loaded neighbors sharing the edited block's chunk face are marked dirty too,
    /// since their boundary faces may appear or disappear.
    pub fn set_block(&self, position: Point3<i32>, block: BlockType) -> Result<(), WorldError> {
        let (coordinate, local) = ChunkCoordinate::from_world(position, self.dimensions);
        let chunk = self.get_or_create_chunk(coordinate);
        let changed = chunk
            .get_mut()
            .set_block(local.x as i32, local.y as i32, local.z as i32, block)?;

        if changed {
            for side in local.touching_sides(self.dimensions) {
                if let Some(neighbor) = self.get_chunk_if_loaded(coordinate.neighbor(side)) {
                    neighbor.get_mut().mark_dirty();
                }
            }
        }
        Ok(())
    }

    /// World y of the highest solid block in a column, searching loaded chunks only.
    pub fn find_surface_y(&self, x: i32, z: i32) -> Option<i32> {
        let (column, local) = ChunkCoordinate::from_world(Point3::new(x, 0, z), self.dimensions);

        let mut stack: Vec<(ChunkCoordinate, MtResource<Chunk>)> = self
            .handles()
            .into_iter()
            .filter(|(coordinate, _)| coordinate.x == column.x && coordinate.z == column.z)
            .collect();
        stack.sort_by_key(|(coordinate, _)| std::cmp::Reverse(coordinate.y));

        for (coordinate, chunk) in stack {
            let chunk = chunk.get();
            for y in (0..self.dimensions.y as i32).rev() {
                if chunk.is_solid(local.x as i32, y, local.z as i32) {
                    return Some(coordinate.origin(self.dimensions).y + y);
                }
            }
        }
        None
    }

    /// Saves every modified loaded chunk.
    ///
    /// # Returns
    /// The number of chunks written.
    pub fn save_all(&self) -> usize {
        if self.persistence.is_none() {
            return 0;
        }

        let mut saved = 0;
        for (_, chunk) in self.handles() {
            let mut chunk = chunk.get_mut();
            if chunk.is_modified() && self.persist(&chunk) {
                chunk.mark_saved();
                saved += 1;
            }
        }
        debug!("Saved {} modified chunks", saved);
        saved
    }

    fn persist(&self, chunk: &Chunk) -> bool {
        let Some(persistence) = &self.persistence else {
            return false;
        };
        match persistence.save(chunk.position(), &BlockData::from_chunk(chunk)) {
            Ok(()) => true,
            Err(error) => {
                warn!("Failed to save chunk {}: {}", chunk.position(), error);
                false
            }
        }
    }

    fn handles(&self) -> Vec<(ChunkCoordinate, MtResource<Chunk>)> {
        self.chunks
            .get()
            .iter()
            .map(|(coordinate, chunk)| (*coordinate, chunk.clone()))
            .collect()
    }
}

impl NeighborLookup for World {
    fn chunk_if_loaded(&self, coordinate: ChunkCoordinate) -> Option<MtResource<Chunk>> {
        self.get_chunk_if_loaded(coordinate)
    }

    fn density_field(&self) -> Option<&dyn DensityField> {
        Some(&self.generator)
    }
}

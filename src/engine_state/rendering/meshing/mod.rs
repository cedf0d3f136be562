//! Mesh generation for voxel chunks.
//!
//! This module turns chunk block data into [`Mesh`] geometry and decides which
//! chunks get rebuilt. A chunk is only rebuilt while it is dirty, and always
//! wholesale: every edit leads to a fresh mesh for the entire chunk.
//!
//! # Architecture
//! - `MeshBuilder`: Builds meshes with the configured [`MeshStrategy`]
//! - `occlusion`: Padded solidity mask including neighbor boundaries
//! - `mesh/`: Faces, the mesh container and the meshing strategies
//!
//! # Concurrency
//! [`MeshBuilder::build_chunk`] may run on worker threads. It records the
//! chunk's revision, copies neighbor boundaries, then read-locks the target
//! chunk for the build. Edits to the chunk or to a neighbor's touching layer
//! bump that revision, so [`Chunk::install_mesh`] leaves a chunk dirty when its
//! mesh raced with either.

use log::trace;
use serde::{Deserialize, Serialize};
use web_time::Instant;

pub mod mesh;
pub mod occlusion;

pub use mesh::Mesh;

use occlusion::{NeighborLookup, NeighborPlanes, OcclusionMask};

use crate::{
    core::{config::MeshConfig, MtResource},
    engine_state::voxels::{chunk::Chunk, world::World},
};

/// How faces are turned into quads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshStrategy {
    /// One quad per exposed block face.
    Culled,
    /// Exposed faces of the same block type merged per layer.
    #[default]
    Greedy,
    /// Smooth surface of the terrain density field. Blocks placed or broken
    /// after generation do not show; without a density field it meshes greedily.
    Smooth,
}

/// Stateless mesh builder; cheap to clone into worker tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshBuilder {
    strategy: MeshStrategy,
}

impl MeshBuilder {
    pub fn new(config: &MeshConfig) -> Self {
        Self::with_strategy(config.strategy)
    }

    pub fn with_strategy(strategy: MeshStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MeshStrategy {
        self.strategy
    }

    /// Builds the block mesh of a locked chunk against pre-gathered neighbor
    /// boundaries. [`MeshStrategy::Smooth`] falls back to greedy here.
    ///
    /// An all-air chunk always yields an empty mesh.
    pub fn build(&self, chunk: &Chunk, neighbors: &NeighborPlanes) -> Mesh {
        let mut mesh = Mesh::new();
        if chunk.is_empty() {
            return mesh;
        }

        let occlusion = OcclusionMask::new(chunk, neighbors);
        match self.strategy {
            MeshStrategy::Culled => mesh::culled(chunk, &occlusion, &mut mesh),
            MeshStrategy::Greedy | MeshStrategy::Smooth => mesh::greedy(chunk, &occlusion, &mut mesh),
        }
        mesh
    }

    /// Builds a shared chunk's mesh, resolving neighbors through `lookup`.
    ///
    /// # Returns
    /// The mesh and the chunk revision it reflects, to hand to
    /// [`Chunk::install_mesh`].
    pub fn build_chunk<L>(&self, chunk: &MtResource<Chunk>, lookup: &L) -> (Mesh, u64)
    where
        L: NeighborLookup + ?Sized,
    {
        let start = Instant::now();
        // Taken before the neighbors are read: an edit next door bumps it afterwards.
        let (coordinate, dimensions, revision) = {
            let chunk = chunk.get();
            (chunk.position(), chunk.dimensions(), chunk.revision())
        };
        let mesh = match lookup.density_field() {
            Some(field) if self.strategy == MeshStrategy::Smooth => {
                let mut mesh = Mesh::new();
                mesh::smooth(coordinate.origin(dimensions), dimensions, field, &mut mesh);
                mesh
            }
            _ => {
                let neighbors = NeighborPlanes::gather(coordinate, dimensions, lookup);
                self.build(&chunk.get(), &neighbors)
            }
        };
        trace!(
            "Meshed chunk {} ({:?}): {} triangles in {:?}",
            coordinate,
            self.strategy,
            mesh.triangle_count(),
            start.elapsed()
        );
        (mesh, revision)
    }

    /// Synchronously rebuilds up to `budget` dirty loaded chunks.
    ///
    /// Chunks are visited in coordinate order so repeated passes make steady
    /// progress through a large backlog.
    ///
    /// # Returns
    /// The number of chunks rebuilt.
    pub fn rebuild_dirty(&self, world: &World, budget: usize) -> usize {
        let mut dirty = world.dirty_chunks();
        dirty.sort();

        let mut rebuilt = 0;
        for coordinate in dirty.into_iter().take(budget) {
            let Some(chunk) = world.get_chunk_if_loaded(coordinate) else {
                continue;
            };
            let (mesh, revision) = self.build_chunk(&chunk, world);
            chunk.get_mut().install_mesh(mesh, revision);
            rebuilt += 1;
        }
        rebuilt
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use cgmath::Point3;

    use super::*;
    use crate::{
        core::config::TerrainConfig,
        engine_state::voxels::{
            block::{block_side::BlockSide, block_type::BlockType},
            coordinates::{ChunkCoordinate, ChunkDimensions},
            terrain::TerrainGenerator,
        },
    };

    const DIMS: ChunkDimensions = ChunkDimensions::new(8, 8, 8);

    struct Loaded(HashMap<ChunkCoordinate, MtResource<Chunk>>);

    impl NeighborLookup for Loaded {
        fn chunk_if_loaded(&self, coordinate: ChunkCoordinate) -> Option<MtResource<Chunk>> {
            self.0.get(&coordinate).cloned()
        }
    }

    /// Expands every quad of a mesh into the set of unit faces it covers.
    fn unit_faces(mesh: &Mesh) -> HashSet<([i32; 3], [i32; 3], u32)> {
        let mut faces = HashSet::new();
        for quad in mesh.vertices.chunks(4) {
            let normal = quad[0].normal.map(|n| n as i32);
            let min = |axis: usize| quad.iter().map(|v| v.position[axis]).fold(f32::MAX, f32::min) as i32;
            let max = |axis: usize| quad.iter().map(|v| v.position[axis]).fold(f32::MIN, f32::max) as i32;
            let (lo, hi) = ([min(0), min(1), min(2)], [max(0), max(1), max(2)]);

            let range = |axis: usize| {
                if lo[axis] == hi[axis] {
                    lo[axis]..lo[axis] + 1
                } else {
                    lo[axis]..hi[axis]
                }
            };
            for x in range(0) {
                for y in range(1) {
                    for z in range(2) {
                        faces.insert(([x, y, z], normal, quad[0].texture_index));
                    }
                }
            }
        }
        faces
    }

    fn scattered_chunk() -> Chunk {
        let mut chunk = Chunk::empty(ChunkCoordinate::new(1, 0, -1), DIMS);
        let mut rng = fastrand::Rng::with_seed(7);
        for x in 0..8 {
            for z in 0..8 {
                let height = rng.i32(1..8);
                for y in 0..height {
                    let block = if y + 1 == height { BlockType::GRASS } else { BlockType::STONE };
                    chunk.set_block(x, y, z, block).unwrap();
                }
            }
        }
        chunk.set_block(3, 7, 3, BlockType::WOOD).unwrap();
        chunk
    }

    #[test]
    fn empty_chunk_has_empty_mesh() {
        let chunk = Chunk::empty(ChunkCoordinate::new(0, 0, 0), DIMS);
        for strategy in [MeshStrategy::Culled, MeshStrategy::Greedy] {
            let mesh = MeshBuilder::with_strategy(strategy).build(&chunk, &NeighborPlanes::none());
            assert!(mesh.is_empty());
            assert!(mesh.vertices.is_empty());
        }
    }

    #[test]
    fn single_block_has_six_quads() {
        let mut chunk = Chunk::empty(ChunkCoordinate::new(0, 0, 0), DIMS);
        chunk.set_block(4, 4, 4, BlockType::STONE).unwrap();
        for strategy in [MeshStrategy::Culled, MeshStrategy::Greedy] {
            let mesh = MeshBuilder::with_strategy(strategy).build(&chunk, &NeighborPlanes::none());
            assert_eq!(mesh.vertices.len(), 24);
            assert_eq!(mesh.indices.len(), 36);
            for side in BlockSide::all() {
                assert_eq!(mesh.side_count(side), 1);
            }
        }
    }

    #[test]
    fn greedy_and_culled_cover_the_same_faces() {
        let chunk = scattered_chunk();
        let culled = MeshBuilder::with_strategy(MeshStrategy::Culled).build(&chunk, &NeighborPlanes::none());
        let greedy = MeshBuilder::with_strategy(MeshStrategy::Greedy).build(&chunk, &NeighborPlanes::none());

        assert!(greedy.quad_count() < culled.quad_count());
        assert_eq!(unit_faces(&culled).len(), culled.quad_count());
        assert_eq!(unit_faces(&greedy), unit_faces(&culled));
    }

    #[test]
    fn flat_layer_merges_into_one_quad_per_side() {
        let mut chunk = Chunk::empty(ChunkCoordinate::new(0, 0, 0), DIMS);
        for x in 0..8 {
            for z in 0..8 {
                chunk.set_block(x, 0, z, BlockType::SAND).unwrap();
            }
        }
        let mesh = MeshBuilder::with_strategy(MeshStrategy::Greedy).build(&chunk, &NeighborPlanes::none());
        assert_eq!(mesh.quad_count(), 6);
        let top = mesh
            .vertices
            .iter()
            .find(|vertex| vertex.normal == [0.0, 1.0, 0.0])
            .unwrap();
        assert_eq!(top.position[1], 1.0);
    }

    #[test]
    fn surrounded_solid_chunk_has_no_faces() {
        let center = ChunkCoordinate::new(0, 0, 0);
        let mut loaded = HashMap::new();
        for side in BlockSide::all() {
            let coordinate = center.neighbor(side);
            loaded.insert(coordinate, MtResource::new(Chunk::filled(coordinate, DIMS, BlockType::STONE)));
        }
        let chunk = MtResource::new(Chunk::filled(center, DIMS, BlockType::STONE));
        let lookup = Loaded(loaded);

        for strategy in [MeshStrategy::Culled, MeshStrategy::Greedy] {
            let (mesh, revision) = MeshBuilder::with_strategy(strategy).build_chunk(&chunk, &lookup);
            assert!(mesh.is_empty());
            assert_eq!(revision, chunk.get().revision());
        }
    }

    #[test]
    fn missing_neighbor_exposes_the_boundary() {
        let center = ChunkCoordinate::new(0, 0, 0);
        let mut loaded = HashMap::new();
        for side in BlockSide::all().into_iter().filter(|side| *side != BlockSide::TOP) {
            let coordinate = center.neighbor(side);
            loaded.insert(coordinate, MtResource::new(Chunk::filled(coordinate, DIMS, BlockType::STONE)));
        }
        let chunk = MtResource::new(Chunk::filled(center, DIMS, BlockType::STONE));

        let (mesh, _) = MeshBuilder::default().build_chunk(&chunk, &Loaded(loaded));
        assert_eq!(mesh.quad_count(), 1);
        assert_eq!(mesh.side_count(BlockSide::TOP), 1);
        assert!(mesh.vertices.iter().all(|vertex| vertex.position[1] == 8.0));
    }

    /// Edits the FRONT neighbor's touching layer while the RIGHT neighbor is looked up.
    struct EditDuringGather {
        loaded: Loaded,
        center: MtResource<Chunk>,
    }

    impl NeighborLookup for EditDuringGather {
        fn chunk_if_loaded(&self, coordinate: ChunkCoordinate) -> Option<MtResource<Chunk>> {
            let center = self.center.get().position();
            if coordinate == center.neighbor(BlockSide::RIGHT) {
                let front = self.loaded.chunk_if_loaded(center.neighbor(BlockSide::FRONT)).unwrap();
                front.get_mut().set_block(2, 2, 0, BlockType::AIR).unwrap();
                self.center.get_mut().mark_dirty();
            }
            self.loaded.chunk_if_loaded(coordinate)
        }
    }

    #[test]
    fn neighbor_edit_during_build_keeps_chunk_dirty() {
        let center = ChunkCoordinate::new(0, 0, 0);
        let mut loaded = HashMap::new();
        for side in BlockSide::all() {
            let coordinate = center.neighbor(side);
            loaded.insert(coordinate, MtResource::new(Chunk::filled(coordinate, DIMS, BlockType::STONE)));
        }
        let loaded = Loaded(loaded);
        let chunk = MtResource::new(Chunk::filled(center, DIMS, BlockType::STONE));
        let builder = MeshBuilder::default();

        let (mesh, revision) = builder.build_chunk(&chunk, &loaded);
        assert!(chunk.get_mut().install_mesh(mesh, revision));
        assert!(!chunk.get().is_dirty());

        let racing = EditDuringGather { loaded, center: chunk.clone() };
        let (stale, revision) = builder.build_chunk(&chunk, &racing);
        assert!(stale.is_empty());
        assert!(!chunk.get_mut().install_mesh(stale, revision));
        assert!(chunk.get().is_dirty());

        let (fresh, revision) = builder.build_chunk(&chunk, &racing.loaded);
        assert_eq!(fresh.side_count(BlockSide::FRONT), 1);
        assert!(chunk.get_mut().install_mesh(fresh, revision));
        assert!(!chunk.get().is_dirty());
    }

    #[test]
    fn smooth_strategy_follows_the_terrain_field() {
        let dimensions = ChunkDimensions::new(8, 128, 8);
        let world = World::new(TerrainGenerator::new(5, TerrainConfig::default(), dimensions), None);
        let chunk = world.get_or_create_chunk(ChunkCoordinate::new(0, 0, 0));
        let smooth = MeshBuilder::with_strategy(MeshStrategy::Smooth);

        let (mesh, revision) = smooth.build_chunk(&chunk, &world);
        assert!(!mesh.is_empty());
        assert_eq!(mesh.vertices.len(), mesh.indices.len());
        assert_eq!(mesh.side_counts, [0; 6]);
        for vertex in &mesh.vertices {
            assert!((30.0..100.0).contains(&vertex.position[1]));
        }
        assert!(chunk.get_mut().install_mesh(mesh, revision));

        let no_field = Loaded(HashMap::new());
        let (blocky, _) = smooth.build_chunk(&chunk, &no_field);
        let (greedy, _) = MeshBuilder::default().build_chunk(&chunk, &no_field);
        assert!(!blocky.is_empty());
        assert_eq!(blocky, greedy);
    }

    #[test]
    fn positions_are_in_world_space() {
        let mut chunk = Chunk::empty(ChunkCoordinate::new(-1, 0, 2), DIMS);
        chunk.set_block(0, 0, 0, BlockType::DIRT).unwrap();
        let mesh = MeshBuilder::default().build(&chunk, &NeighborPlanes::none());
        let origin = Point3::new(-8.0, 0.0, 16.0);
        for vertex in &mesh.vertices {
            assert!(vertex.position[0] >= origin.x && vertex.position[0] <= origin.x + 1.0);
            assert!(vertex.position[2] >= origin.z && vertex.position[2] <= origin.z + 1.0);
        }
    }
}

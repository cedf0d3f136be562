//! Deterministic feature placement: trees and ore veins.
//!
//! Every random decision is drawn from a `fastrand::Rng` seeded with a hash of
//! the world seed, a per-feature salt and the world coordinates involved. The same
//! position therefore always rolls the same value, no matter which chunk asks or
//! in which order chunks are generated.

use cgmath::Point3;

use crate::core::config::TerrainConfig;
use crate::engine_state::voxels::block::block_type::BlockType;

const TREE_SALT: u64 = 0x7472_6565;
const ORE_SALT: u64 = 0x6f72_6573;

/// Horizontal reach of a canopy from its trunk, in blocks.
pub const CANOPY_RADIUS: i32 = 2;

/// Mixes a seed, salt and coordinates into a 64-bit RNG seed (splitmix64 finalizer).
pub fn feature_seed(seed: u64, salt: u64, coordinates: &[i32]) -> u64 {
    let mut state = seed ^ salt.rotate_left(17);
    for &coordinate in coordinates {
        state = state
            .wrapping_add(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(coordinate as u32 as u64);
        state = (state ^ (state >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        state = (state ^ (state >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        state ^= state >> 31;
    }
    state
}

/// Returns `true` if a tree is rooted in the world column `(x, z)`.
pub fn has_tree(seed: u64, x: i32, z: i32, chance: f64) -> bool {
    if chance <= 0.0 {
        return false;
    }
    fastrand::Rng::with_seed(feature_seed(seed, TREE_SALT, &[x, z])).f64() < chance
}

/// Blocks of a tree standing on `surface`, trunk first, then canopy.
///
/// # Arguments
/// * `surface` - The grass block the trunk grows out of
/// * `trunk_height` - Number of wood blocks above the surface
pub fn tree_blocks(surface: Point3<i32>, trunk_height: i32) -> Vec<(Point3<i32>, BlockType)> {
    let mut blocks = Vec::new();
    let top = surface.y + trunk_height;

    for y in surface.y + 1..=top {
        blocks.push((Point3::new(surface.x, y, surface.z), BlockType::WOOD));
    }

    for dy in -2..=1 {
        let radius = if dy == 1 { 1 } else { CANOPY_RADIUS };
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let corner = dx.abs() == radius && dz.abs() == radius;
                if corner && radius > 1 {
                    continue;
                }
                if dx == 0 && dz == 0 && dy <= 0 {
                    continue;
                }
                blocks.push((
                    Point3::new(surface.x + dx, top + dy, surface.z + dz),
                    BlockType::LEAVES,
                ));
            }
        }
    }

    blocks
}

/// Ore replacing stone at a world position, given the density sampled there.
pub fn ore_at(seed: u64, position: Point3<i32>, density: f64, terrain: &TerrainConfig) -> Option<BlockType> {
    if density <= terrain.ore_threshold {
        return None;
    }
    let roll = fastrand::Rng::with_seed(feature_seed(
        seed,
        ORE_SALT,
        &[position.x, position.y, position.z],
    ))
    .f64();

    if roll < terrain.iron_chance {
        Some(BlockType::IRON_ORE)
    } else if roll < terrain.iron_chance + terrain.coal_chance {
        Some(BlockType::COAL_ORE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_seed_depends_on_every_input() {
        let base = feature_seed(1, TREE_SALT, &[3, 4]);
        assert_eq!(base, feature_seed(1, TREE_SALT, &[3, 4]));
        assert_ne!(base, feature_seed(2, TREE_SALT, &[3, 4]));
        assert_ne!(base, feature_seed(1, ORE_SALT, &[3, 4]));
        assert_ne!(base, feature_seed(1, TREE_SALT, &[4, 3]));
        assert_ne!(base, feature_seed(1, TREE_SALT, &[-3, 4]));
    }

    #[test]
    fn tree_placement_is_stable() {
        let placed: Vec<bool> = (-50..50).map(|x| has_tree(9, x, 2 * x, 0.2)).collect();
        let again: Vec<bool> = (-50..50).map(|x| has_tree(9, x, 2 * x, 0.2)).collect();
        assert_eq!(placed, again);
        assert!(placed.iter().any(|&p| p));
        assert!(!has_tree(9, 0, 0, 0.0));
    }

    #[test]
    fn tree_has_trunk_and_canopy_within_radius() {
        let blocks = tree_blocks(Point3::new(10, 60, -4), 5);
        let wood: Vec<_> = blocks.iter().filter(|(_, b)| *b == BlockType::WOOD).collect();
        assert_eq!(wood.len(), 5);
        assert!(wood.iter().all(|(p, _)| p.x == 10 && p.z == -4));

        for (position, _) in &blocks {
            assert!((position.x - 10).abs() <= CANOPY_RADIUS);
            assert!((position.z + 4).abs() <= CANOPY_RADIUS);
        }
        assert!(blocks
            .iter()
            .any(|(p, b)| *b == BlockType::LEAVES && *p == Point3::new(10, 66, -4)));
    }

    #[test]
    fn ore_requires_dense_rock() {
        let terrain = TerrainConfig {
            ore_threshold: 0.5,
            coal_chance: 1.0,
            ..TerrainConfig::default()
        };
        assert_eq!(ore_at(1, Point3::new(0, 10, 0), 0.2, &terrain), None);
        assert!(ore_at(1, Point3::new(0, 10, 0), 0.9, &terrain).is_some());
    }
}

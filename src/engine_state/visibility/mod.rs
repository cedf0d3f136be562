//! # Visibility Manager
//!
//! Decides each frame which chunks should be loaded and which of those are drawn.
//!
//! ## Selection
//!
//! 1. **Load set** - every chunk column within `view_distance` of the camera's
//!    chunk, measured horizontally with the configured metric, for each chunk
//!    layer `0..height_in_chunks`. The boundary is inclusive.
//! 2. **Draw set** - the load set filtered by a conservative frustum test
//!    against each chunk's bounding box.
//!
//! Both lists are ordered near-to-far by distance from the camera to the chunk
//! centre, ties broken by coordinate, so the order is stable across frames.
//!
//! Loaded chunks stay resident until they leave the retention radius
//! `view_distance + hysteresis_margin`; the margin keeps a camera moving back and
//! forth across the load boundary from evicting and regenerating the same chunks.

use cgmath::MetricSpace;
use serde::{Deserialize, Serialize};

use super::{
    camera_state::CameraView,
    voxels::coordinates::{ChunkCoordinate, ChunkDimensions},
};
use crate::core::config::{StreamingConfig, WorldConfig};

/// Horizontal distance between chunk columns, in chunk units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Square neighborhoods: `max(|dx|, |dz|)`.
    #[default]
    Chebyshev,
    /// Round neighborhoods: `sqrt(dx² + dz²)`.
    Euclidean,
    /// Diamond neighborhoods: `|dx| + |dz|`.
    Manhattan,
}

impl DistanceMetric {
    /// Returns `true` if `coordinate` lies within `radius` of `center`, inclusive.
    pub fn within(self, center: ChunkCoordinate, coordinate: ChunkCoordinate, radius: i32) -> bool {
        let dx = (coordinate.x - center.x).abs() as i64;
        let dz = (coordinate.z - center.z).abs() as i64;
        let radius = radius as i64;
        match self {
            DistanceMetric::Chebyshev => dx.max(dz) <= radius,
            DistanceMetric::Euclidean => dx * dx + dz * dz <= radius * radius,
            DistanceMetric::Manhattan => dx + dz <= radius,
        }
    }
}

/// Chunks to keep loaded and to draw for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilitySelection {
    /// Chunk containing the camera.
    pub center: ChunkCoordinate,
    /// Near-to-far.
    pub load: Vec<ChunkCoordinate>,
    /// Subset of `load` touching the frustum, near-to-far.
    pub draw: Vec<ChunkCoordinate>,
}

#[derive(Debug, Clone)]
pub struct VisibilityManager {
    view_distance: i32,
    hysteresis_margin: i32,
    metric: DistanceMetric,
    height_in_chunks: i32,
    dimensions: ChunkDimensions,
}

impl VisibilityManager {
    pub fn new(streaming: &StreamingConfig, world: &WorldConfig) -> Self {
        Self {
            view_distance: streaming.view_distance,
            hysteresis_margin: streaming.hysteresis_margin,
            metric: streaming.distance_metric,
            height_in_chunks: world.height_in_chunks,
            dimensions: world.chunk_dimensions,
        }
    }

    pub fn view_distance(&self) -> i32 {
        self.view_distance
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Distance past which loaded chunks are evicted.
    pub fn retention_radius(&self) -> i32 {
        self.view_distance + self.hysteresis_margin
    }

    pub fn within_view(&self, center: ChunkCoordinate, coordinate: ChunkCoordinate) -> bool {
        self.metric.within(center, coordinate, self.view_distance)
    }

    pub fn within_retention(&self, center: ChunkCoordinate, coordinate: ChunkCoordinate) -> bool {
        self.metric.within(center, coordinate, self.retention_radius())
    }

    /// Chunk coordinates in the load radius around `center`, unordered.
    pub fn load_coordinates(&self, center: ChunkCoordinate) -> Vec<ChunkCoordinate> {
        let radius = self.view_distance;
        let mut coordinates = Vec::new();
        for x in center.x - radius..=center.x + radius {
            for z in center.z - radius..=center.z + radius {
                let column = ChunkCoordinate::new(x, 0, z);
                if !self.metric.within(center, column, radius) {
                    continue;
                }
                coordinates.extend((0..self.height_in_chunks).map(|y| ChunkCoordinate::new(x, y, z)));
            }
        }
        coordinates
    }

    /// Selects the load and draw sets for a camera.
    pub fn select(&self, view: &CameraView) -> VisibilitySelection {
        let center = ChunkCoordinate::containing(view.position, self.dimensions);

        let mut ranked: Vec<(f32, ChunkCoordinate)> = self
            .load_coordinates(center)
            .into_iter()
            .map(|coordinate| {
                let distance = view.position.distance2(coordinate.center(self.dimensions));
                (distance, coordinate)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let load: Vec<ChunkCoordinate> = ranked.into_iter().map(|(_, coordinate)| coordinate).collect();
        let draw = load
            .iter()
            .copied()
            .filter(|coordinate| view.frustum.intersects_aabb(&coordinate.bounds(self.dimensions)))
            .collect();

        VisibilitySelection { center, load, draw }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Point3};

    use super::*;
    use crate::engine_state::camera_state::camera::{Camera, Projection};

    fn manager(view_distance: i32, metric: DistanceMetric) -> VisibilityManager {
        let streaming = StreamingConfig {
            view_distance,
            distance_metric: metric,
            ..StreamingConfig::default()
        };
        VisibilityManager::new(&streaming, &WorldConfig::default())
    }

    fn view_from(position: Point3<f32>, yaw: Deg<f32>) -> CameraView {
        let camera = Camera::new(position, yaw, Deg(-20.0));
        camera.view(&Projection::new(800, 600, Deg(70.0), 0.1, 1000.0))
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let center = ChunkCoordinate::new(0, 0, 0);
        for metric in [
            DistanceMetric::Chebyshev,
            DistanceMetric::Euclidean,
            DistanceMetric::Manhattan,
        ] {
            assert!(metric.within(center, ChunkCoordinate::new(3, 0, 0), 3));
            assert!(metric.within(center, ChunkCoordinate::new(0, 0, -3), 3));
            assert!(!metric.within(center, ChunkCoordinate::new(4, 0, 0), 3));
            assert!(!metric.within(center, ChunkCoordinate::new(0, 0, -4), 3));
        }
        assert!(DistanceMetric::Chebyshev.within(center, ChunkCoordinate::new(3, 0, 3), 3));
        assert!(!DistanceMetric::Euclidean.within(center, ChunkCoordinate::new(3, 0, 3), 3));
        assert!(!DistanceMetric::Manhattan.within(center, ChunkCoordinate::new(2, 0, 2), 3));
    }

    #[test]
    fn square_load_set_around_origin() {
        let manager = manager(2, DistanceMetric::Chebyshev);
        let selection = manager.select(&view_from(Point3::new(8.0, 100.0, 8.0), Deg(0.0)));

        assert_eq!(selection.center, ChunkCoordinate::new(0, 0, 0));
        assert_eq!(selection.load.len(), 25);
        assert_eq!(selection.load[0], ChunkCoordinate::new(0, 0, 0));
        for coordinate in &selection.load {
            assert!(coordinate.x.abs() <= 2 && coordinate.z.abs() <= 2);
            assert_eq!(coordinate.y, 0);
        }
    }

    #[test]
    fn load_set_is_near_to_far() {
        let manager = manager(3, DistanceMetric::Euclidean);
        let view = view_from(Point3::new(-20.0, 64.0, 40.0), Deg(45.0));
        let selection = manager.select(&view);

        let distances: Vec<f32> = selection
            .load
            .iter()
            .map(|c| view.position.distance2(c.center(ChunkDimensions::new(16, 256, 16))))
            .collect();
        assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn chunks_behind_the_camera_are_not_drawn() {
        let manager = manager(4, DistanceMetric::Chebyshev);
        let selection = manager.select(&view_from(Point3::new(8.0, 100.0, 8.0), Deg(0.0)));

        assert!(!selection.draw.is_empty());
        assert!(selection.draw.len() < selection.load.len());
        assert!(selection.draw.contains(&ChunkCoordinate::new(3, 0, 0)));
        assert!(!selection.draw.contains(&ChunkCoordinate::new(-4, 0, 0)));
        assert!(selection
            .draw
            .iter()
            .all(|coordinate| selection.load.contains(coordinate)));
    }

    #[test]
    fn retention_adds_hysteresis() {
        let manager = manager(2, DistanceMetric::Chebyshev);
        let center = ChunkCoordinate::new(0, 0, 0);
        assert_eq!(manager.retention_radius(), 4);
        assert!(!manager.within_view(center, ChunkCoordinate::new(3, 0, 0)));
        assert!(manager.within_retention(center, ChunkCoordinate::new(4, 0, 0)));
        assert!(!manager.within_retention(center, ChunkCoordinate::new(5, 0, 0)));
    }
}

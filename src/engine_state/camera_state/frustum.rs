//! View frustum and axis-aligned boxes for chunk culling.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3, Vector4};

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }
}

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vector3<f32>, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(point.to_vec()) + self.distance
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a view-projection matrix with a `[0, 1]` depth range.
    pub fn from_view_projection(view_projection: &Matrix4<f32>) -> Self {
        let m: [[f32; 4]; 4] = (*view_projection).into();
        let row = |r: usize| Vector4::new(m[0][r], m[1][r], m[2][r], m[3][r]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Self::normalize_plane(r2),
                Self::normalize_plane(r3 - r2),
                Self::normalize_plane(r3 + r0),
                Self::normalize_plane(r3 - r0),
                Self::normalize_plane(r3 - r1),
                Self::normalize_plane(r3 + r1),
            ],
        }
    }

    fn normalize_plane(plane: Vector4<f32>) -> Plane {
        let normal = plane.truncate();
        let length = normal.magnitude();
        if length <= f32::EPSILON {
            return Plane::new(Vector3::new(0.0, 0.0, 0.0), plane.w);
        }
        Plane::new(normal / length, plane.w / length)
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Conservative AABB test: `false` only if the box is entirely outside one plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Point3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to_point(positive) >= 0.0
        })
    }
}

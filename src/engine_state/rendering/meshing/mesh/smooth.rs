//! # Smooth Meshing
//!
//! Extracts the zero surface of a continuous density field with marching
//! tetrahedra: every lattice cube is split into six tetrahedra and a triangle
//! (or two) is emitted wherever the surface crosses a tetrahedron's edges.
//!
//! ## Seams
//!
//! The field is sampled at world-space lattice points and every cube uses the
//! same split along its `(0,0,0)`-`(1,1,1)` diagonal. Two cubes sharing a face
//! therefore split it along the same diagonal, and each crossing is
//! interpolated from the lower corner of its edge. Chunks on either side of a
//! border produce bit-identical vertices there, so no cracks open up.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::engine_state::{
    rendering::vertex::Vertex,
    voxels::{
        block::{block_side::BlockSide, block_type::BlockType},
        coordinates::ChunkDimensions,
    },
};

use super::Mesh;

/// A scalar field whose positive region is solid.
pub trait DensityField: Send + Sync {
    /// Density at a world-space point; the surface lies where it crosses zero.
    fn density(&self, x: f64, y: f64, z: f64) -> f64;

    /// Block whose color and texture paint the surface at world height `y`.
    fn surface_block(&self, y: i32) -> BlockType;
}

/// Six tetrahedra sharing the cube diagonal. Corner `i` sits at
/// `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`, and each list walks monotonically
/// from corner 0 to corner 7.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

fn corner_offset(corner: usize) -> [usize; 3] {
    [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1]
}

/// Densities on the `(S + 1)^3` lattice spanning one chunk.
struct Lattice {
    size: [usize; 3],
    values: Vec<f64>,
}

impl Lattice {
    fn sample<F>(origin: Point3<i32>, dimensions: ChunkDimensions, field: &F) -> Self
    where
        F: DensityField + ?Sized,
    {
        let size = [dimensions.x + 1, dimensions.y + 1, dimensions.z + 1];
        let mut values = Vec::with_capacity(size[0] * size[1] * size[2]);
        for x in 0..size[0] {
            for y in 0..size[1] {
                for z in 0..size[2] {
                    values.push(field.density(
                        (origin.x + x as i32) as f64,
                        (origin.y + y as i32) as f64,
                        (origin.z + z as i32) as f64,
                    ));
                }
            }
        }
        Self { size, values }
    }

    fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.values[(x * self.size[1] + y) * self.size[2] + z]
    }
}

/// Appends the smooth surface of `field` inside one chunk to `mesh`.
///
/// # Arguments
/// * `origin` - World position of the chunk's minimum corner
/// * `dimensions` - Chunk size; the lattice has one more point per axis
/// * `field` - Density sampled in world space
/// * `mesh` - Receives the triangles
pub fn smooth<F>(origin: Point3<i32>, dimensions: ChunkDimensions, field: &F, mesh: &mut Mesh)
where
    F: DensityField + ?Sized,
{
    let lattice = Lattice::sample(origin, dimensions, field);

    for x in 0..dimensions.x {
        for y in 0..dimensions.y {
            for z in 0..dimensions.z {
                let mut densities = [0.0; 8];
                let mut positions = [[0.0; 3]; 8];
                for corner in 0..8 {
                    let [dx, dy, dz] = corner_offset(corner);
                    densities[corner] = lattice.get(x + dx, y + dy, z + dz);
                    positions[corner] = [
                        (origin.x + (x + dx) as i32) as f64,
                        (origin.y + (y + dy) as i32) as f64,
                        (origin.z + (z + dz) as i32) as f64,
                    ];
                }

                for tetrahedron in TETRAHEDRA {
                    let d = tetrahedron.map(|corner| densities[corner]);
                    let p = tetrahedron.map(|corner| positions[corner]);
                    polygonise(&d, &p, field, mesh);
                }
            }
        }
    }
}

/// Point where the surface crosses the edge from slot `a` to slot `b`, `a < b`.
fn crossing(d: &[f64; 4], p: &[[f64; 3]; 4], a: usize, b: usize) -> [f64; 3] {
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    let t = d[a] / (d[a] - d[b]);
    [
        p[a][0] + t * (p[b][0] - p[a][0]),
        p[a][1] + t * (p[b][1] - p[a][1]),
        p[a][2] + t * (p[b][2] - p[a][2]),
    ]
}

fn polygonise<F>(d: &[f64; 4], p: &[[f64; 3]; 4], field: &F, mesh: &mut Mesh)
where
    F: DensityField + ?Sized,
{
    let inside: Vec<usize> = (0..4).filter(|&i| d[i] > 0.0).collect();
    let outside: Vec<usize> = (0..4).filter(|&i| d[i] <= 0.0).collect();

    let mut centroid = [0.0; 3];
    for &i in &inside {
        for axis in 0..3 {
            centroid[axis] += p[i][axis] / inside.len().max(1) as f64;
        }
    }

    match (inside.as_slice(), outside.as_slice()) {
        ([lone], [a, b, c]) | ([a, b, c], [lone]) => {
            let triangle = [
                crossing(d, p, *lone, *a),
                crossing(d, p, *lone, *b),
                crossing(d, p, *lone, *c),
            ];
            push_oriented(triangle, centroid, field, mesh);
        }
        ([a, b], [c, e]) => {
            let quad = [
                crossing(d, p, *a, *c),
                crossing(d, p, *a, *e),
                crossing(d, p, *b, *e),
                crossing(d, p, *b, *c),
            ];
            push_oriented([quad[0], quad[1], quad[2]], centroid, field, mesh);
            push_oriented([quad[0], quad[2], quad[3]], centroid, field, mesh);
        }
        _ => {}
    }
}

/// Emits a triangle wound counter-clockwise seen from the empty side.
fn push_oriented<F>(mut triangle: [[f64; 3]; 3], inside: [f64; 3], field: &F, mesh: &mut Mesh)
where
    F: DensityField + ?Sized,
{
    let corner = |point: [f64; 3]| Vector3::new(point[0], point[1], point[2]);
    let (a, b, c) = (corner(triangle[0]), corner(triangle[1]), corner(triangle[2]));
    let mut normal = (b - a).cross(c - a);
    if normal.magnitude2() <= f64::EPSILON {
        return;
    }

    let center = (a + b + c) / 3.0;
    if normal.dot(corner(inside) - center) > 0.0 {
        triangle.swap(1, 2);
        normal = -normal;
    }
    let normal = normal.normalize().cast::<f32>().map_or([0.0, 1.0, 0.0], Into::into);

    let base = mesh.vertices.len() as u32;
    for position in triangle {
        let block = field.surface_block(position[1].floor() as i32);
        mesh.vertices.push(Vertex {
            position: position.map(|component| component as f32),
            normal,
            tex_coords: [position[0] as f32, position[2] as f32],
            texture_index: block.texture_indices()[BlockSide::TOP as usize],
            color: block.color(),
        });
    }
    mesh.indices.extend([base, base + 1, base + 2]);
}

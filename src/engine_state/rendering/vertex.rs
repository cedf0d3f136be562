//! Vertex data structures and layouts for voxel rendering.
//!
//! This module defines the vertex format produced by the mesh builder and the
//! matching `wgpu` buffer layout used by the render pipeline.

/// A vertex in the voxel rendering pipeline.
///
/// Positions are in world space, so a chunk mesh can be drawn without a
/// per-chunk transform.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Texture Index: u32 (4 bytes)
/// - Color: [f32; 3] (12 bytes)
///
/// Total size: 48 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// World-space position of the corner
    pub position: [f32; 3],
    /// Unit normal of the face the vertex belongs to
    pub normal: [f32; 3],
    /// Texture coordinates in block units; a merged quad repeats the texture
    pub tex_coords: [f32; 2],
    /// Index of the texture in the texture array
    pub texture_index: u32,
    /// Base block color multiplied by the face's shade factor
    pub color: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Uint32,
        4 => Float32x3,
    ];

    /// Returns the vertex buffer layout description for the shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: normal (vec3<f32>)
    /// - `location = 2`: tex_coords (vec2<f32>)
    /// - `location = 3`: texture_index (u32)
    /// - `location = 4`: color (vec3<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
        let layout = Vertex::desc();
        assert_eq!(layout.array_stride, 48);
        let last = layout.attributes[4];
        assert_eq!(last.offset, 36);
        assert_eq!(last.shader_location, 4);
    }
}

//! Vertex data structures and layouts for terrain rendering.
//!
//! Every grid vertex of the terrain is stored exactly once in a shared vertex
//! buffer. All LOD variants index into it, so the vertex carries everything the
//! shader needs at any level of detail.

/// A vertex of the terrain grid.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Normal: [f32; 3] (12 bytes)
///
/// Total size: 32 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    /// Position in world space
    pub position: [f32; 3],
    /// Texture coordinates, repeating `texture_scale` times across the terrain
    pub tex_coords: [f32; 2],
    /// Surface normal, zero until normals are calculated
    pub normal: [f32; 3],
}

impl TerrainVertex {
    /// Creates a vertex with a zero normal.
    pub fn new(position: [f32; 3], tex_coords: [f32; 2]) -> Self {
        TerrainVertex {
            position,
            tex_coords,
            normal: [0.0; 3],
        }
    }

    /// Returns the vertex buffer layout description for the shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: tex_coords (vec2<f32>)
    /// - `location = 2`: normal (vec3<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TerrainVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

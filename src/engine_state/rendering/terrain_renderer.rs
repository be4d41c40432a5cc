//! Terrain renderer.
//!
//! Owns the terrain render pipelines and draws a frame's [`DrawList`] out of the
//! shared vertex and index buffers. Every visible patch becomes one
//! `draw_indexed` call whose index range selects the LOD variant and whose base
//! vertex moves the patch into place. There is no batching or sorting.

use cgmath::{InnerSpace, Vector3};
use log::{info, warn};
use wgpu::{Device, RenderPass, RenderPipeline, TextureFormat};

use crate::{
    core::StSystem,
    engine_state::buffer_state::{
        BufferState, TERRAIN_INDEX_BUFFER, TERRAIN_UNIFORM_BUFFER, TERRAIN_VERTEX_BUFFER,
    },
    error::RenderResult,
    terrain::{submit, CompiledTerrain, DrawList, PatchDrawBackend, Winding},
};

use super::{
    bind_group_state::{
        BindGroupState, CAMERA_BIND_GROUP, CAMERA_BIND_GROUP_LAYOUT, TERRAIN_BIND_GROUP,
        TERRAIN_BIND_GROUP_LAYOUT,
    },
    texture::Texture,
    vertex::TerrainVertex,
};

impl PatchDrawBackend for RenderPass<'_> {
    fn draw_patch(&mut self, indices: std::ops::Range<u32>, base_vertex: i32) {
        self.draw_indexed(indices, base_vertex, 0..1);
    }
}

/// Shading parameters for the terrain shader.
///
/// Matches the WGSL struct, where `light_direction` is a `vec3<f32>` aligned
/// to 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainUniform {
    pub min_height: f32,
    pub max_height: f32,
    _padding: [f32; 2],
    /// Direction the light travels, normalized
    pub light_direction: [f32; 3],
    _padding2: f32,
}

impl TerrainUniform {
    /// Builds the uniform. A zero light direction falls back to straight down.
    pub fn new(min_height: f32, max_height: f32, light_direction: [f32; 3]) -> Self {
        let direction = Vector3::from(light_direction);
        let direction = if direction.magnitude2() > 0.0 {
            direction.normalize()
        } else {
            -Vector3::unit_y()
        };

        Self {
            min_height,
            max_height,
            _padding: [0.0; 2],
            light_direction: direction.into(),
            _padding2: 0.0,
        }
    }
}

/// Front face matching the index library's winding, seen from above.
pub fn front_face(winding: Winding) -> wgpu::FrontFace {
    match winding {
        Winding::CounterClockwise => wgpu::FrontFace::Ccw,
        Winding::Clockwise => wgpu::FrontFace::Cw,
    }
}

/// Uploads the terrain's shared vertices and the index library.
///
/// Existing buffers of the same name are replaced, so this is also the
/// regeneration path.
pub fn upload_terrain(buffer_state: &mut BufferState, terrain: &CompiledTerrain) {
    buffer_state.create_buffer_init(
        TERRAIN_VERTEX_BUFFER,
        wgpu::util::BufferInitDescriptor {
            label: Some(TERRAIN_VERTEX_BUFFER),
            contents: bytemuck::cast_slice(terrain.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        },
    );
    buffer_state.create_buffer_init(
        TERRAIN_INDEX_BUFFER,
        wgpu::util::BufferInitDescriptor {
            label: Some(TERRAIN_INDEX_BUFFER),
            contents: bytemuck::cast_slice(terrain.indices()),
            usage: wgpu::BufferUsages::INDEX,
        },
    );
    info!(
        "Terrain GPU memory: {} bytes allocated",
        buffer_state.get_total_allocated_memory()
    );
}

/// Creates the terrain uniform buffer on first use, rewrites it afterwards.
pub fn upload_terrain_uniform(
    buffer_state: &mut BufferState,
    uniform: TerrainUniform,
) -> RenderResult<()> {
    if buffer_state.analytics(TERRAIN_UNIFORM_BUFFER).is_some() {
        return buffer_state.write_buffer(TERRAIN_UNIFORM_BUFFER, 0, bytemuck::bytes_of(&uniform));
    }
    buffer_state.create_buffer_init(
        TERRAIN_UNIFORM_BUFFER,
        wgpu::util::BufferInitDescriptor {
            label: Some(TERRAIN_UNIFORM_BUFFER),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        },
    );
    Ok(())
}

/// Draws geomipmapped terrain patches.
pub struct TerrainRenderer {
    fill_pipeline: RenderPipeline,
    /// Only present when the device supports `POLYGON_MODE_LINE`
    wireframe_pipeline: Option<RenderPipeline>,
    buffer_state: StSystem<BufferState>,
    bind_group_state: StSystem<BindGroupState>,
}

impl TerrainRenderer {
    /// Creates the fill pipeline and, when supported, a wireframe pipeline.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `buffer_state` - Registry holding the terrain buffers
    /// * `bind_group_state` - Camera and terrain bind groups
    /// * `shader_string` - The WGSL shader source code
    /// * `texture_format` - Format of the surface being rendered to
    /// * `winding` - Winding the index library was built with
    pub fn new(
        device: &Device,
        buffer_state: StSystem<BufferState>,
        bind_group_state: StSystem<BindGroupState>,
        shader_string: &str,
        texture_format: TextureFormat,
        winding: Winding,
    ) -> RenderResult<Self> {
        let pipeline_layout = {
            let bind_groups = bind_group_state.get();
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Terrain Render Pipeline Layout"),
                bind_group_layouts: &[
                    bind_groups.get_bind_group_layout(CAMERA_BIND_GROUP_LAYOUT)?,
                    bind_groups.get_bind_group_layout(TERRAIN_BIND_GROUP_LAYOUT)?,
                ],
                push_constant_ranges: &[],
            })
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Shader"),
            source: wgpu::ShaderSource::Wgsl(shader_string.into()),
        });

        let create_pipeline = |label: &str, polygon_mode: wgpu::PolygonMode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[TerrainVertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: texture_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: front_face(winding),
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(Texture::depth_stencil_state()),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        };

        let fill_pipeline = create_pipeline("Terrain Render Pipeline", wgpu::PolygonMode::Fill);
        let wireframe_pipeline = if device
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            Some(create_pipeline(
                "Terrain Wireframe Pipeline",
                wgpu::PolygonMode::Line,
            ))
        } else {
            warn!("POLYGON_MODE_LINE is not supported, wireframe view is unavailable");
            None
        };

        Ok(Self {
            fill_pipeline,
            wireframe_pipeline,
            buffer_state,
            bind_group_state,
        })
    }

    pub fn supports_wireframe(&self) -> bool {
        self.wireframe_pipeline.is_some()
    }

    /// Draws every entry of `draw_list` in order.
    ///
    /// # Arguments
    /// * `render_pass` - The render pass to use for rendering
    /// * `draw_list` - This frame's visible patches
    /// * `wireframe` - Use the wireframe pipeline if there is one
    pub fn render(
        &self,
        render_pass: &mut RenderPass<'_>,
        draw_list: &DrawList,
        wireframe: bool,
    ) -> RenderResult<()> {
        let pipeline = match &self.wireframe_pipeline {
            Some(wireframe_pipeline) if wireframe => wireframe_pipeline,
            _ => &self.fill_pipeline,
        };
        render_pass.set_pipeline(pipeline);

        let bind_groups = self.bind_group_state.get();
        render_pass.set_bind_group(0, bind_groups.get_bind_group(CAMERA_BIND_GROUP)?, &[]);
        render_pass.set_bind_group(1, bind_groups.get_bind_group(TERRAIN_BIND_GROUP)?, &[]);

        let buffers = self.buffer_state.get();
        render_pass.set_vertex_buffer(0, buffers.get_buffer(TERRAIN_VERTEX_BUFFER)?.slice(..));
        render_pass.set_index_buffer(
            buffers.get_buffer(TERRAIN_INDEX_BUFFER)?.slice(..),
            wgpu::IndexFormat::Uint32,
        );

        submit(draw_list, render_pass);
        Ok(())
    }
}

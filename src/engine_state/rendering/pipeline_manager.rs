//! Frame orchestration for the terrain renderer.
//!
//! The `PipelineManager` owns the resources shared by a frame: the depth texture
//! and the [`TerrainRenderer`] with its bind groups. It acquires the surface
//! texture, opens one render pass, lets the terrain renderer draw, then submits
//! and presents.

use wgpu::{Device, Queue, Surface, SurfaceConfiguration, TextureFormat};

use crate::{
    core::StSystem,
    engine_state::buffer_state::BufferState,
    error::RenderResult,
    terrain::{DrawList, Winding},
};

use super::{bind_group_state::BindGroupState, terrain_renderer::TerrainRenderer, texture};

/// Sky color behind the terrain
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.53,
    g: 0.71,
    b: 0.88,
    a: 1.0,
};

/// How a frame ended when it did not reach the screen.
#[derive(Debug)]
pub enum FrameError {
    /// The surface texture could not be acquired
    Surface(wgpu::SurfaceError),
    /// Drawing failed before submission
    Render(crate::error::RenderError),
}

/// Coordinates the terrain render pass and its shared resources.
pub struct PipelineManager {
    /// Depth texture used for depth testing
    pub depth_texture: texture::Texture,
    pub terrain_renderer: TerrainRenderer,
}

impl PipelineManager {
    /// Creates a new `PipelineManager` instance.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `config` - Surface configuration containing size and format
    /// * `texture_format` - The texture format to use for rendering
    /// * `buffer_state` - Registry holding the camera and terrain buffers
    /// * `shader_string` - The WGSL terrain shader
    /// * `winding` - Winding the terrain index library was built with
    pub fn new(
        device: StSystem<Device>,
        config: &SurfaceConfiguration,
        texture_format: TextureFormat,
        buffer_state: StSystem<BufferState>,
        shader_string: &str,
        winding: Winding,
    ) -> RenderResult<Self> {
        let bind_group_state = StSystem::new(BindGroupState::new(
            device.clone(),
            buffer_state.clone(),
        )?);

        let device_ref = device.get();
        let depth_texture =
            texture::Texture::create_depth_texture(&device_ref, config, "DEPTH TEXTURE");

        let terrain_renderer = TerrainRenderer::new(
            &device_ref,
            buffer_state,
            bind_group_state,
            shader_string,
            texture_format,
            winding,
        )?;

        Ok(Self {
            depth_texture,
            terrain_renderer,
        })
    }

    /// Renders one frame of terrain to `surface`.
    ///
    /// # Arguments
    /// * `surface` - The target surface to render to
    /// * `device` - The WebGPU device for creating the command encoder
    /// * `queue` - The WebGPU queue for command submission
    /// * `draw_list` - This frame's patch draws
    /// * `wireframe` - Draw triangle edges instead of filled triangles
    pub fn render(
        &mut self,
        surface: &Surface,
        device: StSystem<Device>,
        queue: StSystem<Queue>,
        draw_list: &DrawList,
        wireframe: bool,
    ) -> Result<(), FrameError> {
        let frame = surface.get_current_texture().map_err(FrameError::Surface)?;

        let view = frame.texture.create_view(&Default::default());
        let mut encoder = device.get().create_command_encoder(&Default::default());
        {
            let depth_stencil_attachment = Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Terrain Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment,
                ..Default::default()
            });
            self.terrain_renderer
                .render(&mut rpass, draw_list, wireframe)
                .map_err(FrameError::Render)?;
        }

        queue.get().submit([encoder.finish()]);
        frame.present();
        Ok(())
    }

    /// Recreates the depth texture for a resized surface.
    pub fn resize(&mut self, device: StSystem<Device>, config: &SurfaceConfiguration) {
        self.depth_texture =
            texture::Texture::create_depth_texture(&device.get(), config, "DEPTH TEXTURE");
    }
}

//! Rendering system for the terrain demo.
//!
//! Owns the wgpu surface and the frame pipeline. The terrain core decides what
//! to draw; this module only turns a [`DrawList`] into GPU commands.

use log::{error, warn};
use pipeline_manager::{FrameError, PipelineManager};
use wgpu::{Device, Queue, Surface, SurfaceConfiguration};

use crate::{
    core::StSystem,
    error::RenderResult,
    terrain::{DrawList, Winding},
};

use super::{buffer_state::BufferState, camera_state::camera};

mod bind_group_state;
mod pipeline_manager;
pub mod terrain_renderer;
mod texture;
pub mod vertex;

pub use vertex::TerrainVertex;

/// Manages the surface and the terrain render pipeline.
pub struct TerrainRendererManager {
    /// The WebGPU surface being rendered to
    pub surface: Surface<'static>,
    /// Configuration for the surface (size, format, etc.)
    pub surface_config: SurfaceConfiguration,
    pub device: StSystem<Device>,
    pub queue: StSystem<Queue>,
    pub pipeline_manager: PipelineManager,
    /// Camera projection settings, resized with the surface
    pub camera_projection: camera::Projection,
}

impl TerrainRendererManager {
    /// Creates the render pipeline for an already configured surface.
    ///
    /// # Arguments
    /// * `surface` - The WebGPU surface to render to
    /// * `surface_config` - Configuration for the surface
    /// * `device` - The WebGPU device
    /// * `queue` - The WebGPU queue
    /// * `buffer_state` - Registry already holding the camera and terrain buffers
    /// * `shader_string` - WGSL source of the terrain shader
    /// * `camera_projection` - Initial camera projection settings
    /// * `winding` - Winding the terrain index library was built with
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        surface: Surface<'static>,
        surface_config: SurfaceConfiguration,
        device: StSystem<Device>,
        queue: StSystem<Queue>,
        buffer_state: StSystem<BufferState>,
        shader_string: &str,
        camera_projection: camera::Projection,
        winding: Winding,
    ) -> RenderResult<Self> {
        let pipeline_manager = PipelineManager::new(
            device.clone(),
            &surface_config,
            surface_config.format,
            buffer_state,
            shader_string,
            winding,
        )?;

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            pipeline_manager,
            camera_projection,
        })
    }

    /// Handles window resize events.
    ///
    /// # Arguments
    /// * `size` - The new window size in physical pixels
    pub fn resize_surface(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.surface.configure(&self.device.get(), &self.surface_config);

        self.camera_projection.resize(size.width, size.height);
        self.pipeline_manager
            .resize(self.device.clone(), &self.surface_config);
    }

    pub fn supports_wireframe(&self) -> bool {
        self.pipeline_manager.terrain_renderer.supports_wireframe()
    }

    /// Renders one frame.
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped. Other
    /// failures are logged and the frame skipped.
    pub fn render(&mut self, draw_list: &DrawList, wireframe: bool) {
        let result = self.pipeline_manager.render(
            &self.surface,
            self.device.clone(),
            self.queue.clone(),
            draw_list,
            wireframe,
        );

        match result {
            Ok(()) => {}
            Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device.get(), &self.surface_config);
            }
            Err(FrameError::Surface(err)) => {
                error!("Error getting current frame: {:?}", err);
            }
            Err(FrameError::Render(err)) => {
                error!("Terrain render failed: {}", err);
            }
        }
    }
}

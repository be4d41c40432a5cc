//! Manages WebGPU bind groups and their layouts.
//!
//! The terrain shader reads two uniform buffers:
//! - group 0: the camera (`view_proj` and eye position)
//! - group 1: terrain shading (height range and light direction)
//!
//! Both buffers keep their size for the lifetime of the renderer, so the bind
//! groups survive terrain regeneration. Only the uniform contents change.

use std::collections::HashMap;

use wgpu::{BindGroup, BindGroupLayout, Device};

use crate::{
    core::StSystem,
    engine_state::buffer_state::{BufferState, CAMERA_BUFFER, TERRAIN_UNIFORM_BUFFER},
    error::{RenderError, RenderResult},
};

/// Name of the camera bind group
pub const CAMERA_BIND_GROUP: &str = "camera_bind_group";
/// Name of the camera bind group layout
pub const CAMERA_BIND_GROUP_LAYOUT: &str = "camera_bind_group_layout";
/// Name of the terrain shading bind group
pub const TERRAIN_BIND_GROUP: &str = "terrain_bind_group";
/// Name of the terrain shading bind group layout
pub const TERRAIN_BIND_GROUP_LAYOUT: &str = "terrain_bind_group_layout";

/// Named bind groups and layouts shared by the terrain pipelines.
pub struct BindGroupState {
    bind_groups: HashMap<&'static str, wgpu::BindGroup>,
    bind_group_layouts: HashMap<&'static str, wgpu::BindGroupLayout>,
}

impl BindGroupState {
    /// Creates the camera and terrain bind groups.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `buffer_state` - Registry that already holds [`CAMERA_BUFFER`] and
    ///   [`TERRAIN_UNIFORM_BUFFER`]
    pub fn new(device: StSystem<Device>, buffer_state: StSystem<BufferState>) -> RenderResult<Self> {
        let mut bind_groups = HashMap::new();
        let mut bind_group_layouts = HashMap::new();

        let device = device.get();
        let buffer_state = buffer_state.get();

        for (group, layout, buffer) in [
            (CAMERA_BIND_GROUP, CAMERA_BIND_GROUP_LAYOUT, CAMERA_BUFFER),
            (TERRAIN_BIND_GROUP, TERRAIN_BIND_GROUP_LAYOUT, TERRAIN_UNIFORM_BUFFER),
        ] {
            let (bind_group, bind_group_layout) =
                Self::generate_uniform_bindgroups(&device, &buffer_state, group, layout, buffer)?;
            bind_groups.insert(group, bind_group);
            bind_group_layouts.insert(layout, bind_group_layout);
        }

        Ok(Self {
            bind_groups,
            bind_group_layouts,
        })
    }

    pub fn get_bind_group(&self, name: &'static str) -> RenderResult<&wgpu::BindGroup> {
        self.bind_groups
            .get(name)
            .ok_or(RenderError::UnknownBindGroup(name))
    }

    pub fn get_bind_group_layout(&self, name: &'static str) -> RenderResult<&wgpu::BindGroupLayout> {
        self.bind_group_layouts
            .get(name)
            .ok_or(RenderError::UnknownBindGroup(name))
    }

    /// Creates a single-entry uniform bind group visible to both shader stages.
    ///
    /// # Returns
    /// A tuple containing the bind group and its layout
    fn generate_uniform_bindgroups(
        device: &Device,
        buffer_state: &BufferState,
        group: &'static str,
        layout: &'static str,
        buffer: &'static str,
    ) -> RenderResult<(BindGroup, BindGroupLayout)> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some(layout),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer_state.get_entire_binding(buffer)?,
            }],
            label: Some(group),
        });

        Ok((bind_group, bind_group_layout))
    }
}

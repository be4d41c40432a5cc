//! # Buffer State Module
//!
//! A registry of named GPU buffers. The terrain renderer keeps four of them:
//!
//! * [`TERRAIN_VERTEX_BUFFER`]: the shared vertex array of every patch
//! * [`TERRAIN_INDEX_BUFFER`]: the index library, all LOD and edge variants
//! * [`CAMERA_BUFFER`]: camera uniform
//! * [`TERRAIN_UNIFORM_BUFFER`]: height range and light direction for shading
//!
//! Each buffer carries allocation analytics (allocated bytes, bytes written and
//! write count) so the demo can log its GPU memory footprint.

use std::collections::HashMap;

use log::{debug, info};
use wgpu::{util::DeviceExt, Buffer, Device, Queue};

use crate::{
    core::StSystem,
    error::{RenderError, RenderResult},
};

pub const TERRAIN_VERTEX_BUFFER: &str = "terrain_vertex_buffer";
pub const TERRAIN_INDEX_BUFFER: &str = "terrain_index_buffer";
pub const CAMERA_BUFFER: &str = "camera_buffer";
pub const TERRAIN_UNIFORM_BUFFER: &str = "terrain_uniform_buffer";

/// Analytics data for a GPU buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    pub allocated_memory: u64,
    /// Highest byte written so far
    pub used_memory: u64,
    /// Number of times the buffer has been written to
    pub times_written: u64,
}

impl BufferAnalytics {
    fn record_write(&mut self, name: &'static str, offset: u64, len: u64) -> RenderResult<()> {
        if offset + len > self.allocated_memory {
            return Err(RenderError::BufferOverflow {
                name,
                offset,
                len,
                size: self.allocated_memory,
            });
        }
        self.used_memory = self.used_memory.max(offset + len);
        self.times_written += 1;
        Ok(())
    }
}

/// Central manager for GPU buffers
///
/// Buffers are referenced by name. Creating a buffer under an existing name
/// replaces it, which is how terrain regeneration swaps in new geometry.
///
/// # Examples
///
/// ```ignore
/// let mut buffer_state = BufferState::new(device, queue);
/// buffer_state.create_buffer_init(
///     TERRAIN_VERTEX_BUFFER,
///     wgpu::util::BufferInitDescriptor {
///         label: Some(TERRAIN_VERTEX_BUFFER),
///         contents: bytemuck::cast_slice(terrain.vertices()),
///         usage: wgpu::BufferUsages::VERTEX,
///     },
/// );
/// let vertex_buffer = buffer_state.get_buffer(TERRAIN_VERTEX_BUFFER)?;
/// ```
pub struct BufferState {
    /// Reference to the GPU device
    pub device: StSystem<Device>,
    /// Reference to the GPU command queue
    pub queue: StSystem<Queue>,
    buffers: HashMap<&'static str, Buffer>,
    analytics: HashMap<&'static str, BufferAnalytics>,
}

impl BufferState {
    /// Creates an empty registry on `device` and `queue`.
    pub fn new(device: StSystem<Device>, queue: StSystem<Queue>) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            analytics: HashMap::new(),
        }
    }

    /// Creates a buffer and initializes it with data
    ///
    /// # Arguments
    ///
    /// * `buffer_name` - Unique name for the buffer
    /// * `init_descriptor` - Buffer initialization descriptor with data
    pub fn create_buffer_init(
        &mut self,
        buffer_name: &'static str,
        init_descriptor: wgpu::util::BufferInitDescriptor,
    ) {
        let size = init_descriptor.contents.len() as u64;
        let buffer = self.device.get().create_buffer_init(&init_descriptor);

        info!("Created GPU buffer '{}' of {} bytes", buffer_name, size);
        if let Some(old) = self.buffers.insert(buffer_name, buffer) {
            old.destroy();
        }
        self.analytics.insert(
            buffer_name,
            BufferAnalytics {
                allocated_memory: size,
                used_memory: size,
                times_written: 1,
            },
        );
    }

    /// Writes raw byte data to a buffer
    ///
    /// # Arguments
    ///
    /// * `buffer_name` - Name of the buffer to write to
    /// * `offset` - Byte offset in the buffer to start writing
    /// * `data` - Raw byte data to write
    ///
    /// # Returns
    ///
    /// An error if the buffer does not exist or the write would exceed its bounds.
    /// Nothing is written in that case.
    pub fn write_buffer(
        &mut self,
        buffer_name: &'static str,
        offset: wgpu::BufferAddress,
        data: &[u8],
    ) -> RenderResult<()> {
        let buffer = self
            .buffers
            .get(buffer_name)
            .ok_or(RenderError::UnknownBuffer(buffer_name))?;
        self.analytics
            .entry(buffer_name)
            .or_default()
            .record_write(buffer_name, offset, data.len() as u64)?;

        self.queue.get().write_buffer(buffer, offset, data);
        debug!("Wrote {} bytes to '{}'", data.len(), buffer_name);
        Ok(())
    }

    /// Gets a reference to a buffer by name
    pub fn get_buffer(&self, buffer_name: &'static str) -> RenderResult<&Buffer> {
        self.buffers
            .get(buffer_name)
            .ok_or(RenderError::UnknownBuffer(buffer_name))
    }

    /// Gets a binding resource for the entire buffer
    pub fn get_entire_binding(
        &self,
        buffer_name: &'static str,
    ) -> RenderResult<wgpu::BindingResource<'_>> {
        Ok(self.get_buffer(buffer_name)?.as_entire_binding())
    }

    pub fn analytics(&self, buffer_name: &'static str) -> Option<BufferAnalytics> {
        self.analytics.get(buffer_name).copied()
    }

    /// Total allocated memory across all buffers, in bytes
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.analytics.values().map(|a| a.allocated_memory).sum()
    }

    /// Total used memory across all buffers, in bytes
    pub fn get_total_used_memory(&self) -> u64 {
        self.analytics.values().map(|a| a.used_memory).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_inside_the_allocation_are_recorded() {
        let mut analytics = BufferAnalytics {
            allocated_memory: 64,
            ..Default::default()
        };
        analytics.record_write(CAMERA_BUFFER, 0, 16).unwrap();
        analytics.record_write(CAMERA_BUFFER, 32, 32).unwrap();

        assert_eq!(analytics.used_memory, 64);
        assert_eq!(analytics.times_written, 2);
    }

    #[test]
    fn overflowing_write_is_rejected() {
        let mut analytics = BufferAnalytics {
            allocated_memory: 64,
            ..Default::default()
        };
        let err = analytics.record_write(CAMERA_BUFFER, 60, 8).unwrap_err();

        assert!(matches!(
            err,
            RenderError::BufferOverflow {
                offset: 60,
                len: 8,
                size: 64,
                ..
            }
        ));
        assert_eq!(analytics.times_written, 0);
    }
}

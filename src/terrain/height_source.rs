//! # Height Sources
//!
//! Read-only access to a square height field. The geomipmapping core only ever
//! reads heights through the [`HeightSource`] trait, so any producer (a generator,
//! a file, a procedural function) can feed it.
//!
//! [`HeightMap`] is the in-memory implementation used by the generators and the demo.

use std::path::Path;

use cgmath::Point3;

use crate::error::{TerrainError, TerrainResult};

/// Read-only height-field accessor.
///
/// Grid coordinates run over `0..size()` on both axes. World coordinates are grid
/// coordinates multiplied by [`HeightSource::world_scale`].
pub trait HeightSource {
    /// Height of the grid vertex at `(x, z)`.
    fn height(&self, x: usize, z: usize) -> f32;

    /// Number of vertices along each side of the square field.
    fn size(&self) -> usize;

    /// World units per grid step.
    fn world_scale(&self) -> f32;

    /// Texture coordinate repeat factor across the field.
    fn texture_scale(&self) -> f32 {
        1.0
    }

    /// Bilinearly interpolated height at fractional grid coordinates.
    ///
    /// Coordinates are clamped into the grid. On the last row or column there is
    /// no far neighbor to blend with, so the base vertex height is returned.
    fn height_interpolated(&self, x: f32, z: f32) -> f32 {
        let last = self.size().saturating_sub(1) as f32;
        let x = if x.is_finite() { x.clamp(0.0, last) } else { 0.0 };
        let z = if z.is_finite() { z.clamp(0.0, last) } else { 0.0 };

        let x0 = x.floor() as usize;
        let z0 = z.floor() as usize;
        let base = self.height(x0, z0);

        if x0 + 1 >= self.size() || z0 + 1 >= self.size() {
            return base;
        }

        let ratio_x = x - x0 as f32;
        let ratio_z = z - z0 as f32;

        let near_row = base + (self.height(x0 + 1, z0) - base) * ratio_x;
        let far_left = self.height(x0, z0 + 1);
        let far_row = far_left + (self.height(x0 + 1, z0 + 1) - far_left) * ratio_x;

        near_row + (far_row - near_row) * ratio_z
    }

    /// Lowest and highest height in the field.
    fn min_max_height(&self) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for z in 0..self.size() {
            for x in 0..self.size() {
                let h = self.height(x, z);
                min = min.min(h);
                max = max.max(h);
            }
        }
        (min, max)
    }
}

/// Square, row-major grid of heights.
#[derive(Debug, Clone)]
pub struct HeightMap {
    size: usize,
    heights: Vec<f32>,
    world_scale: f32,
    texture_scale: f32,
}

impl HeightMap {
    /// Creates a map of `size x size` vertices, all at `height`.
    pub fn flat(size: usize, height: f32, world_scale: f32, texture_scale: f32) -> Self {
        Self {
            size,
            heights: vec![height; size * size],
            world_scale,
            texture_scale,
        }
    }

    /// Wraps existing row-major samples.
    ///
    /// # Arguments
    /// * `heights` - `size * size` samples, stored at `z * size + x`
    ///
    /// # Returns
    /// The map, or [`TerrainError::HeightMapNotSquare`] if the sample count is not
    /// a square of at least 2
    pub fn from_heights(
        heights: Vec<f32>,
        world_scale: f32,
        texture_scale: f32,
    ) -> TerrainResult<Self> {
        let size = square_side(heights.len())
            .ok_or(TerrainError::HeightMapNotSquare(heights.len()))?;

        Ok(Self {
            size,
            heights,
            world_scale,
            texture_scale,
        })
    }

    /// Builds a map by evaluating `f(x, z)` at every vertex.
    pub fn from_fn(
        size: usize,
        world_scale: f32,
        texture_scale: f32,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> Self {
        let mut heights = Vec::with_capacity(size * size);
        for z in 0..size {
            for x in 0..size {
                heights.push(f(x, z));
            }
        }

        Self {
            size,
            heights,
            world_scale,
            texture_scale,
        }
    }

    /// Loads a square grid of raw little-endian `f32` samples.
    pub fn from_raw_f32_file(
        path: impl AsRef<Path>,
        world_scale: f32,
        texture_scale: f32,
    ) -> TerrainResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        if bytes.len() % std::mem::size_of::<f32>() != 0 {
            return Err(TerrainError::TruncatedHeightMap(bytes.len()));
        }

        let heights: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let map = Self::from_heights(heights, world_scale, texture_scale)?;
        log::info!(
            "Loaded {}x{} height map from {:?}",
            map.size,
            map.size,
            path.as_ref()
        );
        Ok(map)
    }

    /// Writes the samples as raw little-endian `f32`, the format read by
    /// [`HeightMap::from_raw_f32_file`].
    pub fn save_raw_f32(&self, path: impl AsRef<Path>) -> TerrainResult<()> {
        let bytes: Vec<u8> = self.heights.iter().flat_map(|h| h.to_le_bytes()).collect();
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Saves the map as an 8-bit grayscale PNG, with the lowest sample black and
    /// the highest white.
    pub fn save_png(&self, path: impl AsRef<Path>) -> TerrainResult<()> {
        let (min, max) = self.min_max_height();
        let range = max - min;
        let side = self.size as u32;

        let image = image::GrayImage::from_fn(side, side, |x, z| {
            let h = self.height(x as usize, z as usize);
            let level = if range > 0.0 { (h - min) / range } else { 0.0 };
            image::Luma([(level * 255.0).round() as u8])
        });

        image.save(path.as_ref())?;
        log::info!("Saved height map image to {:?}", path.as_ref());
        Ok(())
    }

    /// Sets the height of the vertex at `(x, z)`.
    pub fn set_height(&mut self, x: usize, z: usize, height: f32) {
        self.heights[z * self.size + x] = height;
    }

    /// Linearly remaps all samples into `[min, max]`.
    ///
    /// A perfectly flat map is moved to `min`.
    pub fn normalize(&mut self, min: f32, max: f32) {
        let (cur_min, cur_max) = self.min_max_height();
        let cur_range = cur_max - cur_min;

        for h in self.heights.iter_mut() {
            *h = if cur_range > 0.0 {
                min + (*h - cur_min) / cur_range * (max - min)
            } else {
                min
            };
        }
    }

    /// All samples, row-major.
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// World-space extent of the map along each axis.
    pub fn world_size(&self) -> f32 {
        self.size.saturating_sub(1) as f32 * self.world_scale
    }

    /// Interpolated height at a world-space `(x, z)` position.
    pub fn world_height(&self, world_x: f32, world_z: f32) -> f32 {
        self.height_interpolated(world_x / self.world_scale, world_z / self.world_scale)
    }

    /// Keeps a camera over the terrain, a fixed height above the surface.
    ///
    /// # Arguments
    /// * `position` - Requested camera position
    /// * `height_above` - Eye height above the terrain surface
    ///
    /// # Returns
    /// The position clamped into the terrain's world bounds, with `y` on the surface
    /// plus `height_above`
    pub fn constrain_camera_position(
        &self,
        position: Point3<f32>,
        height_above: f32,
    ) -> Point3<f32> {
        let limit = (self.world_size() - 0.5).max(0.0);
        let x = position.x.clamp(0.0, limit);
        let z = position.z.clamp(0.0, limit);

        Point3::new(x, self.world_height(x, z) + height_above, z)
    }
}

impl HeightSource for HeightMap {
    fn height(&self, x: usize, z: usize) -> f32 {
        self.heights[z * self.size + x]
    }

    fn size(&self) -> usize {
        self.size
    }

    fn world_scale(&self) -> f32 {
        self.world_scale
    }

    fn texture_scale(&self) -> f32 {
        self.texture_scale
    }

    fn min_max_height(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &h| {
                (min.min(h), max.max(h))
            })
    }
}

fn square_side(samples: usize) -> Option<usize> {
    let side = (samples as f64).sqrt().round() as usize;
    (side >= 2 && side * side == samples).then_some(side)
}

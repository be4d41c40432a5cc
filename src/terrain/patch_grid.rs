//! # Patch Grid
//!
//! Splits a `width x depth` vertex grid into square patches of `patch_size`
//! vertices per side. Neighboring patches share their border row or column, so a
//! grid of `n` patches along an axis has `n * (patch_size - 1) + 1` vertices.
//!
//! The grid owns the single shared vertex array (row-major, `z * width + x`) and
//! one world-space bounding box per patch, used for culling.

use cgmath::{Point3, Vector3};

use crate::{
    engine_state::rendering::vertex::TerrainVertex,
    error::{GridAxis, TerrainError, TerrainResult},
    terrain::height_source::HeightSource,
};

/// Validated patch layout of a terrain grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchLayout {
    width: usize,
    depth: usize,
    patch_size: usize,
    world_scale: f32,
    num_patches_x: usize,
    num_patches_z: usize,
    max_lod: u32,
}

impl PatchLayout {
    /// Validates and creates a layout.
    ///
    /// # Arguments
    /// * `width` - Vertices along X
    /// * `depth` - Vertices along Z
    /// * `patch_size` - Vertices per patch side, must be `2^n + 1` with `n >= 1`
    /// * `world_scale` - World units per grid step
    ///
    /// # Returns
    /// The layout, or the first configuration error found
    pub fn new(
        width: usize,
        depth: usize,
        patch_size: usize,
        world_scale: f32,
    ) -> TerrainResult<Self> {
        if patch_size < 3 || !(patch_size - 1).is_power_of_two() {
            return Err(TerrainError::InvalidPatchSize(patch_size));
        }

        let step = patch_size - 1;
        for (axis, vertices) in [(GridAxis::X, width), (GridAxis::Z, depth)] {
            if vertices.saturating_sub(1) % step != 0 {
                return Err(TerrainError::IndivisibleGrid {
                    axis,
                    vertices,
                    patch_size,
                });
            }
        }

        if !world_scale.is_finite() || world_scale <= 0.0 {
            return Err(TerrainError::InvalidWorldScale(world_scale));
        }

        if width < patch_size || depth < patch_size {
            return Err(TerrainError::GridTooSmall {
                width,
                depth,
                patch_size,
            });
        }

        Ok(Self {
            width,
            depth,
            patch_size,
            world_scale,
            num_patches_x: (width - 1) / step,
            num_patches_z: (depth - 1) / step,
            max_lod: step.trailing_zeros(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn world_scale(&self) -> f32 {
        self.world_scale
    }

    pub fn num_patches_x(&self) -> usize {
        self.num_patches_x
    }

    pub fn num_patches_z(&self) -> usize {
        self.num_patches_z
    }

    pub fn patch_count(&self) -> usize {
        self.num_patches_x * self.num_patches_z
    }

    /// Coarsest LOD level, `log2(patch_size - 1)`.
    pub fn max_lod(&self) -> u32 {
        self.max_lod
    }

    pub fn vertex_count(&self) -> usize {
        self.width * self.depth
    }

    /// Row-major index of a patch.
    pub fn patch_index(&self, px: usize, pz: usize) -> usize {
        pz * self.num_patches_x + px
    }

    /// Grid coordinates of a patch's first vertex.
    pub fn base_vertex(&self, px: usize, pz: usize) -> (usize, usize) {
        (px * (self.patch_size - 1), pz * (self.patch_size - 1))
    }

    /// Offset added to a patch-relative index to reach the global vertex array.
    pub fn base_vertex_offset(&self, px: usize, pz: usize) -> i32 {
        let (base_x, base_z) = self.base_vertex(px, pz);
        (base_z * self.width + base_x) as i32
    }

    /// World-space `(x, z)` of a patch's center vertex.
    pub fn patch_center(&self, px: usize, pz: usize) -> (f32, f32) {
        let (base_x, base_z) = self.base_vertex(px, pz);
        let half = (self.patch_size - 1) as f32 / 2.0;
        (
            (base_x as f32 + half) * self.world_scale,
            (base_z as f32 + half) * self.world_scale,
        )
    }

    /// World-space footprint of a patch as `(min_x, min_z, max_x, max_z)`.
    pub fn footprint(&self, px: usize, pz: usize) -> (f32, f32, f32, f32) {
        let (base_x, base_z) = self.base_vertex(px, pz);
        let side = (self.patch_size - 1) as f32 * self.world_scale;
        let min_x = base_x as f32 * self.world_scale;
        let min_z = base_z as f32 * self.world_scale;
        (min_x, min_z, min_x + side, min_z + side)
    }

    /// All patch coordinates in row-major order (`pz` outer, `px` inner).
    pub fn patch_coords(&self) -> impl Iterator<Item = (usize, usize)> {
        let num_x = self.num_patches_x;
        (0..self.num_patches_z).flat_map(move |pz| (0..num_x).map(move |px| (px, pz)))
    }
}

/// World-space axis-aligned bounding box of a patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchBounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl PatchBounds {
    pub fn center(&self) -> Point3<f32> {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Half the box size along each axis.
    pub fn extents(&self) -> Vector3<f32> {
        (self.max - self.min) * 0.5
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }
}

/// Shared vertex array and per-patch bounds of a terrain.
#[derive(Debug, Clone)]
pub struct PatchGrid {
    layout: PatchLayout,
    vertices: Vec<TerrainVertex>,
    bounds: Vec<PatchBounds>,
    min_height: f32,
    max_height: f32,
}

impl PatchGrid {
    /// Samples every grid vertex from `source` and computes the patch bounds.
    ///
    /// Normals are left at zero; see [`crate::terrain::normals::calc_normals`].
    ///
    /// # Arguments
    /// * `layout` - Validated patch layout
    /// * `source` - Height field covering at least `width x depth` vertices, at the
    ///   layout's world scale
    /// * `texture_scale` - Texture repeat factor across the terrain
    pub fn build(
        layout: PatchLayout,
        source: &dyn HeightSource,
        texture_scale: f32,
    ) -> TerrainResult<Self> {
        if source.size() < layout.width() || source.size() < layout.depth() {
            return Err(TerrainError::HeightSourceTooSmall {
                size: source.size(),
                width: layout.width(),
                depth: layout.depth(),
            });
        }

        let ws = layout.world_scale();
        let source_ws = source.world_scale();
        let scales_agree = (source_ws - ws).abs() <= f32::EPSILON * ws.max(source_ws.abs());
        if !scales_agree {
            return Err(TerrainError::WorldScaleMismatch {
                height_source: source_ws,
                layout: ws,
            });
        }

        let tex_width = layout.width() as f32;
        let tex_depth = layout.depth() as f32;

        let mut vertices = Vec::with_capacity(layout.vertex_count());
        for z in 0..layout.depth() {
            for x in 0..layout.width() {
                let height = source.height(x, z);
                vertices.push(TerrainVertex::new(
                    [x as f32 * ws, height, z as f32 * ws],
                    [
                        texture_scale * x as f32 / tex_width,
                        texture_scale * z as f32 / tex_depth,
                    ],
                ));
            }
        }

        let bounds: Vec<PatchBounds> = layout
            .patch_coords()
            .map(|(px, pz)| Self::patch_bounds_of(&layout, &vertices, px, pz))
            .collect();

        let (min_height, max_height) = bounds
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), b| {
                (lo.min(b.min.y), hi.max(b.max.y))
            });

        Ok(Self {
            layout,
            vertices,
            bounds,
            min_height,
            max_height,
        })
    }

    fn patch_bounds_of(
        layout: &PatchLayout,
        vertices: &[TerrainVertex],
        px: usize,
        pz: usize,
    ) -> PatchBounds {
        let (base_x, base_z) = layout.base_vertex(px, pz);
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;

        for z in base_z..base_z + layout.patch_size() {
            for x in base_x..base_x + layout.patch_size() {
                let y = vertices[z * layout.width() + x].position[1];
                lo = lo.min(y);
                hi = hi.max(y);
            }
        }

        let (min_x, min_z, max_x, max_z) = layout.footprint(px, pz);
        PatchBounds {
            min: Point3::new(min_x, lo, min_z),
            max: Point3::new(max_x, hi, max_z),
        }
    }

    pub fn layout(&self) -> &PatchLayout {
        &self.layout
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub(crate) fn vertices_mut(&mut self) -> &mut [TerrainVertex] {
        &mut self.vertices
    }

    pub fn bounds(&self) -> &[PatchBounds] {
        &self.bounds
    }

    pub fn patch_bounds(&self, px: usize, pz: usize) -> &PatchBounds {
        &self.bounds[self.layout.patch_index(px, pz)]
    }

    /// Lowest and highest vertex height of the whole grid.
    pub fn height_range(&self) -> (f32, f32) {
        (self.min_height, self.max_height)
    }
}

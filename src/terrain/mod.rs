//! # Geomipmapped Terrain
//!
//! The terrain core, free of any GPU or windowing code:
//!
//! - [`height_source`]: height-field access and the in-memory [`HeightMap`]
//! - [`generation`]: procedural height maps
//! - [`patch_grid`]: layout validation, shared vertices and patch bounds
//! - [`index_library`]: every crack-free patch triangulation in one index array
//! - [`normals`]: vertex normals from the finest triangulation
//! - [`lod`]: per-patch LOD and edge flags from the camera position
//! - [`culling`]: frustum visibility of patch bounds
//! - [`draw`]: the per-frame draw list and its submission
//!
//! A [`CompiledTerrain`] bundles the parts that are built once per height field.
//! It never changes after construction; regenerating terrain builds a new one and
//! swaps it in behind an `Arc`.
//!
//! ## Per-Frame Flow
//!
//! ```text
//! camera -> LodSelector::select -> LodMap ─┐
//!                                          ├─> build_draw_list -> submit
//! view_proj -> FrustumCuller ──────────────┘
//! ```

use cgmath::{Matrix4, Point3};

use crate::{
    config::TerrainConfig,
    engine_state::rendering::vertex::TerrainVertex,
    error::{TerrainError, TerrainResult},
};

pub mod culling;
pub mod draw;
pub mod generation;
pub mod height_source;
pub mod index_library;
pub mod lod;
pub mod normals;
pub mod patch_grid;

pub use culling::{CullingStrategy, FrustumCuller};
pub use draw::{build_draw_list, submit, DrawList, FrameStats, PatchDraw, PatchDrawBackend};
pub use height_source::{HeightMap, HeightSource};
pub use index_library::{EdgeFlags, IndexBufferLibrary, IndexSlice, LodKey, Winding};
pub use lod::{LodConfig, LodMap, LodSelector, PatchLod};
pub use patch_grid::{PatchBounds, PatchGrid, PatchLayout};

/// Immutable geomipmapping data for one height field.
#[derive(Debug, Clone)]
pub struct CompiledTerrain {
    grid: PatchGrid,
    library: IndexBufferLibrary,
    selector: LodSelector,
}

impl CompiledTerrain {
    /// Builds the patch grid, index library, normals and LOD selector.
    ///
    /// # Arguments
    /// * `layout` - Validated patch layout
    /// * `source` - Height field covering the layout
    /// * `texture_scale` - Texture repeat factor across the terrain
    /// * `lod` - LOD distance configuration
    /// * `winding` - Triangle winding of the index library
    pub fn compile(
        layout: PatchLayout,
        source: &dyn HeightSource,
        texture_scale: f32,
        lod: &LodConfig,
        winding: Winding,
    ) -> TerrainResult<Self> {
        let selector = LodSelector::new(&layout, lod)?;
        let mut grid = PatchGrid::build(layout, source, texture_scale)?;
        let library = IndexBufferLibrary::build(&layout, winding);
        normals::calc_normals(grid.vertices_mut(), &layout, &library);

        log::info!(
            "Compiled terrain: {}x{} patches of {} vertices, max LOD {}, {} vertices, {} indices in {} variants",
            layout.num_patches_x(),
            layout.num_patches_z(),
            layout.patch_size(),
            layout.max_lod(),
            grid.vertices().len(),
            library.total_indices(),
            library.variant_count()
        );

        Ok(Self {
            grid,
            library,
            selector,
        })
    }

    /// Compiles a square terrain of `config.terrain_size` vertices from `source`.
    ///
    /// The source must be exactly `terrain_size` vertices on a side, so a height
    /// map file of another size is rejected instead of cropped.
    pub fn from_config(config: &TerrainConfig, source: &dyn HeightSource) -> TerrainResult<Self> {
        if source.size() != config.terrain_size {
            return Err(TerrainError::HeightSourceSizeMismatch {
                size: source.size(),
                expected: config.terrain_size,
            });
        }
        let layout = PatchLayout::new(
            config.terrain_size,
            config.terrain_size,
            config.patch_size,
            config.world_scale,
        )?;
        Self::compile(
            layout,
            source,
            config.texture_scale,
            &config.lod,
            config.winding,
        )
    }

    /// Generates a height map with the configured generator and compiles it.
    pub fn generate(config: &TerrainConfig) -> TerrainResult<(HeightMap, Self)> {
        config.validate()?;
        let map = generation::generate_height_map(
            &config.generator,
            config.terrain_size,
            config.world_scale,
            config.texture_scale,
        )?;
        let terrain = Self::from_config(config, &map)?;
        Ok((map, terrain))
    }

    pub fn grid(&self) -> &PatchGrid {
        &self.grid
    }

    pub fn layout(&self) -> &PatchLayout {
        self.grid.layout()
    }

    pub fn library(&self) -> &IndexBufferLibrary {
        &self.library
    }

    pub fn selector(&self) -> &LodSelector {
        &self.selector
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        self.grid.vertices()
    }

    pub fn indices(&self) -> &[u32] {
        self.library.indices()
    }

    pub fn select_lod(&self, camera: Point3<f32>) -> LodMap {
        self.selector.select(camera)
    }

    /// Runs LOD selection and culling for one camera and builds the draw list.
    pub fn frame_draw_list(
        &self,
        camera: Point3<f32>,
        view_proj: Matrix4<f32>,
        strategy: CullingStrategy,
    ) -> DrawList {
        let lod_map = self.select_lod(camera);
        let culler = FrustumCuller::new(strategy, view_proj);
        build_draw_list(self, &lod_map, &culler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn compiled_terrain_is_shareable() {
        assert_send_sync::<CompiledTerrain>();
    }

    #[test]
    fn generate_from_config() {
        let config = TerrainConfig {
            terrain_size: 65,
            patch_size: 17,
            generator: GeneratorConfig::MidpointDisplacement {
                roughness: 1.0,
                min_height: 0.0,
                max_height: 100.0,
                seed: 9,
            },
            ..Default::default()
        };
        let (map, terrain) = CompiledTerrain::generate(&config).unwrap();

        assert_eq!(map.size(), 65);
        assert_eq!(terrain.layout().patch_count(), 16);
        assert_eq!(terrain.vertices().len(), 65 * 65);
        assert_eq!(terrain.library().variant_count(), 80);

        let (lo, hi) = terrain.grid().height_range();
        assert!(lo >= -1e-3 && hi <= 100.0 + 1e-3);
    }

    #[test]
    fn height_map_file_must_match_terrain_size() {
        let path = std::env::temp_dir().join(format!(
            "geomip-oversized-{}.raw",
            std::process::id()
        ));
        HeightMap::flat(33, 1.0, 20.0, 16.0).save_raw_f32(&path).unwrap();

        let config = TerrainConfig {
            terrain_size: 17,
            patch_size: 17,
            generator: GeneratorConfig::HeightMapFile { path: path.clone() },
            ..Default::default()
        };
        let result = CompiledTerrain::generate(&config);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            result,
            Err(TerrainError::HeightSourceSizeMismatch { size: 33, expected: 17 })
        ));
    }

    #[test]
    fn source_at_another_world_scale_is_rejected() {
        let config = TerrainConfig {
            terrain_size: 33,
            patch_size: 17,
            world_scale: 1.0,
            ..Default::default()
        };
        let map = HeightMap::flat(33, 0.0, 10.0, 1.0);

        assert!(matches!(
            CompiledTerrain::from_config(&config, &map),
            Err(TerrainError::WorldScaleMismatch { .. })
        ));
    }

    #[test]
    fn invalid_config_is_reported() {
        let config = TerrainConfig {
            terrain_size: 60,
            ..Default::default()
        };
        assert!(CompiledTerrain::generate(&config).is_err());
    }
}

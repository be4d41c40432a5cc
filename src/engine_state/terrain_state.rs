//! # Terrain State
//!
//! The engine's handle on the current terrain: its configuration, the height
//! map it was built from and the compiled geomipmapping data behind an `Arc`.
//!
//! Regeneration builds a complete new [`CompiledTerrain`] first and only then
//! swaps the `Arc`. A failed regeneration leaves the old terrain in place, so a
//! frame never sees half-built data.

use std::sync::Arc;

use log::{debug, info};

use crate::{
    config::TerrainConfig,
    engine_state::{camera_state::CameraSnapshot, rendering::terrain_renderer::TerrainUniform},
    error::TerrainResult,
    terrain::{CompiledTerrain, CullingStrategy, DrawList, HeightMap},
};

pub struct TerrainState {
    config: TerrainConfig,
    height_map: HeightMap,
    terrain: Arc<CompiledTerrain>,
    generation: u64,
}

impl TerrainState {
    /// Generates and compiles the terrain described by `config`.
    pub fn new(config: TerrainConfig) -> TerrainResult<Self> {
        let (height_map, terrain) = CompiledTerrain::generate(&config)?;
        Ok(Self {
            config,
            height_map,
            terrain: Arc::new(terrain),
            generation: 0,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn height_map(&self) -> &HeightMap {
        &self.height_map
    }

    /// The current compiled terrain.
    pub fn terrain(&self) -> Arc<CompiledTerrain> {
        Arc::clone(&self.terrain)
    }

    /// How many times the terrain has been regenerated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Regenerates with a random seed.
    pub fn regenerate(&mut self) -> TerrainResult<Arc<CompiledTerrain>> {
        self.regenerate_with_seed(fastrand::u64(..))
    }

    /// Regenerates with `seed` and swaps the new terrain in.
    ///
    /// # Returns
    /// The new terrain. On error the previous terrain stays current.
    pub fn regenerate_with_seed(&mut self, seed: u64) -> TerrainResult<Arc<CompiledTerrain>> {
        let mut config = self.config.clone();
        config.generator = config.generator.reseeded(seed);

        let (height_map, terrain) = CompiledTerrain::generate(&config)?;
        let terrain = Arc::new(terrain);

        self.config = config;
        self.height_map = height_map;
        self.terrain = Arc::clone(&terrain);
        self.generation += 1;

        info!(
            "Regenerated terrain with seed {} (generation {})",
            seed, self.generation
        );
        Ok(terrain)
    }

    /// Shading parameters for the current terrain.
    pub fn uniform(&self) -> TerrainUniform {
        let (min_height, max_height) = self.terrain.grid().height_range();
        TerrainUniform::new(min_height, max_height, self.config.light_direction)
    }

    /// LOD selection, culling and draw-list building for one frame.
    pub fn frame(&self, snapshot: &CameraSnapshot, strategy: CullingStrategy) -> DrawList {
        let draw_list = self
            .terrain
            .frame_draw_list(snapshot.position, snapshot.view_proj, strategy);

        let stats = &draw_list.stats;
        debug!(
            "Terrain frame ({:?}): {}/{} patches visible, {} draw calls, {} indices, LOD histogram {:?}",
            strategy,
            stats.visible_patches,
            stats.total_patches,
            stats.draw_calls,
            stats.indices,
            stats.lod_histogram
        );
        draw_list
    }
}

//! # Terrain Configuration
//!
//! All construction-time parameters of the terrain engine, loadable from a JSON
//! file. Every field has a default, so a partial file (or no file at all) yields a
//! working setup matching the stock demo: a 513x513 midpoint-displacement terrain
//! split into 17x17 patches.
//!
//! ## Loading
//!
//! ```no_run
//! use geomip_terrain::config::TerrainConfig;
//!
//! let config = TerrainConfig::from_env().expect("bad terrain config");
//! config.validate().expect("invalid terrain layout");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{TerrainError, TerrainResult},
    terrain::{
        culling::CullingStrategy, index_library::Winding, lod::LodConfig,
        patch_grid::PatchLayout,
    },
};

/// Environment variable naming the JSON configuration file
pub const CONFIG_PATH_ENV: &str = "GEOMIP_TERRAIN_CONFIG";

/// Top-level configuration for terrain generation, compilation and rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Number of vertices along each side of the (square) terrain
    pub terrain_size: usize,
    /// Number of vertices along each side of a patch, must be 2^n + 1
    pub patch_size: usize,
    /// World units per grid step
    pub world_scale: f32,
    /// Texture coordinate repeat factor across the whole terrain
    pub texture_scale: f32,
    /// How the height field is produced
    pub generator: GeneratorConfig,
    /// Level of detail selection parameters
    pub lod: LodConfig,
    /// Frustum culling strategy
    pub culling: CullingStrategy,
    /// Triangle winding order of the generated index buffer
    pub winding: Winding,
    /// Initial camera placement and projection
    pub camera: CameraConfig,
    /// Direction of the directional light used for shading
    pub light_direction: [f32; 3],
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            terrain_size: 513,
            patch_size: 17,
            world_scale: 20.0,
            texture_scale: 16.0,
            generator: GeneratorConfig::default(),
            lod: LodConfig::default(),
            culling: CullingStrategy::default(),
            winding: Winding::default(),
            camera: CameraConfig::default(),
            light_direction: [0.0, -1.0, 0.0],
        }
    }
}

impl TerrainConfig {
    /// Reads a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON file
    ///
    /// # Returns
    /// The parsed configuration, with defaults for any omitted field
    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&contents)?;
        log::info!("Loaded terrain configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Loads the file named by [`CONFIG_PATH_ENV`], or the defaults if it is unset.
    pub fn from_env() -> TerrainResult<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(path),
            None => {
                log::info!("{} not set, using default terrain configuration", CONFIG_PATH_ENV);
                Ok(Self::default())
            }
        }
    }

    /// Checks the configuration for errors that would otherwise surface during
    /// terrain compilation.
    pub fn validate(&self) -> TerrainResult<()> {
        PatchLayout::new(
            self.terrain_size,
            self.terrain_size,
            self.patch_size,
            self.world_scale,
        )?;
        self.lod.validate()?;
        self.generator.validate()
    }
}

/// Height field source selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum GeneratorConfig {
    /// Diamond-square fractal terrain
    MidpointDisplacement {
        roughness: f32,
        min_height: f32,
        max_height: f32,
        seed: u64,
    },
    /// Fractal Perlin noise
    Perlin {
        frequency: f64,
        octaves: usize,
        min_height: f32,
        max_height: f32,
        seed: u32,
    },
    /// Square grid of raw little-endian f32 samples
    HeightMapFile { path: PathBuf },
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::MidpointDisplacement {
            roughness: 0.4,
            min_height: 30.0,
            max_height: 400.0,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> TerrainResult<()> {
        let (min, max) = match self {
            GeneratorConfig::MidpointDisplacement {
                roughness,
                min_height,
                max_height,
                ..
            } => {
                if !roughness.is_finite() || *roughness < 0.0 {
                    return Err(TerrainError::InvalidRoughness(*roughness));
                }
                (*min_height, *max_height)
            }
            GeneratorConfig::Perlin {
                min_height,
                max_height,
                ..
            } => (*min_height, *max_height),
            GeneratorConfig::HeightMapFile { .. } => return Ok(()),
        };

        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(TerrainError::InvalidHeightRange { min, max });
        }
        Ok(())
    }

    /// Returns a copy with a different random seed, used when regenerating terrain.
    pub fn reseeded(&self, new_seed: u64) -> Self {
        let mut generator = self.clone();
        match &mut generator {
            GeneratorConfig::MidpointDisplacement { seed, .. } => *seed = new_seed,
            GeneratorConfig::Perlin { seed, .. } => *seed = new_seed as u32,
            GeneratorConfig::HeightMapFile { .. } => {}
        }
        generator
    }
}

/// Initial camera placement, projection and movement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
    pub fov_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Movement speed in world units per second
    pub speed: f32,
    pub sensitivity: f32,
    /// Eye height kept above the surface when the camera is constrained to the terrain
    pub height_above_terrain: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [100.0, 600.0, 100.0],
            yaw_degrees: 45.0,
            pitch_degrees: -25.0,
            fov_degrees: 45.0,
            z_near: 1.0,
            z_far: 5000.0,
            speed: 300.0,
            sensitivity: 2.0,
            height_above_terrain: 2.0,
        }
    }
}

//! # Error Types
//!
//! Every fallible terrain operation returns a [`TerrainResult`]. Layout problems
//! (bad patch size, a grid that does not divide into whole patches) are reported
//! here instead of aborting, so the caller decides whether to exit or fall back.
//!
//! GPU setup and buffer bookkeeping in the demo renderer use [`RenderResult`].

use thiserror::Error;

/// Grid axis named in layout errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAxis {
    /// Vertices along X (the grid width)
    X,
    /// Vertices along Z (the grid depth)
    Z,
}

impl std::fmt::Display for GridAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridAxis::X => write!(f, "width"),
            GridAxis::Z => write!(f, "depth"),
        }
    }
}

/// Errors raised while configuring, loading or compiling terrain.
#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("patch size {0} is not of the form 2^n + 1 with n >= 1")]
    InvalidPatchSize(usize),
    #[error("grid {axis} of {vertices} vertices does not split into patches of size {patch_size}")]
    IndivisibleGrid {
        axis: GridAxis,
        vertices: usize,
        patch_size: usize,
    },
    #[error("grid of {width}x{depth} vertices is smaller than a single patch of size {patch_size}")]
    GridTooSmall {
        width: usize,
        depth: usize,
        patch_size: usize,
    },
    #[error("world scale must be finite and positive, got {0}")]
    InvalidWorldScale(f32),
    #[error("height source of size {size} cannot cover a {width}x{depth} grid")]
    HeightSourceTooSmall {
        size: usize,
        width: usize,
        depth: usize,
    },
    #[error("height source of size {size} does not match the configured terrain size {expected}")]
    HeightSourceSizeMismatch { size: usize, expected: usize },
    #[error("height source world scale {height_source} differs from the layout world scale {layout}")]
    WorldScaleMismatch { height_source: f32, layout: f32 },
    #[error("LOD distance thresholds must be non-empty, finite and strictly increasing")]
    InvalidLodThresholds,
    #[error("roughness must be finite and non-negative, got {0}")]
    InvalidRoughness(f32),
    #[error("height range [{min}, {max}] is empty or not finite")]
    InvalidHeightRange { min: f32, max: f32 },
    #[error("height map of {0} samples is not a square grid of at least 2x2")]
    HeightMapNotSquare(usize),
    #[error("height map file of {0} bytes does not hold whole f32 samples")]
    TruncatedHeightMap(usize),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("configuration error")]
    Config(#[from] serde_json::Error),
    #[error("image error")]
    Image(#[from] image::ImageError),
}

pub type TerrainResult<T> = Result<T, TerrainError>;

/// Errors raised by the GPU side of the demo renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no GPU buffer named '{0}'")]
    UnknownBuffer(&'static str),
    #[error("no bind group named '{0}'")]
    UnknownBindGroup(&'static str),
    #[error("write of {len} bytes at offset {offset} overflows buffer '{name}' of {size} bytes")]
    BufferOverflow {
        name: &'static str,
        offset: u64,
        len: u64,
        size: u64,
    },
    #[error("failed to create the window surface")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open the GPU device")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("window creation failed")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
}

pub type RenderResult<T> = Result<T, RenderError>;

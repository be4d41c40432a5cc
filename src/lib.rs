//! # Geomipmapped Terrain
//!
//! Level-of-detail terrain rendering by geomipmapping, on wgpu.
//!
//! A square height field is cut into patches of `2^n + 1` vertices that share
//! one vertex buffer. Every patch is drawn at its own LOD out of a single
//! precomputed index buffer that holds every (LOD, stitched edges) variant, so
//! neighbouring patches at different LODs meet without cracks.
//!
//! ## Key Modules
//!
//! * `terrain` - The GPU-free core: layout, index library, normals, LOD, culling
//!   and draw lists
//! * `config` - JSON configuration with defaults
//! * `engine_state` - Camera, GPU buffers and the terrain renderer
//! * `application_state` - The winit application handler
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     geomip_terrain::run();
//! }
//! ```
//!
//! Set `GEOMIP_TERRAIN_CONFIG` to a JSON file to override the defaults, and
//! `RUST_LOG` to pick the log level.

use application_state::ApplicationState;
use log::{error, info};
use winit::event_loop::EventLoop;

use config::TerrainConfig;

pub mod application_state;
pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;
pub mod terrain;

/// Runs the terrain demo until the window closes.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let config = match TerrainConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load terrain configuration: {}", err);
            return;
        }
    };

    let event_loop = match EventLoop::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            error!("Failed to create the event loop: {}", err);
            return;
        }
    };

    let mut state = ApplicationState::new(event_loop.create_proxy(), config);
    if let Err(err) = event_loop.run_app(&mut state) {
        error!("Event loop ended with an error: {}", err);
    }
}

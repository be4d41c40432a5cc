//! # Engine State Module
//!
//! Ties the terrain core to the window: camera input, terrain regeneration and
//! the per-frame flow.
//!
//! * `buffer_state` - Named GPU buffers with allocation analytics
//! * `camera_state` - Fly camera and its uniform
//! * `rendering` - Surface, pipelines and the terrain draw backend
//! * `terrain_state` - Current terrain, swapped atomically on regeneration
//!
//! ## Frame Flow
//!
//! Each frame takes a [`CameraSnapshot`], runs LOD selection and culling on the
//! terrain core and hands the resulting draw list to the renderer.

use log::{error, info, warn};
use wgpu::{Device, Queue, Surface, SurfaceConfiguration};
use winit::{event::MouseButton, keyboard::KeyCode};

use buffer_state::BufferState;
use camera_state::{camera, CameraSnapshot, CameraState};
use rendering::{terrain_renderer, TerrainRendererManager};
use terrain_state::TerrainState;

use crate::{
    application_state::input_state::ProcessedInputState,
    config::TerrainConfig,
    core::StSystem,
    error::RenderResult,
    terrain::CullingStrategy,
};

pub mod buffer_state;
pub mod camera_state;
pub mod rendering;
pub mod terrain_state;

/// Flags controlling engine behavior and rendering options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineFlags {
    pub culling: CullingStrategy,
    /// Draw triangle edges instead of filled triangles
    pub wireframe: bool,
    /// Keep the camera a fixed height above the terrain surface
    pub constrain_camera: bool,
}

impl EngineFlags {
    fn new(culling: CullingStrategy) -> Self {
        Self {
            culling,
            wireframe: false,
            constrain_camera: false,
        }
    }
}

/// The main state container of the terrain demo.
pub struct EngineState {
    /// Camera state managing position, orientation and movement
    pub camera_state: CameraState,
    /// Current player actions derived from input
    pub player_actions: PlayerAction,
    /// Buffer state for managing GPU buffers
    pub buffer_state: StSystem<BufferState>,
    pub render_manager: TerrainRendererManager,
    pub terrain_state: TerrainState,
    flags: EngineFlags,
}

impl EngineState {
    /// Creates the terrain, uploads it and builds the render pipeline.
    ///
    /// # Arguments
    ///
    /// * `surface` - The configured rendering surface
    /// * `surface_config` - Configuration for the rendering surface
    /// * `device` - The GPU device
    /// * `queue` - The GPU command queue
    /// * `shader_string` - WGSL source of the terrain shader
    /// * `config` - Terrain, camera and LOD settings
    pub fn new(
        surface: Surface<'static>,
        surface_config: SurfaceConfiguration,
        device: Device,
        queue: Queue,
        shader_string: &str,
        config: TerrainConfig,
    ) -> RenderResult<Self> {
        let terrain_state = TerrainState::new(config)?;
        let config = terrain_state.config();

        let device = StSystem::new(device);
        let queue = StSystem::new(queue);
        let buffer_state = StSystem::new(BufferState::new(device.clone(), queue.clone()));

        let camera_projection = camera::Projection::new(
            surface_config.width,
            surface_config.height,
            cgmath::Deg(config.camera.fov_degrees),
            config.camera.z_near,
            config.camera.z_far,
        );
        let camera_state =
            CameraState::new(buffer_state.clone(), &camera_projection, &config.camera);

        {
            let mut buffers = buffer_state.get_mut();
            terrain_renderer::upload_terrain(&mut buffers, &terrain_state.terrain());
            terrain_renderer::upload_terrain_uniform(&mut buffers, terrain_state.uniform())?;
        }

        let render_manager = TerrainRendererManager::new(
            surface,
            surface_config,
            device,
            queue,
            buffer_state.clone(),
            shader_string,
            camera_projection,
            config.winding,
        )?;

        info!(
            "Engine ready: {} bytes of GPU buffers, culling {:?}",
            buffer_state.get().get_total_allocated_memory(),
            config.culling
        );

        let flags = EngineFlags::new(config.culling);
        Ok(Self {
            camera_state,
            player_actions: PlayerAction::default(),
            buffer_state,
            render_manager,
            terrain_state,
            flags,
        })
    }

    /// Resizes the rendering surface when the window size changes
    pub fn resize_surface(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        self.render_manager.resize_surface(size);
    }

    /// Renders the current frame
    ///
    /// Snapshots the camera, uploads its uniform, builds the draw list and
    /// submits it.
    pub fn render(&mut self) {
        let snapshot: CameraSnapshot = self
            .camera_state
            .snapshot(&self.render_manager.camera_projection);
        if let Err(err) = self.camera_state.upload(&snapshot) {
            error!("Failed to upload camera uniform: {}", err);
            return;
        }

        let draw_list = self.terrain_state.frame(&snapshot, self.flags.culling);
        self.render_manager.render(&draw_list, self.flags.wireframe);
    }

    /// Applies this frame's actions to the camera and the engine toggles.
    ///
    /// # Arguments
    ///
    /// * `wait_duration` - The time elapsed since the last frame
    pub fn process_input(&mut self, wait_duration: web_time::Duration) {
        let actions = std::mem::take(&mut self.player_actions);

        if actions.toggle_culling {
            self.flags.culling = self.flags.culling.toggled();
            info!("Culling strategy: {:?}", self.flags.culling);
        }
        if actions.toggle_wireframe {
            if self.render_manager.supports_wireframe() {
                self.flags.wireframe = !self.flags.wireframe;
                info!("Wireframe: {}", self.flags.wireframe);
            } else {
                warn!("Wireframe requires POLYGON_MODE_LINE, which this device lacks");
            }
        }
        if actions.toggle_constrain_camera {
            self.flags.constrain_camera = !self.flags.constrain_camera;
            info!("Camera constrained to terrain: {}", self.flags.constrain_camera);
        }
        if actions.regenerate_terrain {
            self.regenerate_terrain();
        }

        self.camera_state.intake_actions(&actions);
        let moved = self.camera_state.update(wait_duration);
        let terrain_changed = actions.toggle_constrain_camera || actions.regenerate_terrain;
        if self.flags.constrain_camera && (moved || terrain_changed) {
            let position = self.terrain_state.height_map().constrain_camera_position(
                self.camera_state.camera.position,
                self.terrain_state.config().camera.height_above_terrain,
            );
            self.camera_state.set_position(position);
        }
    }

    /// Builds a new terrain and swaps it in, GPU buffers included.
    fn regenerate_terrain(&mut self) {
        let terrain = match self.terrain_state.regenerate() {
            Ok(terrain) => terrain,
            Err(err) => {
                error!("Terrain regeneration failed, keeping the current terrain: {}", err);
                return;
            }
        };

        let mut buffers = self.buffer_state.get_mut();
        terrain_renderer::upload_terrain(&mut buffers, &terrain);
        if let Err(err) =
            terrain_renderer::upload_terrain_uniform(&mut buffers, self.terrain_state.uniform())
        {
            error!("Failed to update terrain uniform: {}", err);
        }
    }

    /// Sets the input commands for the engine state.
    pub fn set_input_commands(&mut self, input: ProcessedInputState) {
        self.player_actions = PlayerAction::from_input(&input);
    }
}

/// Player actions derived from one frame of input
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayerAction {
    /// Movement actions - true if key is pressed or held
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub move_up: bool,
    pub move_down: bool,

    /// View rotation - Some while the left button is down and the mouse moved
    pub rotate_view: Option<(f64, f64)>,

    /// Actions that only trigger on key press, not hold
    pub toggle_culling: bool,
    pub toggle_wireframe: bool,
    pub regenerate_terrain: bool,
    pub toggle_constrain_camera: bool,
}

impl PlayerAction {
    /// Translates the processed input state into player actions.
    pub fn from_input(input: &ProcessedInputState) -> Self {
        let mut player_action = PlayerAction {
            move_forward: input.get_key_state(KeyCode::KeyW).is_active(),
            move_backward: input.get_key_state(KeyCode::KeyS).is_active(),
            move_left: input.get_key_state(KeyCode::KeyA).is_active(),
            move_right: input.get_key_state(KeyCode::KeyD).is_active(),
            move_up: input.get_key_state(KeyCode::Space).is_active(),
            move_down: input.get_key_state(KeyCode::ShiftLeft).is_active(),
            toggle_culling: input.get_key_state(KeyCode::KeyC).is_just_pressed(),
            toggle_wireframe: input.get_key_state(KeyCode::KeyV).is_just_pressed(),
            regenerate_terrain: input.get_key_state(KeyCode::KeyR).is_just_pressed(),
            toggle_constrain_camera: input.get_key_state(KeyCode::KeyT).is_just_pressed(),
            ..Default::default()
        };

        if input.get_mouse_button_state(MouseButton::Left).is_active() {
            player_action.rotate_view = input.get_mouse_delta();
        }

        player_action
    }
}

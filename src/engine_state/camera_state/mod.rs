//! # Camera State Management
//!
//! Owns the fly camera, its controller and the camera uniform buffer. Each frame
//! the engine hands the terrain core a [`CameraSnapshot`]; the core never touches
//! the camera itself.

use cgmath::{Deg, Matrix4, Point3};

use camera::{Camera, CameraController, CameraUniform, Projection};

use crate::{
    config::CameraConfig,
    core::StSystem,
    error::RenderResult,
};

use super::{
    buffer_state::{BufferState, CAMERA_BUFFER},
    PlayerAction,
};

pub mod camera;

/// The camera inputs of one frame of terrain work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSnapshot {
    pub position: Point3<f32>,
    pub view_proj: Matrix4<f32>,
}

impl CameraSnapshot {
    pub fn new(camera: &Camera, projection: &Projection) -> Self {
        Self {
            position: camera.position,
            view_proj: projection.calc_matrix() * camera.calc_matrix(),
        }
    }
}

/// Manages the camera, its controls and its GPU uniform.
pub struct CameraState {
    /// The current camera position and orientation
    pub camera: Camera,
    /// GPU-optimized camera data for shaders
    pub camera_uniform: CameraUniform,
    /// Handles player input and camera movement
    pub camera_controller: CameraController,
    /// Manages GPU buffer state for camera data
    pub buffer_state: StSystem<BufferState>,
}

impl CameraState {
    /// Creates the camera from `config` and uploads its uniform.
    ///
    /// # Arguments
    /// * `buffer_state` - The buffer registry that receives [`CAMERA_BUFFER`]
    /// * `projection` - The initial camera projection settings
    /// * `config` - Start position, orientation and control speeds
    pub fn new(
        buffer_state: StSystem<BufferState>,
        projection: &Projection,
        config: &CameraConfig,
    ) -> Self {
        let camera = Camera::new(
            config.position,
            Deg(config.yaw_degrees),
            Deg(config.pitch_degrees),
        );
        let camera_controller = CameraController::new(config.speed, config.sensitivity);

        let snapshot = CameraSnapshot::new(&camera, projection);
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj_and_pos(snapshot.view_proj, snapshot.position);

        buffer_state.get_mut().create_buffer_init(
            CAMERA_BUFFER,
            wgpu::util::BufferInitDescriptor {
                label: Some(CAMERA_BUFFER),
                contents: bytemuck::cast_slice(&[camera_uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
        );

        CameraState {
            camera,
            camera_uniform,
            camera_controller,
            buffer_state,
        }
    }

    /// Processes player input actions and updates the camera controller state.
    pub fn intake_actions(&mut self, actions: &PlayerAction) {
        self.camera_controller.intake_actions(actions);
    }

    /// Applies pending input to the camera.
    ///
    /// # Returns
    /// `true` if the camera moved or turned
    pub fn update(&mut self, dt: web_time::Duration) -> bool {
        if !self.camera_controller.has_updates() {
            return false;
        }
        self.camera
            .get_controller_updates_and_reset_controller(&mut self.camera_controller, dt);
        true
    }

    /// Moves the camera without touching its orientation.
    pub fn set_position(&mut self, position: Point3<f32>) {
        self.camera.position = position;
    }

    pub fn snapshot(&self, projection: &Projection) -> CameraSnapshot {
        CameraSnapshot::new(&self.camera, projection)
    }

    /// Writes the camera uniform for this frame's snapshot.
    pub fn upload(&mut self, snapshot: &CameraSnapshot) -> RenderResult<()> {
        self.camera_uniform
            .update_view_proj_and_pos(snapshot.view_proj, snapshot.position);
        self.buffer_state.get_mut().write_buffer(
            CAMERA_BUFFER,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        )
    }
}

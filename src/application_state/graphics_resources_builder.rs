//! # Graphics Resources Builder
//!
//! Creates the window, surface, adapter and device, then hands them to the
//! event loop as a user event.
//!
//! - `Graphics`: the initialized GPU context
//! - `GraphicsBuilder`: one-shot initialization on `resumed`
//! - `MaybeGraphics`: the states of that initialization

use std::sync::Arc;

use log::{info, warn};
use wgpu::{Device, Features, Queue, Surface, SurfaceConfiguration};
use winit::{
    event_loop::{ActiveEventLoop, EventLoopProxy},
    window::Window,
};

use crate::error::RenderResult;

/// WGSL source of the terrain shader
pub const TERRAIN_SHADER: &str = include_str!("../../assets/shaders/terrain.wgsl");

const WINDOW_TITLE: &str = "Geomipmapped Terrain";

/// Everything the engine needs from the GPU and the window.
pub struct Graphics {
    pub window: Arc<Window>,
    pub surface: Surface<'static>,
    pub surface_config: SurfaceConfiguration,
    pub device: Device,
    pub queue: Queue,
}

/// Creates the window and a configured surface on the best available adapter.
///
/// `POLYGON_MODE_LINE` is requested when the adapter has it, so the wireframe
/// view can be offered.
async fn create_graphics(window: Arc<Window>) -> RenderResult<Graphics> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::empty(),
        backend_options: wgpu::BackendOptions::from_env_or_default(),
    });

    let surface = instance.create_surface(window.clone())?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await?;
    info!("Using adapter {:?}", adapter.get_info().name);

    let mut required_features = Features::empty();
    if adapter.features().contains(Features::POLYGON_MODE_LINE) {
        required_features |= Features::POLYGON_MODE_LINE;
    } else {
        warn!("Adapter lacks POLYGON_MODE_LINE, wireframe view disabled");
    }

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            required_features,
            required_limits: wgpu::Limits::default(),
            label: None,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        })
        .await?;

    let size = window.inner_size();

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = surface_caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .copied()
        .unwrap_or(surface_caps.formats[0]);
    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: surface_caps.present_modes[0],
        alpha_mode: surface_caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    Ok(Graphics {
        window,
        surface,
        surface_config,
        device,
        queue,
    })
}

/// Sends the initialized [`Graphics`] back through the event loop.
pub struct GraphicsBuilder {
    event_loop_proxy: Option<EventLoopProxy<Graphics>>,
}

/// The states of graphics initialization.
pub enum MaybeGraphics {
    /// Waiting for `resumed`
    Builder(GraphicsBuilder),
    /// Initialized but not yet handed to the engine
    Graphics(Graphics),
    /// Handed to the engine
    Moved,
}

impl GraphicsBuilder {
    pub fn new(event_loop_proxy: EventLoopProxy<Graphics>) -> Self {
        Self {
            event_loop_proxy: Some(event_loop_proxy),
        }
    }

    /// Initializes graphics once and sends them to the event loop.
    ///
    /// # Returns
    /// An error if window or GPU setup failed. Later calls do nothing.
    pub fn build_and_send(&mut self, event_loop: &ActiveEventLoop) -> RenderResult<()> {
        let Some(event_loop_proxy) = self.event_loop_proxy.take() else {
            return Ok(());
        };

        let window_attrs = Window::default_attributes().with_title(WINDOW_TITLE);
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gfx = pollster::block_on(create_graphics(window))?;

        if event_loop_proxy.send_event(gfx).is_err() {
            warn!("Event loop closed before graphics were ready");
        }
        Ok(())
    }
}

// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use fluid_cursor::{capture, FluidConfig, FluidSim, GpuContext, MOUSE_ID};
use rand::Rng;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    gpu: GpuContext,
    sim: FluidSim,
    cursor: PhysicalPosition<f64>,
    frame_count: u32,
    fps_timer: Instant,
}

impl App {
    fn new(event_loop: &ActiveEventLoop, config: FluidConfig) -> anyhow::Result<Self> {
        let window_attributes = Window::default_attributes()
            .with_title("Fluid Cursor")
            .with_transparent(true)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let instance = GpuContext::create_instance();
        let surface = instance.create_surface(window.clone())?;
        let gpu = pollster::block_on(GpuContext::new(instance, Some(&surface)))?;

        let caps = surface.get_capabilities(&gpu.adapter);
        // Dye values are already display-referred.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);
        log::info!("Surface: {:?}, alpha {:?}", format, alpha_mode);

        let sim = FluidSim::new(
            &gpu,
            config,
            format,
            (surface_config.width, surface_config.height),
        );

        Ok(Self {
            window,
            surface,
            surface_config,
            gpu,
            sim,
            cursor: PhysicalPosition::new(0.0, 0.0),
            frame_count: 0,
            fps_timer: Instant::now(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.gpu.device, &self.surface_config);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let size = (self.surface_config.width, self.surface_config.height);
        self.sim.frame(&self.gpu, Instant::now(), size, &view);
        output.present();

        self.frame_count += 1;
        let elapsed = self.fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            self.window.set_title(&format!("Fluid Cursor - {:.1} FPS", fps));
            self.frame_count = 0;
            self.fps_timer = Instant::now();
        }
        Ok(())
    }

    fn save_snapshot(&mut self) -> anyhow::Result<PathBuf> {
        let image = self.sim.capture(&self.gpu)?;
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let path = PathBuf::from(format!("fluid_snapshot_{stamp}.png"));
        capture::save_png(&image, &path)?;
        Ok(path)
    }

    fn handle_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        match code {
            KeyCode::Space => {
                let amount = rand::thread_rng().gen_range(5..25);
                self.sim.random_splats(amount);
            }
            KeyCode::KeyP => {
                let paused = self.sim.toggle_pause();
                log::info!("{}", if paused { "Paused" } else { "Resumed" });
            }
            KeyCode::KeyS => {
                if let Err(err) = self.save_snapshot() {
                    log::error!("Snapshot failed: {err:?}");
                }
            }
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }

    fn handle_event(&mut self, event: WindowEvent, event_loop: &ActiveEventLoop) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                self.sim
                    .on_move(MOUSE_ID, position.x as f32, position.y as f32, None);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.sim
                        .on_down(MOUSE_ID, self.cursor.x as f32, self.cursor.y as f32)
                }
                ElementState::Released => self.sim.on_up(MOUSE_ID),
            },
            WindowEvent::Touch(touch) => {
                let id = touch.id as i64;
                let (x, y) = (touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => self.sim.on_down(id, x, y),
                    TouchPhase::Moved => self.sim.on_move(id, x, y, None),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.sim.on_up(id),
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.handle_key(code, event_loop);
                    }
                }
            }
            WindowEvent::RedrawRequested => match self.render() {
                Ok(_) => {}
                Err(wgpu::SurfaceError::Lost) => {
                    let size = self.window.inner_size();
                    self.resize(size.width, size.height);
                }
                Err(wgpu::SurfaceError::Outdated) => {}
                Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                Err(e) => log::warn!("Surface error: {:?}", e),
            },
            _ => {}
        }
    }
}

struct AppState {
    app: Option<App>,
    config: FluidConfig,
    error: Option<anyhow::Error>,
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        match App::new(event_loop, self.config.clone()) {
            Ok(app) => self.app = Some(app),
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(app) = &mut self.app {
            app.handle_event(event, event_loop);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &self.app {
            app.window.request_redraw();
        }
    }
}

fn load_config() -> FluidConfig {
    let path = FluidConfig::default_path();
    match FluidConfig::load_from_disk(&path) {
        Ok(config) => {
            log::info!("Loaded settings from {:?}", path);
            config
        }
        Err(err) => {
            log::warn!("Failed to load settings from {:?}: {err:?}", path);
            let config = FluidConfig::default();
            if let Err(err) = config.save_to_disk(&path) {
                log::warn!("Failed to write default settings to {:?}: {err:?}", path);
            }
            config
        }
    }
}

fn main() -> anyhow::Result<()> {
    use env_logger::Env;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut state = AppState {
        app: None,
        config: load_config(),
        error: None,
    };
    event_loop.run_app(&mut state)?;

    match state.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

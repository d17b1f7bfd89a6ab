// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! The engine handle and its per-frame cadence.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::capabilities::Capabilities;
use crate::capture;
use crate::color::{generate_color, Rgb};
use crate::config::FluidConfig;
use crate::context::GpuContext;
use crate::display::{DisplayKeyword, DisplayMaterial, KeywordSet};
use crate::fields::{resolution, SimulationFields};
use crate::pointer::{aspect_ratio, PointerTracker};
use crate::program::ProgramSet;
use crate::scheduler::FrameClock;
use crate::splat::{self, Splat};
use crate::step;

/// One independent fluid simulation bound to a device.
pub struct FluidSim {
    caps: Capabilities,
    config: FluidConfig,
    programs: ProgramSet,
    display: DisplayMaterial,
    fields: SimulationFields,
    pointers: PointerTracker,
    pending: Vec<Splat>,
    clock: FrameClock,
    rng: StdRng,
    output_format: wgpu::TextureFormat,
    surface_size: (u32, u32),
}

impl FluidSim {
    /// Resolves capabilities, compiles programs and allocates fields for a
    /// `surface_size` surface presented in `output_format`.
    pub fn new(
        gpu: &GpuContext,
        mut config: FluidConfig,
        output_format: wgpu::TextureFormat,
        surface_size: (u32, u32),
    ) -> Self {
        let caps = Capabilities::resolve(&gpu.adapter, config.precision.texel_type());
        config.sanitize();
        config.apply_capabilities(&caps);

        let programs = ProgramSet::new(gpu, &caps);
        let mut display = DisplayMaterial::new(gpu, &caps, output_format, programs.samplers().clone());
        display.set_keywords(gpu, keywords_for(&config));

        let (w, h) = surface_size;
        let fields = SimulationFields::new(
            gpu,
            &caps,
            resolution(config.sim_resolution, w, h),
            resolution(config.dye_resolution, w, h),
        );

        log::info!(
            "Fluid simulation ready: sim {:?}, dye {:?}",
            fields.sim_size(),
            fields.dye_size()
        );

        Self {
            caps,
            config,
            programs,
            display,
            fields,
            pointers: PointerTracker::new(),
            pending: Vec::new(),
            clock: FrameClock::new(Instant::now()),
            rng: StdRng::from_entropy(),
            output_format,
            surface_size,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn fields(&self) -> &SimulationFields {
        &self.fields
    }

    pub fn pointers(&self) -> &PointerTracker {
        &self.pointers
    }

    pub fn display(&self) -> &DisplayMaterial {
        &self.display
    }

    /// Contact start at pixel `(x, y)`. Queues a click splat.
    pub fn on_down(&mut self, id: i64, x: f32, y: f32) {
        let (w, h) = self.surface_size;
        let color = generate_color(&mut self.rng);
        let pointer = self.pointers.get_or_create(id);
        pointer.on_down(x, y, w, h, color);
        let click = Splat::click(&mut self.rng, pointer.texcoord_x, pointer.texcoord_y);
        self.pending.push(click);
    }

    /// Pointer motion. `None` keeps the pointer's current color.
    pub fn on_move(&mut self, id: i64, x: f32, y: f32, color: Option<Rgb>) {
        let (w, h) = self.surface_size;
        let pointer = self.pointers.get_or_create(id);
        let color = color.unwrap_or(pointer.color);
        pointer.on_move(x, y, w, h, color);
    }

    pub fn on_up(&mut self, id: i64) {
        self.pointers.get_or_create(id).on_up();
    }

    /// Queues `amount` random bursts for the next frame.
    pub fn random_splats(&mut self, amount: usize) {
        for _ in 0..amount {
            let burst = Splat::random(&mut self.rng);
            self.pending.push(burst);
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.config.paused = !self.config.paused;
        self.config.paused
    }

    pub fn set_shading(&mut self, gpu: &GpuContext, shading: bool) {
        self.config.shading = shading && self.caps.linear_filtering;
        self.display.set_keywords(gpu, keywords_for(&self.config));
    }

    /// Reallocates fields when the surface changed size. Returns true if it did.
    pub fn resize_if_needed(&mut self, gpu: &GpuContext, surface_size: (u32, u32)) -> bool {
        if surface_size == self.surface_size {
            return false;
        }
        self.surface_size = surface_size;

        let (w, h) = surface_size;
        let sim = resolution(self.config.sim_resolution, w, h);
        let dye = resolution(self.config.dye_resolution, w, h);

        self.fields.resize(gpu, &self.caps, &self.programs, sim, dye);
        true
    }

    /// One frame: resize check, color cycling, inputs, step, composite into `view`.
    pub fn frame(&mut self, gpu: &GpuContext, now: Instant, surface_size: (u32, u32), view: &wgpu::TextureView) {
        let dt = self.clock.delta_time(now);
        self.resize_if_needed(gpu, surface_size);
        self.update_colors(dt);
        self.apply_inputs(gpu);
        if !self.config.paused {
            self.advance(gpu, dt);
        }
        self.render(gpu, view);
    }

    fn update_colors(&mut self, dt: f32) {
        if self.clock.advance_color_timer(dt, self.config.color_update_speed) {
            for pointer in self.pointers.iter_mut() {
                pointer.color = generate_color(&mut self.rng);
            }
        }
    }

    /// Applies queued splats, then one drag splat per moved pointer.
    pub fn apply_inputs(&mut self, gpu: &GpuContext) {
        let aspect = aspect_ratio(self.surface_size.0, self.surface_size.1);
        let radius = self.config.splat_radius;

        for pending in self.pending.drain(..) {
            splat::apply(gpu, &mut self.fields, &self.programs, &pending, radius, aspect);
        }

        let force = self.config.splat_force;
        for pointer in self.pointers.iter_mut() {
            if !pointer.moved {
                continue;
            }
            pointer.moved = false;
            let drag = Splat {
                x: pointer.texcoord_x,
                y: pointer.texcoord_y,
                dx: pointer.delta_x * force,
                dy: pointer.delta_y * force,
                color: pointer.color,
            };
            splat::apply(gpu, &mut self.fields, &self.programs, &drag, radius, aspect);
        }
    }

    /// Applies one splat immediately.
    pub fn splat(&mut self, gpu: &GpuContext, splat: &Splat) {
        let aspect = aspect_ratio(self.surface_size.0, self.surface_size.1);
        splat::apply(gpu, &mut self.fields, &self.programs, splat, self.config.splat_radius, aspect);
    }

    pub fn advance(&mut self, gpu: &GpuContext, dt: f32) {
        step::step(gpu, &mut self.fields, &self.programs, &self.config, dt);
    }

    pub fn render(&mut self, gpu: &GpuContext, view: &wgpu::TextureView) {
        let (w, h) = self.surface_size;
        self.display
            .draw(gpu, self.fields.dye.read(), view, self.output_format, w, h);
    }

    /// Renders the current dye at the configured capture resolution.
    pub fn capture(&mut self, gpu: &GpuContext) -> anyhow::Result<image::RgbaImage> {
        let (w, h) = resolution(self.config.capture_resolution, self.surface_size.0, self.surface_size.1);
        capture::capture(gpu, &mut self.display, self.fields.dye.read(), w, h)
    }
}

fn keywords_for(config: &FluidConfig) -> KeywordSet {
    let mut keywords = Vec::new();
    if config.shading {
        keywords.push(DisplayKeyword::Shading);
    }
    KeywordSet::from_keywords(keywords)
}

// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Simulation state: the five fields and their resize policy.

use crate::capabilities::Capabilities;
use crate::context::GpuContext;
use crate::program::ProgramSet;
use crate::target::{DoubleBuffered, RenderTarget, TargetSpec};

/// Grid size for a configured longer edge on a `surface_width` x
/// `surface_height` surface. Aspect ratio is preserved and the longer edge
/// never exceeds the surface's own longer edge.
pub fn resolution(longer_edge: u32, surface_width: u32, surface_height: u32) -> (u32, u32) {
    let surface_width = surface_width.max(1);
    let surface_height = surface_height.max(1);
    let surface_long = surface_width.max(surface_height);
    let long = longer_edge.clamp(1, surface_long);

    let aspect = surface_long as f32 / surface_width.min(surface_height) as f32;
    let short = ((long as f32 / aspect).round() as u32).max(1);

    if surface_width >= surface_height {
        (long, short)
    } else {
        (short, long)
    }
}

/// GPU-resident state advanced by [`crate::step::step`].
pub struct SimulationFields {
    pub velocity: DoubleBuffered<RenderTarget>,
    pub dye: DoubleBuffered<RenderTarget>,
    pub divergence: RenderTarget,
    pub curl: RenderTarget,
    pub pressure: DoubleBuffered<RenderTarget>,
}

fn velocity_spec(caps: &Capabilities) -> TargetSpec {
    TargetSpec {
        format: caps.rg,
        filter: caps.smooth_filter(),
    }
}

fn dye_spec(caps: &Capabilities) -> TargetSpec {
    TargetSpec {
        format: caps.rgba,
        filter: caps.smooth_filter(),
    }
}

fn scalar_spec(caps: &Capabilities) -> TargetSpec {
    TargetSpec {
        format: caps.r,
        filter: wgpu::FilterMode::Nearest,
    }
}

fn double(gpu: &GpuContext, label: &str, (w, h): (u32, u32), spec: TargetSpec) -> DoubleBuffered<RenderTarget> {
    DoubleBuffered::new(
        RenderTarget::new(gpu, label, w, h, spec),
        RenderTarget::new(gpu, label, w, h, spec),
    )
}

impl SimulationFields {
    /// Allocates every field at zero. `sim` and `dye` are grid sizes from [`resolution`].
    pub fn new(gpu: &GpuContext, caps: &Capabilities, sim: (u32, u32), dye: (u32, u32)) -> Self {
        log::debug!("Allocating fields: sim {}x{}, dye {}x{}", sim.0, sim.1, dye.0, dye.1);
        Self {
            velocity: double(gpu, "Velocity", sim, velocity_spec(caps)),
            dye: double(gpu, "Dye", dye, dye_spec(caps)),
            divergence: RenderTarget::new(gpu, "Divergence", sim.0, sim.1, scalar_spec(caps)),
            curl: RenderTarget::new(gpu, "Curl", sim.0, sim.1, scalar_spec(caps)),
            pressure: double(gpu, "Pressure", sim, scalar_spec(caps)),
        }
    }

    pub fn sim_size(&self) -> (u32, u32) {
        (self.velocity.width(), self.velocity.height())
    }

    pub fn dye_size(&self) -> (u32, u32) {
        (self.dye.width(), self.dye.height())
    }

    /// Follows a surface resize. Velocity and dye are resampled through the
    /// copy program when their grid size changed; divergence, curl and
    /// pressure always restart at zero.
    pub fn resize(
        &mut self,
        gpu: &GpuContext,
        caps: &Capabilities,
        programs: &ProgramSet,
        sim: (u32, u32),
        dye: (u32, u32),
    ) {
        log::debug!(
            "Resizing fields: sim {:?} -> {:?}, dye {:?} -> {:?}",
            self.sim_size(),
            sim,
            self.dye_size(),
            dye
        );

        let copy = |src: &RenderTarget, dst: &mut RenderTarget| programs.copy_into(gpu, src, dst);

        let velocity_spec = velocity_spec(caps);
        self.velocity.resize(
            sim.0,
            sim.1,
            |w, h| RenderTarget::new(gpu, "Velocity", w, h, velocity_spec),
            copy,
        );
        let dye_spec = dye_spec(caps);
        self.dye.resize(
            dye.0,
            dye.1,
            |w, h| RenderTarget::new(gpu, "Dye", w, h, dye_spec),
            copy,
        );

        self.reset_transient(gpu, caps);
    }

    /// Recreates divergence, curl and pressure at zero, sized to velocity.
    /// The pressure warm start is lost.
    pub fn reset_transient(&mut self, gpu: &GpuContext, caps: &Capabilities) {
        let (w, h) = self.sim_size();
        let scalar = scalar_spec(caps);
        self.divergence = RenderTarget::new(gpu, "Divergence", w, h, scalar);
        self.curl = RenderTarget::new(gpu, "Curl", w, h, scalar);
        self.pressure = double(gpu, "Pressure", (w, h), scalar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_surface_keeps_aspect() {
        let sim = resolution(128, 1024, 768);
        let dye = resolution(512, 1024, 768);
        assert_eq!(sim, (128, 96));
        assert_eq!(dye, (512, 384));
        assert!((dye.0 as f32 / dye.1 as f32 - 1.333).abs() < 0.01);
        assert!(dye.0 <= 1024 && dye.1 <= 768);
    }

    #[test]
    fn portrait_surface_puts_long_edge_vertical() {
        assert_eq!(resolution(128, 600, 1200), (64, 128));
    }

    #[test]
    fn longer_edge_is_clamped_to_surface() {
        assert_eq!(resolution(1440, 800, 600), (800, 600));
        assert_eq!(resolution(1440, 300, 300), (300, 300));
    }

    #[test]
    fn degenerate_surface_yields_one_texel() {
        assert_eq!(resolution(128, 0, 0), (1, 1));
        let (w, h) = resolution(128, 4000, 1);
        assert_eq!(w, 128);
        assert_eq!(h, 1);
    }
}

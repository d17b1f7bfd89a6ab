// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capabilities::{Capabilities, TexelType};

pub const SETTINGS_FILE_NAME: &str = "fluid_settings.json";

/// Dye resolution used when the device cannot filter float textures.
pub const DEGRADED_DYE_RESOLUTION: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    Half,
    Full,
}

impl Precision {
    pub fn texel_type(self) -> TexelType {
        match self {
            Precision::Half => TexelType::Half,
            Precision::Full => TexelType::Full,
        }
    }
}

/// Flat parameter object read by every part of the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FluidConfig {
    /// Longer edge of the velocity/pressure grid.
    pub sim_resolution: u32,
    /// Longer edge of the dye grid, clamped to the surface.
    pub dye_resolution: u32,
    /// Longer edge of snapshot images.
    pub capture_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    /// Multiplier applied to pressure at the start of every step.
    pub pressure: f32,
    pub pressure_iterations: u32,
    /// Vorticity confinement strength.
    pub curl: f32,
    pub shading: bool,
    pub splat_radius: f32,
    pub splat_force: f32,
    pub color_update_speed: f32,
    pub precision: Precision,
    pub paused: bool,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1440,
            capture_resolution: 512,
            density_dissipation: 3.5,
            velocity_dissipation: 2.0,
            pressure: 0.1,
            pressure_iterations: 20,
            curl: 3.0,
            shading: true,
            splat_radius: 0.2,
            splat_force: 6000.0,
            color_update_speed: 10.0,
            precision: Precision::Half,
            paused: false,
        }
    }
}

impl FluidConfig {
    pub fn default_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(SETTINGS_FILE_NAME)
    }

    pub fn load_from_disk(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&data)?;
        config.sanitize();
        Ok(config)
    }

    pub fn save_to_disk(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn sanitize(&mut self) {
        self.sim_resolution = self.sim_resolution.clamp(8, 1024);
        self.dye_resolution = self.dye_resolution.clamp(8, 4096);
        self.capture_resolution = self.capture_resolution.clamp(8, 4096);
        self.density_dissipation = self.density_dissipation.clamp(0.0, 10.0);
        self.velocity_dissipation = self.velocity_dissipation.clamp(0.0, 10.0);
        self.pressure = self.pressure.clamp(0.0, 1.0);
        self.pressure_iterations = self.pressure_iterations.clamp(1, 200);
        self.curl = self.curl.clamp(0.0, 100.0);
        // shading requires no sanitizing
        self.splat_radius = self.splat_radius.clamp(0.01, 1.0);
        self.splat_force = self.splat_force.clamp(0.0, 50_000.0);
        self.color_update_speed = self.color_update_speed.clamp(0.0, 100.0);
    }

    /// Applies the reduced-quality fallback when smooth sampling is missing.
    pub fn apply_capabilities(&mut self, caps: &Capabilities) {
        if !caps.linear_filtering {
            self.dye_resolution = DEGRADED_DYE_RESOLUTION;
            self.shading = false;
        }
    }
}

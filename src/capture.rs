// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Off-screen snapshots of the composited dye.

use std::path::Path;

use anyhow::Context as _;

use crate::context::GpuContext;
use crate::display::DisplayMaterial;
use crate::target::{self, RenderTarget};

pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Runs the display program into a `width` x `height` RGBA8 texture and reads it back.
pub fn capture(
    gpu: &GpuContext,
    display: &mut DisplayMaterial,
    dye: &RenderTarget,
    width: u32,
    height: u32,
) -> anyhow::Result<image::RgbaImage> {
    let width = width.max(1);
    let height = height.max(1);

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Capture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CAPTURE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    display.draw(gpu, dye, &view, CAPTURE_FORMAT, width, height);

    let bytes = target::read_texture_bytes(gpu, &texture, width, height, 4)?;
    image::RgbaImage::from_raw(width, height, bytes).context("capture buffer has the wrong size")
}

pub fn save_png(image: &image::RgbaImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
    log::info!("Saved snapshot to {}", path.display());
    Ok(())
}

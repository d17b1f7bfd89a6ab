// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Render targets and the read/write double buffer.

use anyhow::Context as _;

use crate::capabilities::{TargetFormat, TexelType};
use crate::context::GpuContext;

/// Anything that stores a field at a fixed resolution.
pub trait FieldTarget {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width() as f32, 1.0 / self.height() as f32]
    }
}

/// Storage and sampling mode of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub format: TargetFormat,
    pub filter: wgpu::FilterMode,
}

/// Clamp-to-edge samplers, one per filter mode.
pub struct Samplers {
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
}

impl Samplers {
    pub fn new(device: &wgpu::Device) -> Self {
        let make = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        Self {
            linear: make("Field Sampler (linear)", wgpu::FilterMode::Linear),
            nearest: make("Field Sampler (nearest)", wgpu::FilterMode::Nearest),
        }
    }

    pub fn get(&self, filter: wgpu::FilterMode) -> &wgpu::Sampler {
        match filter {
            wgpu::FilterMode::Linear => &self.linear,
            wgpu::FilterMode::Nearest => &self.nearest,
        }
    }
}

/// A single GPU texture holding one field.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    spec: TargetSpec,
}

impl FieldTarget for RenderTarget {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl RenderTarget {
    /// Allocates zero-initialised storage. `spec.filter` is used as given.
    pub fn new(gpu: &GpuContext, label: &str, width: u32, height: u32, spec: TargetSpec) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.format.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            spec,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn spec(&self) -> TargetSpec {
        self.spec
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.spec.format.format
    }

    /// Bind group entries exposing this target as sampling unit `unit`.
    /// Unit `n` occupies bindings `1 + 2n` (texture) and `2 + 2n` (sampler).
    pub fn attach<'a>(&'a self, unit: u32, samplers: &'a Samplers) -> [wgpu::BindGroupEntry<'a>; 2] {
        [
            wgpu::BindGroupEntry {
                binding: 1 + unit * 2,
                resource: wgpu::BindingResource::TextureView(&self.view),
            },
            wgpu::BindGroupEntry {
                binding: 2 + unit * 2,
                resource: wgpu::BindingResource::Sampler(samplers.get(self.spec.filter)),
            },
        ]
    }

    /// Reads the texture back as `width * height * channels` floats, rows top to bottom.
    pub fn read_pixels(&self, gpu: &GpuContext) -> anyhow::Result<Vec<f32>> {
        let format = self.spec.format;
        let bytes = read_texture_bytes(gpu, &self.texture, self.width, self.height, format.bytes_per_texel())?;
        Ok(decode_texels(&bytes, format.texel_type))
    }

    /// Overwrites the whole texture. Intended for tooling and tests; the
    /// simulation itself only changes targets by drawing into them.
    pub fn write_pixels(&self, gpu: &GpuContext, data: &[f32]) -> anyhow::Result<()> {
        let format = self.spec.format;
        let expected = (self.width * self.height * format.channels.count()) as usize;
        if data.len() != expected {
            anyhow::bail!(
                "field upload expects {} values for {}x{}x{}, got {}",
                expected,
                self.width,
                self.height,
                format.channels.count(),
                data.len()
            );
        }

        let bytes = encode_texels(data, format.texel_type);
        gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * format.bytes_per_texel()),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::empty());
        Ok(())
    }
}

/// Copies a texture into a mappable buffer and returns tightly packed rows.
pub(crate) fn read_texture_bytes(
    gpu: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    bytes_per_texel: u32,
) -> anyhow::Result<Vec<u8>> {
    let unpadded_row = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = unpadded_row.div_ceil(align) * align;

    let staging_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Field Readback"),
        size: (padded_row * height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Read"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    gpu.device.poll(wgpu::Maintain::Wait);
    pollster::block_on(receiver.receive()).context("readback map callback never ran")??;

    let data = buffer_slice.get_mapped_range();
    let mut packed = Vec::with_capacity((unpadded_row * height) as usize);
    for row in data.chunks_exact(padded_row as usize) {
        packed.extend_from_slice(&row[..unpadded_row as usize]);
    }
    drop(data);
    staging_buffer.unmap();

    Ok(packed)
}

fn decode_texels(bytes: &[u8], texel_type: TexelType) -> Vec<f32> {
    match texel_type {
        TexelType::Half => bytes
            .chunks_exact(2)
            .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect(),
        TexelType::Full => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

fn encode_texels(values: &[f32], texel_type: TexelType) -> Vec<u8> {
    match texel_type {
        TexelType::Half => values
            .iter()
            .flat_map(|&v| half::f16::from_f32(v).to_bits().to_le_bytes())
            .collect(),
        TexelType::Full => values.iter().flat_map(|&v| v.to_le_bytes()).collect(),
    }
}

/// Two same-sized targets with a movable read/write role.
///
/// Passes sample `read()`, draw into `write()` and then call `swap()`.
#[derive(Debug, Clone)]
pub struct DoubleBuffered<T> {
    targets: [T; 2],
    read_index: usize,
}

impl<T: FieldTarget> DoubleBuffered<T> {
    pub fn new(first: T, second: T) -> Self {
        debug_assert_eq!(first.width(), second.width());
        debug_assert_eq!(first.height(), second.height());
        Self {
            targets: [first, second],
            read_index: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.targets[self.read_index]
    }

    pub fn write(&self) -> &T {
        &self.targets[1 - self.read_index]
    }

    pub fn read_mut(&mut self) -> &mut T {
        &mut self.targets[self.read_index]
    }

    /// Read side shared, write side exclusive.
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [first, second] = &mut self.targets;
        if self.read_index == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        }
    }

    pub fn swap(&mut self) {
        self.read_index = 1 - self.read_index;
    }

    pub fn width(&self) -> u32 {
        self.read().width()
    }

    pub fn height(&self) -> u32 {
        self.read().height()
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read().texel_size()
    }

    /// Leaves both targets untouched when the size is unchanged. Otherwise the
    /// read side is resampled into a fresh target through `copy` and the write
    /// side is replaced by a fresh allocation.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        mut create: impl FnMut(u32, u32) -> T,
        copy: impl FnOnce(&T, &mut T),
    ) {
        if self.width() == width && self.height() == height {
            return;
        }

        let mut new_read = create(width, height);
        copy(self.read(), &mut new_read);
        let new_write = create(width, height);

        self.targets = [new_read, new_write];
        self.read_index = 0;
    }
}

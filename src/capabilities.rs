// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Texture format negotiation.
//!
//! Every fallback decision is an ordered candidate list: the first candidate
//! the adapter accepts wins, and the last candidate of each list is taken
//! unconditionally so resolution never fails.

use serde::{Deserialize, Serialize};

/// Numeric type stored in each field channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexelType {
    /// 16-bit float. Renderable and filterable on every WebGPU adapter.
    Half,
    /// 32-bit float. Filterable only with `FLOAT32_FILTERABLE`.
    Full,
}

impl TexelType {
    pub fn bytes_per_channel(self) -> u32 {
        match self {
            TexelType::Half => 2,
            TexelType::Full => 4,
        }
    }

    pub fn format(self, channels: Channels) -> wgpu::TextureFormat {
        use wgpu::TextureFormat as F;
        match (self, channels) {
            (TexelType::Half, Channels::R) => F::R16Float,
            (TexelType::Half, Channels::Rg) => F::Rg16Float,
            (TexelType::Half, Channels::Rgba) => F::Rgba16Float,
            (TexelType::Full, Channels::R) => F::R32Float,
            (TexelType::Full, Channels::Rg) => F::Rg32Float,
            (TexelType::Full, Channels::Rgba) => F::Rgba32Float,
        }
    }

    /// Texel types tried in order when `self` is the preferred one.
    pub fn candidates(self) -> &'static [TexelType] {
        match self {
            TexelType::Full => &[TexelType::Full, TexelType::Half],
            TexelType::Half => &[TexelType::Half],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
    R,
    Rg,
    Rgba,
}

impl Channels {
    pub fn count(self) -> u32 {
        match self {
            Channels::R => 1,
            Channels::Rg => 2,
            Channels::Rgba => 4,
        }
    }

    /// Storage layouts tried in order for a field that needs `self` channels.
    /// Each step widens the layout; four channels is assumed always renderable.
    pub fn candidates(self) -> &'static [Channels] {
        match self {
            Channels::R => &[Channels::R, Channels::Rg, Channels::Rgba],
            Channels::Rg => &[Channels::Rg, Channels::Rgba],
            Channels::Rgba => &[Channels::Rgba],
        }
    }
}

/// Concrete storage chosen for one kind of field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetFormat {
    pub format: wgpu::TextureFormat,
    pub texel_type: TexelType,
    /// Channels actually stored, which may exceed the channels requested.
    pub channels: Channels,
}

impl TargetFormat {
    pub fn new(texel_type: TexelType, channels: Channels) -> Self {
        Self {
            format: texel_type.format(channels),
            texel_type,
            channels,
        }
    }

    pub fn bytes_per_texel(&self) -> u32 {
        self.channels.count() * self.texel_type.bytes_per_channel()
    }
}

/// What the device can do, queried once.
pub trait FormatProbe {
    fn is_renderable(&self, format: wgpu::TextureFormat) -> bool;
    fn is_filterable(&self, format: wgpu::TextureFormat) -> bool;
}

impl FormatProbe for wgpu::Adapter {
    fn is_renderable(&self, format: wgpu::TextureFormat) -> bool {
        let features = self.get_texture_format_features(format);
        features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
    }

    fn is_filterable(&self, format: wgpu::TextureFormat) -> bool {
        use wgpu::TextureFormat as F;
        match format {
            F::R32Float | F::Rg32Float | F::Rgba32Float => {
                self.features().contains(wgpu::Features::FLOAT32_FILTERABLE)
            }
            _ => self
                .get_texture_format_features(format)
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE),
        }
    }
}

/// Result of walking one candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChoice {
    pub format: TargetFormat,
    /// Number of candidates examined, including the winner.
    pub attempts: usize,
    /// False when the list was exhausted and the last candidate was taken on trust.
    pub verified: bool,
}

/// Walks the widening chain for `channels` and returns the first renderable format.
pub fn resolve_format<P: FormatProbe + ?Sized>(
    probe: &P,
    texel_type: TexelType,
    channels: Channels,
) -> FormatChoice {
    let candidates = channels.candidates();
    for (index, &candidate) in candidates.iter().enumerate() {
        let format = TargetFormat::new(texel_type, candidate);
        if probe.is_renderable(format.format) {
            return FormatChoice {
                format,
                attempts: index + 1,
                verified: true,
            };
        }
    }

    FormatChoice {
        format: TargetFormat::new(texel_type, Channels::Rgba),
        attempts: candidates.len(),
        verified: false,
    }
}

/// Immutable capability descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub texel_type: TexelType,
    pub rgba: TargetFormat,
    pub rg: TargetFormat,
    pub r: TargetFormat,
    /// Whether bilinear sampling of `texel_type` textures is available.
    pub linear_filtering: bool,
}

impl Capabilities {
    pub fn resolve<P: FormatProbe + ?Sized>(probe: &P, preferred: TexelType) -> Self {
        let candidates = preferred.candidates();
        let texel_type = candidates
            .iter()
            .copied()
            .find(|t| probe.is_renderable(t.format(Channels::Rgba)))
            .unwrap_or(TexelType::Half);

        let rgba = resolve_format(probe, texel_type, Channels::Rgba);
        let rg = resolve_format(probe, texel_type, Channels::Rg);
        let r = resolve_format(probe, texel_type, Channels::R);

        let linear_filtering = [rgba, rg, r]
            .iter()
            .all(|choice| probe.is_filterable(choice.format.format));

        let caps = Self {
            texel_type,
            rgba: rgba.format,
            rg: rg.format,
            r: r.format,
            linear_filtering,
        };

        log::info!(
            "Capabilities: {:?} texels, rgba={:?} rg={:?} r={:?}, linear filtering {}",
            caps.texel_type,
            caps.rgba.format,
            caps.rg.format,
            caps.r.format,
            if linear_filtering { "on" } else { "off" }
        );
        if !linear_filtering {
            log::warn!("Linear filtering of {:?} textures unsupported; using manual filtering", texel_type);
        }

        caps
    }

    /// Distinct render formats used by the simulation fields.
    pub fn field_formats(&self) -> Vec<wgpu::TextureFormat> {
        let mut formats = Vec::with_capacity(3);
        for format in [self.rgba.format, self.rg.format, self.r.format] {
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        formats
    }

    /// Filter mode for fields that want smooth sampling.
    pub fn smooth_filter(&self) -> wgpu::FilterMode {
        if self.linear_filtering {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        }
    }
}

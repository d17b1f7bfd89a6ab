// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Display compositor with keyword-specialised pipeline variants.

use std::collections::HashMap;
use std::sync::Arc;

use crate::capabilities::Capabilities;
use crate::context::GpuContext;
use crate::program::{self, ProgramKind, TexelUniforms};
use crate::target::{RenderTarget, Samplers};

/// Optional display features, each an override constant in `display.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayKeyword {
    Shading,
}

impl DisplayKeyword {
    pub const ALL: [DisplayKeyword; 1] = [DisplayKeyword::Shading];

    fn bit(self) -> u32 {
        match self {
            DisplayKeyword::Shading => 1 << 0,
        }
    }

    fn constant_name(self) -> &'static str {
        match self {
            DisplayKeyword::Shading => "SHADING",
        }
    }
}

/// Order-independent set of active keywords, usable as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeywordSet(u32);

impl KeywordSet {
    pub fn from_keywords<I: IntoIterator<Item = DisplayKeyword>>(keywords: I) -> Self {
        Self(keywords.into_iter().fold(0, |bits, k| bits | k.bit()))
    }

    pub fn contains(self, keyword: DisplayKeyword) -> bool {
        self.0 & keyword.bit() != 0
    }

    /// Override constants for every known keyword, enabled or not.
    pub fn constants(self) -> HashMap<String, f64> {
        DisplayKeyword::ALL
            .iter()
            .map(|&k| (k.constant_name().to_string(), if self.contains(k) { 1.0 } else { 0.0 }))
            .collect()
    }
}

struct DisplayVariant {
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

pub struct DisplayMaterial {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    samplers: Arc<Samplers>,
    formats: Vec<wgpu::TextureFormat>,
    variants: HashMap<KeywordSet, DisplayVariant>,
    active: KeywordSet,
}

impl DisplayMaterial {
    /// Prepares the material for `output_format`. No variant exists until
    /// the first `set_keywords`.
    pub fn new(
        gpu: &GpuContext,
        caps: &Capabilities,
        output_format: wgpu::TextureFormat,
        samplers: Arc<Samplers>,
    ) -> Self {
        let kind = ProgramKind::Display;
        let module = program::compile_module(&gpu.device, kind.label(), &kind.source());
        let bind_group_layout = program::create_bind_group_layout(
            &gpu.device,
            kind.label(),
            kind.inputs().len(),
            caps.linear_filtering,
        );
        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Display Uniforms"),
            size: kind.uniform_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            module,
            bind_group_layout,
            uniform_buffer,
            samplers,
            formats: vec![output_format],
            variants: HashMap::new(),
            active: KeywordSet::default(),
        }
    }

    fn compile_pipeline(&self, gpu: &GpuContext, keywords: KeywordSet, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        program::create_pipeline(
            &gpu.device,
            "display",
            &self.module,
            &self.bind_group_layout,
            format,
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            &keywords.constants(),
        )
    }

    /// Activates a keyword set, compiling its variant on first use.
    /// Returns true when a new variant was compiled.
    pub fn set_keywords(&mut self, gpu: &GpuContext, keywords: KeywordSet) -> bool {
        self.active = keywords;
        if self.variants.contains_key(&keywords) {
            return false;
        }

        let pipelines = self
            .formats
            .iter()
            .map(|&format| (format, self.compile_pipeline(gpu, keywords, format)))
            .collect();
        self.variants.insert(keywords, DisplayVariant { pipelines });
        log::debug!("Compiled display variant {:?}", keywords);
        true
    }

    pub fn active_keywords(&self) -> KeywordSet {
        self.active
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Composites `dye` into `view`, clearing it to transparent first.
    pub fn draw(
        &mut self,
        gpu: &GpuContext,
        dye: &RenderTarget,
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) {
        if !self.variants.contains_key(&self.active) {
            self.set_keywords(gpu, self.active);
        }
        if !self.formats.contains(&format) {
            self.formats.push(format);
        }

        let active = self.active;
        let missing = self
            .variants
            .get(&active)
            .is_some_and(|variant| !variant.pipelines.contains_key(&format));
        if missing {
            let pipeline = self.compile_pipeline(gpu, active, format);
            if let Some(variant) = self.variants.get_mut(&active) {
                variant.pipelines.insert(format, pipeline);
            }
        }

        let Some(pipeline) = self.variants.get(&active).and_then(|v| v.pipelines.get(&format)) else {
            log::error!("Display variant {:?} unavailable for {:?}", active, format);
            return;
        };

        let uniforms = TexelUniforms::new([1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32]);
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let bind_group = program::create_bind_group(
            gpu,
            "display",
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.samplers,
            &[dye],
        );
        program::run_pass(
            gpu,
            "display",
            view,
            pipeline,
            &bind_group,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
    }
}

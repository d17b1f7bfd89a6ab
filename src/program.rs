// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! The fixed set of fragment programs that make up the solver.
//!
//! Every program shares the full-screen vertex stage in `shaders/base.wgsl`
//! and follows one binding contract: a uniform block at binding 0 whose first
//! member is the texel size, then one texture/sampler pair per input, input
//! `n` at bindings `1 + 2n` and `2 + 2n`.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::capabilities::Capabilities;
use crate::context::GpuContext;
use crate::target::{FieldTarget, RenderTarget, Samplers};

pub const BASE_VERTEX: &str = include_str!("../shaders/base.wgsl");

/// Shared vertex stage followed by a fragment stage.
pub fn compose(fragment: &str) -> String {
    format!("{}\n{}", BASE_VERTEX, fragment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Copy,
    Clear,
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Advection,
    Display,
}

impl ProgramKind {
    /// Programs compiled once at startup. Display is specialised per keyword set.
    pub const FIXED: [ProgramKind; 9] = [
        ProgramKind::Copy,
        ProgramKind::Clear,
        ProgramKind::Splat,
        ProgramKind::Curl,
        ProgramKind::Vorticity,
        ProgramKind::Divergence,
        ProgramKind::Pressure,
        ProgramKind::GradientSubtract,
        ProgramKind::Advection,
    ];

    pub const ALL: [ProgramKind; 10] = [
        ProgramKind::Copy,
        ProgramKind::Clear,
        ProgramKind::Splat,
        ProgramKind::Curl,
        ProgramKind::Vorticity,
        ProgramKind::Divergence,
        ProgramKind::Pressure,
        ProgramKind::GradientSubtract,
        ProgramKind::Advection,
        ProgramKind::Display,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::Copy => "copy",
            ProgramKind::Clear => "clear",
            ProgramKind::Splat => "splat",
            ProgramKind::Curl => "curl",
            ProgramKind::Vorticity => "vorticity",
            ProgramKind::Divergence => "divergence",
            ProgramKind::Pressure => "pressure",
            ProgramKind::GradientSubtract => "gradient_subtract",
            ProgramKind::Advection => "advection",
            ProgramKind::Display => "display",
        }
    }

    fn fragment_source(self) -> &'static str {
        match self {
            ProgramKind::Copy => include_str!("../shaders/copy.wgsl"),
            ProgramKind::Clear => include_str!("../shaders/clear.wgsl"),
            ProgramKind::Splat => include_str!("../shaders/splat.wgsl"),
            ProgramKind::Curl => include_str!("../shaders/curl.wgsl"),
            ProgramKind::Vorticity => include_str!("../shaders/vorticity.wgsl"),
            ProgramKind::Divergence => include_str!("../shaders/divergence.wgsl"),
            ProgramKind::Pressure => include_str!("../shaders/pressure.wgsl"),
            ProgramKind::GradientSubtract => include_str!("../shaders/gradient_subtract.wgsl"),
            ProgramKind::Advection => include_str!("../shaders/advection.wgsl"),
            ProgramKind::Display => include_str!("../shaders/display.wgsl"),
        }
    }

    /// Full WGSL module for this program.
    pub fn source(self) -> String {
        compose(self.fragment_source())
    }

    /// Sampled inputs in binding order.
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            ProgramKind::Copy | ProgramKind::Clear | ProgramKind::Display => &["u_texture"],
            ProgramKind::Splat => &["u_target"],
            ProgramKind::Curl | ProgramKind::Divergence => &["u_velocity"],
            ProgramKind::Vorticity => &["u_velocity", "u_curl"],
            ProgramKind::Pressure => &["u_pressure", "u_divergence"],
            ProgramKind::GradientSubtract => &["u_pressure", "u_velocity"],
            ProgramKind::Advection => &["u_velocity", "u_source"],
        }
    }

    /// Size of the uniform block in bytes.
    pub fn uniform_size(self) -> u64 {
        let size = match self {
            ProgramKind::Copy
            | ProgramKind::Curl
            | ProgramKind::Divergence
            | ProgramKind::Pressure
            | ProgramKind::GradientSubtract
            | ProgramKind::Display => std::mem::size_of::<TexelUniforms>(),
            ProgramKind::Clear => std::mem::size_of::<ClearUniforms>(),
            ProgramKind::Splat => std::mem::size_of::<SplatUniforms>(),
            ProgramKind::Vorticity => std::mem::size_of::<VorticityUniforms>(),
            ProgramKind::Advection => std::mem::size_of::<AdvectionUniforms>(),
        };
        size as u64
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct TexelUniforms {
    pub texel_size: [f32; 2],
    pub _pad: [f32; 2],
}

impl TexelUniforms {
    pub fn new(texel_size: [f32; 2]) -> Self {
        Self {
            texel_size,
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ClearUniforms {
    pub texel_size: [f32; 2],
    pub value: f32,
    pub _pad: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SplatUniforms {
    pub texel_size: [f32; 2],
    /// Texture-space centre, origin top-left.
    pub point: [f32; 2],
    pub color: [f32; 4],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct VorticityUniforms {
    pub texel_size: [f32; 2],
    pub curl: f32,
    pub dt: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct AdvectionUniforms {
    pub texel_size: [f32; 2],
    /// Texel size of the advected field, used by manual filtering.
    pub dye_texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    pub _pad: [f32; 2],
}

/// Compiles a module, logging validation errors instead of failing.
pub(crate) fn compile_module(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        log::error!("Shader '{}' failed to compile:\n{}", label, err);
    }
    module
}

pub(crate) fn create_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    input_count: usize,
    filterable: bool,
) -> wgpu::BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];

    let sampler_type = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };

    for unit in 0..input_count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1 + unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(sampler_type),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    constants: &HashMap<String, f64>,
) -> wgpu::RenderPipeline {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions {
                constants,
                ..Default::default()
            },
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions {
                constants,
                ..Default::default()
            },
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        log::error!("Pipeline '{}' ({:?}) failed to link:\n{}", label, format, err);
    }
    pipeline
}

/// Records one full-screen draw and submits it.
pub(crate) fn run_pass(
    gpu: &GpuContext,
    label: &str,
    view: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    load: wgpu::LoadOp<wgpu::Color>,
) {
    let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(label),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
    gpu.queue.submit(std::iter::once(encoder.finish()));
}

/// Binds `inputs` plus the uniform buffer in the shared layout.
pub(crate) fn create_bind_group(
    gpu: &GpuContext,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    samplers: &Samplers,
    inputs: &[&RenderTarget],
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(1 + inputs.len() * 2);
    entries.push(wgpu::BindGroupEntry {
        binding: 0,
        resource: uniform_buffer.as_entire_binding(),
    });
    for (unit, input) in inputs.iter().enumerate() {
        entries.extend(input.attach(unit as u32, samplers));
    }

    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// A compiled fragment program with one pipeline per output format.
pub struct Program {
    kind: ProgramKind,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    locations: HashMap<&'static str, u32>,
    samplers: Arc<Samplers>,
}

impl Program {
    pub fn new(
        gpu: &GpuContext,
        kind: ProgramKind,
        formats: &[wgpu::TextureFormat],
        filterable: bool,
        constants: &HashMap<String, f64>,
        samplers: Arc<Samplers>,
    ) -> Self {
        let label = kind.label();
        let module = compile_module(&gpu.device, label, &kind.source());
        let bind_group_layout = create_bind_group_layout(&gpu.device, label, kind.inputs().len(), filterable);

        let pipelines = formats
            .iter()
            .map(|&format| {
                let pipeline =
                    create_pipeline(&gpu.device, label, &module, &bind_group_layout, format, None, constants);
                (format, pipeline)
            })
            .collect();

        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: kind.uniform_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let locations = kind
            .inputs()
            .iter()
            .enumerate()
            .map(|(unit, &name)| (name, unit as u32))
            .collect();

        Self {
            kind,
            bind_group_layout,
            uniform_buffer,
            pipelines,
            locations,
            samplers,
        }
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    /// Sampling unit of a named input.
    pub fn location(&self, name: &str) -> Option<u32> {
        self.locations.get(name).copied()
    }

    /// Draws into `target`, sampling `inputs` in binding order.
    pub fn draw<U: Pod>(&self, gpu: &GpuContext, target: &mut RenderTarget, uniforms: &U, inputs: &[&RenderTarget]) {
        let label = self.kind.label();
        debug_assert_eq!(std::mem::size_of::<U>() as u64, self.kind.uniform_size());

        if inputs.len() != self.locations.len() {
            log::error!(
                "Program '{}' expects {} inputs, got {}",
                label,
                self.locations.len(),
                inputs.len()
            );
            return;
        }
        let Some(pipeline) = self.pipelines.get(&target.format()) else {
            log::error!("Program '{}' has no pipeline for {:?}", label, target.format());
            return;
        };

        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        let bind_group = create_bind_group(
            gpu,
            label,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.samplers,
            inputs,
        );
        run_pass(gpu, label, target.view(), pipeline, &bind_group, wgpu::LoadOp::Load);
    }
}

/// The nine solver programs, compiled for every field format in use.
pub struct ProgramSet {
    pub copy: Program,
    pub clear: Program,
    pub splat: Program,
    pub curl: Program,
    pub vorticity: Program,
    pub divergence: Program,
    pub pressure: Program,
    pub gradient_subtract: Program,
    pub advection: Program,
    samplers: Arc<Samplers>,
}

impl ProgramSet {
    pub fn new(gpu: &GpuContext, caps: &Capabilities) -> Self {
        let samplers = Arc::new(Samplers::new(&gpu.device));
        let formats = caps.field_formats();
        let filterable = caps.linear_filtering;
        let no_constants = HashMap::new();

        let build = |kind, constants: &HashMap<String, f64>| {
            Program::new(gpu, kind, &formats, filterable, constants, Arc::clone(&samplers))
        };

        let mut advection_constants = HashMap::new();
        advection_constants.insert(
            "MANUAL_FILTERING".to_string(),
            if caps.linear_filtering { 0.0 } else { 1.0 },
        );

        let set = Self {
            copy: build(ProgramKind::Copy, &no_constants),
            clear: build(ProgramKind::Clear, &no_constants),
            splat: build(ProgramKind::Splat, &no_constants),
            curl: build(ProgramKind::Curl, &no_constants),
            vorticity: build(ProgramKind::Vorticity, &no_constants),
            divergence: build(ProgramKind::Divergence, &no_constants),
            pressure: build(ProgramKind::Pressure, &no_constants),
            gradient_subtract: build(ProgramKind::GradientSubtract, &no_constants),
            advection: build(ProgramKind::Advection, &advection_constants),
            samplers: Arc::clone(&samplers),
        };

        log::debug!(
            "Compiled {} programs for {} formats",
            ProgramKind::FIXED.len(),
            formats.len()
        );
        set
    }

    pub fn samplers(&self) -> &Arc<Samplers> {
        &self.samplers
    }

    /// Resamples `source` into `target` through the copy program.
    pub fn copy_into(&self, gpu: &GpuContext, source: &RenderTarget, target: &mut RenderTarget) {
        let uniforms = TexelUniforms::new(target.texel_size());
        self.copy.draw(gpu, target, &uniforms, &[source]);
    }
}

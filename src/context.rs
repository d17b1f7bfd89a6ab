// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use anyhow::Context as _;

/// Device handles shared by every part of the engine.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        })
    }

    /// Acquires an adapter (compatible with `surface` when given) and a device.
    /// This is the only fatal failure of the engine.
    pub async fn new(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> anyhow::Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter found")?;

        // Linear sampling of 32-bit float fields is an optional feature;
        // half-float fields never need it.
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fluid Device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        // Shader and pipeline errors are logged, never fatal.
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            log::error!("Uncaptured GPU error: {err}");
        }));

        let info = adapter.get_info();
        log::info!("GPU: {} ({:?})", info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Device without a presentation surface, for off-screen use and tests.
    pub fn headless() -> anyhow::Result<Self> {
        pollster::block_on(Self::new(Self::create_instance(), None))
    }
}

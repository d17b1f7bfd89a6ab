// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! One solver timestep.

use crate::config::FluidConfig;
use crate::context::GpuContext;
use crate::fields::SimulationFields;
use crate::program::{AdvectionUniforms, ClearUniforms, ProgramSet, TexelUniforms, VorticityUniforms};

/// Advances the fields by `dt` seconds. Pass order is fixed: later passes
/// read what earlier ones wrote.
pub fn step(
    gpu: &GpuContext,
    fields: &mut SimulationFields,
    programs: &ProgramSet,
    config: &FluidConfig,
    dt: f32,
) {
    let texel_size = fields.velocity.texel_size();
    let texel = TexelUniforms::new(texel_size);

    // 1. curl
    programs
        .curl
        .draw(gpu, &mut fields.curl, &texel, &[fields.velocity.read()]);

    // 2. vorticity confinement
    let (read, write) = fields.velocity.split_mut();
    programs.vorticity.draw(
        gpu,
        write,
        &VorticityUniforms {
            texel_size,
            curl: config.curl,
            dt,
        },
        &[read, &fields.curl],
    );
    fields.velocity.swap();

    // 3. divergence
    programs
        .divergence
        .draw(gpu, &mut fields.divergence, &texel, &[fields.velocity.read()]);

    // 4. pressure decay
    let (read, write) = fields.pressure.split_mut();
    programs.clear.draw(
        gpu,
        write,
        &ClearUniforms {
            texel_size,
            value: config.pressure,
            _pad: 0.0,
        },
        &[read],
    );
    fields.pressure.swap();

    // 5. Jacobi iterations
    for _ in 0..config.pressure_iterations {
        let (read, write) = fields.pressure.split_mut();
        programs
            .pressure
            .draw(gpu, write, &texel, &[read, &fields.divergence]);
        fields.pressure.swap();
    }

    // 6. projection
    let (read, write) = fields.velocity.split_mut();
    programs
        .gradient_subtract
        .draw(gpu, write, &texel, &[fields.pressure.read(), read]);
    fields.velocity.swap();

    // 7. velocity self-advection
    let (read, write) = fields.velocity.split_mut();
    programs.advection.draw(
        gpu,
        write,
        &AdvectionUniforms {
            texel_size,
            dye_texel_size: texel_size,
            dt,
            dissipation: config.velocity_dissipation,
            _pad: [0.0; 2],
        },
        &[read, read],
    );
    fields.velocity.swap();

    // 8. dye advection
    let dye_texel_size = fields.dye.texel_size();
    let (read, write) = fields.dye.split_mut();
    programs.advection.draw(
        gpu,
        write,
        &AdvectionUniforms {
            texel_size,
            dye_texel_size,
            dt,
            dissipation: config.density_dissipation,
            _pad: [0.0; 2],
        },
        &[fields.velocity.read(), read],
    );
    fields.dye.swap();
}

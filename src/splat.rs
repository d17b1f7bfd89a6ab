// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Additive Gaussian perturbations of velocity and dye.

use rand::Rng;

use crate::color::{generate_color, Rgb};
use crate::context::GpuContext;
use crate::fields::SimulationFields;
use crate::program::{ProgramSet, SplatUniforms};
use crate::target::FieldTarget;

/// Brightness multiplier for click and burst splats.
pub const CLICK_COLOR_BOOST: f32 = 10.0;

/// One perturbation. Coordinates are normalised with the origin at the
/// bottom-left; the impulse is in the same y-up frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: Rgb,
}

impl Splat {
    /// Centre in texture space, origin top-left.
    pub fn texture_point(&self) -> [f32; 2] {
        [self.x, 1.0 - self.y]
    }

    /// Click splat at `(x, y)`: small random impulse, boosted fresh color.
    pub fn click<R: Rng + ?Sized>(rng: &mut R, x: f32, y: f32) -> Self {
        let (dx, dy) = click_impulse(rng);
        Self {
            x,
            y,
            dx,
            dy,
            color: generate_color(rng).scaled(CLICK_COLOR_BOOST),
        }
    }

    /// Splat at a random position with a strong random impulse.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            x: rng.gen(),
            y: rng.gen(),
            dx: 1000.0 * (rng.gen::<f32>() - 0.5),
            dy: 1000.0 * (rng.gen::<f32>() - 0.5),
            color: generate_color(rng).scaled(CLICK_COLOR_BOOST),
        }
    }
}

pub fn click_impulse<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
    (10.0 * (rng.gen::<f32>() - 0.5), 30.0 * (rng.gen::<f32>() - 0.5))
}

/// Widens the splat on landscape surfaces so it stays round on screen.
pub fn correct_radius(radius: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}

/// Applies `splat` to velocity then dye. `radius` is the configured splat
/// radius; `aspect_ratio` is surface width over height.
pub fn apply(
    gpu: &GpuContext,
    fields: &mut SimulationFields,
    programs: &ProgramSet,
    splat: &Splat,
    radius: f32,
    aspect_ratio: f32,
) {
    let point = splat.texture_point();
    let radius = correct_radius(radius / 100.0, aspect_ratio);

    let (read, write) = fields.velocity.split_mut();
    programs.splat.draw(
        gpu,
        write,
        &SplatUniforms {
            texel_size: read.texel_size(),
            point,
            color: [splat.dx, splat.dy, 0.0, 0.0],
            aspect_ratio,
            radius,
            _pad: [0.0; 2],
        },
        &[read],
    );
    fields.velocity.swap();

    let (read, write) = fields.dye.split_mut();
    programs.splat.draw(
        gpu,
        write,
        &SplatUniforms {
            texel_size: read.texel_size(),
            point,
            color: splat.color.to_array4(),
            aspect_ratio,
            radius,
            _pad: [0.0; 2],
        },
        &[read],
    );
    fields.dye.swap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn radius_grows_only_on_landscape() {
        assert_eq!(correct_radius(0.002, 2.0), 0.004);
        assert_eq!(correct_radius(0.002, 1.0), 0.002);
        assert_eq!(correct_radius(0.002, 0.5), 0.002);
    }

    #[test]
    fn click_impulse_stays_within_jitter() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let (dx, dy) = click_impulse(&mut rng);
            assert!(dx.abs() <= 5.0);
            assert!(dy.abs() <= 15.0);
        }
    }

    #[test]
    fn texture_point_flips_vertical() {
        let splat = Splat {
            x: 0.25,
            y: 0.9,
            dx: 0.0,
            dy: 0.0,
            color: Rgb::BLACK,
        };
        let [x, y] = splat.texture_point();
        assert_eq!(x, 0.25);
        assert!((y - 0.1).abs() < 1e-6);
    }
}

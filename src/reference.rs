// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! CPU mirror of the solver programs.
//!
//! Every function here reproduces one shader texel for texel on plain
//! vectors, with the same texture-space conventions and clamp-to-edge
//! sampling. It exists to check solver properties without a GPU and to
//! compare GPU read-back against.

use crate::config::FluidConfig;
use crate::splat::{correct_radius, Splat};
use crate::target::{DoubleBuffered, FieldTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Linear,
    Nearest,
}

/// A grid of up to four channels. Reads of unstored channels behave like a
/// GPU texture: missing color channels read 0 and a missing alpha reads 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    width: u32,
    height: u32,
    channels: u32,
    filter: Filter,
    data: Vec<[f32; 4]>,
}

impl FieldTarget for Field {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Coordinates handed to a fragment: the texel centre and its neighbours.
#[derive(Debug, Clone, Copy)]
pub struct Frag {
    pub uv: [f32; 2],
    pub l: [f32; 2],
    pub r: [f32; 2],
    pub t: [f32; 2],
    pub b: [f32; 2],
}

impl Field {
    pub fn new(width: u32, height: u32, channels: u32, filter: Filter) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut field = Self {
            width,
            height,
            channels: channels.clamp(1, 4),
            filter,
            data: vec![[0.0; 4]; (width * height) as usize],
        };
        field.fill([0.0; 4]);
        field
    }

    fn mask(&self, mut value: [f32; 4]) -> [f32; 4] {
        for channel in value.iter_mut().take(3).skip(self.channels as usize) {
            *channel = 0.0;
        }
        if self.channels < 4 {
            value[3] = 1.0;
        }
        value
    }

    pub fn fill(&mut self, value: [f32; 4]) {
        let value = self.mask(value);
        self.data.fill(value);
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let value = self.mask(value);
        let index = (y * self.width + x) as usize;
        self.data[index] = value;
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.data
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn texel_center(&self, x: u32, y: u32) -> [f32; 2] {
        [
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        ]
    }

    fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y)
    }

    /// Samples at texture-space `uv` with this field's filter.
    pub fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        match self.filter {
            Filter::Nearest => self.fetch(
                (uv[0] * self.width as f32).floor() as i64,
                (uv[1] * self.height as f32).floor() as i64,
            ),
            Filter::Linear => {
                let sx = uv[0] * self.width as f32 - 0.5;
                let sy = uv[1] * self.height as f32 - 0.5;
                let (ix, iy) = (sx.floor(), sy.floor());
                let (fx, fy) = (sx - ix, sy - iy);
                let (ix, iy) = (ix as i64, iy as i64);
                let top = mix(self.fetch(ix, iy), self.fetch(ix + 1, iy), fx);
                let bottom = mix(self.fetch(ix, iy + 1), self.fetch(ix + 1, iy + 1), fx);
                mix(top, bottom, fy)
            }
        }
    }

    /// Runs `fragment` for every texel, the way a full-screen draw would.
    pub fn render(&mut self, texel_size: [f32; 2], fragment: impl Fn(Frag) -> [f32; 4]) {
        for y in 0..self.height {
            for x in 0..self.width {
                let uv = self.texel_center(x, y);
                let frag = Frag {
                    uv,
                    l: [uv[0] - texel_size[0], uv[1]],
                    r: [uv[0] + texel_size[0], uv[1]],
                    t: [uv[0], uv[1] - texel_size[1]],
                    b: [uv[0], uv[1] + texel_size[1]],
                };
                let value = fragment(frag);
                self.set(x, y, value);
            }
        }
    }

    /// Root of the summed squares of channel 0.
    pub fn l2_norm(&self) -> f32 {
        self.data.iter().map(|v| v[0] * v[0]).sum::<f32>().sqrt()
    }
}

fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

pub fn copy(target: &mut Field, source: &Field) {
    let texel_size = target.texel_size();
    target.render(texel_size, |f| source.sample(f.uv));
}

pub fn clear(target: &mut Field, source: &Field, value: f32) {
    let texel_size = target.texel_size();
    target.render(texel_size, |f| source.sample(f.uv).map(|c| c * value));
}

/// `point` is in texture space; `radius` is already aspect-corrected.
pub fn splat(target: &mut Field, base: &Field, point: [f32; 2], color: [f32; 4], aspect_ratio: f32, radius: f32) {
    let texel_size = target.texel_size();
    target.render(texel_size, |f| {
        let px = (f.uv[0] - point[0]) * aspect_ratio;
        let py = f.uv[1] - point[1];
        let falloff = (-(px * px + py * py) / radius).exp();
        let b = base.sample(f.uv);
        [
            b[0] + falloff * color[0],
            b[1] + falloff * color[1],
            b[2] + falloff * color[2],
            1.0,
        ]
    });
}

pub fn curl(target: &mut Field, velocity: &Field, texel_size: [f32; 2]) {
    target.render(texel_size, |f| {
        let l = velocity.sample(f.l)[1];
        let r = velocity.sample(f.r)[1];
        let t = velocity.sample(f.t)[0];
        let b = velocity.sample(f.b)[0];
        [0.5 * (r - l - t + b), 0.0, 0.0, 1.0]
    });
}

pub fn vorticity(target: &mut Field, velocity: &Field, curl: &Field, texel_size: [f32; 2], strength: f32, dt: f32) {
    target.render(texel_size, |f| {
        let l = curl.sample(f.l)[0];
        let r = curl.sample(f.r)[0];
        let t = curl.sample(f.t)[0];
        let b = curl.sample(f.b)[0];
        let c = curl.sample(f.uv)[0];

        let mut force = [0.5 * (t.abs() - b.abs()), 0.5 * (r.abs() - l.abs())];
        let length = (force[0] * force[0] + force[1] * force[1]).sqrt() + 0.0001;
        force = [force[0] / length * strength * c, -(force[1] / length * strength * c)];

        let v = velocity.sample(f.uv);
        [
            (v[0] + force[0] * dt).clamp(-1000.0, 1000.0),
            (v[1] + force[1] * dt).clamp(-1000.0, 1000.0),
            0.0,
            1.0,
        ]
    });
}

pub fn divergence(target: &mut Field, velocity: &Field, texel_size: [f32; 2]) {
    target.render(texel_size, |f| {
        let c = velocity.sample(f.uv);
        let l = if f.l[0] < 0.0 { -c[0] } else { velocity.sample(f.l)[0] };
        let r = if f.r[0] > 1.0 { -c[0] } else { velocity.sample(f.r)[0] };
        let t = if f.t[1] < 0.0 { -c[1] } else { velocity.sample(f.t)[1] };
        let b = if f.b[1] > 1.0 { -c[1] } else { velocity.sample(f.b)[1] };
        [0.5 * (r - l + t - b), 0.0, 0.0, 1.0]
    });
}

pub fn pressure(target: &mut Field, pressure: &Field, divergence: &Field, texel_size: [f32; 2]) {
    target.render(texel_size, |f| {
        let l = pressure.sample(f.l)[0];
        let r = pressure.sample(f.r)[0];
        let t = pressure.sample(f.t)[0];
        let b = pressure.sample(f.b)[0];
        let div = divergence.sample(f.uv)[0];
        [(l + r + b + t - div) * 0.25, 0.0, 0.0, 1.0]
    });
}

pub fn gradient_subtract(target: &mut Field, pressure: &Field, velocity: &Field, texel_size: [f32; 2]) {
    target.render(texel_size, |f| {
        let l = pressure.sample(f.l)[0];
        let r = pressure.sample(f.r)[0];
        let t = pressure.sample(f.t)[0];
        let b = pressure.sample(f.b)[0];
        let v = velocity.sample(f.uv);
        [v[0] - 0.5 * (r - l), v[1] - 0.5 * (t - b), 0.0, 1.0]
    });
}

/// Parameters of one advection pass.
#[derive(Debug, Clone, Copy)]
pub struct Advection {
    /// Texel size of the velocity grid.
    pub texel_size: [f32; 2],
    /// Texel size of the advected field.
    pub source_texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    /// Bilinear filtering assembled from four nearest lookups.
    pub manual_filtering: bool,
}

pub fn advection(target: &mut Field, velocity: &Field, source: &Field, params: Advection) {
    let texel_size = params.texel_size;
    target.render(texel_size, |f| {
        let v = velocity.sample(f.uv);
        let coord = [
            f.uv[0] - params.dt * v[0] * texel_size[0],
            f.uv[1] + params.dt * v[1] * texel_size[1],
        ];
        let result = if params.manual_filtering {
            bilerp(source, coord, params.source_texel_size)
        } else {
            source.sample(coord)
        };
        let decay = 1.0 + params.dissipation * params.dt;
        [result[0] / decay, result[1] / decay, result[2] / decay, 1.0]
    });
}

fn bilerp(source: &Field, uv: [f32; 2], tsize: [f32; 2]) -> [f32; 4] {
    let st = [uv[0] / tsize[0] - 0.5, uv[1] / tsize[1] - 0.5];
    let i = [st[0].floor(), st[1].floor()];
    let fr = [st[0] - i[0], st[1] - i[1]];
    let at = |dx: f32, dy: f32| source.sample([(i[0] + dx) * tsize[0], (i[1] + dy) * tsize[1]]);

    let a = at(0.5, 0.5);
    let b = at(1.5, 0.5);
    let c = at(0.5, 1.5);
    let d = at(1.5, 1.5);
    mix(mix(a, b, fr[0]), mix(c, d, fr[0]), fr[1])
}

/// CPU counterpart of the GPU field set.
#[derive(Debug, Clone)]
pub struct ReferenceSim {
    pub velocity: DoubleBuffered<Field>,
    pub dye: DoubleBuffered<Field>,
    pub divergence: Field,
    pub curl: Field,
    pub pressure: DoubleBuffered<Field>,
    pub linear_filtering: bool,
}

impl ReferenceSim {
    pub fn new(sim: (u32, u32), dye: (u32, u32), linear_filtering: bool) -> Self {
        let smooth = if linear_filtering { Filter::Linear } else { Filter::Nearest };
        let pair = |(w, h): (u32, u32), channels, filter| {
            DoubleBuffered::new(Field::new(w, h, channels, filter), Field::new(w, h, channels, filter))
        };
        Self {
            velocity: pair(sim, 2, smooth),
            dye: pair(dye, 4, smooth),
            divergence: Field::new(sim.0, sim.1, 1, Filter::Nearest),
            curl: Field::new(sim.0, sim.1, 1, Filter::Nearest),
            pressure: pair(sim, 1, Filter::Nearest),
            linear_filtering,
        }
    }

    pub fn splat(&mut self, splat: &Splat, radius: f32, aspect_ratio: f32) {
        let point = splat.texture_point();
        let radius = correct_radius(radius / 100.0, aspect_ratio);

        let (read, write) = self.velocity.split_mut();
        self::splat(write, read, point, [splat.dx, splat.dy, 0.0, 0.0], aspect_ratio, radius);
        self.velocity.swap();

        let (read, write) = self.dye.split_mut();
        self::splat(write, read, point, splat.color.to_array4(), aspect_ratio, radius);
        self.dye.swap();
    }

    pub fn step(&mut self, config: &FluidConfig, dt: f32) {
        let texel_size = self.velocity.texel_size();

        curl(&mut self.curl, self.velocity.read(), texel_size);

        let (read, write) = self.velocity.split_mut();
        vorticity(write, read, &self.curl, texel_size, config.curl, dt);
        self.velocity.swap();

        divergence(&mut self.divergence, self.velocity.read(), texel_size);

        let (read, write) = self.pressure.split_mut();
        clear(write, read, config.pressure);
        self.pressure.swap();

        self.solve_pressure(config.pressure_iterations);

        let (read, write) = self.velocity.split_mut();
        gradient_subtract(write, self.pressure.read(), read, texel_size);
        self.velocity.swap();

        let manual_filtering = !self.linear_filtering;
        let (read, write) = self.velocity.split_mut();
        advection(
            write,
            read,
            read,
            Advection {
                texel_size,
                source_texel_size: texel_size,
                dt,
                dissipation: config.velocity_dissipation,
                manual_filtering,
            },
        );
        self.velocity.swap();

        let source_texel_size = self.dye.texel_size();
        let (read, write) = self.dye.split_mut();
        advection(
            write,
            self.velocity.read(),
            read,
            Advection {
                texel_size,
                source_texel_size,
                dt,
                dissipation: config.density_dissipation,
                manual_filtering,
            },
        );
        self.dye.swap();
    }

    pub fn solve_pressure(&mut self, iterations: u32) {
        let texel_size = self.pressure.texel_size();
        for _ in 0..iterations {
            let (read, write) = self.pressure.split_mut();
            pressure(write, read, &self.divergence, texel_size);
            self.pressure.swap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn center_splat(dx: f32, dy: f32) -> Splat {
        Splat {
            x: 0.5,
            y: 0.5,
            dx,
            dy,
            color: Rgb::new(1.0, 0.5, 0.25),
        }
    }

    fn magnitude(v: [f32; 4]) -> f32 {
        (v[0] * v[0] + v[1] * v[1]).sqrt()
    }

    #[test]
    fn splat_is_strongest_at_its_centre() {
        let mut sim = ReferenceSim::new((64, 64), (64, 64), true);
        sim.splat(&center_splat(100.0, 0.0), 0.2, 1.0);

        let velocity = sim.velocity.read();
        let centre = magnitude(velocity.get(32, 32));
        let corner = magnitude(velocity.get(0, 0));
        assert!(centre > corner, "centre {centre} corner {corner}");
        assert!(centre > 90.0);

        let dye = sim.dye.read().get(32, 32);
        assert!(dye[0] > dye[1] && dye[1] > dye[2]);
        assert_eq!(dye[3], 1.0);
    }

    #[test]
    fn projection_reduces_divergence() {
        let mut sim = ReferenceSim::new((64, 64), (64, 64), true);
        sim.splat(&center_splat(100.0, 40.0), 0.2, 1.0);

        let texel_size = sim.velocity.texel_size();
        divergence(&mut sim.divergence, sim.velocity.read(), texel_size);
        let before = sim.divergence.l2_norm();
        assert!(before > 0.0);

        sim.solve_pressure(20);
        let (read, write) = sim.velocity.split_mut();
        gradient_subtract(write, sim.pressure.read(), read, texel_size);
        sim.velocity.swap();

        divergence(&mut sim.divergence, sim.velocity.read(), texel_size);
        let after = sim.divergence.l2_norm();
        assert!(after < before, "divergence {before} -> {after}");
    }

    #[test]
    fn zero_dt_step_only_decays_pressure() {
        for linear_filtering in [true, false] {
            let mut sim = ReferenceSim::new((16, 12), (32, 24), linear_filtering);
            {
                let dye = sim.dye.read_mut();
                for y in 0..24 {
                    for x in 0..32 {
                        dye.set(x, y, [x as f32 / 32.0, y as f32 / 24.0, 0.5, 1.0]);
                    }
                }
            }
            sim.pressure.read_mut().fill([2.0, 0.0, 0.0, 0.0]);
            let velocity_before = sim.velocity.read().clone();
            let dye_before = sim.dye.read().clone();

            let config = FluidConfig::default();
            sim.step(&config, 0.0);

            for (a, b) in sim.velocity.read().texels().iter().zip(velocity_before.texels()) {
                assert!((a[0] - b[0]).abs() < 1e-5 && (a[1] - b[1]).abs() < 1e-5);
            }
            for (a, b) in sim.dye.read().texels().iter().zip(dye_before.texels()) {
                for channel in 0..4 {
                    assert!((a[channel] - b[channel]).abs() < 1e-4, "{a:?} vs {b:?}");
                }
            }
            for texel in sim.pressure.read().texels() {
                assert!((texel[0] - 2.0 * config.pressure).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn zero_dt_step_with_motion_only_projects_velocity() {
        for linear_filtering in [true, false] {
            let mut sim = ReferenceSim::new((32, 32), (32, 32), linear_filtering);
            sim.splat(&center_splat(100.0, 40.0), 0.2, 1.0);
            let config = FluidConfig::default();

            // Projection alone: divergence, decayed warm start, Jacobi, gradient subtraction.
            let mut projected = sim.clone();
            let texel_size = projected.velocity.texel_size();
            divergence(&mut projected.divergence, projected.velocity.read(), texel_size);
            let (read, write) = projected.pressure.split_mut();
            clear(write, read, config.pressure);
            projected.pressure.swap();
            projected.solve_pressure(config.pressure_iterations);
            let (read, write) = projected.velocity.split_mut();
            gradient_subtract(write, projected.pressure.read(), read, texel_size);
            projected.velocity.swap();

            let velocity_before = sim.velocity.read().clone();
            let dye_before = sim.dye.read().clone();
            sim.step(&config, 0.0);

            let mut largest_change = 0.0f32;
            for ((a, b), before) in sim
                .velocity
                .read()
                .texels()
                .iter()
                .zip(projected.velocity.read().texels())
                .zip(velocity_before.texels())
            {
                for channel in 0..2 {
                    assert!(
                        (a[channel] - b[channel]).abs() < 1e-3 * (1.0 + b[channel].abs()),
                        "{a:?} vs {b:?}"
                    );
                    largest_change = largest_change.max((a[channel] - before[channel]).abs());
                }
            }
            // The projection is not scaled by dt, so divergent motion is corrected.
            assert!(largest_change > 1.0, "projection left velocity untouched");

            for (a, b) in sim.dye.read().texels().iter().zip(dye_before.texels()) {
                for channel in 0..4 {
                    assert!((a[channel] - b[channel]).abs() < 1e-4, "{a:?} vs {b:?}");
                }
            }
            for (a, b) in sim.pressure.read().texels().iter().zip(projected.pressure.read().texels()) {
                assert!((a[0] - b[0]).abs() < 1e-4 * (1.0 + b[0].abs()), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn unstored_channels_read_like_a_texture() {
        let mut field = Field::new(2, 2, 1, Filter::Nearest);
        field.set(0, 0, [3.0, 4.0, 5.0, 6.0]);
        assert_eq!(field.get(0, 0), [3.0, 0.0, 0.0, 1.0]);
        assert_eq!(field.get(1, 1), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn sampling_clamps_at_edges() {
        let mut field = Field::new(2, 1, 4, Filter::Linear);
        field.set(0, 0, [1.0; 4]);
        field.set(1, 0, [3.0; 4]);
        assert_eq!(field.sample([-1.0, 0.5])[0], 1.0);
        assert_eq!(field.sample([2.0, 0.5])[0], 3.0);
        assert!((field.sample([0.5, 0.5])[0] - 2.0).abs() < 1e-6);
    }
}

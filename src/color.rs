// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

use rand::Rng;

/// Brightness applied to freshly generated pointer colors.
const COLOR_INTENSITY: f32 = 0.15;

/// Linear RGB triple used for dye injection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
        }
    }

    pub fn to_array4(self) -> [f32; 4] {
        [self.r, self.g, self.b, 0.0]
    }
}

/// Six-sector HSV to RGB conversion. All inputs are in [0, 1].
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (sector as i32).rem_euclid(6) {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

/// Random fully saturated hue, dimmed so overlapping splats don't blow out.
pub fn generate_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    hsv_to_rgb(rng.gen::<f32>(), 1.0, 1.0).scaled(COLOR_INTENSITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn primary_hues() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb::new(1.0, 0.0, 0.0));
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(green.g > 0.999 && green.r < 1e-5 && green.b < 1e-5);
        let blue = hsv_to_rgb(2.0 / 3.0, 1.0, 1.0);
        assert!(blue.b > 0.999 && blue.r < 1e-5 && blue.g < 1e-5);
    }

    #[test]
    fn generated_colors_stay_dim() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let c = generate_color(&mut rng);
            let max = c.r.max(c.g).max(c.b);
            assert!((max - COLOR_INTENSITY).abs() < 1e-5, "max channel {max}");
            assert!(c.r >= 0.0 && c.g >= 0.0 && c.b >= 0.0);
        }
    }
}
